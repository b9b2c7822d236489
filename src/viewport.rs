use nalgebra::{Matrix3, Point2};

// ComplexField provides round() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

use crate::collision::Aabb2;
use crate::math::Vec2;

/// Maps world coordinates (y up) onto a `width` x `height` pixel screen
/// (y down), centered on `center`.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    center: Vec2,
    /// Pixels per world unit.
    zoom: f32,
    width: u16,
    height: u16,
    world_to_screen: Matrix3<f32>,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Viewport {
        let mut ret = Viewport {
            center: Vec2::zeros(),
            zoom: 1.0,
            width,
            height,
            world_to_screen: Matrix3::identity(),
        };

        ret.update_matrix();

        ret
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn set_center(&mut self, center: Vec2) {
        self.center = center;

        self.update_matrix();
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Ignored unless positive and finite.
    pub fn set_zoom(&mut self, pixels_per_unit: f32) {
        if !(pixels_per_unit.is_finite() && pixels_per_unit > 0.0) {
            return;
        }
        self.zoom = pixels_per_unit;

        self.update_matrix();
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn matrix(&self) -> &Matrix3<f32> {
        &self.world_to_screen
    }

    pub fn world_to_screen(&self, world: &Vec2) -> Point2<i32> {
        let p = self.world_to_screen.transform_point(&Point2::from(*world));
        Point2::new(p.x.round() as i32, p.y.round() as i32)
    }

    pub fn screen_to_world(&self, screen: &Point2<i32>) -> Vec2 {
        let half = self.half_size();
        Vec2::new(
            (screen.x as f32 - half.x) / self.zoom + self.center.x,
            (half.y - screen.y as f32) / self.zoom + self.center.y,
        )
    }

    /// The part of the world that lands on screen.
    pub fn visible_bounds(&self) -> Aabb2 {
        let half = self.half_size() / self.zoom;
        Aabb2::from_center(self.center, half)
    }

    pub fn is_visible(&self, bounds: &Aabb2) -> bool {
        self.visible_bounds().overlaps(bounds)
    }

    fn half_size(&self) -> Vec2 {
        Vec2::new(self.width as f32 * 0.5, self.height as f32 * 0.5)
    }

    fn update_matrix(&mut self) {
        let half = self.half_size();
        self.world_to_screen = Matrix3::new_translation(&half)
            * Matrix3::new_nonuniform_scaling(&Vec2::new(self.zoom, -self.zoom))
            * Matrix3::new_translation(&-self.center);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_creation() {
        let viewport = Viewport::new(320, 240);
        assert_eq!(viewport.size(), (320, 240));
        assert_eq!(viewport.zoom(), 1.0);
        assert_eq!(viewport.world_to_screen(&Vec2::zeros()), Point2::new(160, 120));
    }

    #[test]
    fn test_y_axis_points_up() {
        let mut viewport = Viewport::new(320, 240);
        viewport.set_zoom(10.0);
        let above = viewport.world_to_screen(&Vec2::new(0.0, 1.0));
        assert_eq!(above, Point2::new(160, 110));
        let right = viewport.world_to_screen(&Vec2::new(1.0, 0.0));
        assert_eq!(right, Point2::new(170, 120));
    }

    #[test]
    fn test_set_center_updates_matrix() {
        let mut viewport = Viewport::new(100, 100);
        let initial = *viewport.matrix();
        viewport.set_center(Vec2::new(5.0, 5.0));
        assert_ne!(*viewport.matrix(), initial);
        assert_eq!(viewport.world_to_screen(&Vec2::new(5.0, 5.0)), Point2::new(50, 50));
    }

    #[test]
    fn test_screen_to_world_inverts() {
        let mut viewport = Viewport::new(200, 100);
        viewport.set_zoom(4.0);
        viewport.set_center(Vec2::new(-3.0, 2.0));
        let world = Vec2::new(-1.0, 4.5);
        let back = viewport.screen_to_world(&viewport.world_to_screen(&world));
        assert!((back - world).norm() < 0.5);
    }

    #[test]
    fn test_visible_bounds_and_bad_zoom() {
        let mut viewport = Viewport::new(100, 50);
        viewport.set_zoom(10.0);
        viewport.set_zoom(0.0);
        viewport.set_zoom(f32::NAN);
        assert_eq!(viewport.zoom(), 10.0);

        let bounds = viewport.visible_bounds();
        assert!((bounds.max.x - 5.0).abs() < 1e-5);
        assert!((bounds.max.y - 2.5).abs() < 1e-5);
        let offscreen = Aabb2::from_center(Vec2::new(20.0, 0.0), Vec2::new(1.0, 1.0));
        assert!(!viewport.is_visible(&offscreen));
    }
}
