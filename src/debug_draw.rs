//! Debug overlay drawing.
//!
//! The simulation never depends on drawing.
//! [`PhysicsSystem::render`](crate::system::PhysicsSystem::render) only hands
//! lines, polygons and boxes to a [`DebugRenderer`];
//! [`FramebufferRenderer`] rasterizes them onto any `DrawTarget`.

use core::fmt::Debug;

use embedded_graphics_core::draw_target::DrawTarget;
use embedded_graphics_core::pixelcolor::{Rgb565, RgbColor};
use embedded_graphics_core::prelude::Point;
use nalgebra::Point2;

use crate::collider::{Collider, Obb2};
use crate::collision::Aabb2;
use crate::math::Vec2;
use crate::viewport::Viewport;

pub const AWAKE_COLOR: Rgb565 = Rgb565::GREEN;
pub const ASLEEP_COLOR: Rgb565 = Rgb565::BLUE;
pub const STATIC_COLOR: Rgb565 = Rgb565::WHITE;
pub const JOINT_COLOR: Rgb565 = Rgb565::YELLOW;
pub const CONTACT_COLOR: Rgb565 = Rgb565::RED;
pub const PARTITION_COLOR: Rgb565 = Rgb565::CYAN;

/// Screen coordinates beyond this are not rasterized.
const MAX_SCREEN_COORD: i32 = 1 << 14;

/// Primitive sink for debug overlays, in world coordinates.
pub trait DebugRenderer {
    fn draw_line(&mut self, from: &Vec2, to: &Vec2, color: Rgb565);

    /// Closed outline through `vertices`.
    fn draw_polygon(&mut self, vertices: &[Vec2], color: Rgb565) {
        for (i, from) in vertices.iter().enumerate() {
            let to = &vertices[(i + 1) % vertices.len()];
            self.draw_line(from, to, color);
        }
    }

    fn draw_obb(&mut self, obb: &Obb2, color: Rgb565) {
        self.draw_polygon(&obb.corners(), color);
    }

    fn draw_aabb(&mut self, aabb: &Aabb2, color: Rgb565) {
        let corners = [
            aabb.min,
            Vec2::new(aabb.max.x, aabb.min.y),
            aabb.max,
            Vec2::new(aabb.min.x, aabb.max.y),
        ];
        self.draw_polygon(&corners, color);
    }

    fn draw_collider(&mut self, collider: &Collider, color: Rgb565) {
        match collider {
            Collider::Obb(obb) => self.draw_obb(obb, color),
            Collider::Polygon(polygon)
            | Collider::Aabb(polygon)
            | Collider::Circle { polygon, .. } => self.draw_polygon(polygon.vertices(), color),
        }
    }

    /// Small `+` marker.
    fn draw_cross(&mut self, center: &Vec2, half_size: f32, color: Rgb565) {
        let dx = Vec2::new(half_size, 0.0);
        let dy = Vec2::new(0.0, half_size);
        self.draw_line(&(center - dx), &(center + dx), color);
        self.draw_line(&(center - dy), &(center + dy), color);
    }
}

/// Rasterizes debug primitives onto an `Rgb565` draw target through a
/// [`Viewport`].
pub struct FramebufferRenderer<'a, D> {
    target: &'a mut D,
    viewport: Viewport,
    failed_draws: u32,
}

impl<'a, D> FramebufferRenderer<'a, D>
where
    D: DrawTarget<Color = Rgb565>,
    <D as DrawTarget>::Error: Debug,
{
    pub fn new(target: &'a mut D, viewport: Viewport) -> Self {
        Self {
            target,
            viewport,
            failed_draws: 0,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    /// Draw calls the target rejected.
    pub fn failed_draws(&self) -> u32 {
        self.failed_draws
    }

    fn draw_screen_line(&mut self, p1: Point2<i32>, p2: Point2<i32>, color: Rgb565) {
        let (width, height) = self.viewport.size();
        let (width, height) = (width as i32, height as i32);

        // Trivially reject lines entirely off one side of the screen
        if (p1.x < 0 && p2.x < 0)
            || (p1.y < 0 && p2.y < 0)
            || (p1.x >= width && p2.x >= width)
            || (p1.y >= height && p2.y >= height)
        {
            return;
        }
        if [p1.x, p1.y, p2.x, p2.y]
            .iter()
            .any(|c| c.abs() > MAX_SCREEN_COORD)
        {
            log::trace!("debug line out of raster range");
            return;
        }

        let result = self.target.draw_iter(
            line_drawing::Bresenham::new((p1.x, p1.y), (p2.x, p2.y))
                .filter(|(x, y)| *x >= 0 && *y >= 0 && *x < width && *y < height)
                .map(|(x, y)| embedded_graphics_core::Pixel(Point::new(x, y), color)),
        );
        if let Err(e) = result {
            self.failed_draws = self.failed_draws.saturating_add(1);
            log::error!("debug draw failed: {:?}", e);
        }
    }
}

impl<'a, D> DebugRenderer for FramebufferRenderer<'a, D>
where
    D: DrawTarget<Color = Rgb565>,
    <D as DrawTarget>::Error: Debug,
{
    fn draw_line(&mut self, from: &Vec2, to: &Vec2, color: Rgb565) {
        let p1 = self.viewport.world_to_screen(from);
        let p2 = self.viewport.world_to_screen(to);
        self.draw_screen_line(p1, p2, color);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use embedded_graphics_core::prelude::*;

    // Mock framebuffer for testing
    struct MockFramebuffer {
        pixels: std::vec::Vec<(i32, i32, Rgb565)>,
        fail: bool,
    }

    impl MockFramebuffer {
        fn new() -> Self {
            Self {
                pixels: std::vec::Vec::new(),
                fail: false,
            }
        }

        fn contains_pixel(&self, x: i32, y: i32) -> bool {
            self.pixels.iter().any(|(px, py, _)| *px == x && *py == y)
        }

        fn pixel_count(&self) -> usize {
            self.pixels.len()
        }
    }

    impl DrawTarget for MockFramebuffer {
        type Color = Rgb565;
        type Error = ();

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = embedded_graphics_core::Pixel<Self::Color>>,
        {
            if self.fail {
                return Err(());
            }
            for pixel in pixels {
                self.pixels.push((pixel.0.x, pixel.0.y, pixel.1));
            }
            Ok(())
        }
    }

    impl OriginDimensions for MockFramebuffer {
        fn size(&self) -> Size {
            Size::new(100, 100)
        }
    }

    fn viewport() -> Viewport {
        let mut viewport = Viewport::new(100, 100);
        viewport.set_zoom(10.0);
        viewport
    }

    /// Records world-space lines.
    struct LineRecorder {
        lines: std::vec::Vec<(Vec2, Vec2)>,
    }

    impl DebugRenderer for LineRecorder {
        fn draw_line(&mut self, from: &Vec2, to: &Vec2, _color: Rgb565) {
            self.lines.push((*from, *to));
        }
    }

    #[test]
    fn test_draw_line_horizontal() {
        let mut fb = MockFramebuffer::new();
        let mut renderer = FramebufferRenderer::new(&mut fb, viewport());
        renderer.draw_line(&Vec2::new(-1.0, 0.0), &Vec2::new(1.0, 0.0), JOINT_COLOR);

        assert_eq!(fb.pixel_count(), 21);
        assert!(fb.contains_pixel(40, 50));
        assert!(fb.contains_pixel(60, 50));
    }

    #[test]
    fn test_offscreen_pixels_are_clipped() {
        let mut fb = MockFramebuffer::new();
        let mut renderer = FramebufferRenderer::new(&mut fb, viewport());
        renderer.draw_line(&Vec2::new(0.0, 0.0), &Vec2::new(20.0, 0.0), JOINT_COLOR);
        renderer.draw_line(&Vec2::new(30.0, 0.0), &Vec2::new(40.0, 0.0), JOINT_COLOR);

        assert!(fb.pixels.iter().all(|(x, y, _)| *x >= 0 && *x < 100 && *y >= 0 && *y < 100));
        assert_eq!(fb.pixel_count(), 50);
    }

    #[test]
    fn test_failed_draw_is_counted() {
        let mut fb = MockFramebuffer::new();
        fb.fail = true;
        let mut renderer = FramebufferRenderer::new(&mut fb, viewport());
        renderer.draw_line(&Vec2::new(-1.0, 0.0), &Vec2::new(1.0, 0.0), CONTACT_COLOR);
        assert_eq!(renderer.failed_draws(), 1);
    }

    #[test]
    fn test_polygon_is_closed() {
        let mut recorder = LineRecorder {
            lines: std::vec::Vec::new(),
        };
        let triangle = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        recorder.draw_polygon(&triangle, AWAKE_COLOR);
        assert_eq!(recorder.lines.len(), 3);
        assert_eq!(recorder.lines[2], (triangle[2], triangle[0]));
    }

    #[test]
    fn test_collider_outlines() {
        let mut recorder = LineRecorder {
            lines: std::vec::Vec::new(),
        };
        recorder.draw_collider(&Collider::obb(Vec2::new(1.0, 1.0)), STATIC_COLOR);
        assert_eq!(recorder.lines.len(), 4);

        recorder.lines.clear();
        recorder.draw_collider(&Collider::circle(1.0), AWAKE_COLOR);
        assert_eq!(recorder.lines.len(), crate::collider::CIRCLE_SIDES);
    }
}
