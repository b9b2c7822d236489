//! Convex collision shapes.
//!
//! Every shape exposes a support function, which is all the GJK/EPA narrow
//! phase needs, plus area (for mass), dimensions and an oriented bounding box
//! (for the broad phase).
//!
//! # Shapes
//! - [`Collider::Polygon`]: regular or arbitrary convex N-gon
//! - [`Collider::Obb`]: oriented box
//! - [`Collider::Circle`]: a 65-sided polygon for outline and containment,
//!   with an exact circular support function
//! - [`Collider::Aabb`]: a 4-sided polygon that stays axis-aligned

use alloc::vec::Vec;
use core::f32::consts::PI;

use crate::math::{self, Vec2};

// ComplexField provides sqrt()/sin()/cos() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

/// Number of sides used to approximate a circle.
pub const CIRCLE_SIDES: usize = 65;

/// Vertices within this fraction of the shape's largest half-extent of the
/// extreme depth belong to the same extreme feature.
const FEATURE_TOLERANCE: f32 = 1e-2;

/// Oriented bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb2 {
    pub position: Vec2,
    pub half_extents: Vec2,
    /// Orientation in degrees.
    pub orientation: f32,
}

impl Obb2 {
    pub fn new(position: Vec2, half_extents: Vec2, orientation: f32) -> Self {
        Self {
            position,
            half_extents,
            orientation,
        }
    }

    /// Local X and Y axes in world space.
    pub fn axes(&self) -> (Vec2, Vec2) {
        let x = math::rotate_degrees(&Vec2::new(1.0, 0.0), self.orientation);
        (x, math::perpendicular(&x))
    }

    /// Corners in counter-clockwise order.
    pub fn corners(&self) -> [Vec2; 4] {
        let (ax, ay) = self.axes();
        let ex = ax * self.half_extents.x;
        let ey = ay * self.half_extents.y;
        let p = self.position;
        [p - ex - ey, p + ex - ey, p + ex + ey, p - ex + ey]
    }

    pub fn area(&self) -> f32 {
        4.0 * self.half_extents.x * self.half_extents.y
    }

    pub fn contains(&self, point: &Vec2) -> bool {
        let (ax, ay) = self.axes();
        let d = point - self.position;
        d.dot(&ax).abs() <= self.half_extents.x && d.dot(&ay).abs() <= self.half_extents.y
    }

    /// Closest point on or inside the box to `point`.
    pub fn closest_point(&self, point: &Vec2) -> Vec2 {
        let (ax, ay) = self.axes();
        let d = point - self.position;
        let lx = d.dot(&ax).clamp(-self.half_extents.x, self.half_extents.x);
        let ly = d.dot(&ay).clamp(-self.half_extents.y, self.half_extents.y);
        self.position + ax * lx + ay * ly
    }

    /// Corner farthest along `direction`.
    pub fn support(&self, direction: &Vec2) -> Vec2 {
        farthest_along(&self.corners(), direction).unwrap_or(self.position)
    }
}

/// Convex polygon stored as counter-clockwise local vertices around its
/// position, with a cached world-space copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon2 {
    position: Vec2,
    orientation: f32,
    half_extents: Vec2,
    local_vertices: Vec<Vec2>,
    vertices: Vec<Vec2>,
}

impl Polygon2 {
    /// Regular polygon inscribed in the ellipse spanned by `half_extents`.
    ///
    /// `sides` below 3 is raised to 3.
    pub fn regular(sides: usize, half_extents: Vec2) -> Self {
        let sides = sides.max(3);
        let step = 360.0 / sides as f32;
        let local_vertices = (0..sides)
            .map(|i| {
                let angle = (step * i as f32).to_radians();
                Vec2::new(angle.cos() * half_extents.x, angle.sin() * half_extents.y)
            })
            .collect();
        Self::from_local_vertices(local_vertices)
    }

    /// Polygon from vertices relative to its center. Clockwise input is
    /// reversed so the winding is always counter-clockwise.
    pub fn from_local_vertices(mut local_vertices: Vec<Vec2>) -> Self {
        if signed_area(&local_vertices) < 0.0 {
            local_vertices.reverse();
        }
        let (_, half_extents) = local_box(&local_vertices);
        let mut polygon = Self {
            position: Vec2::zeros(),
            orientation: 0.0,
            half_extents,
            vertices: local_vertices.clone(),
            local_vertices,
        };
        polygon.update_vertices();
        polygon
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.update_vertices();
    }

    pub fn orientation(&self) -> f32 {
        self.orientation
    }

    pub fn set_orientation(&mut self, degrees: f32) {
        self.orientation = math::wrap_degrees(degrees);
        self.update_vertices();
    }

    pub fn half_extents(&self) -> Vec2 {
        self.half_extents
    }

    /// World-space vertices, counter-clockwise.
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    pub fn side_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn area(&self) -> f32 {
        signed_area(&self.local_vertices).abs()
    }

    pub fn support(&self, direction: &Vec2) -> Vec2 {
        farthest_along(&self.vertices, direction).unwrap_or(self.position)
    }

    pub fn contains(&self, point: &Vec2) -> bool {
        edges(&self.vertices).all(|(a, b)| math::cross(&(b - a), &(point - a)) >= 0.0)
    }

    /// `point` itself when inside, otherwise the closest point on the outline.
    pub fn closest_point(&self, point: &Vec2) -> Vec2 {
        if self.contains(point) {
            return *point;
        }
        edges(&self.vertices)
            .map(|(a, b)| math::closest_point_on_segment(point, &a, &b))
            .min_by(|p, q| {
                (p - point)
                    .norm_squared()
                    .total_cmp(&(q - point).norm_squared())
            })
            .unwrap_or(self.position)
    }

    /// Tight box in the polygon's own frame.
    pub fn bounds(&self) -> Obb2 {
        let (center, half_extents) = local_box(&self.local_vertices);
        Obb2::new(
            self.position + math::rotate_degrees(&center, self.orientation),
            half_extents,
            self.orientation,
        )
    }

    fn update_vertices(&mut self) {
        let (position, orientation) = (self.position, self.orientation);
        for (world, local) in self.vertices.iter_mut().zip(self.local_vertices.iter()) {
            *world = position + math::rotate_degrees(local, orientation);
        }
    }
}

/// Collision shape attached to a rigid body.
#[derive(Debug, Clone, PartialEq)]
pub enum Collider {
    Polygon(Polygon2),
    Obb(Obb2),
    /// Circle of `radius`; `polygon` is its 65-gon outline.
    Circle { polygon: Polygon2, radius: f32 },
    /// Axis-aligned box; rotation requests are ignored.
    Aabb(Polygon2),
}

impl Collider {
    /// Regular N-gon.
    pub fn polygon(sides: usize, half_extents: Vec2) -> Self {
        Collider::Polygon(Polygon2::regular(sides, half_extents))
    }

    /// Arbitrary convex polygon given relative to its center.
    pub fn convex(local_vertices: Vec<Vec2>) -> Self {
        Collider::Polygon(Polygon2::from_local_vertices(local_vertices))
    }

    pub fn obb(half_extents: Vec2) -> Self {
        Collider::Obb(Obb2::new(Vec2::zeros(), half_extents, 0.0))
    }

    pub fn circle(radius: f32) -> Self {
        Collider::Circle {
            polygon: Polygon2::regular(CIRCLE_SIDES, Vec2::new(radius, radius)),
            radius,
        }
    }

    pub fn aabb(half_extents: Vec2) -> Self {
        let (hx, hy) = (half_extents.x, half_extents.y);
        Collider::Aabb(Polygon2::from_local_vertices(alloc::vec![
            Vec2::new(-hx, -hy),
            Vec2::new(hx, -hy),
            Vec2::new(hx, hy),
            Vec2::new(-hx, hy),
        ]))
    }

    /// Point of the shape farthest along `direction`.
    pub fn support(&self, direction: &Vec2) -> Vec2 {
        match self {
            Collider::Polygon(polygon) | Collider::Aabb(polygon) => polygon.support(direction),
            Collider::Obb(obb) => obb.support(direction),
            Collider::Circle { polygon, radius } => {
                let dir = math::try_normalize(direction).unwrap_or(Vec2::new(1.0, 0.0));
                polygon.position() + dir * *radius
            }
        }
    }

    pub fn calc_area(&self) -> f32 {
        match self {
            Collider::Polygon(polygon) | Collider::Aabb(polygon) => polygon.area(),
            Collider::Obb(obb) => obb.area(),
            Collider::Circle { radius, .. } => PI * radius * radius,
        }
    }

    /// Half-extents of the shape in its own frame.
    pub fn calc_dimensions(&self) -> Vec2 {
        match self {
            Collider::Polygon(polygon) | Collider::Aabb(polygon) => polygon.half_extents(),
            Collider::Obb(obb) => obb.half_extents,
            Collider::Circle { radius, .. } => Vec2::new(*radius, *radius),
        }
    }

    pub fn bounds(&self) -> Obb2 {
        match self {
            Collider::Polygon(polygon) | Collider::Aabb(polygon) => polygon.bounds(),
            Collider::Obb(obb) => *obb,
            Collider::Circle { polygon, radius } => Obb2::new(
                polygon.position(),
                Vec2::new(*radius, *radius),
                polygon.orientation(),
            ),
        }
    }

    pub fn position(&self) -> Vec2 {
        match self {
            Collider::Polygon(polygon)
            | Collider::Aabb(polygon)
            | Collider::Circle { polygon, .. } => polygon.position(),
            Collider::Obb(obb) => obb.position,
        }
    }

    pub fn set_position(&mut self, position: Vec2) {
        match self {
            Collider::Polygon(polygon)
            | Collider::Aabb(polygon)
            | Collider::Circle { polygon, .. } => polygon.set_position(position),
            Collider::Obb(obb) => obb.position = position,
        }
    }

    pub fn translate(&mut self, delta: &Vec2) {
        let position = self.position() + delta;
        self.set_position(position);
    }

    pub fn orientation(&self) -> f32 {
        match self {
            Collider::Polygon(polygon)
            | Collider::Aabb(polygon)
            | Collider::Circle { polygon, .. } => polygon.orientation(),
            Collider::Obb(obb) => obb.orientation,
        }
    }

    pub fn set_orientation(&mut self, degrees: f32) {
        match self {
            Collider::Polygon(polygon) | Collider::Circle { polygon, .. } => {
                polygon.set_orientation(degrees)
            }
            Collider::Obb(obb) => obb.orientation = math::wrap_degrees(degrees),
            // Stays axis-aligned
            Collider::Aabb(polygon) => polygon.set_orientation(0.0),
        }
    }

    pub fn rotate(&mut self, degrees: f32) {
        let orientation = self.orientation() + degrees;
        self.set_orientation(orientation);
    }

    pub fn contains(&self, point: &Vec2) -> bool {
        match self {
            Collider::Polygon(polygon) | Collider::Aabb(polygon) => polygon.contains(point),
            Collider::Obb(obb) => obb.contains(point),
            Collider::Circle { polygon, radius } => {
                (point - polygon.position()).norm_squared() <= radius * radius
            }
        }
    }

    /// `point` itself when inside, otherwise the closest point on the outline.
    pub fn closest_point(&self, point: &Vec2) -> Vec2 {
        match self {
            Collider::Polygon(polygon) | Collider::Aabb(polygon) => polygon.closest_point(point),
            Collider::Obb(obb) => obb.closest_point(point),
            Collider::Circle { polygon, radius } => {
                let center = polygon.position();
                let offset = point - center;
                if offset.norm_squared() <= radius * radius {
                    *point
                } else {
                    center + offset.normalize() * *radius
                }
            }
        }
    }

    /// Moment of inertia for a body of `mass` using this shape.
    ///
    /// Circles use the solid disc formula, everything else the solid box
    /// spanned by [`calc_dimensions`](Self::calc_dimensions).
    pub fn moment_of_inertia(&self, mass: f32) -> f32 {
        match self {
            Collider::Circle { radius, .. } => 0.5 * mass * radius * radius,
            _ => {
                let he = self.calc_dimensions();
                mass * (he.x * he.x + he.y * he.y) / 3.0
            }
        }
    }

    /// Vertex or edge of the shape farthest along `direction`, as the two
    /// ends of the edge. Both ends are the same point for a vertex, and
    /// always for a circle.
    pub fn extreme_feature(&self, direction: &Vec2) -> (Vec2, Vec2) {
        let corners;
        let vertices: &[Vec2] = match self {
            Collider::Polygon(polygon) | Collider::Aabb(polygon) => polygon.vertices(),
            Collider::Obb(obb) => {
                corners = obb.corners();
                &corners
            }
            Collider::Circle { .. } => {
                let point = self.support(direction);
                return (point, point);
            }
        };
        let Some(direction) = math::try_normalize(direction) else {
            let point = self.support(&Vec2::new(1.0, 0.0));
            return (point, point);
        };

        let dimensions = self.calc_dimensions();
        let tolerance = FEATURE_TOLERANCE * dimensions.x.max(dimensions.y);
        let depth = vertices
            .iter()
            .map(|v| v.dot(&direction))
            .fold(f32::NEG_INFINITY, f32::max);
        let tangent = math::perpendicular(&direction);

        let mut feature: Option<(Vec2, Vec2)> = None;
        for vertex in vertices.iter().filter(|v| depth - v.dot(&direction) <= tolerance) {
            feature = Some(match feature {
                None => (*vertex, *vertex),
                Some((lo, hi)) => {
                    let t = vertex.dot(&tangent);
                    (
                        if t < lo.dot(&tangent) { *vertex } else { lo },
                        if t > hi.dot(&tangent) { *vertex } else { hi },
                    )
                }
            });
        }
        feature.unwrap_or_else(|| {
            let point = self.support(&direction);
            (point, point)
        })
    }

    /// Outline polygon, if the shape is stored as one.
    pub fn as_polygon(&self) -> Option<&Polygon2> {
        match self {
            Collider::Polygon(polygon)
            | Collider::Aabb(polygon)
            | Collider::Circle { polygon, .. } => Some(polygon),
            Collider::Obb(_) => None,
        }
    }
}

fn farthest_along(points: &[Vec2], direction: &Vec2) -> Option<Vec2> {
    points
        .iter()
        .copied()
        .max_by(|a, b| a.dot(direction).total_cmp(&b.dot(direction)))
}

fn edges(vertices: &[Vec2]) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
    let n = vertices.len();
    (0..n).map(move |i| (vertices[i], vertices[(i + 1) % n]))
}

fn signed_area(vertices: &[Vec2]) -> f32 {
    0.5 * edges(vertices).map(|(a, b)| math::cross(&a, &b)).sum::<f32>()
}

/// Center and half-extents of the axis-aligned box around `vertices`.
fn local_box(vertices: &[Vec2]) -> (Vec2, Vec2) {
    let Some(first) = vertices.first() else {
        return (Vec2::zeros(), Vec2::zeros());
    };
    let (min, max) = vertices.iter().fold((*first, *first), |(min, max), v| {
        (min.inf(v), max.sup(v))
    });
    ((min + max) * 0.5, (max - min) * 0.5)
}
