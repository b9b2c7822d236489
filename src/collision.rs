//! Collision detection: AABB broad phase, GJK intersection and EPA
//! penetration.
//!
//! GJK and EPA only ever query shapes through [`Collider::support`], so any
//! convex collider works with any other. Both algorithms are bounded by an
//! iteration cap; when EPA runs out of iterations it returns the best edge it
//! has found so far.

use core::cmp::Ordering;

use crate::body_set::BodyId;
use crate::collider::{Collider, Obb2};
use crate::math::{self, Vec2};

// ComplexField provides sqrt()/abs() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

/// Maximum number of GJK refinement steps.
pub const GJK_MAX_ITERATIONS: usize = 32;
/// Maximum number of polytope expansions in EPA.
pub const EPA_MAX_ITERATIONS: usize = 64;
/// EPA stops once a new support point improves the edge distance by less than this.
pub const EPA_TOLERANCE: f32 = 1e-4;

const POLYTOPE_CAPACITY: usize = EPA_MAX_ITERATIONS + 3;

/// Axis-aligned bounding box used by the broad phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb2 {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Smallest box containing the oriented box.
    pub fn from_obb(obb: &Obb2) -> Self {
        let corners = obb.corners();
        let mut min = corners[0];
        let mut max = corners[0];
        for corner in &corners[1..] {
            min = min.inf(corner);
            max = max.sup(corner);
        }
        Self::new(min, max)
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    /// Touching boxes count as overlapping.
    pub fn overlaps(&self, other: &Aabb2) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}

/// Outcome of [`gjk`].
///
/// When `collides` is `true` the simplex holds three points whose triangle
/// contains the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct GjkResult {
    pub collides: bool,
    pub simplex: heapless::Vec<Vec2, 3>,
}

/// Outcome of [`epa`]: penetration depth and the normal pointing from the
/// first shape toward the second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpaResult {
    pub distance: f32,
    pub normal: Vec2,
}

/// A resolved contact between two bodies.
///
/// Equality and ordering only look at the body pair, so a set of
/// `CollisionData` keeps at most one contact per pair.
#[derive(Debug, Clone, Copy)]
pub struct CollisionData {
    pub a: BodyId,
    pub b: BodyId,
    /// Penetration depth.
    pub distance: f32,
    /// Unit normal from `a` toward `b`.
    pub normal: Vec2,
}

impl CollisionData {
    /// The body pair with the smaller id first.
    pub fn key(&self) -> (BodyId, BodyId) {
        if self.a <= self.b {
            (self.a, self.b)
        } else {
            (self.b, self.a)
        }
    }

    pub fn involves(&self, id: BodyId) -> bool {
        self.a == id || self.b == id
    }
}

impl PartialEq for CollisionData {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for CollisionData {}

impl PartialOrd for CollisionData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CollisionData {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Support point of the Minkowski difference `a - b`.
#[inline]
pub fn minkowski_support(a: &Collider, b: &Collider, direction: &Vec2) -> Vec2 {
    a.support(direction) - b.support(&-direction)
}

/// Gilbert-Johnson-Keerthi intersection test.
pub fn gjk(a: &Collider, b: &Collider) -> GjkResult {
    gjk_with_limit(a, b, GJK_MAX_ITERATIONS)
}

pub(crate) fn gjk_with_limit(a: &Collider, b: &Collider, max_iterations: usize) -> GjkResult {
    let mut simplex: heapless::Vec<Vec2, 3> = heapless::Vec::new();

    let mut direction = b.position() - a.position();
    if direction.norm_squared() <= math::NEAR_ZERO_SQ {
        direction = Vec2::new(1.0, 0.0);
    }

    let first = minkowski_support(a, b, &direction);
    let _ = simplex.push(first);
    direction = -first;
    if direction.norm_squared() <= math::NEAR_ZERO_SQ {
        // The origin sits on a support point; search sideways to build area
        direction = Vec2::new(0.0, 1.0);
    }

    for _ in 0..max_iterations {
        let point = minkowski_support(a, b, &direction);
        if point.dot(&direction) < 0.0 {
            // Nothing reaches past the origin along `direction`
            return GjkResult {
                collides: false,
                simplex,
            };
        }
        if simplex.push(point).is_err() {
            break;
        }
        if evolve_simplex(&mut simplex, &mut direction) {
            return GjkResult {
                collides: true,
                simplex,
            };
        }
    }

    log::warn!("gjk: iteration cap reached, treating pair as separated");
    GjkResult {
        collides: false,
        simplex,
    }
}

/// Update the simplex toward the origin. Returns `true` once a triangle
/// encloses it; otherwise drops points and sets the next search direction.
fn evolve_simplex(simplex: &mut heapless::Vec<Vec2, 3>, direction: &mut Vec2) -> bool {
    match simplex.len() {
        2 => {
            line_case(simplex, direction);
            false
        }
        3 => {
            let a = simplex[2];
            let b = simplex[1];
            let c = simplex[0];
            let ab = b - a;
            let ac = c - a;
            let ao = -a;

            if math::cross(&ab, &ac).abs() <= math::NEAR_ZERO_SQ {
                // Degenerate triangle: keep the newest edge
                simplex.remove(0);
                line_case(simplex, direction);
                return false;
            }

            let ab_perp = math::triple_product(&ac, &ab, &ab);
            let ac_perp = math::triple_product(&ab, &ac, &ac);

            if ab_perp.dot(&ao) > 0.0 {
                simplex.remove(0);
                *direction = ab_perp;
                false
            } else if ac_perp.dot(&ao) > 0.0 {
                simplex.remove(1);
                *direction = ac_perp;
                false
            } else {
                true
            }
        }
        _ => {
            *direction = -simplex[0];
            false
        }
    }
}

fn line_case(simplex: &mut heapless::Vec<Vec2, 3>, direction: &mut Vec2) {
    let a = simplex[1];
    let b = simplex[0];
    let ab = b - a;
    let ao = -a;

    if ab.norm_squared() <= math::NEAR_ZERO_SQ {
        // Coincident supports; restart from the newest point
        simplex.remove(0);
        *direction = if ao.norm_squared() <= math::NEAR_ZERO_SQ {
            Vec2::new(0.0, 1.0)
        } else {
            ao
        };
        return;
    }

    let toward_origin = math::triple_product(&ab, &ao, &ab);
    *direction = if toward_origin.norm_squared() <= math::NEAR_ZERO_SQ {
        // Origin on the segment's line; either side works
        math::perpendicular(&ab)
    } else {
        toward_origin
    };
}

/// Expanding Polytope Algorithm on a colliding GJK simplex.
///
/// Returns `None` when the simplex does not describe a collision.
pub fn epa(a: &Collider, b: &Collider, gjk_result: &GjkResult) -> Option<EpaResult> {
    epa_with_limit(a, b, gjk_result, EPA_MAX_ITERATIONS)
}

pub(crate) fn epa_with_limit(
    a: &Collider,
    b: &Collider,
    gjk_result: &GjkResult,
    max_iterations: usize,
) -> Option<EpaResult> {
    if !gjk_result.collides || gjk_result.simplex.len() < 3 {
        return None;
    }

    let mut polytope: heapless::Vec<Vec2, POLYTOPE_CAPACITY> = heapless::Vec::new();
    for point in gjk_result.simplex.iter() {
        let _ = polytope.push(*point);
    }
    if math::cross(&(polytope[1] - polytope[0]), &(polytope[2] - polytope[0])) < 0.0 {
        polytope.swap(1, 2);
    }

    let mut best: Option<(usize, EpaResult)> = None;
    for _ in 0..max_iterations {
        let Some((insert_at, edge)) = closest_edge(&polytope) else {
            break;
        };
        best = Some((insert_at, edge));

        let support = minkowski_support(a, b, &edge.normal);
        let support_distance = support.dot(&edge.normal);
        if support_distance - edge.distance < EPA_TOLERANCE {
            return Some(EpaResult {
                distance: support_distance.max(0.0),
                normal: edge.normal,
            });
        }
        if polytope.insert(insert_at, support).is_err() {
            break;
        }
    }

    match best {
        Some((_, edge)) => {
            log::warn!(
                "epa: no convergence after {} iterations, using depth {}",
                max_iterations,
                edge.distance
            );
            Some(EpaResult {
                distance: edge.distance.max(0.0),
                normal: edge.normal,
            })
        }
        None => {
            // Every edge degenerate: fall back to the center-to-center axis
            let normal =
                math::try_normalize(&(b.position() - a.position())).unwrap_or(Vec2::new(1.0, 0.0));
            Some(EpaResult {
                distance: 0.0,
                normal,
            })
        }
    }
}

/// Polytope edge nearest the origin, as (insertion index, distance, outward normal).
fn closest_edge(polytope: &[Vec2]) -> Option<(usize, EpaResult)> {
    let n = polytope.len();
    let mut closest: Option<(usize, EpaResult)> = None;
    for i in 0..n {
        let j = (i + 1) % n;
        let edge = polytope[j] - polytope[i];
        // Counter-clockwise winding: the outward normal is the right-hand perpendicular
        let Some(normal) = math::try_normalize(&Vec2::new(edge.y, -edge.x)) else {
            continue;
        };
        let distance = normal.dot(&polytope[i]);
        if closest.map_or(true, |(_, best)| distance < best.distance) {
            closest = Some((j, EpaResult { distance, normal }));
        }
    }
    closest
}

/// One representative contact point for a collision whose `normal` points
/// from `a` to `b`.
///
/// Along the contact tangent it is the middle of the overlap between the
/// touching features of both shapes (a vertex or an edge each); along the
/// normal it sits halfway between the two surfaces.
pub fn contact_point(a: &Collider, b: &Collider, normal: &Vec2) -> Vec2 {
    let tangent = math::perpendicular(normal);
    let (a0, a1) = a.extreme_feature(normal);
    let (b0, b1) = b.extreme_feature(&-normal);

    let span = |p: &Vec2, q: &Vec2| {
        let (s, t) = (p.dot(&tangent), q.dot(&tangent));
        (s.min(t), s.max(t))
    };
    let (a_lo, a_hi) = span(&a0, &a1);
    let (b_lo, b_hi) = span(&b0, &b1);
    let (lo, hi) = (a_lo.max(b_lo), a_hi.min(b_hi));
    let along = if lo <= hi {
        0.5 * (lo + hi)
    } else if a_hi - a_lo <= b_hi - b_lo {
        0.5 * (a_lo + a_hi)
    } else {
        0.5 * (b_lo + b_hi)
    };

    let depth = 0.25 * (a0 + a1 + b0 + b1).dot(normal);
    tangent * along + normal * depth
}

/// Full narrow phase: GJK, then EPA if the shapes intersect.
pub fn collide(a: &Collider, b: &Collider) -> Option<EpaResult> {
    let result = gjk(a, b);
    if !result.collides {
        return None;
    }
    epa(a, b, &result)
}
