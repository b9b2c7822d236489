//! Small 2D helpers on top of nalgebra shared by the collider, collision and
//! integration code.

use nalgebra::{Matrix3, Rotation2, Vector2};

// ComplexField provides sqrt()/sin()/cos() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

/// 2D vector type used throughout the crate.
pub type Vec2 = Vector2<f32>;

/// Squared-length threshold below which a vector is treated as zero.
pub const NEAR_ZERO_SQ: f32 = 1e-10;

/// Returns `true` if every component is finite.
#[inline]
pub fn is_finite(v: &Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

/// Scalar 2D cross product `a.x * b.y - a.y * b.x`.
#[inline]
pub fn cross(a: &Vec2, b: &Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Counter-clockwise perpendicular `(-y, x)`.
#[inline]
pub fn perpendicular(v: &Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Vector triple product `(a × b) × c` restricted to the plane.
#[inline]
pub fn triple_product(a: &Vec2, b: &Vec2, c: &Vec2) -> Vec2 {
    b * a.dot(c) - a * b.dot(c)
}

/// Normalizes `v`, or returns `None` when it is too short to have a direction.
#[inline]
pub fn try_normalize(v: &Vec2) -> Option<Vec2> {
    let len_sq = v.norm_squared();
    if len_sq <= NEAR_ZERO_SQ || !len_sq.is_finite() {
        None
    } else {
        Some(v / len_sq.sqrt())
    }
}

/// Projects `v` onto `onto`. Returns zero if `onto` has no direction.
pub fn project(v: &Vec2, onto: &Vec2) -> Vec2 {
    let len_sq = onto.norm_squared();
    if len_sq <= NEAR_ZERO_SQ {
        return Vec2::zeros();
    }
    onto * (v.dot(onto) / len_sq)
}

/// Closest point to `p` on the segment `a`..`b`.
pub fn closest_point_on_segment(p: &Vec2, a: &Vec2, b: &Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq <= NEAR_ZERO_SQ {
        return *a;
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Rotates `v` counter-clockwise by `degrees`.
#[inline]
pub fn rotate_degrees(v: &Vec2, degrees: f32) -> Vec2 {
    Rotation2::new(degrees.to_radians()) * v
}

/// Wraps an angle in degrees into `[0, 360)`.
pub fn wrap_degrees(degrees: f32) -> f32 {
    let wrapped = degrees % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Clamps a vector to zero when it is NaN, infinite, or already near zero.
///
/// The second value is `true` when a non-finite component was discarded.
pub fn sanitize(v: Vec2) -> (Vec2, bool) {
    if !is_finite(&v) {
        (Vec2::zeros(), true)
    } else if v.norm_squared() <= NEAR_ZERO_SQ {
        (Vec2::zeros(), false)
    } else {
        (v, false)
    }
}

/// Scalar counterpart of [`sanitize`].
pub fn sanitize_scalar(value: f32) -> (f32, bool) {
    if !value.is_finite() {
        (0.0, true)
    } else if value * value <= NEAR_ZERO_SQ {
        (0.0, false)
    } else {
        (value, false)
    }
}

/// Builds the homogeneous transform `T * R * S`.
pub fn transform_matrix(
    scale: &Vec2,
    orientation_degrees: f32,
    translation: &Vec2,
) -> Matrix3<f32> {
    Matrix3::new_translation(translation)
        * Matrix3::new_rotation(orientation_degrees.to_radians())
        * Matrix3::new_nonuniform_scaling(scale)
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_cross_and_perpendicular() {
        let x = Vec2::new(1.0, 0.0);
        let y = Vec2::new(0.0, 1.0);
        assert!(approx_eq(cross(&x, &y), 1.0));
        assert!(approx_eq(cross(&y, &x), -1.0));
        assert_eq!(perpendicular(&x), y);
    }

    #[test]
    fn test_triple_product_points_toward_origin() {
        // Segment from (-1, 1) to (1, 1); origin lies below it
        let a = Vec2::new(1.0, 1.0);
        let b = Vec2::new(-1.0, 1.0);
        let ab = b - a;
        let ao = -a;
        let d = triple_product(&ab, &ao, &ab);
        assert!(d.y < 0.0);
        assert!(approx_eq(d.x, 0.0));
    }

    #[test]
    fn test_try_normalize_zero() {
        assert!(try_normalize(&Vec2::zeros()).is_none());
        let n = try_normalize(&Vec2::new(3.0, 4.0)).unwrap();
        assert!(approx_eq(n.norm(), 1.0));
    }

    #[test]
    fn test_closest_point_on_segment_clamps() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(2.0, 0.0);
        assert_eq!(closest_point_on_segment(&Vec2::new(-3.0, 1.0), &a, &b), a);
        assert_eq!(closest_point_on_segment(&Vec2::new(5.0, 1.0), &a, &b), b);
        let mid = closest_point_on_segment(&Vec2::new(1.0, 4.0), &a, &b);
        assert!(approx_eq(mid.x, 1.0) && approx_eq(mid.y, 0.0));
    }

    #[test]
    fn test_rotate_and_wrap() {
        let r = rotate_degrees(&Vec2::new(1.0, 0.0), 90.0);
        assert!(approx_eq(r.x, 0.0) && approx_eq(r.y, 1.0));
        assert!(approx_eq(wrap_degrees(370.0), 10.0));
        assert!(approx_eq(wrap_degrees(-90.0), 270.0));
    }

    #[test]
    fn test_sanitize() {
        let (v, flagged) = sanitize(Vec2::new(f32::NAN, 1.0));
        assert_eq!(v, Vec2::zeros());
        assert!(flagged);

        let (v, flagged) = sanitize(Vec2::new(f32::INFINITY, 0.0));
        assert_eq!(v, Vec2::zeros());
        assert!(flagged);

        let (v, flagged) = sanitize(Vec2::new(1e-7, -1e-7));
        assert_eq!(v, Vec2::zeros());
        assert!(!flagged);

        let (v, _) = sanitize(Vec2::new(1.0, 2.0));
        assert_eq!(v, Vec2::new(1.0, 2.0));
    }

    #[test]
    fn test_transform_matrix_maps_unit_corner() {
        let m = transform_matrix(&Vec2::new(2.0, 1.0), 90.0, &Vec2::new(10.0, 0.0));
        let p = m.transform_point(&nalgebra::Point2::new(1.0, 0.0));
        assert!(approx_eq(p.x, 10.0));
        assert!(approx_eq(p.y, 2.0));
    }
}
