//! Planes and view frustums.

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// A plane `dot(normal, p) + d = 0`.
///
/// Points with a positive signed distance lie on the normal side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Plane normal. Not necessarily unit length unless built by [`Plane::normalized`].
    pub normal: Vec3,
    /// Plane offset.
    pub d: f32,
}

impl Plane {
    /// Creates a plane from its coefficients.
    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Creates the plane through `point` with the given normal.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    /// Creates a plane from packed `(a, b, c, d)` coefficients.
    pub fn from_vec4(v: Vec4) -> Self {
        Self {
            normal: v.truncate(),
            d: v.w,
        }
    }

    /// Returns the plane scaled so its normal has unit length.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let len = self.normal.length();
        if len == 0.0 {
            return *self;
        }
        Self {
            normal: self.normal / len,
            d: self.d / len,
        }
    }

    /// Returns the signed distance from a point to the plane.
    ///
    /// Only a true distance when the normal has unit length.
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// The six planes bounding a camera's view volume, all facing inward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the frustum planes from a combined `projection * view` matrix.
    ///
    /// `half_z` selects a `[0, 1]` clip depth range (glam `*_rh` projections)
    /// instead of `[-1, 1]`.
    pub fn from_view_projection(view_projection: &Mat4, half_z: bool) -> Self {
        let r0 = view_projection.row(0);
        let r1 = view_projection.row(1);
        let r2 = view_projection.row(2);
        let r3 = view_projection.row(3);

        let near = if half_z { r2 } else { r3 + r2 };
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, near, r3 - r2]
            .map(|v| Plane::from_vec4(v).normalized());
        Self { planes }
    }

    /// Returns whether a point lies inside all six planes.
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_from_point_normal() {
        let plane = Plane::from_point_normal(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(plane.normal, Vec3::Y);
        assert!((plane.signed_distance(Vec3::new(5.0, 2.0, -1.0))).abs() < 1e-6);
        assert!(plane.signed_distance(Vec3::new(0.0, 3.0, 0.0)) > 0.0);
    }

    #[test]
    fn test_frustum_contains_point() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let frustum = Frustum::from_view_projection(&(proj * view), true);

        assert!(frustum.contains_point(Vec3::ZERO));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 10.0)));
        assert!(!frustum.contains_point(Vec3::new(50.0, 0.0, 0.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -200.0)));
    }
}
