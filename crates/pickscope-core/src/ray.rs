//! Ray representation and the ray-geometry kernel.
//!
//! Every test here is a pure function of its inputs. Nothing is cached on the
//! ray between calls, so the same ray can be tested against many primitives
//! (and from nested picks) without interference.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::bounds::{Aabb, BoundingSphere};
use crate::frustum::Plane;
use crate::intersection::IntersectionInfo;

/// Below this magnitude a direction component is treated as parallel to the slab.
const SLAB_PARALLEL_EPSILON: f32 = 1e-7;

/// Below this `|dot(normal, direction)|` a ray is treated as parallel to a plane.
const PLANE_PARALLEL_EPSILON: f32 = 1e-6;

/// Parameters smaller than this snap to zero in the segment test.
const SEGMENT_SMALL_NUM: f32 = 1e-8;

/// Relative threshold under which a segment is considered parallel to the ray.
const SEGMENT_PARALLEL_EPSILON: f32 = 1e-6;

/// Extent used for the ray side of the segment test when the ray is unbounded.
const RAY_FAR_EXTENT: f32 = 1e8;

/// Far plane depth used when unprojecting, kept below 1 so that infinite
/// projections do not produce NaNs.
const UNPROJECT_FAR_DEPTH: f32 = 1.0 - 1e-7;

/// A coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    /// The x axis.
    X,
    /// The y axis.
    Y,
    /// The z axis.
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// A half-line with an optional maximum length.
///
/// `direction` is expected to be unit length; [`Ray::new`] does not enforce it
/// but all distance results assume it. `length` bounds every distance-based
/// acceptance except [`Ray::intersects_box_min_max`] and
/// [`Ray::intersects_sphere`], which are broad-phase filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    /// Start point.
    pub origin: Vec3,
    /// Travel direction.
    pub direction: Vec3,
    /// Maximum accepted hit distance.
    pub length: f32,
}

impl Default for Ray {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ray {
    /// Creates a new ray.
    pub fn new(origin: Vec3, direction: Vec3, length: f32) -> Self {
        Self {
            origin,
            direction,
            length,
        }
    }

    /// Creates an unbounded ray.
    pub fn infinite(origin: Vec3, direction: Vec3) -> Self {
        Self::new(origin, direction, f32::INFINITY)
    }

    /// A ray at the origin with zero direction, used as a scratch value.
    pub fn zero() -> Self {
        Self::infinite(Vec3::ZERO, Vec3::ZERO)
    }

    /// Creates the ray going from `origin` to `end`, then transforms it by `world`.
    ///
    /// The length of the resulting ray is the (transformed) segment length.
    pub fn from_to(origin: Vec3, end: Vec3, world: &Mat4) -> Self {
        let delta = end - origin;
        let length = delta.length();
        let direction = if length > 0.0 { delta / length } else { delta };
        Self::new(origin, direction, length).transform(world)
    }

    /// Evaluates the ray at distance `t`.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Slab test against the box `[min, max]`, grown by `epsilon_expand` on every side.
    ///
    /// Boxes entirely behind the origin are rejected. `length` is ignored.
    pub fn intersects_box_min_max(&self, min: Vec3, max: Vec3, epsilon_expand: f32) -> bool {
        let min = min - Vec3::splat(epsilon_expand);
        let max = max + Vec3::splat(epsilon_expand);

        let mut near = 0.0_f32;
        let mut far = f32::MAX;

        for axis in 0..3 {
            let origin = self.origin[axis];
            let direction = self.direction[axis];

            if direction.abs() < SLAB_PARALLEL_EPSILON {
                if origin < min[axis] || origin > max[axis] {
                    return false;
                }
                continue;
            }

            let inv = 1.0 / direction;
            let mut t0 = (min[axis] - origin) * inv;
            let mut t1 = (max[axis] - origin) * inv;
            if t1 == f32::NEG_INFINITY {
                t1 = f32::INFINITY;
            }
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            near = near.max(t0);
            far = far.min(t1);
            if near > far {
                return false;
            }
        }

        true
    }

    /// Slab test against an [`Aabb`].
    pub fn intersects_box(&self, aabb: &Aabb, epsilon_expand: f32) -> bool {
        self.intersects_box_min_max(aabb.min, aabb.max, epsilon_expand)
    }

    /// Closed-form sphere test. `length` is ignored.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32, epsilon_expand: f32) -> bool {
        let to_center = center - self.origin;
        let dist_sq = to_center.length_squared();
        let radius = radius + epsilon_expand;
        let radius_sq = radius * radius;

        if dist_sq <= radius_sq {
            return true;
        }

        let projection = to_center.dot(self.direction);
        if projection < 0.0 {
            return false;
        }

        dist_sq - projection * projection <= radius_sq
    }

    /// Sphere test against a [`BoundingSphere`].
    pub fn intersects_bounding_sphere(&self, sphere: &BoundingSphere, epsilon_expand: f32) -> bool {
        self.intersects_sphere(sphere.center, sphere.radius, epsilon_expand)
    }

    /// Möller–Trumbore triangle test without back-face culling.
    ///
    /// On a hit, `bu` of the returned record weights `v0`, `bv` weights `v1`
    /// and the remaining `1 - bu - bv` weights `v2`. Hits beyond `length` are
    /// rejected; hits behind the origin are not.
    pub fn intersects_triangle(&self, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<IntersectionInfo> {
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;
        let pvec = self.direction.cross(edge2);
        let det = edge1.dot(pvec);

        if det == 0.0 {
            return None;
        }

        let inv_det = 1.0 / det;
        let tvec = self.origin - v0;
        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let qvec = tvec.cross(edge1);
        let v = self.direction.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let distance = edge2.dot(qvec) * inv_det;
        if distance > self.length {
            return None;
        }

        Some(IntersectionInfo::new(1.0 - u - v, u, distance))
    }

    /// Returns the distance at which the ray crosses `plane`.
    ///
    /// The plane normal must be unit length for the result to be a distance.
    /// Origins a hair behind the plane count as touching it.
    pub fn intersects_plane(&self, plane: &Plane) -> Option<f32> {
        let denom = plane.normal.dot(self.direction);
        if denom.abs() < PLANE_PARALLEL_EPSILON {
            return None;
        }

        let distance = (-plane.d - plane.normal.dot(self.origin)) / denom;
        if distance < 0.0 {
            if distance < -PLANE_PARALLEL_EPSILON {
                return None;
            }
            return Some(0.0);
        }

        Some(distance)
    }

    /// Intercept of the ray's line with the plane `axis = offset`.
    ///
    /// Solves `t = (origin[axis] - offset) / direction[axis]` and returns
    /// `origin - t * direction` when `t <= 0`, `None` otherwise.
    pub fn intersects_axis(&self, axis: Axis, offset: f32) -> Option<Vec3> {
        let i = axis.index();
        let t = (self.origin[i] - offset) / self.direction[i];
        // Also rejects NaN from a direction parallel to the plane.
        if t > 0.0 || t.is_nan() {
            return None;
        }

        let mut point = self.origin + self.direction * -t;
        point[i] = offset;
        Some(point)
    }

    /// Closest approach between the ray and the segment `[seg_a, seg_b]`.
    ///
    /// The segment parameter is clamped to `[0, 1]` and the ray parameter to
    /// `[0, length]` (unbounded rays use a very large finite extent). Returns
    /// the distance from the ray origin to the closest point on the segment
    /// when the two pass within `threshold` of each other in front of the
    /// origin.
    pub fn intersection_segment(&self, seg_a: Vec3, seg_b: Vec3, threshold: f32) -> Option<f32> {
        let extent = self.length.min(RAY_FAR_EXTENT);
        let u = seg_b - seg_a;
        let v = self.direction;
        let w = seg_a - self.origin;

        let a = u.dot(u);
        let b = u.dot(v);
        let c = v.dot(v);
        let d = u.dot(w);
        let e = v.dot(w);
        let denom = a * c - b * b;

        let (mut s_n, mut s_d) = (0.0_f32, denom);
        let (mut t_n, mut t_d) = (0.0_f32, denom);

        if denom <= SEGMENT_PARALLEL_EPSILON * a * c {
            s_d = 1.0;
            t_n = e;
            t_d = c;
        } else {
            s_n = b * e - c * d;
            t_n = a * e - b * d;
            if s_n < 0.0 {
                s_n = 0.0;
                t_n = e;
                t_d = c;
            } else if s_n > s_d {
                s_n = s_d;
                t_n = e + b;
                t_d = c;
            }
        }

        if t_n < 0.0 {
            t_n = 0.0;
            if -d < 0.0 {
                s_n = 0.0;
            } else if -d > a {
                s_n = s_d;
            } else {
                s_n = -d;
                s_d = a;
            }
        } else if t_n > extent * t_d {
            t_n = extent * t_d;
            let s = b * extent - d;
            if s < 0.0 {
                s_n = 0.0;
            } else if s > a {
                s_n = s_d;
            } else {
                s_n = s;
                s_d = a;
            }
        }

        let sc = if s_n.abs() < SEGMENT_SMALL_NUM || s_d == 0.0 {
            0.0
        } else {
            s_n / s_d
        };
        let tc = if t_n.abs() < SEGMENT_SMALL_NUM || t_d == 0.0 {
            0.0
        } else {
            t_n / t_d
        };

        let on_segment = w + u * sc;
        let gap = on_segment - v * tc;

        if tc > 0.0 && tc <= self.length && gap.length_squared() < threshold * threshold {
            Some(on_segment.length())
        } else {
            None
        }
    }

    /// Returns this ray transformed by `matrix`.
    #[must_use]
    pub fn transform(&self, matrix: &Mat4) -> Ray {
        let mut result = Ray::zero();
        self.transform_to_ref(matrix, &mut result);
        result
    }

    /// Transforms this ray by `matrix` into `result`.
    ///
    /// The origin is transformed as a point and the direction as a vector.
    /// The direction is renormalized and `length` is scaled by the transformed
    /// direction's magnitude so it still measures the same span.
    pub fn transform_to_ref(&self, matrix: &Mat4, result: &mut Ray) {
        let origin = matrix.project_point3(self.origin);
        let mut direction = matrix.transform_vector3(self.direction);
        let mut length = self.length;

        let magnitude = direction.length();
        if magnitude != 0.0 && magnitude != 1.0 {
            direction /= magnitude;
            length *= magnitude;
        }

        result.origin = origin;
        result.direction = direction;
        result.length = length;
    }

    /// Builds the ray through a screen position.
    ///
    /// `world` maps the space the ray should end up in to world space: pass a
    /// mesh's world matrix to get a ray in that mesh's local space, or the
    /// identity for a world-space ray.
    #[allow(clippy::too_many_arguments)]
    pub fn unproject(
        screen_x: f32,
        screen_y: f32,
        viewport_width: f32,
        viewport_height: f32,
        world: &Mat4,
        view: &Mat4,
        projection: &Mat4,
        half_z: bool,
    ) -> Ray {
        let mut ray = Ray::zero();
        ray.update(
            screen_x,
            screen_y,
            viewport_width,
            viewport_height,
            world,
            view,
            projection,
            half_z,
        );
        ray
    }

    /// In-place version of [`Ray::unproject`].
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        screen_x: f32,
        screen_y: f32,
        viewport_width: f32,
        viewport_height: f32,
        world: &Mat4,
        view: &Mat4,
        projection: &Mat4,
        half_z: bool,
    ) {
        let inverse = (*projection * *view * *world).inverse();

        let ndc_x = screen_x / viewport_width * 2.0 - 1.0;
        let ndc_y = -(screen_y / viewport_height * 2.0 - 1.0);
        let near_z = if half_z { 0.0 } else { -1.0 };

        let near = inverse.project_point3(Vec3::new(ndc_x, ndc_y, near_z));
        let far = inverse.project_point3(Vec3::new(ndc_x, ndc_y, UNPROJECT_FAR_DEPTH));

        self.origin = near;
        self.direction = (far - near).normalize_or_zero();
        self.length = f32::INFINITY;
    }
}
