//! Axis-aligned bounding boxes and bounding spheres.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::frustum::Frustum;

/// An axis-aligned bounding box described by its two extreme corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from its corners. The corners are not reordered.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a box from a center and half extents.
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Computes the tightest box around a set of points.
    ///
    /// Returns `None` for an empty set.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        Some(points.fold(Self::new(first, first), |acc, p| Self {
            min: acc.min.min(*p),
            max: acc.max.max(*p),
        }))
    }

    /// Returns the center of the box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the full size of the box along each axis.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Returns the smallest box containing both boxes.
    #[must_use]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns whether `other` lies entirely inside this box (faces may touch).
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.cmple(other.min).all() && other.max.cmple(self.max).all()
    }

    /// Returns whether a point lies inside the box or on its boundary.
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.min.cmple(point).all() && point.cmple(self.max).all()
    }

    /// Returns whether two boxes overlap (touching counts).
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// Sphere-vs-box test using the distance from the sphere center to the
    /// closest point of the box.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }

    /// Returns the eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Transforms the box by `matrix` and returns the box around the result.
    #[must_use]
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        let corners = self.corners().map(|c| matrix.transform_point3(c));
        // Eight corners, never empty.
        Aabb::from_points(corners.iter()).unwrap_or(*self)
    }

    /// Splits the box into its eight equal octants.
    ///
    /// Octant `i` lies on the max side of the x axis when bit 0 is set, the
    /// y axis for bit 1 and the z axis for bit 2.
    pub fn octants(&self) -> [Aabb; 8] {
        let center = self.center();
        std::array::from_fn(|i| {
            let pick = |bit: usize, lo: f32, mid: f32, hi: f32| {
                if i & bit == 0 {
                    (lo, mid)
                } else {
                    (mid, hi)
                }
            };
            let (x0, x1) = pick(1, self.min.x, center.x, self.max.x);
            let (y0, y1) = pick(2, self.min.y, center.y, self.max.y);
            let (z0, z1) = pick(4, self.min.z, center.z, self.max.z);
            Aabb::new(Vec3::new(x0, y0, z0), Vec3::new(x1, y1, z1))
        })
    }

    /// Conservative frustum test.
    ///
    /// The box is rejected only when all eight corners lie on the outer side
    /// of a single plane, so boxes near frustum edges may pass.
    pub fn is_in_frustum(&self, frustum: &Frustum) -> bool {
        let corners = self.corners();
        frustum.planes.iter().all(|plane| {
            corners
                .iter()
                .any(|corner| plane.signed_distance(*corner) >= 0.0)
        })
    }

    /// Returns the sphere enclosing this box.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere {
            center: self.center(),
            radius: self.extent().length() * 0.5,
        }
    }
}

/// A sphere used for the cheapest broad-phase rejection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    /// Sphere center.
    pub center: Vec3,
    /// Sphere radius.
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a new bounding sphere.
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}
