//! Single-primitive intersection records.

/// Result of a ray hitting one triangle (or line segment).
///
/// `bu` and `bv` are two of the three barycentric weights; the third is
/// [`IntersectionInfo::bw`]. For triangles returned by
/// [`Ray::intersects_triangle`](crate::Ray::intersects_triangle), `bu`
/// weights the first vertex, `bv` the second and `bw` the third.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntersectionInfo {
    /// Barycentric weight of the first vertex.
    pub bu: f32,
    /// Barycentric weight of the second vertex.
    pub bv: f32,
    /// Distance along the ray.
    pub distance: f32,
    /// Index of the face that was hit.
    pub face_id: usize,
    /// Index of the sub-mesh that was hit.
    pub sub_mesh_id: usize,
}

impl IntersectionInfo {
    /// Creates a record with zero face and sub-mesh ids.
    pub fn new(bu: f32, bv: f32, distance: f32) -> Self {
        Self {
            bu,
            bv,
            distance,
            face_id: 0,
            sub_mesh_id: 0,
        }
    }

    /// Returns the third barycentric weight, `1 - bu - bv`.
    pub fn bw(&self) -> f32 {
        1.0 - self.bu - self.bv
    }
}
