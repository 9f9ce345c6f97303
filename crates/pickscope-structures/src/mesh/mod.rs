//! Mesh structure.

mod geometry;
mod intersect;

use glam::{Mat4, Vec2, Vec3};
use pickscope_core::octree::Octree;
use pickscope_core::pick::{GeometryView, IntersectOptions, ItemId, Pickable, PickingInfo};
use pickscope_core::{Aabb, Ray, Result};

/// How the index buffer is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MeshTopology {
    /// Every three indices form a triangle.
    #[default]
    Triangles,
    /// Every two indices form a line segment, picked within `threshold`.
    Lines {
        /// Maximum distance between the ray and a segment for a hit.
        threshold: f32,
    },
}

impl MeshTopology {
    /// Number of indices per face.
    pub fn stride(self) -> usize {
        match self {
            MeshTopology::Triangles => 3,
            MeshTopology::Lines { .. } => 2,
        }
    }

    /// Expansion applied to bounding tests.
    pub fn bounds_epsilon(self) -> f32 {
        match self {
            MeshTopology::Triangles => 0.0,
            MeshTopology::Lines { threshold } => threshold,
        }
    }
}

/// A contiguous range of a mesh's index buffer drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMesh {
    /// Material slot used by this range.
    pub material_index: usize,
    /// First vertex used by this range.
    pub vertex_start: usize,
    /// Number of vertices used by this range.
    pub vertex_count: usize,
    /// First index of this range.
    pub index_start: usize,
    /// Number of indices in this range.
    pub index_count: usize,
}

impl SubMesh {
    /// Creates a new sub-mesh.
    pub fn new(
        material_index: usize,
        vertex_start: usize,
        vertex_count: usize,
        index_start: usize,
        index_count: usize,
    ) -> Self {
        Self {
            material_index,
            vertex_start,
            vertex_count,
            index_start,
            index_count,
        }
    }
}

/// A pickable mesh: vertex positions plus an index buffer, optionally split
/// into sub-meshes and drawn many times through thin instances.
pub struct Mesh {
    // Core data
    id: ItemId,
    name: String,
    positions: Vec<Vec3>,
    indices: Vec<u32>,
    normals: Option<Vec<Vec3>>,
    uvs: Option<Vec<Vec2>>,
    topology: MeshTopology,
    sub_meshes: Vec<SubMesh>,
    transform: Mat4,
    enabled: bool,
    visible: bool,
    pickable: bool,

    // Thin instances
    thin_instances: Vec<Mat4>,
    thin_instance_picking: bool,

    // Computed data
    geometry_box: Option<Aabb>,
    bounding_box: Option<Aabb>,
    sub_mesh_boxes: Vec<Option<Aabb>>,
    sub_meshes_octree: Option<Octree<usize>>,
}

impl Mesh {
    /// Creates a triangle mesh from positions and a flat index buffer.
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self::with_topology(name, positions, indices, MeshTopology::Triangles)
    }

    /// Creates a triangle mesh from indexed triangles.
    pub fn from_triangles(
        name: impl Into<String>,
        positions: Vec<Vec3>,
        triangles: &[[u32; 3]],
    ) -> Self {
        let indices = triangles.iter().flatten().copied().collect();
        Self::new(name, positions, indices)
    }

    /// Creates a line mesh. Every pair of indices is one segment.
    pub fn lines(
        name: impl Into<String>,
        positions: Vec<Vec3>,
        indices: Vec<u32>,
        threshold: f32,
    ) -> Self {
        Self::with_topology(name, positions, indices, MeshTopology::Lines { threshold })
    }

    fn with_topology(
        name: impl Into<String>,
        positions: Vec<Vec3>,
        indices: Vec<u32>,
        topology: MeshTopology,
    ) -> Self {
        let sub_meshes = vec![SubMesh::new(0, 0, positions.len(), 0, indices.len())];
        let mut mesh = Self {
            id: ItemId(u32::MAX),
            name: name.into(),
            positions,
            indices,
            normals: None,
            uvs: None,
            topology,
            sub_meshes,
            transform: Mat4::IDENTITY,
            enabled: true,
            visible: true,
            pickable: true,

            thin_instances: Vec::new(),
            thin_instance_picking: true,

            geometry_box: None,
            bounding_box: None,
            sub_mesh_boxes: Vec::new(),
            sub_meshes_octree: None,
        };
        mesh.refresh_bounding_info();
        mesh
    }

    /// Sets per-vertex normals.
    #[must_use]
    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Sets per-vertex texture coordinates.
    #[must_use]
    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    /// Sets the model transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Replaces the sub-mesh split.
    #[must_use]
    pub fn with_sub_meshes(mut self, sub_meshes: Vec<SubMesh>) -> Self {
        self.set_sub_meshes(sub_meshes);
        self
    }

    // === Accessors ===

    /// Returns the vertex positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Returns the index buffer.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Returns the vertex normals, if any.
    pub fn normals(&self) -> Option<&[Vec3]> {
        self.normals.as_deref()
    }

    /// Returns the texture coordinates, if any.
    pub fn uvs(&self) -> Option<&[Vec2]> {
        self.uvs.as_deref()
    }

    /// Returns the topology.
    pub fn topology(&self) -> MeshTopology {
        self.topology
    }

    /// Returns the sub-meshes.
    pub fn sub_meshes(&self) -> &[SubMesh] {
        &self.sub_meshes
    }

    /// Returns the number of faces (triangles or segments).
    pub fn num_faces(&self) -> usize {
        self.indices.len() / self.topology.stride()
    }

    /// Returns the model transform.
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    // === Mutation ===

    /// Replaces the vertex data and index buffer, resetting to one sub-mesh.
    pub fn set_geometry(&mut self, positions: Vec<Vec3>, indices: Vec<u32>) {
        self.sub_meshes = vec![SubMesh::new(0, 0, positions.len(), 0, indices.len())];
        self.positions = positions;
        self.indices = indices;
        self.refresh_bounding_info();
    }

    /// Replaces the sub-mesh split.
    pub fn set_sub_meshes(&mut self, sub_meshes: Vec<SubMesh>) {
        self.sub_meshes = sub_meshes;
        self.refresh_bounding_info();
    }

    /// Sets the model transform.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Sets whether the mesh is enabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Sets whether the mesh is visible.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Sets whether the mesh accepts picks.
    pub fn set_pickable(&mut self, pickable: bool) {
        self.pickable = pickable;
    }

    /// Sets the line pick threshold. Has no effect on triangle meshes.
    pub fn set_intersection_threshold(&mut self, value: f32) {
        if let MeshTopology::Lines { threshold } = &mut self.topology {
            *threshold = value;
        }
    }

    // === Thin instances ===

    /// Adds a thin instance and returns its index.
    pub fn thin_instance_add(&mut self, matrix: Mat4) -> usize {
        self.thin_instances.push(matrix);
        self.refresh_bounding_info();
        self.thin_instances.len() - 1
    }

    /// Replaces the matrix of an existing thin instance.
    ///
    /// Returns `false` if `index` is out of range.
    pub fn thin_instance_set(&mut self, index: usize, matrix: Mat4) -> bool {
        let Some(slot) = self.thin_instances.get_mut(index) else {
            return false;
        };
        *slot = matrix;
        self.refresh_bounding_info();
        true
    }

    /// Removes every thin instance.
    pub fn thin_instance_clear(&mut self) {
        self.thin_instances.clear();
        self.refresh_bounding_info();
    }

    /// Returns the number of thin instances.
    pub fn thin_instance_count(&self) -> usize {
        self.thin_instances.len()
    }

    /// Enables or disables per-instance picking.
    ///
    /// While disabled, picks test the base geometry under the mesh transform
    /// and the bounds cover only that geometry.
    pub fn set_thin_instance_picking(&mut self, enabled: bool) {
        self.thin_instance_picking = enabled;
        self.refresh_bounding_info();
    }

    // === Sub-mesh octree ===

    /// Builds (or rebuilds) an octree over the sub-meshes, used to narrow
    /// down which sub-meshes a ray is tested against.
    pub fn create_or_update_sub_meshes_octree(
        &mut self,
        capacity: usize,
        max_depth: usize,
    ) -> Result<&Octree<usize>> {
        let mut octree = Octree::new(capacity, max_depth)?;
        self.fill_sub_meshes_octree(&mut octree);
        Ok(self.sub_meshes_octree.insert(octree))
    }

    /// Returns the sub-mesh octree, if one was created.
    pub fn sub_meshes_octree(&self) -> Option<&Octree<usize>> {
        self.sub_meshes_octree.as_ref()
    }

    /// Drops the sub-mesh octree.
    pub fn dispose_sub_meshes_octree(&mut self) {
        self.sub_meshes_octree = None;
    }
}

impl Pickable for Mesh {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn id(&self) -> ItemId {
        self.id
    }

    fn set_id(&mut self, id: ItemId) {
        self.id = id;
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn world_matrix(&self) -> Mat4 {
        self.transform
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn is_pickable(&self) -> bool {
        self.pickable
    }

    fn bounding_box(&self) -> Option<Aabb> {
        self.bounding_box
    }

    fn thin_instances(&self) -> &[Mat4] {
        &self.thin_instances
    }

    fn thin_instance_picking_enabled(&self) -> bool {
        self.thin_instance_picking && !self.thin_instances.is_empty()
    }

    fn intersection_threshold(&self) -> f32 {
        self.topology.bounds_epsilon()
    }

    fn geometry(&self) -> Option<GeometryView<'_>> {
        Some(GeometryView {
            positions: &self.positions,
            indices: &self.indices,
            normals: self.normals.as_deref(),
            uvs: self.uvs.as_deref(),
            triangles: self.topology == MeshTopology::Triangles,
        })
    }

    fn intersects(&self, local_ray: &Ray, options: &IntersectOptions<'_>) -> PickingInfo {
        self.intersect_local(local_ray, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        Mesh::from_triangles(
            "tri",
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            &[[0, 1, 2]],
        )
    }

    #[test]
    fn test_mesh_creation() {
        let mesh = triangle();
        assert_eq!(mesh.name(), "tri");
        assert_eq!(mesh.indices(), &[0, 1, 2]);
        assert_eq!(mesh.num_faces(), 1);
        assert_eq!(mesh.sub_meshes(), &[SubMesh::new(0, 0, 3, 0, 3)]);
        assert!(mesh.is_enabled() && mesh.is_visible() && mesh.is_pickable());
        assert_eq!(
            mesh.bounding_box(),
            Some(Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)))
        );
    }

    #[test]
    fn test_lines_topology() {
        let mesh = Mesh::lines("seg", vec![Vec3::ZERO, Vec3::X], vec![0, 1], 0.2);
        assert_eq!(mesh.topology(), MeshTopology::Lines { threshold: 0.2 });
        assert_eq!(mesh.num_faces(), 1);
        assert!(!mesh.geometry().unwrap().triangles);
    }

    #[test]
    fn test_world_bounding_box_follows_transform() {
        let mesh = triangle().with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)));
        let world = mesh.world_bounding_box().unwrap();
        assert_eq!(world.min, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(world.max, Vec3::new(1.0, 1.0, 5.0));
    }

    #[test]
    fn test_thin_instance_lifecycle() {
        let mut mesh = triangle();
        assert!(!mesh.thin_instance_picking_enabled());

        let index = mesh.thin_instance_add(Mat4::IDENTITY);
        assert_eq!(index, 0);
        assert!(mesh.thin_instance_picking_enabled());

        let moved = Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0));
        assert!(mesh.thin_instance_set(0, moved));
        assert!(!mesh.thin_instance_set(5, moved));
        assert_eq!(mesh.thin_instances(), &[moved]);
        assert_eq!(mesh.bounding_box().unwrap().min.x, 3.0);

        mesh.set_thin_instance_picking(false);
        assert!(!mesh.thin_instance_picking_enabled());

        mesh.thin_instance_clear();
        assert_eq!(mesh.thin_instance_count(), 0);
    }

    #[test]
    fn test_downcast() {
        let mut mesh = triangle();
        mesh.set_id(ItemId(2));
        let item: &dyn Pickable = &mesh;
        assert_eq!(item.id(), ItemId(2));
        assert!(item.as_any().downcast_ref::<Mesh>().is_some());
    }

    #[test]
    fn test_invalid_sub_mesh_octree() {
        let mut mesh = triangle();
        assert!(mesh.create_or_update_sub_meshes_octree(0, 2).is_err());
        assert!(mesh.sub_meshes_octree().is_none());
    }
}
