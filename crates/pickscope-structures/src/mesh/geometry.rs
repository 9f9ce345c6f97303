//! Derived data for meshes.
//!
//! This module keeps the cached bounds in sync with the vertex data:
//! - Geometry bounds (the base mesh, in local space)
//! - Item bounds (the union of every thin instance, or the geometry bounds)
//! - Per sub-mesh bounds, feeding the sub-mesh octree
//!
//! It also holds vertex normal generation and a few primitive builders.

use glam::Vec3;
use pickscope_core::octree::{Octree, OctreeEntry};
use pickscope_core::Aabb;

use super::{Mesh, MeshTopology, SubMesh};

impl Mesh {
    // === Computation methods ===

    /// Recomputes every cached bound. Called after any geometry, sub-mesh
    /// or thin instance change.
    pub(super) fn refresh_bounding_info(&mut self) {
        self.compute_geometry_box();
        self.compute_bounding_box();
        self.compute_sub_mesh_boxes();

        if let Some(mut octree) = self.sub_meshes_octree.take() {
            self.fill_sub_meshes_octree(&mut octree);
            self.sub_meshes_octree = Some(octree);
        }
    }

    fn compute_geometry_box(&mut self) {
        self.geometry_box = Aabb::from_points(self.positions.iter());
    }

    /// With instance picking on, only the instance copies contribute: the
    /// base mesh itself is not drawn. Otherwise picks test the base geometry.
    fn compute_bounding_box(&mut self) {
        let instanced = self.thin_instance_picking && !self.thin_instances.is_empty();
        self.bounding_box = match self.geometry_box {
            Some(geometry_box) if instanced => self
                .thin_instances
                .iter()
                .map(|matrix| geometry_box.transformed(matrix))
                .reduce(|a, b| a.union(&b)),
            other => other,
        };
    }

    fn compute_sub_mesh_boxes(&mut self) {
        let boxes = self
            .sub_meshes
            .iter()
            .map(|sub_mesh| self.sub_mesh_box(sub_mesh))
            .collect();
        self.sub_mesh_boxes = boxes;
    }

    /// Bounds of the vertices referenced by a sub-mesh's index range.
    fn sub_mesh_box(&self, sub_mesh: &SubMesh) -> Option<Aabb> {
        let end = (sub_mesh.index_start + sub_mesh.index_count).min(self.indices.len());
        let range = self.indices.get(sub_mesh.index_start..end)?;
        Aabb::from_points(
            range
                .iter()
                .filter_map(|&index| self.positions.get(index as usize)),
        )
    }

    pub(super) fn sub_mesh_bounds(&self, index: usize) -> Option<Aabb> {
        self.sub_mesh_boxes.get(index).copied().flatten()
    }

    pub(super) fn fill_sub_meshes_octree(&self, octree: &mut Octree<usize>) {
        let Some(bounds) = self.geometry_box else {
            octree.dispose();
            return;
        };
        // Line rays within the threshold may pass outside a flat box
        let pad = Vec3::splat(self.topology.bounds_epsilon());
        let entries = self
            .sub_mesh_boxes
            .iter()
            .enumerate()
            .filter_map(|(index, aabb)| {
                aabb.map(|aabb| OctreeEntry::new(index, Aabb::new(aabb.min - pad, aabb.max + pad)))
            });
        octree.update(bounds.min - pad, bounds.max + pad, entries);
    }

    /// Computes vertex normals as the area-weighted average of incident face
    /// normals. Line meshes are left untouched.
    pub fn compute_vertex_normals(&mut self) {
        if self.topology != MeshTopology::Triangles {
            return;
        }

        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let (Some(&v0), Some(&v1), Some(&v2)) = (
                self.positions.get(tri[0] as usize),
                self.positions.get(tri[1] as usize),
                self.positions.get(tri[2] as usize),
            ) else {
                continue;
            };

            // Cross product length is twice the area, which is all the weighting needs
            let weighted_normal = (v1 - v0).cross(v2 - v0);
            for &vi in tri {
                normals[vi as usize] += weighted_normal;
            }
        }

        for normal in &mut normals {
            *normal = normal.normalize_or_zero();
        }
        self.normals = Some(normals);
    }

    // === Primitives ===

    /// Creates an axis-aligned box with outward facing triangles.
    pub fn cuboid(name: impl Into<String>, min: Vec3, max: Vec3) -> Self {
        let positions = Aabb::new(min, max).corners().to_vec();
        // Corner order follows `Aabb::corners`: bit 0 = x, bit 1 = y, bit 2 = z
        let triangles = [
            [0, 2, 3],
            [0, 3, 1], // -z
            [4, 5, 7],
            [4, 7, 6], // +z
            [0, 4, 6],
            [0, 6, 2], // -x
            [1, 3, 7],
            [1, 7, 5], // +x
            [0, 1, 5],
            [0, 5, 4], // -y
            [2, 6, 7],
            [2, 7, 3], // +y
        ];
        Self::from_triangles(name, positions, &triangles)
    }

    /// Creates a `size` by `size` plane at z = 0 facing +z, split into
    /// `subdivisions` squares per side.
    pub fn plane(name: impl Into<String>, size: f32, subdivisions: u32) -> Self {
        let n = subdivisions.max(1);
        let step = size / n as f32;
        let half = size * 0.5;

        let mut positions = Vec::with_capacity(((n + 1) * (n + 1)) as usize);
        for j in 0..=n {
            for i in 0..=n {
                positions.push(Vec3::new(
                    -half + i as f32 * step,
                    -half + j as f32 * step,
                    0.0,
                ));
            }
        }

        let row = n + 1;
        let mut triangles = Vec::with_capacity((n * n * 2) as usize);
        for j in 0..n {
            for i in 0..n {
                let a = j * row + i;
                let b = a + 1;
                let c = a + row + 1;
                let d = a + row;
                triangles.push([a, b, c]);
                triangles.push([a, c, d]);
            }
        }

        let mut mesh = Self::from_triangles(name, positions, &triangles);
        mesh.normals = Some(vec![Vec3::Z; mesh.positions.len()]);
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    #[test]
    fn test_cuboid_bounds() {
        let mesh = Mesh::cuboid("box", Vec3::splat(-1.0), Vec3::splat(1.0));
        assert_eq!(mesh.num_faces(), 12);
        assert_eq!(
            mesh.geometry_box,
            Some(Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)))
        );
    }

    #[test]
    fn test_cuboid_normals_point_outward() {
        let mut mesh = Mesh::cuboid("box", Vec3::splat(-1.0), Vec3::splat(1.0));
        mesh.compute_vertex_normals();
        let normals = mesh.normals().unwrap();
        for (position, normal) in mesh.positions().iter().zip(normals) {
            assert!(position.dot(*normal) > 0.0);
        }
    }

    #[test]
    fn test_plane_layout() {
        let mesh = Mesh::plane("ground", 4.0, 2);
        assert_eq!(mesh.positions().len(), 9);
        assert_eq!(mesh.num_faces(), 8);
        let bounds = mesh.geometry_box.unwrap();
        assert_eq!(bounds.min, Vec3::new(-2.0, -2.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(2.0, 2.0, 0.0));
    }

    #[test]
    fn test_thin_instances_drive_bounds() {
        let mut mesh = Mesh::cuboid("box", Vec3::splat(-1.0), Vec3::splat(1.0));
        mesh.thin_instance_add(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        mesh.thin_instance_add(Mat4::from_translation(Vec3::new(-10.0, 0.0, 0.0)));

        let bounds = mesh.bounding_box.unwrap();
        assert_eq!(bounds.min, Vec3::new(-11.0, -1.0, -1.0));
        assert_eq!(bounds.max, Vec3::new(11.0, 1.0, 1.0));

        mesh.set_thin_instance_picking(false);
        assert_eq!(mesh.bounding_box, mesh.geometry_box);
        mesh.set_thin_instance_picking(true);
        assert_eq!(mesh.bounding_box.unwrap().max.x, 11.0);

        mesh.thin_instance_clear();
        assert_eq!(mesh.bounding_box, mesh.geometry_box);
    }

    #[test]
    fn test_sub_mesh_bounds_ignore_bad_indices() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::splat(5.0)];
        let mesh = Mesh::new("tri", positions, vec![0, 1, 2, 0, 1, 99])
            .with_sub_meshes(vec![SubMesh::new(0, 0, 3, 0, 3), SubMesh::new(0, 0, 3, 3, 3)]);

        assert_eq!(
            mesh.sub_mesh_bounds(0),
            Some(Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)))
        );
        assert_eq!(
            mesh.sub_mesh_bounds(1),
            Some(Aabb::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)))
        );
        assert!(mesh.sub_mesh_bounds(2).is_none());
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        let mesh = Mesh::new("empty", Vec::new(), Vec::new());
        assert!(mesh.geometry_box.is_none());
        assert!(mesh.bounding_box.is_none());
    }
}
