//! MikkTSpace tangent refinement.
//!
//! Faces handed to the solver are the cached polygon triangles, so n-gons of
//! any size are supported. Normals are read, never written. The resulting
//! binormal sign follows the solver's convention: `B = sign * cross(N, T)`.

use super::ids::VertexInstanceId;
use super::mesh_graph::MeshGraph;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MikktspaceError {
    #[error("mesh must be compacted before MikkTSpace generation")]
    HasHoles,
    #[error("mesh has no triangles")]
    Empty,
    #[error("MikkTSpace rejected the mesh")]
    Failed,
    #[error("built without the `mikktspace` feature")]
    Disabled,
}

/// Flattened triangle corners of a compact mesh.
fn flatten_corners(mesh: &MeshGraph) -> Result<Vec<VertexInstanceId>, MikktspaceError> {
    if mesh.has_holes() {
        return Err(MikktspaceError::HasHoles);
    }
    let corners: Vec<VertexInstanceId> = mesh
        .polygons()
        .flat_map(|(_, polygon)| polygon.triangles().iter().flat_map(|t| t.corners))
        .collect();
    if corners.is_empty() {
        return Err(MikktspaceError::Empty);
    }
    Ok(corners)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "mikktspace")] {
        use super::core::Vec3;

        struct MikkGeometry<'a> {
            mesh: &'a MeshGraph,
            corners: &'a [VertexInstanceId],
            out: Vec<[f32; 4]>,
        }

        impl MikkGeometry<'_> {
            fn corner(&self, face: usize, vert: usize) -> VertexInstanceId {
                self.corners[face * 3 + vert]
            }
        }

        impl bevy_mikktspace::Geometry for MikkGeometry<'_> {
            fn num_faces(&self) -> usize {
                self.corners.len() / 3
            }

            fn num_vertices_of_face(&self, _face: usize) -> usize {
                3
            }

            fn position(&self, face: usize, vert: usize) -> [f32; 3] {
                self.mesh.instance_position(self.corner(face, vert)).to_array()
            }

            fn normal(&self, face: usize, vert: usize) -> [f32; 3] {
                self.mesh
                    .vertex_instance(self.corner(face, vert))
                    .map_or([0.0; 3], |vi| vi.normal.to_array())
            }

            fn tex_coord(&self, face: usize, vert: usize) -> [f32; 2] {
                self.mesh
                    .vertex_instance(self.corner(face, vert))
                    .map_or([0.0; 2], |vi| vi.uv(0).to_array())
            }

            fn set_tangent_encoded(&mut self, tangent: [f32; 4], face: usize, vert: usize) {
                self.out[face * 3 + vert] = tangent;
            }
        }

        /// Replaces vertex-instance tangents and binormal signs with the
        /// MikkTSpace solution. The mesh must have no holes.
        pub fn compute_mikktspace_tangents(mesh: &mut MeshGraph) -> Result<(), MikktspaceError> {
            let corners = flatten_corners(mesh)?;
            let mut geometry = MikkGeometry { mesh, corners: &corners, out: vec![[0.0; 4]; corners.len()] };
            if !bevy_mikktspace::generate_tangents(&mut geometry) {
                return Err(MikktspaceError::Failed);
            }
            let results = geometry.out;

            for (corner, encoded) in corners.iter().zip(results) {
                if let Some(instance) = mesh.vertex_instance_mut(*corner) {
                    instance.tangent = Vec3::new(encoded[0], encoded[1], encoded[2]);
                    instance.binormal_sign = if encoded[3] < 0.0 { -1.0 } else { 1.0 };
                }
            }
            log::debug!("MikkTSpace: {} corners updated", corners.len());
            Ok(())
        }
    } else {
        /// Always fails: the crate was built without MikkTSpace support.
        pub fn compute_mikktspace_tangents(mesh: &mut MeshGraph) -> Result<(), MikktspaceError> {
            flatten_corners(mesh)?;
            Err(MikktspaceError::Disabled)
        }
    }
}
