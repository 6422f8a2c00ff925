//! Editable polygon mesh stored as parallel arenas addressed by typed ids.
//!
//! Elements reference each other only through ids; back-references
//! (vertex → edges, edge → polygons, ...) are kept in sync by the mutating
//! methods on [`MeshGraph`]. Deleting elements leaves holes in the arenas until
//! [`MeshGraph::compact`] renumbers everything densely.

use super::core::{LinearColor, MAX_UV_CHANNELS, Tolerance, Vec2, Vec3};
use super::ids::{EdgeId, PolygonGroupId, PolygonId, VertexId, VertexInstanceId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshGraphError {
    #[error("invalid vertex {0}")]
    InvalidVertex(VertexId),
    #[error("invalid vertex instance {0}")]
    InvalidVertexInstance(VertexInstanceId),
    #[error("invalid edge {0}")]
    InvalidEdge(EdgeId),
    #[error("invalid polygon {0}")]
    InvalidPolygon(PolygonId),
    #[error("invalid polygon group {0}")]
    InvalidPolygonGroup(PolygonGroupId),
    #[error("edge endpoints must be distinct (both are {0})")]
    EdgeEndpointsEqual(VertexId),
    #[error("polygon needs at least 3 corners, got {corners}")]
    TooFewCorners { corners: usize },
    #[error("too many UV channels (max {max})")]
    TooManyUvChannels { max: usize },
    #[error("UV channel {index} out of range ({count} channels)")]
    UvChannelOutOfRange { index: usize, count: usize },
    #[error("a mesh must keep at least one UV channel")]
    LastUvChannel,
    #[error("inconsistent topology: {reason}")]
    Inconsistent { reason: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Arena
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Arena<T> {
    slots: Vec<Option<T>>,
    live: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { slots: Vec::new(), live: 0 }
    }
}

impl<T> Arena<T> {
    fn insert(&mut self, value: T) -> usize {
        self.slots.push(Some(value));
        self.live += 1;
        self.slots.len() - 1
    }

    fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    fn remove(&mut self, index: usize) -> Option<T> {
        let removed = self.slots.get_mut(index).and_then(Option::take);
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.as_ref().map(|v| (i, v)))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| s.as_mut().map(|v| (i, v)))
    }

    fn has_holes(&self) -> bool {
        self.live != self.slots.len()
    }

    /// Drops empty slots and returns the old → new index table.
    fn compact(&mut self) -> Vec<Option<u32>> {
        let mut remap = vec![None; self.slots.len()];
        let mut next = 0u32;
        for (old, slot) in self.slots.iter().enumerate() {
            if slot.is_some() {
                remap[old] = Some(next);
                next += 1;
            }
        }
        self.slots.retain(Option::is_some);
        remap
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Elements
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    instances: Vec<VertexInstanceId>,
    edges: Vec<EdgeId>,
}

impl Vertex {
    #[must_use]
    pub fn instances(&self) -> &[VertexInstanceId] {
        &self.instances
    }

    #[must_use]
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }
}

/// Per-corner attributes. Normals and tangents are zero until synthesized.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexInstance {
    vertex: VertexId,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub binormal_sign: f32,
    pub color: LinearColor,
    pub uvs: Vec<Vec2>,
    polygons: Vec<PolygonId>,
}

impl VertexInstance {
    #[must_use]
    pub const fn vertex(&self) -> VertexId {
        self.vertex
    }

    #[must_use]
    pub fn polygons(&self) -> &[PolygonId] {
        &self.polygons
    }

    #[must_use]
    pub fn uv(&self, channel: usize) -> Vec2 {
        self.uvs.get(channel).copied().unwrap_or(Vec2::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    vertices: [VertexId; 2],
    pub is_hard: bool,
    pub crease_sharpness: f32,
    polygons: Vec<PolygonId>,
}

impl Edge {
    #[must_use]
    pub const fn vertices(&self) -> [VertexId; 2] {
        self.vertices
    }

    #[must_use]
    pub fn polygons(&self) -> &[PolygonId] {
        &self.polygons
    }

    #[must_use]
    pub fn other_vertex(&self, v: VertexId) -> VertexId {
        if self.vertices[0] == v { self.vertices[1] } else { self.vertices[0] }
    }
}

/// Three corners of a polygon triangulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triangle {
    pub corners: [VertexInstanceId; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    perimeter: Vec<VertexInstanceId>,
    group: PolygonGroupId,
    triangles: Vec<Triangle>,
    triangulation_dirty: bool,
    /// Face basis written by the NTB stage; zero until computed.
    pub normal: Vec3,
    pub tangent: Vec3,
    pub binormal: Vec3,
}

impl Polygon {
    #[must_use]
    pub fn perimeter(&self) -> &[VertexInstanceId] {
        &self.perimeter
    }

    #[must_use]
    pub const fn group(&self) -> PolygonGroupId {
        self.group
    }

    #[must_use]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    #[must_use]
    pub const fn is_triangulation_dirty(&self) -> bool {
        self.triangulation_dirty
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolygonGroup {
    pub material_slot_name: String,
    polygons: Vec<PolygonId>,
}

impl PolygonGroup {
    #[must_use]
    pub fn polygons(&self) -> &[PolygonId] {
        &self.polygons
    }
}

/// Old → new id tables produced by [`MeshGraph::compact`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompactionRemap {
    pub vertices: Vec<Option<u32>>,
    pub vertex_instances: Vec<Option<u32>>,
    pub edges: Vec<Option<u32>>,
    pub polygons: Vec<Option<u32>>,
    pub polygon_groups: Vec<Option<u32>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// MeshGraph
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MeshGraph {
    vertices: Arena<Vertex>,
    vertex_instances: Arena<VertexInstance>,
    edges: Arena<Edge>,
    polygons: Arena<Polygon>,
    polygon_groups: Arena<PolygonGroup>,
    num_uv_channels: usize,
}

impl Default for MeshGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshGraph {
    /// Empty mesh with a single UV channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vertices: Arena::default(),
            vertex_instances: Arena::default(),
            edges: Arena::default(),
            polygons: Arena::default(),
            polygon_groups: Arena::default(),
            num_uv_channels: 1,
        }
    }

    pub fn with_uv_channels(count: usize) -> Result<Self, MeshGraphError> {
        if count > MAX_UV_CHANNELS {
            return Err(MeshGraphError::TooManyUvChannels { max: MAX_UV_CHANNELS });
        }
        Ok(Self { num_uv_channels: count.max(1), ..Self::new() })
    }

    // ── creation ────────────────────────────────────────────────────────────

    pub fn create_vertex(&mut self, position: Vec3) -> VertexId {
        VertexId::new(self.vertices.insert(Vertex {
            position,
            instances: Vec::new(),
            edges: Vec::new(),
        }))
    }

    pub fn create_vertex_instance(
        &mut self,
        vertex: VertexId,
    ) -> Result<VertexInstanceId, MeshGraphError> {
        if self.vertices.get(vertex.index()).is_none() {
            return Err(MeshGraphError::InvalidVertex(vertex));
        }
        let id = VertexInstanceId::new(self.vertex_instances.insert(VertexInstance {
            vertex,
            normal: Vec3::ZERO,
            tangent: Vec3::ZERO,
            binormal_sign: 1.0,
            color: LinearColor::WHITE,
            uvs: vec![Vec2::ZERO; self.num_uv_channels],
            polygons: Vec::new(),
        }));
        if let Some(v) = self.vertices.get_mut(vertex.index()) {
            v.instances.push(id);
        }
        Ok(id)
    }

    pub fn create_edge(&mut self, v0: VertexId, v1: VertexId) -> Result<EdgeId, MeshGraphError> {
        if v0 == v1 {
            return Err(MeshGraphError::EdgeEndpointsEqual(v0));
        }
        for v in [v0, v1] {
            if self.vertices.get(v.index()).is_none() {
                return Err(MeshGraphError::InvalidVertex(v));
            }
        }
        let id = EdgeId::new(self.edges.insert(Edge {
            vertices: [v0, v1],
            is_hard: false,
            crease_sharpness: 0.0,
            polygons: Vec::new(),
        }));
        for v in [v0, v1] {
            if let Some(vertex) = self.vertices.get_mut(v.index()) {
                vertex.edges.push(id);
            }
        }
        Ok(id)
    }

    pub fn create_polygon_group(&mut self, material_slot_name: impl Into<String>) -> PolygonGroupId {
        PolygonGroupId::new(self.polygon_groups.insert(PolygonGroup {
            material_slot_name: material_slot_name.into(),
            polygons: Vec::new(),
        }))
    }

    /// Creates a polygon from an ordered corner loop, creating any missing
    /// perimeter edges, and triangulates it.
    pub fn create_polygon(
        &mut self,
        group: PolygonGroupId,
        perimeter: &[VertexInstanceId],
    ) -> Result<PolygonId, MeshGraphError> {
        if perimeter.len() < 3 {
            return Err(MeshGraphError::TooFewCorners { corners: perimeter.len() });
        }
        if self.polygon_groups.get(group.index()).is_none() {
            return Err(MeshGraphError::InvalidPolygonGroup(group));
        }
        let mut corner_vertices = Vec::with_capacity(perimeter.len());
        for &vi in perimeter {
            let instance = self
                .vertex_instances
                .get(vi.index())
                .ok_or(MeshGraphError::InvalidVertexInstance(vi))?;
            corner_vertices.push(instance.vertex);
        }

        let mut perimeter_edges = Vec::with_capacity(perimeter.len());
        for i in 0..corner_vertices.len() {
            let a = corner_vertices[i];
            let b = corner_vertices[(i + 1) % corner_vertices.len()];
            let edge = match self.vertex_pair_edge(a, b) {
                Some(edge) => edge,
                None => self.create_edge(a, b)?,
            };
            perimeter_edges.push(edge);
        }

        let id = PolygonId::new(self.polygons.insert(Polygon {
            perimeter: perimeter.to_vec(),
            group,
            triangles: Vec::new(),
            triangulation_dirty: true,
            normal: Vec3::ZERO,
            tangent: Vec3::ZERO,
            binormal: Vec3::ZERO,
        }));

        for edge in perimeter_edges {
            if let Some(e) = self.edges.get_mut(edge.index()) {
                if !e.polygons.contains(&id) {
                    e.polygons.push(id);
                }
            }
        }
        for &vi in perimeter {
            if let Some(instance) = self.vertex_instances.get_mut(vi.index()) {
                if !instance.polygons.contains(&id) {
                    instance.polygons.push(id);
                }
            }
        }
        if let Some(g) = self.polygon_groups.get_mut(group.index()) {
            g.polygons.push(id);
        }
        self.triangulate_polygon(id);
        Ok(id)
    }

    /// Creates a polygon with a caller-supplied triangulation instead of
    /// computing one. Triangles must only use corners of `perimeter`.
    pub fn create_polygon_with_triangles(
        &mut self,
        group: PolygonGroupId,
        perimeter: &[VertexInstanceId],
        triangles: Vec<Triangle>,
    ) -> Result<PolygonId, MeshGraphError> {
        if let Some(bad) = triangles
            .iter()
            .flat_map(|t| t.corners)
            .find(|c| !perimeter.contains(c))
        {
            return Err(MeshGraphError::Inconsistent {
                reason: format!("triangle corner {bad} is not on the polygon perimeter"),
            });
        }
        let id = self.create_polygon(group, perimeter)?;
        if let Some(polygon) = self.polygons.get_mut(id.index()) {
            polygon.triangles = triangles;
            polygon.triangulation_dirty = false;
        }
        Ok(id)
    }

    // ── deletion ────────────────────────────────────────────────────────────

    /// Removes a polygon. With `remove_orphans`, edges, vertex instances and
    /// vertices left without any polygon are removed as well.
    pub fn delete_polygon(&mut self, id: PolygonId, remove_orphans: bool) -> Result<(), MeshGraphError> {
        let polygon = self.polygons.remove(id.index()).ok_or(MeshGraphError::InvalidPolygon(id))?;
        if let Some(g) = self.polygon_groups.get_mut(polygon.group.index()) {
            g.polygons.retain(|&p| p != id);
        }

        let edges = self.perimeter_edges_of(&polygon.perimeter);
        for edge in edges {
            let now_empty = match self.edges.get_mut(edge.index()) {
                Some(e) => {
                    e.polygons.retain(|&p| p != id);
                    e.polygons.is_empty()
                }
                None => false,
            };
            if remove_orphans && now_empty {
                self.remove_edge(edge);
            }
        }

        for &vi in &polygon.perimeter {
            let now_empty = match self.vertex_instances.get_mut(vi.index()) {
                Some(instance) => {
                    instance.polygons.retain(|&p| p != id);
                    instance.polygons.is_empty()
                }
                None => false,
            };
            if remove_orphans && now_empty {
                self.remove_vertex_instance(vi);
            }
        }
        Ok(())
    }

    /// Deletes a group together with all of its polygons.
    pub fn delete_polygon_group(&mut self, id: PolygonGroupId) -> Result<(), MeshGraphError> {
        let polygons = self
            .polygon_groups
            .get(id.index())
            .ok_or(MeshGraphError::InvalidPolygonGroup(id))?
            .polygons
            .clone();
        for polygon in polygons {
            self.delete_polygon(polygon, true)?;
        }
        self.polygon_groups.remove(id.index());
        Ok(())
    }

    fn remove_edge(&mut self, id: EdgeId) {
        let Some(edge) = self.edges.remove(id.index()) else { return };
        for v in edge.vertices {
            if let Some(vertex) = self.vertices.get_mut(v.index()) {
                vertex.edges.retain(|&e| e != id);
            }
            self.remove_vertex_if_orphaned(v);
        }
    }

    fn remove_vertex_instance(&mut self, id: VertexInstanceId) {
        let Some(instance) = self.vertex_instances.remove(id.index()) else { return };
        if let Some(vertex) = self.vertices.get_mut(instance.vertex.index()) {
            vertex.instances.retain(|&vi| vi != id);
        }
        self.remove_vertex_if_orphaned(instance.vertex);
    }

    fn remove_vertex_if_orphaned(&mut self, id: VertexId) {
        let orphaned = self
            .vertices
            .get(id.index())
            .is_some_and(|v| v.instances.is_empty() && v.edges.is_empty());
        if orphaned {
            self.vertices.remove(id.index());
        }
    }

    /// Renumbers every arena densely and rewrites all references.
    pub fn compact(&mut self) -> CompactionRemap {
        let remap = CompactionRemap {
            vertices: self.vertices.compact(),
            vertex_instances: self.vertex_instances.compact(),
            edges: self.edges.compact(),
            polygons: self.polygons.compact(),
            polygon_groups: self.polygon_groups.compact(),
        };

        let map_v = |v: VertexId| VertexId(remap.vertices[v.index()].unwrap_or(u32::MAX));
        let map_vi =
            |v: VertexInstanceId| VertexInstanceId(remap.vertex_instances[v.index()].unwrap_or(u32::MAX));
        let map_e = |e: EdgeId| EdgeId(remap.edges[e.index()].unwrap_or(u32::MAX));
        let map_p = |p: PolygonId| PolygonId(remap.polygons[p.index()].unwrap_or(u32::MAX));
        let map_g = |g: PolygonGroupId| PolygonGroupId(remap.polygon_groups[g.index()].unwrap_or(u32::MAX));

        for (_, vertex) in self.vertices.iter_mut() {
            vertex.instances.iter_mut().for_each(|vi| *vi = map_vi(*vi));
            vertex.edges.iter_mut().for_each(|e| *e = map_e(*e));
        }
        for (_, instance) in self.vertex_instances.iter_mut() {
            instance.vertex = map_v(instance.vertex);
            instance.polygons.iter_mut().for_each(|p| *p = map_p(*p));
        }
        for (_, edge) in self.edges.iter_mut() {
            edge.vertices = edge.vertices.map(map_v);
            edge.polygons.iter_mut().for_each(|p| *p = map_p(*p));
        }
        for (_, polygon) in self.polygons.iter_mut() {
            polygon.perimeter.iter_mut().for_each(|vi| *vi = map_vi(*vi));
            polygon.group = map_g(polygon.group);
            for triangle in &mut polygon.triangles {
                triangle.corners = triangle.corners.map(map_vi);
            }
        }
        for (_, group) in self.polygon_groups.iter_mut() {
            group.polygons.iter_mut().for_each(|p| *p = map_p(*p));
        }
        remap
    }

    /// `true` when any arena contains deleted slots.
    #[must_use]
    pub fn has_holes(&self) -> bool {
        self.vertices.has_holes()
            || self.vertex_instances.has_holes()
            || self.edges.has_holes()
            || self.polygons.has_holes()
            || self.polygon_groups.has_holes()
    }

    // ── mutation ────────────────────────────────────────────────────────────

    /// Moves a vertex and marks every polygon touching it for retriangulation.
    pub fn set_vertex_position(&mut self, id: VertexId, position: Vec3) -> Result<(), MeshGraphError> {
        let vertex = self.vertices.get_mut(id.index()).ok_or(MeshGraphError::InvalidVertex(id))?;
        vertex.position = position;
        for polygon in self.polygons_of_vertex(id) {
            if let Some(p) = self.polygons.get_mut(polygon.index()) {
                p.triangulation_dirty = true;
            }
        }
        Ok(())
    }

    /// Retriangulates every dirty polygon and returns how many were rebuilt.
    pub fn ensure_triangulated(&mut self) -> usize {
        let dirty: Vec<PolygonId> = self
            .polygons
            .iter()
            .filter(|(_, p)| p.triangulation_dirty)
            .map(|(i, _)| PolygonId::new(i))
            .collect();
        for &id in &dirty {
            self.triangulate_polygon(id);
        }
        dirty.len()
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(id.index())
    }

    pub fn vertex_instance_mut(&mut self, id: VertexInstanceId) -> Option<&mut VertexInstance> {
        self.vertex_instances.get_mut(id.index())
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(id.index())
    }

    pub fn polygon_mut(&mut self, id: PolygonId) -> Option<&mut Polygon> {
        self.polygons.get_mut(id.index())
    }

    pub fn polygon_group_mut(&mut self, id: PolygonGroupId) -> Option<&mut PolygonGroup> {
        self.polygon_groups.get_mut(id.index())
    }

    pub fn vertex_instances_mut(&mut self) -> impl Iterator<Item = (VertexInstanceId, &mut VertexInstance)> {
        self.vertex_instances.iter_mut().map(|(i, v)| (VertexInstanceId::new(i), v))
    }

    pub fn polygons_mut(&mut self) -> impl Iterator<Item = (PolygonId, &mut Polygon)> {
        self.polygons.iter_mut().map(|(i, p)| (PolygonId::new(i), p))
    }

    /// Marks an edge hard (or soft) by its endpoints.
    pub fn set_edge_hard(&mut self, v0: VertexId, v1: VertexId, hard: bool) -> Option<EdgeId> {
        let edge = self.vertex_pair_edge(v0, v1)?;
        if let Some(e) = self.edges.get_mut(edge.index()) {
            e.is_hard = hard;
        }
        Some(edge)
    }

    pub fn set_all_edges_hard(&mut self, hard: bool) {
        for (_, edge) in self.edges.iter_mut() {
            edge.is_hard = hard;
        }
    }

    // ── UV channels ─────────────────────────────────────────────────────────

    #[must_use]
    pub const fn num_uv_channels(&self) -> usize {
        self.num_uv_channels
    }

    pub fn add_uv_channel(&mut self) -> Result<usize, MeshGraphError> {
        self.insert_uv_channel(self.num_uv_channels)
    }

    pub fn insert_uv_channel(&mut self, index: usize) -> Result<usize, MeshGraphError> {
        if index > self.num_uv_channels {
            return Err(MeshGraphError::UvChannelOutOfRange { index, count: self.num_uv_channels });
        }
        if self.num_uv_channels >= MAX_UV_CHANNELS {
            return Err(MeshGraphError::TooManyUvChannels { max: MAX_UV_CHANNELS });
        }
        for (_, instance) in self.vertex_instances.iter_mut() {
            instance.uvs.insert(index, Vec2::ZERO);
        }
        self.num_uv_channels += 1;
        Ok(index)
    }

    pub fn remove_uv_channel(&mut self, index: usize) -> Result<(), MeshGraphError> {
        if self.num_uv_channels == 1 {
            return Err(MeshGraphError::LastUvChannel);
        }
        if index >= self.num_uv_channels {
            return Err(MeshGraphError::UvChannelOutOfRange { index, count: self.num_uv_channels });
        }
        for (_, instance) in self.vertex_instances.iter_mut() {
            instance.uvs.remove(index);
        }
        self.num_uv_channels -= 1;
        Ok(())
    }

    /// Grows the channel count so that `channel` is addressable.
    pub fn ensure_uv_channel(&mut self, channel: usize) -> Result<(), MeshGraphError> {
        while self.num_uv_channels <= channel {
            self.add_uv_channel()?;
        }
        Ok(())
    }

    // ── queries ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.index())
    }

    #[must_use]
    pub fn vertex_instance(&self, id: VertexInstanceId) -> Option<&VertexInstance> {
        self.vertex_instances.get(id.index())
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.index())
    }

    #[must_use]
    pub fn polygon(&self, id: PolygonId) -> Option<&Polygon> {
        self.polygons.get(id.index())
    }

    #[must_use]
    pub fn polygon_group(&self, id: PolygonGroupId) -> Option<&PolygonGroup> {
        self.polygon_groups.get(id.index())
    }

    /// Position of a vertex; zero for an invalid id.
    #[must_use]
    pub fn vertex_position(&self, id: VertexId) -> Vec3 {
        self.vertex(id).map_or(Vec3::ZERO, |v| v.position)
    }

    /// Position of the vertex under a vertex instance; zero for an invalid id.
    #[must_use]
    pub fn instance_position(&self, id: VertexInstanceId) -> Vec3 {
        self.vertex_instance(id).map_or(Vec3::ZERO, |vi| self.vertex_position(vi.vertex))
    }

    #[must_use]
    pub fn vertex_instance_vertex(&self, id: VertexInstanceId) -> Option<VertexId> {
        self.vertex_instance(id).map(VertexInstance::vertex)
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.iter().map(|(i, _)| VertexId::new(i))
    }

    pub fn vertex_instance_ids(&self) -> impl Iterator<Item = VertexInstanceId> + '_ {
        self.vertex_instances.iter().map(|(i, _)| VertexInstanceId::new(i))
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().map(|(i, _)| EdgeId::new(i))
    }

    pub fn polygon_ids(&self) -> impl Iterator<Item = PolygonId> + '_ {
        self.polygons.iter().map(|(i, _)| PolygonId::new(i))
    }

    pub fn polygon_group_ids(&self) -> impl Iterator<Item = PolygonGroupId> + '_ {
        self.polygon_groups.iter().map(|(i, _)| PolygonGroupId::new(i))
    }

    pub fn vertex_instances(&self) -> impl Iterator<Item = (VertexInstanceId, &VertexInstance)> {
        self.vertex_instances.iter().map(|(i, v)| (VertexInstanceId::new(i), v))
    }

    pub fn polygons(&self) -> impl Iterator<Item = (PolygonId, &Polygon)> {
        self.polygons.iter().map(|(i, p)| (PolygonId::new(i), p))
    }

    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.vertices.live
    }

    #[must_use]
    pub fn num_vertex_instances(&self) -> usize {
        self.vertex_instances.live
    }

    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.live
    }

    #[must_use]
    pub fn num_polygons(&self) -> usize {
        self.polygons.live
    }

    #[must_use]
    pub fn num_polygon_groups(&self) -> usize {
        self.polygon_groups.live
    }

    /// Size of the vertex-instance arena including holes.
    #[must_use]
    pub fn vertex_instance_array_size(&self) -> usize {
        self.vertex_instances.slots.len()
    }

    #[must_use]
    pub fn polygon_array_size(&self) -> usize {
        self.polygons.slots.len()
    }

    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.polygons.iter().map(|(_, p)| p.triangles.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.polygons.live == 0
    }

    #[must_use]
    pub fn vertex_pair_edge(&self, v0: VertexId, v1: VertexId) -> Option<EdgeId> {
        let vertex = self.vertex(v0)?;
        vertex.edges.iter().copied().find(|&e| {
            self.edge(e).is_some_and(|edge| edge.other_vertex(v0) == v1)
        })
    }

    #[must_use]
    pub fn connected_edges_of_vertex(&self, id: VertexId) -> &[EdgeId] {
        self.vertex(id).map_or(&[], |v| v.edges.as_slice())
    }

    #[must_use]
    pub fn connected_polygons_of_edge(&self, id: EdgeId) -> &[PolygonId] {
        self.edge(id).map_or(&[], |e| e.polygons.as_slice())
    }

    #[must_use]
    pub fn vertex_instance_connected_polygons(&self, id: VertexInstanceId) -> &[PolygonId] {
        self.vertex_instance(id).map_or(&[], |vi| vi.polygons.as_slice())
    }

    /// Unique polygons touching a vertex, in first-seen order.
    #[must_use]
    pub fn polygons_of_vertex(&self, id: VertexId) -> Vec<PolygonId> {
        let mut out = Vec::new();
        if let Some(vertex) = self.vertex(id) {
            for &vi in &vertex.instances {
                for &p in self.vertex_instance_connected_polygons(vi) {
                    if !out.contains(&p) {
                        out.push(p);
                    }
                }
            }
        }
        out
    }

    #[must_use]
    pub fn polygon_perimeter(&self, id: PolygonId) -> &[VertexInstanceId] {
        self.polygon(id).map_or(&[], |p| p.perimeter.as_slice())
    }

    #[must_use]
    pub fn triangles(&self, id: PolygonId) -> &[Triangle] {
        self.polygon(id).map_or(&[], |p| p.triangles.as_slice())
    }

    #[must_use]
    pub fn polygon_polygon_group(&self, id: PolygonId) -> Option<PolygonGroupId> {
        self.polygon(id).map(|p| p.group)
    }

    /// Perimeter edges of a polygon in corner order.
    #[must_use]
    pub fn polygon_perimeter_edges(&self, id: PolygonId) -> Vec<EdgeId> {
        self.polygon(id).map_or_else(Vec::new, |p| self.perimeter_edges_of(&p.perimeter))
    }

    fn perimeter_edges_of(&self, perimeter: &[VertexInstanceId]) -> Vec<EdgeId> {
        let n = perimeter.len();
        (0..n)
            .filter_map(|i| {
                let a = self.vertex_instance_vertex(perimeter[i])?;
                let b = self.vertex_instance_vertex(perimeter[(i + 1) % n])?;
                self.vertex_pair_edge(a, b)
            })
            .collect()
    }

    #[must_use]
    pub fn polygon_group_polygons(&self, id: PolygonGroupId) -> &[PolygonId] {
        self.polygon_group(id).map_or(&[], |g| g.polygons.as_slice())
    }

    /// Checks every structural invariant of the graph.
    pub fn validate(&self) -> Result<(), MeshGraphError> {
        let inconsistent = |reason: String| Err(MeshGraphError::Inconsistent { reason });

        for (i, instance) in self.vertex_instances.iter() {
            if self.vertex(instance.vertex).is_none() {
                return inconsistent(format!("vertex instance vi{i} references missing {}", instance.vertex));
            }
            if instance.uvs.len() != self.num_uv_channels {
                return inconsistent(format!("vertex instance vi{i} has {} UV channels", instance.uvs.len()));
            }
        }
        for (i, edge) in self.edges.iter() {
            let [a, b] = edge.vertices;
            if a == b {
                return Err(MeshGraphError::EdgeEndpointsEqual(a));
            }
            if self.vertex(a).is_none() || self.vertex(b).is_none() {
                return inconsistent(format!("edge e{i} references a missing vertex"));
            }
        }
        for (i, polygon) in self.polygons.iter() {
            let pid = PolygonId::new(i);
            let in_group = self
                .polygon_group(polygon.group)
                .is_some_and(|g| g.polygons.contains(&pid));
            if !in_group {
                return inconsistent(format!("{pid} missing from its group {}", polygon.group));
            }
            for triangle in &polygon.triangles {
                if triangle.corners.iter().any(|c| !polygon.perimeter.contains(c)) {
                    return inconsistent(format!("{pid} triangulation uses a foreign corner"));
                }
            }
            for &vi in &polygon.perimeter {
                if self.vertex_instance(vi).is_none() {
                    return Err(MeshGraphError::InvalidVertexInstance(vi));
                }
            }
        }
        for (i, group) in self.polygon_groups.iter() {
            let gid = PolygonGroupId::new(i);
            for &p in &group.polygons {
                if self.polygon(p).map(|poly| poly.group) != Some(gid) {
                    return inconsistent(format!("{gid} lists {p} which belongs elsewhere"));
                }
            }
        }
        Ok(())
    }

    // ── triangulation ───────────────────────────────────────────────────────

    fn triangulate_polygon(&mut self, id: PolygonId) {
        let Some(polygon) = self.polygons.get(id.index()) else { return };
        let perimeter = polygon.perimeter.clone();
        let positions: Vec<Vec3> = perimeter.iter().map(|&vi| self.instance_position(vi)).collect();
        let triangles = triangulate_loop(&positions)
            .into_iter()
            .map(|[a, b, c]| Triangle { corners: [perimeter[a], perimeter[b], perimeter[c]] })
            .collect();
        if let Some(polygon) = self.polygons.get_mut(id.index()) {
            polygon.triangles = triangles;
            polygon.triangulation_dirty = false;
        }
    }
}

/// Ear-clipping triangulation of a planar-ish loop; falls back to a fan when
/// no ear can be found (self-intersecting or degenerate input).
fn triangulate_loop(positions: &[Vec3]) -> Vec<[usize; 3]> {
    let n = positions.len();
    if n < 3 {
        return Vec::new();
    }
    if n == 3 {
        return vec![[0, 1, 2]];
    }

    // Newell normal
    let mut normal = Vec3::ZERO;
    for i in 0..n {
        let a = positions[i];
        let b = positions[(i + 1) % n];
        normal += Vec3::new(
            (a.y - b.y) * (a.z + b.z),
            (a.z - b.z) * (a.x + b.x),
            (a.x - b.x) * (a.y + b.y),
        );
    }
    let Some(normal) = normal.normalized() else {
        return fan(n);
    };

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut out = Vec::with_capacity(n - 2);
    let mut guard = 0usize;

    while remaining.len() > 3 && guard < n * n {
        guard += 1;
        let m = remaining.len();
        let mut clipped = false;
        for i in 0..m {
            let prev = remaining[(i + m - 1) % m];
            let cur = remaining[i];
            let next = remaining[(i + 1) % m];
            let (a, b, c) = (positions[prev], positions[cur], positions[next]);
            let convex = (b - a).cross(c - b).dot(normal) > Tolerance::SMALL_NUMBER;
            if !convex {
                continue;
            }
            let contains_other = remaining.iter().any(|&k| {
                k != prev && k != cur && k != next && point_in_triangle(positions[k], a, b, c, normal)
            });
            if contains_other {
                continue;
            }
            out.push([prev, cur, next]);
            remaining.remove(i);
            clipped = true;
            break;
        }
        if !clipped {
            return fan(n);
        }
    }
    if remaining.len() == 3 {
        out.push([remaining[0], remaining[1], remaining[2]]);
    }
    out
}

fn fan(n: usize) -> Vec<[usize; 3]> {
    (1..n - 1).map(|i| [0, i, i + 1]).collect()
}

fn point_in_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3, normal: Vec3) -> bool {
    let side = |u: Vec3, v: Vec3| (v - u).cross(p - u).dot(normal) >= 0.0;
    side(a, b) && side(b, c) && side(c, a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concave_loop_triangulates_without_fan_overlap() {
        // L-shaped hexagon
        let loop_ = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(1.0, 2.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ];
        let tris = triangulate_loop(&loop_);
        assert_eq!(tris.len(), 4);
        let area: f32 = tris
            .iter()
            .map(|&[a, b, c]| (loop_[b] - loop_[a]).cross(loop_[c] - loop_[a]).length() * 0.5)
            .sum();
        assert!((area - 3.0).abs() < 1e-5, "area {area}");
    }

    #[test]
    fn collinear_loop_falls_back_to_fan() {
        let loop_ = [Vec3::ZERO, Vec3::X, Vec3::X * 2.0, Vec3::X * 3.0];
        assert_eq!(triangulate_loop(&loop_), vec![[0, 1, 2], [0, 2, 3]]);
    }
}
