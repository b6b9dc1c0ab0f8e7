use std::collections::HashMap;

use arrayvec::ArrayVec;
use glam::DVec3;

use crate::{
    element::{Edge, Entity, Face, Handle, Region, Vertex, EH, FH, RH, VH},
    error::Error,
    history::{Change, CheckPoint, MeshHistory},
    property::{PropertyContainer, Property, Tag},
    status::Status,
};

/// Local vertex pairs of the edges of a tetrahedron.
pub const TET_EDGE_VERTS: [[usize; 2]; 6] = [[0, 1], [1, 2], [2, 0], [0, 3], [1, 3], [2, 3]];

/// Local vertex triples of the faces of a tetrahedron.
pub const TET_TRI_VERTS: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [1, 2, 3], [0, 2, 3]];

/// Local vertex pairs of the edges of a triangle.
pub const TRI_EDGE_VERTS: [[usize; 2]; 3] = [[0, 1], [1, 2], [2, 0]];

fn sorted<const N: usize>(mut verts: [VH; N]) -> [VH; N] {
    verts.sort();
    verts
}

/// A conforming simplicial mesh of dimension 2 (triangles) or 3
/// (tetrahedra).
///
/// Vertices, edges, faces and regions are stored in flat arrays and addressed
/// by their handles. Sub-entities are created when the elements that need
/// them are added, and deleted once nothing of the next dimension uses them.
/// Deletion only sets a status bit: handles are never reused, and deleted
/// entities keep their tag values.
///
/// Every vertex has an owning part. Vertices owned by a part other than
/// [`Mesh::part`] are ghost copies and cannot be edited by this part.
pub struct Mesh {
    dim: usize,
    part: u32,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    faces: Vec<Face>,
    regions: Vec<Region>,
    edge_map: HashMap<[VH; 2], EH>,
    face_map: HashMap<[VH; 3], FH>,
    region_map: HashMap<[VH; 4], RH>,
    vprops: PropertyContainer<VH>,
    eprops: PropertyContainer<EH>,
    fprops: PropertyContainer<FH>,
    rprops: PropertyContainer<RH>,
    history: MeshHistory,
}

impl Mesh {
    pub fn new(dim: usize) -> Result<Self, Error> {
        if !(2..=3).contains(&dim) {
            return Err(Error::UnsupportedDimension(dim));
        }
        Ok(Mesh {
            dim,
            part: 0,
            vertices: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
            regions: Vec::new(),
            edge_map: HashMap::new(),
            face_map: HashMap::new(),
            region_map: HashMap::new(),
            vprops: PropertyContainer::new(),
            eprops: PropertyContainer::new(),
            fprops: PropertyContainer::new(),
            rprops: PropertyContainer::new(),
            history: MeshHistory::default(),
        })
    }

    /// The dimension of the elements of this mesh.
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// The part this copy of the mesh belongs to.
    pub fn part(&self) -> u32 {
        self.part
    }

    pub fn set_part(&mut self, part: u32) {
        self.part = part;
    }

    /// Create a tag with the given default value on every entity of the
    /// mesh. The tag is removed when the returned value is dropped.
    pub fn create_tag<T>(&mut self, default: T) -> Tag<T>
    where
        T: Clone + Copy + 'static,
    {
        Tag::new(
            Property::new(&mut self.vprops, default),
            Property::new(&mut self.eprops, default),
            Property::new(&mut self.fprops, default),
            Property::new(&mut self.rprops, default),
        )
    }

    /// Number of live tags on this mesh.
    pub fn num_tags(&self) -> usize {
        self.rprops.num_properties()
    }

    fn status(&self, e: Entity) -> Option<Status> {
        let i = e.index() as usize;
        match e {
            Entity::Vertex(_) => self.vertices.get(i).map(|v| v.status),
            Entity::Edge(_) => self.edges.get(i).map(|e| e.status),
            Entity::Face(_) => self.faces.get(i).map(|f| f.status),
            Entity::Region(_) => self.regions.get(i).map(|r| r.status),
        }
    }

    fn status_mut(&mut self, e: Entity) -> &mut Status {
        let i = e.index() as usize;
        match e {
            Entity::Vertex(_) => &mut self.vertices[i].status,
            Entity::Edge(_) => &mut self.edges[i].status,
            Entity::Face(_) => &mut self.faces[i].status,
            Entity::Region(_) => &mut self.regions[i].status,
        }
    }

    /// Check that the entity exists and was not deleted.
    pub fn is_alive(&self, e: Entity) -> bool {
        self.status(e).is_some_and(|s| !s.deleted())
    }

    fn len(&self, dim: usize) -> usize {
        match dim {
            0 => self.vertices.len(),
            1 => self.edges.len(),
            2 => self.faces.len(),
            3 => self.regions.len(),
            _ => 0,
        }
    }

    /// Live entities of dimension `dim`, in storage order.
    pub fn entities(&self, dim: usize) -> impl Iterator<Item = Entity> + use<'_> {
        (0..self.len(dim)).filter_map(move |i| {
            let e = Entity::from_index(dim, i as u32)?;
            self.is_alive(e).then_some(e)
        })
    }

    /// Live elements of the mesh's top dimension.
    pub fn elements(&self) -> impl Iterator<Item = Entity> + use<'_> {
        self.entities(self.dim)
    }

    pub fn count(&self, dim: usize) -> usize {
        self.entities(dim).count()
    }

    pub fn num_vertices(&self) -> usize {
        self.count(0)
    }

    pub fn num_edges(&self) -> usize {
        self.count(1)
    }

    pub fn num_faces(&self) -> usize {
        self.count(2)
    }

    pub fn num_regions(&self) -> usize {
        self.count(3)
    }

    pub fn num_elements(&self) -> usize {
        self.count(self.dim)
    }

    pub fn vertices(&self) -> impl Iterator<Item = VH> + use<'_> {
        self.entities(0).filter_map(|e| match e {
            Entity::Vertex(v) => Some(v),
            _ => None,
        })
    }

    pub fn edges(&self) -> impl Iterator<Item = EH> + use<'_> {
        self.entities(1).filter_map(|e| match e {
            Entity::Edge(e) => Some(e),
            _ => None,
        })
    }

    pub fn point(&self, v: VH) -> DVec3 {
        self.vertices[v.index() as usize].point
    }

    pub fn set_point(&mut self, v: VH, pos: DVec3) {
        let old = std::mem::replace(&mut self.vertices[v.index() as usize].point, pos);
        self.history.record(Change::Moved(v, old));
    }

    pub fn vertex_owner(&self, v: VH) -> u32 {
        self.vertices[v.index() as usize].owner
    }

    pub fn set_vertex_owner(&mut self, v: VH, owner: u32) {
        self.vertices[v.index() as usize].owner = owner;
    }

    /// Check if this part owns the vertex, i.e. it is not a ghost copy.
    pub fn is_owned(&self, v: VH) -> bool {
        self.vertex_owner(v) == self.part
    }

    pub(crate) fn is_locked(&self, v: VH) -> bool {
        self.vertices[v.index() as usize].status.locked()
    }

    pub(crate) fn set_locked(&mut self, v: VH, flag: bool) {
        self.vertices[v.index() as usize].status.set_locked(flag);
    }

    pub(crate) fn set_tagged(&mut self, v: VH, flag: bool) {
        self.vertices[v.index() as usize].status.set_tagged(flag);
    }

    pub(crate) fn is_tagged(&self, v: VH) -> bool {
        self.vertices[v.index() as usize].status.tagged()
    }

    pub fn edge_vertices(&self, e: EH) -> [VH; 2] {
        self.edges[e.index() as usize].verts
    }

    pub fn face_vertices(&self, f: FH) -> [VH; 3] {
        self.faces[f.index() as usize].verts
    }

    pub fn region_vertices(&self, r: RH) -> [VH; 4] {
        self.regions[r.index() as usize].verts
    }

    /// Vertices of any entity, in the order the entity was created with.
    pub fn downward_vertices(&self, e: Entity) -> ArrayVec<VH, 4> {
        let mut out = ArrayVec::new();
        match e {
            Entity::Vertex(v) => out.push(v),
            Entity::Edge(e) => out.extend(self.edge_vertices(e)),
            Entity::Face(f) => out.extend(self.face_vertices(f)),
            Entity::Region(r) => out.extend(self.region_vertices(r)),
        }
        out
    }

    /// Positions of the vertices of an entity.
    pub fn entity_points(&self, e: Entity) -> ArrayVec<DVec3, 4> {
        self.downward_vertices(e)
            .iter()
            .map(|v| self.point(*v))
            .collect()
    }

    /// Edges bounding an entity, in the canonical local order
    /// ([`TRI_EDGE_VERTS`] or [`TET_EDGE_VERTS`]).
    pub fn downward_edges(&self, e: Entity) -> ArrayVec<EH, 6> {
        let verts = self.downward_vertices(e);
        let pairs: &[[usize; 2]] = match verts.len() {
            2 => &[[0, 1]],
            3 => &TRI_EDGE_VERTS,
            4 => &TET_EDGE_VERTS,
            _ => &[],
        };
        pairs
            .iter()
            .filter_map(|[i, j]| self.find_edge(verts[*i], verts[*j]))
            .collect()
    }

    /// Faces bounding a region, in the order of [`TET_TRI_VERTS`].
    pub fn region_faces(&self, r: RH) -> ArrayVec<FH, 4> {
        let verts = self.region_vertices(r);
        TET_TRI_VERTS
            .iter()
            .filter_map(|[i, j, k]| self.find_face([verts[*i], verts[*j], verts[*k]]))
            .collect()
    }

    pub fn vertex_edges(&self, v: VH) -> &[EH] {
        &self.vertices[v.index() as usize].edges
    }

    pub fn edge_faces(&self, e: EH) -> &[FH] {
        &self.edges[e.index() as usize].faces
    }

    pub fn face_regions(&self, f: FH) -> &[RH] {
        &self.faces[f.index() as usize].regions
    }

    /// Entities of dimension `dim + 1` directly adjacent to `e`.
    pub fn upward(&self, e: Entity) -> Vec<Entity> {
        match e {
            Entity::Vertex(v) => self.vertex_edges(v).iter().map(|e| (*e).into()).collect(),
            Entity::Edge(e) => self.edge_faces(e).iter().map(|f| (*f).into()).collect(),
            Entity::Face(f) => self.face_regions(f).iter().map(|r| (*r).into()).collect(),
            Entity::Region(_) => Vec::new(),
        }
    }

    pub fn find_edge(&self, a: VH, b: VH) -> Option<EH> {
        self.edge_map.get(&sorted([a, b])).copied()
    }

    pub fn find_face(&self, verts: [VH; 3]) -> Option<FH> {
        self.face_map.get(&sorted(verts)).copied()
    }

    pub fn find_region(&self, verts: [VH; 4]) -> Option<RH> {
        self.region_map.get(&sorted(verts)).copied()
    }

    /// Find the top dimensional element with exactly these vertices.
    pub fn find_element(&self, verts: &[VH]) -> Option<Entity> {
        match *verts {
            [a, b, c] if self.dim == 2 => self.find_face([a, b, c]).map(Entity::Face),
            [a, b, c, d] if self.dim == 3 => self.find_region([a, b, c, d]).map(Entity::Region),
            _ => None,
        }
    }

    /// Top dimensional elements that contain the edge `e`.
    pub fn elements_of_edge(&self, e: EH) -> Vec<Entity> {
        let mut out: Vec<Entity> = Vec::new();
        for f in self.edge_faces(e) {
            if self.dim == 2 {
                out.push((*f).into());
            } else {
                out.extend(self.face_regions(*f).iter().map(|r| Entity::from(*r)));
            }
        }
        out.sort();
        out.dedup();
        out
    }

    /// Top dimensional elements that contain the vertex `v`.
    pub fn elements_of_vertex(&self, v: VH) -> Vec<Entity> {
        let mut out: Vec<Entity> = Vec::new();
        for e in self.vertex_edges(v) {
            out.extend(self.elements_of_edge(*e));
        }
        out.sort();
        out.dedup();
        out
    }

    /// Vertices sharing an edge with `v`.
    pub fn vertex_neighbors(&self, v: VH) -> Vec<VH> {
        self.vertex_edges(v)
            .iter()
            .map(|e| {
                let [a, b] = self.edge_vertices(*e);
                if a == v { b } else { a }
            })
            .collect()
    }

    pub fn is_boundary_face(&self, f: FH) -> bool {
        self.dim == 3 && self.face_regions(f).len() < 2
    }

    /// An edge is on the boundary if it lies on a boundary face of a 3-D
    /// mesh, or if it bounds fewer than two triangles of a 2-D mesh.
    pub fn is_boundary_edge(&self, e: EH) -> bool {
        match self.dim {
            2 => self.edge_faces(e).len() < 2,
            _ => self
                .edge_faces(e)
                .iter()
                .any(|f| self.is_boundary_face(*f)),
        }
    }

    pub fn is_boundary_vertex(&self, v: VH) -> bool {
        self.vertex_edges(v)
            .iter()
            .any(|e| self.is_boundary_edge(*e))
    }

    pub fn add_vertex(&mut self, pos: DVec3) -> Result<VH, Error> {
        let v: VH = (self.vertices.len() as u32).into();
        self.vprops.push_value()?;
        self.vertices.push(Vertex {
            point: pos,
            owner: self.part,
            status: Status::default(),
            edges: Vec::new(),
        });
        self.history.record(Change::Created(v.into()));
        Ok(v)
    }

    pub fn add_vertices(&mut self, pos: &[DVec3]) -> Result<Vec<VH>, Error> {
        pos.iter().map(|p| self.add_vertex(*p)).collect()
    }

    fn check_new_element(&self, verts: &[VH]) -> Result<(), Error> {
        if verts.len() != self.dim + 1 {
            return Err(Error::InvalidElementArity {
                dim: self.dim,
                expected: self.dim + 1,
                found: verts.len(),
            });
        }
        for (i, v) in verts.iter().enumerate() {
            if !self.is_alive((*v).into()) {
                return Err(Error::InvalidVertex(*v));
            }
            if verts[..i].contains(v) {
                return Err(Error::RepeatedVertex(*v));
            }
        }
        if let Some(e) = self.find_element(verts) {
            return Err(Error::DuplicateElement(e));
        }
        Ok(())
    }

    fn get_or_add_edge(&mut self, a: VH, b: VH) -> Result<EH, Error> {
        if let Some(e) = self.find_edge(a, b) {
            return Ok(e);
        }
        let e: EH = (self.edges.len() as u32).into();
        self.eprops.push_value()?;
        self.edges.push(Edge {
            verts: [a, b],
            status: Status::default(),
            faces: Vec::new(),
        });
        self.link(e.into());
        self.history.record(Change::Created(e.into()));
        Ok(e)
    }

    fn get_or_add_face(&mut self, verts: [VH; 3]) -> Result<FH, Error> {
        if let Some(f) = self.find_face(verts) {
            return Ok(f);
        }
        for [i, j] in TRI_EDGE_VERTS {
            self.get_or_add_edge(verts[i], verts[j])?;
        }
        let f: FH = (self.faces.len() as u32).into();
        self.fprops.push_value()?;
        self.faces.push(Face {
            verts,
            status: Status::default(),
            regions: Vec::new(),
        });
        self.link(f.into());
        self.history.record(Change::Created(f.into()));
        Ok(f)
    }

    /// Add an element of the mesh's top dimension, creating the edges and
    /// faces it needs. Tetrahedra are expected to be positively oriented.
    pub fn add_element(&mut self, verts: &[VH]) -> Result<Entity, Error> {
        self.check_new_element(verts)?;
        match *verts {
            [a, b, c] => Ok(self.get_or_add_face([a, b, c])?.into()),
            [a, b, c, d] => {
                let verts = [a, b, c, d];
                for [i, j, k] in TET_TRI_VERTS {
                    self.get_or_add_face([verts[i], verts[j], verts[k]])?;
                }
                let r: RH = (self.regions.len() as u32).into();
                self.rprops.push_value()?;
                self.regions.push(Region {
                    verts,
                    status: Status::default(),
                });
                self.link(r.into());
                self.history.record(Change::Created(r.into()));
                Ok(r.into())
            }
            _ => Err(Error::InvalidElementArity {
                dim: self.dim,
                expected: self.dim + 1,
                found: verts.len(),
            }),
        }
    }

    fn delete(&mut self, e: Entity) {
        self.unlink(e);
        self.status_mut(e).set_deleted(true);
        self.history.record(Change::Deleted(e));
    }

    /// Remove an element of the top dimension, along with every face and
    /// edge that no longer bounds anything. Vertices are left in place, see
    /// [`Mesh::remove_vertex`].
    pub fn remove_element(&mut self, e: Entity) -> Result<(), Error> {
        if e.dim() != self.dim {
            return Err(Error::NotAnElement(e));
        }
        if !self.is_alive(e) {
            return Err(Error::DeletedEntity(e));
        }
        let mut faces: ArrayVec<FH, 4> = ArrayVec::new();
        match e {
            Entity::Region(r) => {
                faces.extend(self.region_faces(r));
                self.delete(e);
                faces.retain(|f| self.face_regions(*f).is_empty());
            }
            Entity::Face(f) => faces.push(f),
            _ => return Err(Error::NotAnElement(e)),
        }
        let mut edges: ArrayVec<EH, 12> = ArrayVec::new();
        for f in faces {
            edges.extend(self.downward_edges(f.into()));
            self.delete(f.into());
        }
        // Faces of a region share edges, so an edge can show up twice.
        for e in edges {
            if self.is_alive(e.into()) && self.edge_faces(e).is_empty() {
                self.delete(e.into());
            }
        }
        Ok(())
    }

    /// Remove a vertex that no longer bounds any edge.
    pub fn remove_vertex(&mut self, v: VH) -> Result<(), Error> {
        if !self.is_alive(v.into()) {
            return Err(Error::DeletedEntity(v.into()));
        }
        if !self.vertex_edges(v).is_empty() {
            return Err(Error::VertexInUse(v));
        }
        self.delete(v.into());
        Ok(())
    }

    /// Remove the elements `old` and add the elements `new` as one edit. If
    /// anything fails, the mesh is left as it was.
    pub fn replace_elements<I, A>(&mut self, old: &[Entity], new: I) -> Result<Vec<Entity>, Error>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[VH]>,
    {
        let cp = self.begin_edit();
        let result = old
            .iter()
            .try_for_each(|e| self.remove_element(*e))
            .and_then(|_| {
                new.into_iter()
                    .map(|verts| self.add_element(verts.as_ref()))
                    .collect::<Result<Vec<_>, _>>()
            });
        match result {
            Ok(added) => {
                self.commit()?;
                Ok(added)
            }
            Err(e) => {
                self.rollback(cp)?;
                Err(e)
            }
        }
    }

    /// Register an entity with the lookup maps and the upward adjacency of
    /// the entities bounding it.
    fn link(&mut self, e: Entity) {
        match e {
            Entity::Vertex(_) => {}
            Entity::Edge(eh) => {
                let verts = self.edge_vertices(eh);
                self.edge_map.insert(sorted(verts), eh);
                for v in verts {
                    self.vertices[v.index() as usize].edges.push(eh);
                }
            }
            Entity::Face(f) => {
                let verts = self.face_vertices(f);
                self.face_map.insert(sorted(verts), f);
                for eh in self.downward_edges(f.into()) {
                    self.edges[eh.index() as usize].faces.push(f);
                }
            }
            Entity::Region(r) => {
                let key = sorted(self.region_vertices(r));
                self.region_map.insert(key, r);
                for f in self.region_faces(r) {
                    self.faces[f.index() as usize].regions.push(r);
                }
            }
        }
    }

    fn unlink(&mut self, e: Entity) {
        match e {
            Entity::Vertex(_) => {}
            Entity::Edge(eh) => {
                let verts = self.edge_vertices(eh);
                self.edge_map.remove(&sorted(verts));
                for v in verts {
                    self.vertices[v.index() as usize].edges.retain(|x| *x != eh);
                }
            }
            Entity::Face(f) => {
                for eh in self.downward_edges(f.into()) {
                    self.edges[eh.index() as usize].faces.retain(|x| *x != f);
                }
                let key = sorted(self.face_vertices(f));
                self.face_map.remove(&key);
            }
            Entity::Region(r) => {
                for f in self.region_faces(r) {
                    self.faces[f.index() as usize].regions.retain(|x| *x != r);
                }
                let key = sorted(self.region_vertices(r));
                self.region_map.remove(&key);
            }
        }
    }

    /// Start recording changes, so they can be undone with
    /// [`Mesh::rollback`]. Edits can be nested.
    pub fn begin_edit(&mut self) -> CheckPoint {
        self.history.begin()
    }

    /// Keep the changes made by the innermost open edit.
    pub fn commit(&mut self) -> Result<(), Error> {
        if self.history.commit() {
            Ok(())
        } else {
            Err(Error::NoActiveEdit)
        }
    }

    /// Undo every change made since `cp` and close the innermost edit.
    pub fn rollback(&mut self, cp: CheckPoint) -> Result<(), Error> {
        let changes = self.history.unwind(cp).ok_or(Error::NoActiveEdit)?;
        for change in changes {
            match change {
                Change::Created(e) => {
                    self.unlink(e);
                    self.status_mut(e).set_deleted(true);
                }
                Change::Deleted(e) => {
                    self.status_mut(e).set_deleted(false);
                    self.link(e);
                }
                Change::Moved(v, pos) => self.vertices[v.index() as usize].point = pos,
            }
        }
        Ok(())
    }
}
