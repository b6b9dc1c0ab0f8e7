use crate::{
    element::{Entity, EH, FH, RH, VH},
    error::Error,
    math,
    mesh::Mesh,
};

fn check_vertices(mesh: &Mesh) -> Result<(), Error> {
    for v in mesh.vertices() {
        for e in mesh.vertex_edges(v) {
            if !mesh.is_alive((*e).into()) || !mesh.edge_vertices(*e).contains(&v) {
                return Err(Error::InconsistentAdjacency(v.into()));
            }
        }
    }
    Ok(())
}

fn check_edge(mesh: &Mesh, e: EH) -> Result<(), Error> {
    let [a, b] = mesh.edge_vertices(e);
    if a == b || !mesh.is_alive(a.into()) || !mesh.is_alive(b.into()) {
        return Err(Error::DanglingEdge(e));
    }
    if mesh.find_edge(a, b) != Some(e)
        || !mesh.vertex_edges(a).contains(&e)
        || !mesh.vertex_edges(b).contains(&e)
    {
        return Err(Error::InconsistentAdjacency(e.into()));
    }
    let nfaces = mesh.edge_faces(e).len();
    if nfaces == 0 {
        return Err(Error::OrphanEntity(e.into()));
    }
    // A 2-D mesh must be manifold: every edge bounds one or two triangles.
    if mesh.dimension() == 2 && nfaces > 2 {
        return Err(Error::InconsistentAdjacency(e.into()));
    }
    for f in mesh.edge_faces(e) {
        if !mesh.is_alive((*f).into()) || !mesh.downward_edges((*f).into()).contains(&e) {
            return Err(Error::InconsistentAdjacency(e.into()));
        }
    }
    Ok(())
}

fn check_face(mesh: &Mesh, f: FH) -> Result<(), Error> {
    let verts = mesh.face_vertices(f);
    if mesh.find_face(verts) != Some(f) {
        return Err(Error::InconsistentAdjacency(f.into()));
    }
    let edges = mesh.downward_edges(f.into());
    if edges.len() != 3 || edges.iter().any(|e| !mesh.is_alive((*e).into())) {
        return Err(Error::DanglingFace(f));
    }
    if mesh.dimension() == 3 {
        let nregions = mesh.face_regions(f).len();
        if nregions == 0 {
            return Err(Error::OrphanEntity(f.into()));
        }
        if nregions > 2 {
            return Err(Error::InconsistentAdjacency(f.into()));
        }
        for r in mesh.face_regions(f) {
            if !mesh.is_alive((*r).into()) || !mesh.region_faces(*r).contains(&f) {
                return Err(Error::InconsistentAdjacency(f.into()));
            }
        }
    }
    Ok(())
}

fn check_region(mesh: &Mesh, r: RH) -> Result<(), Error> {
    if mesh.find_region(mesh.region_vertices(r)) != Some(r) {
        return Err(Error::InconsistentAdjacency(r.into()));
    }
    let faces = mesh.region_faces(r);
    if faces.len() != 4 || faces.iter().any(|f| !mesh.is_alive((*f).into())) {
        return Err(Error::DanglingRegion(r));
    }
    Ok(())
}

impl Mesh {
    /// Verify that the adjacency of every live entity is consistent: downward
    /// entities exist, upward lists agree with them, and no face or edge is
    /// left without something to bound.
    pub fn check_topology(&self) -> Result<(), Error> {
        check_vertices(self)?;
        for e in self.entities(1) {
            if let Entity::Edge(e) = e {
                check_edge(self, e)?;
            }
        }
        for f in self.entities(2) {
            if let Entity::Face(f) = f {
                check_face(self, f)?;
            }
        }
        for r in self.entities(3) {
            if let Entity::Region(r) = r {
                check_region(self, r)?;
            }
        }
        Ok(())
    }

    /// Verify that every tetrahedron has a positive volume. Triangles have no
    /// intrinsic orientation in 3-D space and are not checked.
    pub fn check_volumes(&self) -> Result<(), Error> {
        for r in self.entities(3) {
            let p = self.entity_points(r);
            if math::tet_volume(p[0], p[1], p[2], p[3]) <= 0.0 {
                return Err(Error::InvertedElement(r));
            }
        }
        Ok(())
    }

    /// Vertices that are alive but not used by any edge.
    pub fn isolated_vertices(&self) -> Vec<VH> {
        self.vertices()
            .filter(|v| self.vertex_edges(*v).is_empty())
            .collect()
    }
}
