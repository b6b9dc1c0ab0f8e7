use std::collections::HashSet;

use crate::{
    element::{Entity, VH},
    mesh::Mesh,
};

/// Grants exclusive access to the neighbourhood of the entities a rewrite is
/// about to edit.
///
/// The cavity of a set of entities is every top dimensional element touching
/// any of their vertices. A request succeeds when every vertex of the cavity
/// is owned by the local part, is not locked by another request, and is not
/// reserved. On success the cavity vertices stay locked until
/// [`CavityOp::release`]. On failure nothing is locked and the requested
/// entities are remembered in [`CavityOp::deferred`], so the caller can move
/// them to a part where the edit is possible.
///
/// Reservations stand in for an edit in flight on a neighbouring part.
#[derive(Default)]
pub struct CavityOp {
    locked: Vec<VH>,
    reserved: HashSet<VH>,
    deferred: Vec<Entity>,
}

impl CavityOp {
    pub fn new() -> Self {
        CavityOp::default()
    }

    /// Mark vertices as being edited elsewhere. Requests touching them fail
    /// until [`CavityOp::unreserve_all`] is called.
    pub fn reserve(&mut self, verts: &[VH]) {
        self.reserved.extend(verts.iter().copied());
    }

    pub fn unreserve_all(&mut self) {
        self.reserved.clear();
    }

    fn cavity_vertices(mesh: &Mesh, entities: &[Entity]) -> Vec<VH> {
        let mut verts: Vec<VH> = Vec::new();
        for e in entities {
            for v in mesh.downward_vertices(*e) {
                verts.push(v);
                for elem in mesh.elements_of_vertex(v) {
                    verts.extend(mesh.downward_vertices(elem));
                }
            }
        }
        verts.sort();
        verts.dedup();
        verts
    }

    pub fn request_locality(&mut self, mesh: &mut Mesh, entities: &[Entity]) -> bool {
        let verts = Self::cavity_vertices(mesh, entities);
        let available = verts.iter().all(|v| {
            mesh.is_owned(*v) && !mesh.is_locked(*v) && !self.reserved.contains(v)
        });
        if !available {
            self.deferred.extend_from_slice(entities);
            return false;
        }
        for v in verts {
            mesh.set_locked(v, true);
            self.locked.push(v);
        }
        true
    }

    /// Unlock everything locked by previous requests.
    pub fn release(&mut self, mesh: &mut Mesh) {
        for v in self.locked.drain(..) {
            mesh.set_locked(v, false);
        }
    }

    pub fn is_holding(&self) -> bool {
        !self.locked.is_empty()
    }

    /// Entities whose locality could not be granted.
    pub fn deferred(&self) -> &[Entity] {
        &self.deferred
    }

    pub fn clear_deferred(&mut self) {
        self.deferred.clear();
    }
}

#[cfg(test)]
mod test {
    use super::CavityOp;
    use crate::{element::Entity, mesh::test::two_tets};

    #[test]
    fn t_lock_and_release() {
        let mut mesh = two_tets();
        let mut cavity = CavityOp::new();
        let e: Entity = mesh
            .find_edge(0u32.into(), 3u32.into())
            .expect("Cannot find edge")
            .into();
        assert!(cavity.request_locality(&mut mesh, &[e]));
        assert!(cavity.is_holding());
        // Already locked.
        let mut other = CavityOp::new();
        assert!(!other.request_locality(&mut mesh, &[e]));
        assert_eq!(other.deferred(), &[e]);
        cavity.release(&mut mesh);
        assert!(!cavity.is_holding());
        assert!(other.request_locality(&mut mesh, &[e]));
        other.release(&mut mesh);
    }

    #[test]
    fn t_ghost_and_reserved() {
        let mut mesh = two_tets();
        let mut cavity = CavityOp::new();
        let e: Entity = mesh
            .find_edge(0u32.into(), 3u32.into())
            .expect("Cannot find edge")
            .into();
        // Vertex 4 is in the cavity through the second tet around vertex 0.
        mesh.set_vertex_owner(4u32.into(), 1);
        assert!(!cavity.request_locality(&mut mesh, &[e]));
        mesh.set_vertex_owner(4u32.into(), 0);
        cavity.reserve(&[4u32.into()]);
        assert!(!cavity.request_locality(&mut mesh, &[e]));
        assert_eq!(cavity.deferred().len(), 2);
        cavity.unreserve_all();
        assert!(cavity.request_locality(&mut mesh, &[e]));
        cavity.release(&mut mesh);
    }
}
