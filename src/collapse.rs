use arrayvec::ArrayVec;
use glam::DVec3;

use crate::{
    adapt::Adapt,
    cavity::CavityOp,
    element::{Entity, EH, VH},
    error::Error,
    math,
    mesh::Mesh,
};

/// Collapse of an edge that merges the vertex `removed` onto the vertex
/// `kept`. Every element around `removed` that does not contain the edge is
/// rebuilt with `kept` in its place, the elements containing the edge
/// disappear, and so does `removed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collapse {
    pub edge: EH,
    pub removed: VH,
    pub kept: VH,
}

/// Elements to remove, and the elements replacing them paired with the
/// element each one is rebuilt from.
type Rebuilt = (Vec<Entity>, Vec<(Entity, ArrayVec<VH, 4>)>);

impl Collapse {
    /// Collapse of `edge` removing the vertex `removed`. `None` if `removed`
    /// is not a vertex of the edge.
    pub fn new(mesh: &Mesh, edge: EH, removed: VH) -> Option<Self> {
        let [a, b] = mesh.edge_vertices(edge);
        if removed == a {
            Some(Collapse {
                edge,
                removed: a,
                kept: b,
            })
        } else if removed == b {
            Some(Collapse {
                edge,
                removed: b,
                kept: a,
            })
        } else {
            None
        }
    }

    /// Check that the collapse keeps the mesh a manifold without changing
    /// the shape of its boundary.
    pub fn check_topology(&self, mesh: &mut Mesh) -> bool {
        let (a, b) = (self.removed, self.kept);
        if !mesh.is_alive(self.edge.into()) || !mesh.is_alive(a.into()) {
            return false;
        }
        // A boundary vertex may only slide along the boundary. This also
        // rejects interior edges joining two boundary vertices.
        if mesh.is_boundary_vertex(a) && !mesh.is_boundary_edge(self.edge) {
            return false;
        }
        let around = mesh.elements_of_edge(self.edge);
        let mut opposite: Vec<VH> = Vec::new();
        let mut opposite_edges: Vec<[VH; 2]> = Vec::new();
        for e in &around {
            let others: ArrayVec<VH, 2> = mesh
                .downward_vertices(*e)
                .into_iter()
                .filter(|v| *v != a && *v != b)
                .collect();
            opposite.extend(others.iter().copied());
            if let [x, y] = others[..] {
                opposite_edges.push(if x < y { [x, y] } else { [y, x] });
            }
        }
        // Link condition (Edelsbrunner): the vertices and edges the links of
        // a and b have in common must be in the link of the edge.
        let bnbrs = mesh.vertex_neighbors(b);
        for v in &bnbrs {
            mesh.set_tagged(*v, true);
        }
        let vertex_link = mesh
            .vertex_neighbors(a)
            .iter()
            .all(|v| *v == b || !mesh.is_tagged(*v) || opposite.contains(v));
        for v in &bnbrs {
            mesh.set_tagged(*v, false);
        }
        if !vertex_link {
            return false;
        }
        let faces: Vec<[VH; 3]> = mesh
            .vertex_edges(a)
            .iter()
            .flat_map(|e| mesh.edge_faces(*e).iter())
            .map(|f| mesh.face_vertices(*f))
            .collect();
        for f in faces {
            if f.contains(&b) {
                continue;
            }
            let mut others = f.into_iter().filter(|v| *v != a);
            let (Some(x), Some(y)) = (others.next(), others.next()) else {
                continue;
            };
            if mesh.find_face([b, x, y]).is_some() {
                let key = if x < y { [x, y] } else { [y, x] };
                if mesh.dimension() == 2 || !opposite_edges.contains(&key) {
                    return false;
                }
            }
        }
        true
    }

    fn rebuilt(&self, mesh: &Mesh) -> Rebuilt {
        let old = mesh.elements_of_vertex(self.removed);
        let new = old
            .iter()
            .filter(|e| !mesh.downward_vertices(**e).contains(&self.kept))
            .map(|e| {
                let verts = mesh
                    .downward_vertices(*e)
                    .into_iter()
                    .map(|v| if v == self.removed { self.kept } else { v })
                    .collect();
                (*e, verts)
            })
            .collect();
        (old, new)
    }

    /// Worst quality of the elements the collapse creates, or `None` if any
    /// of them would be invalid or already exists. A collapse that leaves no
    /// element behind has infinite quality.
    pub fn quality(&self, adapt: &Adapt) -> Option<f64> {
        let mesh = &*adapt.mesh;
        let (_, new) = self.rebuilt(mesh);
        let mut quality = f64::INFINITY;
        for (i, (from, verts)) in new.iter().enumerate() {
            if mesh.find_element(verts).is_some()
                || new[..i].iter().any(|(_, other)| same_vertices(other, verts))
            {
                return None;
            }
            let points: ArrayVec<DVec3, 4> = verts.iter().map(|v| mesh.point(*v)).collect();
            let reference = match mesh.entity_points(*from)[..] {
                [p, q, r] => Some(math::tri_normal(p, q, r)),
                _ => None,
            };
            let q = adapt.size_field.simplex_quality(&points, reference);
            if q <= adapt.input.valid_quality {
                return None;
            }
            quality = quality.min(q);
        }
        Some(quality)
    }

    /// Do the collapse. The mesh is left unchanged if this fails.
    pub fn apply(&self, mesh: &mut Mesh) -> Result<(), Error> {
        let (old, new) = self.rebuilt(mesh);
        let cp = mesh.begin_edit();
        let result = mesh
            .replace_elements(&old, new.into_iter().map(|(_, verts)| verts))
            .and_then(|_| mesh.remove_vertex(self.removed));
        match result {
            Ok(()) => mesh.commit(),
            Err(e) => {
                mesh.rollback(cp)?;
                Err(e)
            }
        }
    }
}

fn same_vertices(a: &[VH], b: &[VH]) -> bool {
    a.len() == b.len() && a.iter().all(|v| b.contains(v))
}

/// The better of the two collapses of `edge` that pass the topological
/// checks and only create valid elements.
pub fn best_collapse(adapt: &mut Adapt, edge: EH) -> Option<(Collapse, f64)> {
    if !adapt.mesh.is_alive(edge.into()) {
        return None;
    }
    let mut best: Option<(Collapse, f64)> = None;
    for v in adapt.mesh.edge_vertices(edge) {
        let Some(c) = Collapse::new(adapt.mesh, edge, v) else {
            continue;
        };
        if !c.check_topology(adapt.mesh) {
            continue;
        }
        if let Some(q) = c.quality(adapt) {
            if best.is_none_or(|(_, bq)| q > bq) {
                best = Some((c, q));
            }
        }
    }
    best
}

/// Removes a short edge by collapsing it in whichever direction gives the
/// better elements.
#[derive(Debug, Default)]
pub struct ShortEdgeRemover {
    edge: Option<EH>,
}

impl ShortEdgeRemover {
    pub fn new() -> Self {
        ShortEdgeRemover::default()
    }

    pub fn set_edge(&mut self, edge: EH) {
        self.edge = Some(edge);
    }

    pub fn edge(&self) -> Option<EH> {
        self.edge
    }

    pub fn request_locality(&self, adapt: &mut Adapt, cavity: &mut CavityOp) -> bool {
        match self.edge {
            Some(e) => cavity.request_locality(adapt.mesh, &[e.into()]),
            None => false,
        }
    }

    /// Collapse the current edge. Returns whether the mesh was changed.
    pub fn run(&mut self, adapt: &mut Adapt) -> Result<bool, Error> {
        let Some(edge) = self.edge.take() else {
            return Ok(false);
        };
        match best_collapse(adapt, edge) {
            Some((c, _)) => {
                c.apply(adapt.mesh)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod test {
    use glam::dvec3;

    use super::{best_collapse, Collapse, ShortEdgeRemover};
    use crate::{
        adapt::{Adapt, Input},
        element::VH,
        mesh::{test::two_tets, Mesh},
        size::UniformSizeField,
    };

    #[test]
    fn t_single_tet_collapse() {
        let mut mesh = Mesh::tetrahedron([
            dvec3(0.0, 0.0, 0.0),
            dvec3(0.001, 0.0, 0.0),
            dvec3(0.0, 1.0, 0.0),
            dvec3(0.0, 0.0, 1.0),
        ])
        .expect("Cannot create tetrahedron");
        let sf = UniformSizeField::new(1.0);
        let input = Input::default();
        let mut adapt = Adapt::new(&mut mesh, &sf, &input);
        let edge = adapt
            .mesh
            .find_edge(0u32.into(), 1u32.into())
            .expect("Cannot find edge");
        let mut remover = ShortEdgeRemover::new();
        remover.set_edge(edge);
        assert!(remover.run(&mut adapt).expect("Cannot collapse"));
        assert!(remover.edge().is_none());
        assert_eq!(adapt.mesh.num_vertices(), 3);
        assert_eq!(adapt.mesh.num_regions(), 0);
        assert_eq!(adapt.mesh.num_edges(), 0);
    }

    #[test]
    fn t_boundary_rules() {
        let mut mesh = Mesh::box_tets(2, dvec3(0.0, 0.0, 0.0), dvec3(1.0, 1.0, 1.0))
            .expect("Cannot create box");
        let sf = UniformSizeField::new(0.5);
        let input = Input::default();
        let mut adapt = Adapt::new(&mut mesh, &sf, &input);
        // Vertex 13 is the center of the box, vertex 4 is at the center of
        // the bottom face.
        let (center, bottom): (VH, VH) = (13u32.into(), 4u32.into());
        assert!(!adapt.mesh.is_boundary_vertex(center));
        assert!(adapt.mesh.is_boundary_vertex(bottom));
        let edge = adapt
            .mesh
            .find_edge(center, bottom)
            .expect("Cannot find edge");
        let inward = Collapse::new(adapt.mesh, edge, bottom).expect("Not a vertex of the edge");
        assert!(!inward.check_topology(adapt.mesh));
        let outward = Collapse::new(adapt.mesh, edge, center).expect("Not a vertex of the edge");
        assert!(outward.check_topology(adapt.mesh));
        let (c, _) = best_collapse(&mut adapt, edge).expect("No valid collapse");
        assert_eq!(c, outward);
        // Tagging during the checks is undone.
        assert!(adapt.mesh.vertices().all(|v| !adapt.mesh.is_tagged(v)));
    }

    #[test]
    fn t_collapse_keeps_mesh_valid() {
        let mut mesh = Mesh::box_tets(2, dvec3(0.0, 0.0, 0.0), dvec3(1.0, 1.0, 1.0))
            .expect("Cannot create box");
        let center: VH = 13u32.into();
        mesh.set_point(center, dvec3(0.45, 0.5, 0.5));
        let sf = UniformSizeField::new(0.5);
        let input = Input::default();
        let mut adapt = Adapt::new(&mut mesh, &sf, &input);
        let before = adapt.mesh.num_regions();
        let edge = adapt
            .mesh
            .find_edge(center, 12u32.into())
            .expect("Cannot find edge");
        let (c, q) = best_collapse(&mut adapt, edge).expect("No valid collapse");
        assert_eq!(c.removed, center);
        assert!(q > input.valid_quality);
        let around = adapt.mesh.elements_of_edge(edge).len();
        c.apply(adapt.mesh).expect("Cannot collapse");
        assert_eq!(adapt.mesh.num_regions(), before - around);
        assert!(!adapt.mesh.is_alive(center.into()));
        adapt.mesh.check_topology().expect("Topological errors found");
        adapt.mesh.check_volumes().expect("Inverted elements found");
    }

    #[test]
    fn t_link_condition() {
        // A triangle split around an interior vertex.
        let mut mesh = Mesh::from_elements(
            2,
            &[
                dvec3(0.0, 0.0, 0.0),
                dvec3(1.0, 0.0, 0.0),
                dvec3(0.5, 1.0, 0.0),
                dvec3(0.5, 0.3, 0.0),
            ],
            &[
                [0, 1, 3].as_slice(),
                [1, 2, 3].as_slice(),
                [2, 0, 3].as_slice(),
            ],
        )
        .expect("Cannot create mesh");
        let sf = UniformSizeField::new(1.0);
        let input = Input::default();
        let mut adapt = Adapt::new(&mut mesh, &sf, &input);
        // Vertex 2 neighbours both ends of the boundary edge (0, 1) without
        // being opposite to it.
        let edge = adapt
            .mesh
            .find_edge(0u32.into(), 1u32.into())
            .expect("Cannot find edge");
        for v in [0u32, 1] {
            let c = Collapse::new(adapt.mesh, edge, v.into()).expect("Not a vertex of the edge");
            assert!(!c.check_topology(adapt.mesh));
        }
        assert!(best_collapse(&mut adapt, edge).is_none());
        let edge = adapt
            .mesh
            .find_edge(3u32.into(), 0u32.into())
            .expect("Cannot find edge");
        let (c, _) = best_collapse(&mut adapt, edge).expect("No valid collapse");
        assert_eq!(c.removed, VH::from(3u32));
        c.apply(adapt.mesh).expect("Cannot collapse");
        assert_eq!(adapt.mesh.num_faces(), 1);
        assert_eq!(adapt.mesh.num_vertices(), 3);
        adapt.mesh.check_topology().expect("Topological errors found");
    }

    #[test]
    fn t_collapse_through_shared_face() {
        let mut mesh = two_tets();
        let sf = UniformSizeField::new(1.0);
        let input = Input::default();
        let adapt = Adapt::new(&mut mesh, &sf, &input);
        let edge = adapt
            .mesh
            .find_edge(0u32.into(), 3u32.into())
            .expect("Cannot find edge");
        let c = Collapse::new(adapt.mesh, edge, 3u32.into()).expect("Not a vertex of the edge");
        // Vertices 1 and 2 neighbour both ends and are opposite the edge.
        assert!(c.check_topology(adapt.mesh));
        // The collapsed tet leaves nothing of its own behind.
        assert_eq!(c.quality(&adapt), Some(f64::INFINITY));
    }
}
