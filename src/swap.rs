use arrayvec::ArrayVec;
use glam::DVec3;

use crate::{
    adapt::Adapt,
    element::{Entity, EH, VH},
    error::Error,
    math,
};

/// Largest ring of tetrahedra around an edge that is swapped. Rings with
/// more vertices have too many triangulations to try.
pub const MAX_SWAP_RING: usize = 7;

/// Replaces the elements around an interior edge with a different set
/// filling the same cavity, without the edge.
///
/// On a triangle mesh this flips the diagonal of the two triangles sharing
/// the edge. On a tetrahedral mesh the vertices around the edge form a
/// closed polygon, and every triangulation of that polygon gives a new set of
/// tetrahedra. A swap is only done when it strictly improves the worst
/// quality in the cavity.
#[derive(Debug, Clone)]
pub struct EdgeSwap {
    max_ring: usize,
}

impl Default for EdgeSwap {
    fn default() -> Self {
        EdgeSwap {
            max_ring: MAX_SWAP_RING,
        }
    }
}

/// Element vertices and their worst quality.
struct Candidate {
    elements: Vec<ArrayVec<VH, 4>>,
    quality: f64,
}

impl EdgeSwap {
    pub fn new() -> Self {
        EdgeSwap::default()
    }

    /// Swap `edge` if that improves the mesh. Returns whether the mesh was
    /// changed.
    pub fn run(&mut self, adapt: &mut Adapt, edge: EH) -> Result<bool, Error> {
        if !adapt.mesh.is_alive(edge.into()) || adapt.mesh.is_boundary_edge(edge) {
            return Ok(false);
        }
        let old = adapt.mesh.elements_of_edge(edge);
        let old_quality = old
            .iter()
            .map(|e| adapt.quality(*e))
            .fold(f64::INFINITY, f64::min);
        let best = match adapt.mesh.dimension() {
            2 => self.flip(adapt, edge, &old),
            _ => self.best_ring_triangulation(adapt, edge, &old),
        };
        let best = match best {
            Some(c) if c.quality > old_quality => c,
            _ => return Ok(false),
        };
        adapt.mesh.replace_elements(&old, best.elements)?;
        Ok(true)
    }

    fn flip(&self, adapt: &Adapt, edge: EH, old: &[Entity]) -> Option<Candidate> {
        let mesh = &*adapt.mesh;
        let [f1, f2] = match *old {
            [Entity::Face(f1), Entity::Face(f2)] => [f1, f2],
            _ => return None,
        };
        let [a, b] = mesh.edge_vertices(edge);
        // Rotate the first triangle to (p, q, c), with c opposite the edge.
        let t1 = mesh.face_vertices(f1);
        let i = t1.iter().position(|v| *v != a && *v != b)?;
        let (p, q, c) = (t1[(i + 1) % 3], t1[(i + 2) % 3], t1[i]);
        let d = *mesh
            .face_vertices(f2)
            .iter()
            .find(|v| **v != a && **v != b)?;
        if c == d || mesh.find_edge(c, d).is_some() {
            return None;
        }
        let normal = |f: [VH; 3]| {
            let [x, y, z] = f.map(|v| mesh.point(v));
            math::tri_normal(x, y, z)
        };
        let reference: DVec3 = normal(t1) + normal(mesh.face_vertices(f2));
        let mut elements = Vec::with_capacity(2);
        let mut quality = f64::INFINITY;
        for tri in [[p, d, c], [d, q, c]] {
            let tq = adapt
                .size_field
                .simplex_quality(&tri.map(|v| mesh.point(v)), Some(reference));
            if tq <= adapt.input.valid_quality {
                return None;
            }
            quality = quality.min(tq);
            elements.push(tri.into_iter().collect());
        }
        Some(Candidate { elements, quality })
    }

    /// Vertices around the edge `(a, b)`, ordered so that every tetrahedron
    /// `(a, b, r[i], r[i + 1])` is positive.
    fn ring(&self, adapt: &Adapt, a: VH, b: VH, old: &[Entity]) -> Option<Vec<VH>> {
        let mesh = &*adapt.mesh;
        let pairs: Vec<[VH; 2]> = old
            .iter()
            .map(|e| {
                let mut others = mesh
                    .downward_vertices(*e)
                    .into_iter()
                    .filter(|v| *v != a && *v != b);
                match (others.next(), others.next()) {
                    (Some(x), Some(y)) => Some([x, y]),
                    _ => None,
                }
            })
            .collect::<Option<_>>()?;
        let mut ring: Vec<VH> = Vec::with_capacity(pairs.len());
        let [first, mut next] = *pairs.first()?;
        ring.push(first);
        let mut used = vec![false; pairs.len()];
        used[0] = true;
        while next != first {
            ring.push(next);
            let (i, pair) = pairs
                .iter()
                .enumerate()
                .find(|(i, pair)| !used[*i] && pair.contains(&next))?;
            used[i] = true;
            next = if pair[0] == next { pair[1] } else { pair[0] };
        }
        if ring.len() != pairs.len() || used.iter().any(|u| !u) {
            return None;
        }
        let [pa, pb, p0, p1] = [a, b, ring[0], ring[1]].map(|v| mesh.point(v));
        if math::tet_volume(pa, pb, p0, p1) < 0.0 {
            ring.reverse();
        }
        Some(ring)
    }

    fn best_ring_triangulation(
        &self,
        adapt: &Adapt,
        edge: EH,
        old: &[Entity],
    ) -> Option<Candidate> {
        let mesh = &*adapt.mesh;
        if old.len() < 3 || old.len() > self.max_ring {
            return None;
        }
        let [a, b] = mesh.edge_vertices(edge);
        let ring = self.ring(adapt, a, b, old)?;
        let n = ring.len();
        let indices: Vec<usize> = (0..n).collect();
        let mut best: Option<Candidate> = None;
        'triangulations: for tris in polygon_triangulations(&indices) {
            // Chords of the polygon become new edges.
            for [i, j, k] in &tris {
                for (x, y) in [(*i, *j), (*j, *k), (*i, *k)] {
                    let chord = y - x != 1 && !(x == 0 && y == n - 1);
                    if chord && mesh.find_edge(ring[x], ring[y]).is_some() {
                        continue 'triangulations;
                    }
                }
                if mesh.find_face([ring[*i], ring[*j], ring[*k]]).is_some() {
                    continue 'triangulations;
                }
            }
            let mut elements: Vec<ArrayVec<VH, 4>> = Vec::with_capacity(2 * tris.len());
            let mut quality = f64::INFINITY;
            for [i, j, k] in &tris {
                let (ri, rj, rk) = (ring[*i], ring[*j], ring[*k]);
                for tet in [[ri, rj, rk, b], [rj, ri, rk, a]] {
                    let q = adapt.size_field.simplex_quality(&tet.map(|v| mesh.point(v)), None);
                    if q <= adapt.input.valid_quality {
                        continue 'triangulations;
                    }
                    quality = quality.min(q);
                    elements.push(ArrayVec::from(tet));
                }
            }
            if best.as_ref().is_none_or(|c| quality > c.quality) {
                best = Some(Candidate { elements, quality });
            }
        }
        best
    }
}

/// Every triangulation of the convex polygon with the given vertices, as
/// triangles of increasing vertex positions.
fn polygon_triangulations(verts: &[usize]) -> Vec<Vec<[usize; 3]>> {
    let n = verts.len();
    if n < 3 {
        return vec![Vec::new()];
    }
    // The edge from the first to the last vertex is in exactly one triangle.
    let mut out = Vec::new();
    for k in 1..(n - 1) {
        let tri = [verts[0], verts[k], verts[n - 1]];
        for left in polygon_triangulations(&verts[..=k]) {
            for right in polygon_triangulations(&verts[k..]) {
                let mut tris = Vec::with_capacity(n - 2);
                tris.extend_from_slice(&left);
                tris.push(tri);
                tris.extend_from_slice(&right);
                out.push(tris);
            }
        }
    }
    out
}

#[cfg(test)]
mod test {
    use glam::dvec3;

    use super::{polygon_triangulations, EdgeSwap};
    use crate::{
        adapt::{Adapt, Input},
        element::VH,
        mesh::{test::two_tets, Mesh},
        size::UniformSizeField,
    };

    #[test]
    fn t_triangulation_counts() {
        // Catalan numbers.
        for (n, count) in [(3, 1), (4, 2), (5, 5), (6, 14), (7, 42)] {
            let verts: Vec<usize> = (0..n).collect();
            let all = polygon_triangulations(&verts);
            assert_eq!(all.len(), count);
            for tris in &all {
                assert_eq!(tris.len(), n - 2);
                assert!(tris.iter().all(|[i, j, k]| i < j && j < k));
            }
        }
    }

    /// Three tetrahedra around the edge from (0, 0, -1) to (0, 0, 1), whose
    /// other vertices form an equilateral triangle.
    fn three_tets() -> Mesh {
        let h = 0.5 * 3.0f64.sqrt();
        Mesh::from_elements(
            3,
            &[
                dvec3(0.0, 0.0, -1.0),
                dvec3(0.0, 0.0, 1.0),
                dvec3(1.0, 0.0, 0.0),
                dvec3(-0.5, h, 0.0),
                dvec3(-0.5, -h, 0.0),
            ],
            &[
                [0, 1, 2, 3].as_slice(),
                [0, 1, 3, 4].as_slice(),
                [0, 1, 4, 2].as_slice(),
            ],
        )
        .expect("Cannot create mesh")
    }

    #[test]
    fn t_three_to_two() {
        let mut mesh = three_tets();
        mesh.check_volumes().expect("Inverted elements found");
        let sf = UniformSizeField::new(1.0);
        let input = Input::default();
        let mut adapt = Adapt::new(&mut mesh, &sf, &input);
        let edge = adapt
            .mesh
            .find_edge(0u32.into(), 1u32.into())
            .expect("Cannot find edge");
        // Every face around the edge is shared by two tets.
        assert!(!adapt.mesh.is_boundary_edge(edge));
        assert!(EdgeSwap::new().run(&mut adapt, edge).expect("Cannot swap"));
        assert_eq!(adapt.mesh.num_regions(), 2);
        assert!(adapt.mesh.find_edge(0u32.into(), 1u32.into()).is_none());
        let (v2, v3, v4): (VH, VH, VH) = (2u32.into(), 3u32.into(), 4u32.into());
        assert!(adapt.mesh.find_face([v2, v3, v4]).is_some());
        adapt.mesh.check_topology().expect("Topological errors found");
        adapt.mesh.check_volumes().expect("Inverted elements found");
        // The new edges are all on the boundary now.
        for e in adapt.mesh.edges().collect::<Vec<_>>() {
            assert!(!EdgeSwap::new().run(&mut adapt, e).expect("Cannot swap"));
        }
    }

    #[test]
    fn t_swap_keeps_neighbours() {
        // The same ring, with caps above and below.
        let h = 0.5 * 3.0f64.sqrt();
        let mut mesh = Mesh::from_elements(
            3,
            &[
                dvec3(0.0, 0.0, -1.0),
                dvec3(0.0, 0.0, 1.0),
                dvec3(1.0, 0.0, 0.0),
                dvec3(-0.5, h, 0.0),
                dvec3(-0.5, -h, 0.0),
                dvec3(0.0, 0.0, -3.0),
                dvec3(0.0, 0.0, 3.0),
            ],
            &[
                [0, 1, 2, 3].as_slice(),
                [0, 1, 3, 4].as_slice(),
                [0, 1, 4, 2].as_slice(),
                [1, 6, 2, 3].as_slice(),
                [1, 6, 3, 4].as_slice(),
                [1, 6, 4, 2].as_slice(),
                [5, 0, 2, 3].as_slice(),
                [5, 0, 3, 4].as_slice(),
                [5, 0, 4, 2].as_slice(),
            ],
        )
        .expect("Cannot create mesh");
        mesh.check_topology().expect("Topological errors found");
        mesh.check_volumes().expect("Inverted elements found");
        let sf = UniformSizeField::new(1.0);
        let input = Input::default();
        let mut adapt = Adapt::new(&mut mesh, &sf, &input);
        let edge = adapt
            .mesh
            .find_edge(0u32.into(), 1u32.into())
            .expect("Cannot find edge");
        assert!(EdgeSwap::new().run(&mut adapt, edge).expect("Cannot swap"));
        assert_eq!(adapt.mesh.num_regions(), 8);
        assert!(adapt.mesh.find_edge(0u32.into(), 1u32.into()).is_none());
        adapt.mesh.check_topology().expect("Topological errors found");
        adapt.mesh.check_volumes().expect("Inverted elements found");
    }

    #[test]
    fn t_flip_improves_triangles() {
        // A thin quad split along its long diagonal.
        let mut mesh = Mesh::from_elements(
            2,
            &[
                dvec3(0.0, 0.0, 0.0),
                dvec3(1.0, -0.1, 0.0),
                dvec3(2.0, 0.0, 0.0),
                dvec3(1.0, 0.1, 0.0),
            ],
            &[[0, 1, 2].as_slice(), [0, 2, 3].as_slice()],
        )
        .expect("Cannot create mesh");
        let sf = UniformSizeField::new(1.0);
        let input = Input::default();
        let mut adapt = Adapt::new(&mut mesh, &sf, &input);
        let edge = adapt
            .mesh
            .find_edge(0u32.into(), 2u32.into())
            .expect("Cannot find edge");
        assert!(EdgeSwap::new().run(&mut adapt, edge).expect("Cannot swap"));
        assert!(adapt.mesh.find_edge(0u32.into(), 2u32.into()).is_none());
        assert!(adapt.mesh.find_edge(1u32.into(), 3u32.into()).is_some());
        assert_eq!(adapt.mesh.num_faces(), 2);
        adapt.mesh.check_topology().expect("Topological errors found");
        // Flipping back would make it worse.
        let edge = adapt
            .mesh
            .find_edge(1u32.into(), 3u32.into())
            .expect("Cannot find edge");
        assert!(!EdgeSwap::new().run(&mut adapt, edge).expect("Cannot swap"));
        // Boundary edges are never swapped.
        let boundary = adapt
            .mesh
            .find_edge(0u32.into(), 1u32.into())
            .expect("Cannot find edge");
        assert!(!EdgeSwap::new().run(&mut adapt, boundary).expect("Cannot swap"));
    }

    #[test]
    fn t_boundary_pair_is_untouched() {
        let mut mesh = two_tets();
        let sf = UniformSizeField::new(1.0);
        let input = Input::default();
        let mut adapt = Adapt::new(&mut mesh, &sf, &input);
        for e in adapt.mesh.edges().collect::<Vec<_>>() {
            assert!(!EdgeSwap::new().run(&mut adapt, e).expect("Cannot swap"));
        }
        assert_eq!(adapt.mesh.num_regions(), 2);
    }
}
