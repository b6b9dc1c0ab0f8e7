use glam::{dvec3, DVec3};

use crate::{element::VH, error::Error, math, mesh::Mesh};

impl Mesh {
    /// Create a mesh of dimension `dim` from vertex positions and elements
    /// given as indices into `points`.
    pub fn from_elements(dim: usize, points: &[DVec3], elements: &[&[u32]]) -> Result<Self, Error> {
        let mut mesh = Mesh::new(dim)?;
        let verts = mesh.add_vertices(points)?;
        let mut ev: Vec<VH> = Vec::with_capacity(4);
        for elem in elements {
            ev.clear();
            for i in elem.iter() {
                ev.push(*verts.get(*i as usize).ok_or(Error::InvalidVertex((*i).into()))?);
            }
            mesh.add_element(&ev)?;
        }
        Ok(mesh)
    }

    /// A mesh with a single tetrahedron. The vertices are reordered if needed
    /// so that the tetrahedron is positively oriented.
    pub fn tetrahedron(points: [DVec3; 4]) -> Result<Self, Error> {
        let [a, b, c, d] = points;
        let order: &[u32] = if math::tet_volume(a, b, c, d) < 0.0 {
            &[0, 2, 1, 3]
        } else {
            &[0, 1, 2, 3]
        };
        Mesh::from_elements(3, &points, &[order])
    }

    /// Tetrahedral mesh of the box from `min` to `max`, with `n` cells along
    /// each axis. Every cell is split into six tetrahedra around its main
    /// diagonal.
    ///
    /// ```text
    ///       6-----------7
    ///      /|          /|
    ///     / |         / |
    ///    4-----------5  |
    ///    |  |        |  |
    ///    |  2--------|--3
    ///    | /         | /
    ///    |/          |/
    ///    0-----------1
    /// ```
    pub fn box_tets(n: usize, min: DVec3, max: DVec3) -> Result<Self, Error> {
        const PATHS: [[u32; 4]; 6] = [
            [0, 1, 3, 7],
            [0, 1, 5, 7],
            [0, 2, 3, 7],
            [0, 2, 6, 7],
            [0, 4, 5, 7],
            [0, 4, 6, 7],
        ];
        let n = n.max(1);
        let step = (max - min) / n as f64;
        let np = n + 1;
        let index = |i: usize, j: usize, k: usize| (i + np * (j + np * k)) as u32;
        let mut points = Vec::with_capacity(np * np * np);
        for k in 0..np {
            for j in 0..np {
                for i in 0..np {
                    points.push(min + step * dvec3(i as f64, j as f64, k as f64));
                }
            }
        }
        let mut tets: Vec<[u32; 4]> = Vec::with_capacity(6 * n * n * n);
        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    let corner = |c: u32| {
                        let c = c as usize;
                        index(i + (c & 1), j + ((c >> 1) & 1), k + ((c >> 2) & 1))
                    };
                    for path in PATHS {
                        let mut tet = path.map(corner);
                        let p = tet.map(|v| points[v as usize]);
                        if math::tet_volume(p[0], p[1], p[2], p[3]) < 0.0 {
                            tet.swap(1, 2);
                        }
                        tets.push(tet);
                    }
                }
            }
        }
        let elements: Vec<&[u32]> = tets.iter().map(|t| t.as_slice()).collect();
        Mesh::from_elements(3, &points, &elements)
    }

    /// Triangle mesh of the rectangle from `min` to `max` in the XY plane,
    /// with `n` cells along each axis, split along their diagonals. Triangles
    /// are counter-clockwise when seen from +Z.
    pub fn grid_tris(n: usize, min: DVec3, max: DVec3) -> Result<Self, Error> {
        let n = n.max(1);
        let step = (max - min) / n as f64;
        let np = n + 1;
        let index = |i: usize, j: usize| (i + np * j) as u32;
        let mut points = Vec::with_capacity(np * np);
        for j in 0..np {
            for i in 0..np {
                points.push(dvec3(
                    min.x + step.x * i as f64,
                    min.y + step.y * j as f64,
                    min.z,
                ));
            }
        }
        let mut tris: Vec<[u32; 3]> = Vec::with_capacity(2 * n * n);
        for j in 0..n {
            for i in 0..n {
                let (a, b, c, d) = (
                    index(i, j),
                    index(i + 1, j),
                    index(i + 1, j + 1),
                    index(i, j + 1),
                );
                tris.push([a, b, c]);
                tris.push([a, c, d]);
            }
        }
        let elements: Vec<&[u32]> = tris.iter().map(|t| t.as_slice()).collect();
        Mesh::from_elements(2, &points, &elements)
    }
}

#[cfg(test)]
mod test {
    use glam::dvec3;

    use crate::mesh::Mesh;

    #[test]
    fn t_box_counts() {
        let mesh = Mesh::box_tets(1, dvec3(0.0, 0.0, 0.0), dvec3(1.0, 1.0, 1.0))
            .expect("Cannot create box");
        assert_eq!(mesh.num_vertices(), 8);
        assert_eq!(mesh.num_regions(), 6);
        // 12 cube edges, 6 face diagonals and the main diagonal.
        assert_eq!(mesh.num_edges(), 19);
        // Euler characteristic of a ball.
        assert_eq!(
            mesh.num_vertices() as i64 - mesh.num_edges() as i64 + mesh.num_faces() as i64
                - mesh.num_regions() as i64,
            1
        );
        let mesh = Mesh::box_tets(3, dvec3(0.0, 0.0, 0.0), dvec3(1.0, 1.0, 1.0))
            .expect("Cannot create box");
        assert_eq!(mesh.num_vertices(), 64);
        assert_eq!(mesh.num_regions(), 162);
        mesh.check_topology().expect("Topological errors found");
        mesh.check_volumes().expect("Inverted elements found");
    }

    #[test]
    fn t_grid_counts() {
        let mesh = Mesh::grid_tris(4, dvec3(0.0, 0.0, 0.0), dvec3(1.0, 1.0, 0.0))
            .expect("Cannot create grid");
        assert_eq!(mesh.num_vertices(), 25);
        assert_eq!(mesh.num_faces(), 32);
        assert_eq!(mesh.num_edges(), 25 + 32 - 1);
        mesh.check_topology().expect("Topological errors found");
    }

    #[test]
    fn t_tetrahedron_is_positive() {
        let mesh = Mesh::tetrahedron([
            dvec3(0.0, 0.0, 0.0),
            dvec3(0.0, 1.0, 0.0),
            dvec3(1.0, 0.0, 0.0),
            dvec3(0.0, 0.0, 1.0),
        ])
        .expect("Cannot create tetrahedron");
        mesh.check_volumes().expect("Inverted elements found");
        assert_eq!(mesh.num_edges(), 6);
        assert_eq!(mesh.num_faces(), 4);
    }
}
