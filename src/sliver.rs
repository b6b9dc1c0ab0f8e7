//! Classification of badly shaped tetrahedra.
//!
//! A tetrahedron is classified by looking at where its apex, vertex 3, lands
//! when projected onto the plane of the opposite face (0, 1, 2) in metric
//! space. The projection either falls over the face, near one of its
//! vertices, or across one of its edges. Each of these zones asks for a
//! different repair, described by a [`CodeMatch`].

use glam::DMat3;

use crate::{
    adapt::Adapt,
    element::{Entity, VH},
    math,
};

/// Orientation preserving permutations of the vertices of a tetrahedron.
/// Rotation `r` puts vertex `TET_ROTATION[r][i]` in position `i`.
pub const TET_ROTATION: [[usize; 4]; 12] = [
    [0, 1, 2, 3],
    [2, 0, 1, 3],
    [1, 2, 0, 3],
    [1, 3, 2, 0],
    [0, 2, 3, 1],
    [0, 3, 1, 2],
    [3, 0, 2, 1],
    [2, 1, 3, 0],
    [3, 1, 0, 2],
    [1, 0, 3, 2],
    [2, 3, 0, 1],
    [3, 2, 1, 0],
];

pub fn rotate_tet(v: [VH; 4], rotation: usize) -> [VH; 4] {
    TET_ROTATION[rotation].map(|i| v[i])
}

/// How a sliver is repaired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// Edges 0-2 and 1-3 of the rotated tetrahedron pass close to each
    /// other.
    EdgeEdge,
    /// Vertex 3 of the rotated tetrahedron is close to the face (0, 1, 2).
    FaceVert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeMatch {
    pub template: Template,
    /// Index into [`TET_ROTATION`] that presents the tetrahedron in the
    /// layout the template expects.
    pub rotation: usize,
}

/// Repairs indexed by sliver code. Code zero is never produced.
pub const SLIVER_TABLE: [Option<CodeMatch>; 8] = [
    None,
    Some(CodeMatch {
        template: Template::FaceVert,
        rotation: 3,
    }),
    Some(CodeMatch {
        template: Template::FaceVert,
        rotation: 4,
    }),
    Some(CodeMatch {
        template: Template::EdgeEdge,
        rotation: 2,
    }),
    Some(CodeMatch {
        template: Template::FaceVert,
        rotation: 5,
    }),
    Some(CodeMatch {
        template: Template::EdgeEdge,
        rotation: 0,
    }),
    Some(CodeMatch {
        template: Template::EdgeEdge,
        rotation: 1,
    }),
    Some(CodeMatch {
        template: Template::FaceVert,
        rotation: 0,
    }),
];

/// Code of the zone the apex projection falls in. Bit `i` is set when the
/// `i`th area coordinate of the projection in the face (0, 1, 2) is
/// positive.
pub fn sliver_code(adapt: &Adapt, tet: Entity) -> u8 {
    let points = adapt.mesh.entity_points(tet);
    assert_eq!(points.len(), 4, "{tet:?} is not a tetrahedron");
    let j = math::jacobian(&points);
    let t = adapt.size_field.transform_at(math::centroid(&points));
    let (c0, c1, c2) = (t * j.x_axis, t * j.y_axis, t * j.z_axis);
    let normal = c0.cross(c1);
    let projected = c2 - c2.project_onto(normal);
    let st = DMat3::from_cols(c0, c1, normal).inverse() * projected;
    let area = [1.0 - st.x - st.y, st.x, st.y];
    let code = area
        .iter()
        .enumerate()
        .filter(|(_, a)| **a > 0.0)
        .fold(0u8, |code, (i, _)| code | (1 << i));
    assert!(code != 0, "Sliver code of {tet:?} is zero");
    code
}

pub fn match_code(code: u8) -> CodeMatch {
    match SLIVER_TABLE.get(code as usize).copied().flatten() {
        Some(m) => m,
        None => panic!("No repair for sliver code {code}"),
    }
}

pub fn match_sliver(adapt: &Adapt, tet: Entity) -> CodeMatch {
    match_code(sliver_code(adapt, tet))
}

#[cfg(test)]
mod test {
    use glam::{dvec3, DVec3};

    use super::{match_code, match_sliver, rotate_tet, sliver_code, Template, TET_ROTATION};
    use crate::{
        adapt::{Adapt, Input},
        element::VH,
        math,
        mesh::Mesh,
        size::{MetricSizeField, UniformSizeField},
    };

    const BASE: [DVec3; 3] = [
        DVec3::new(0.0, 0.0, 0.0),
        DVec3::new(1.0, 0.0, 0.0),
        DVec3::new(0.0, 1.0, 0.0),
    ];

    fn code_of(apex: DVec3) -> u8 {
        let mut mesh = Mesh::from_elements(
            3,
            &[BASE[0], BASE[1], BASE[2], apex],
            &[[0, 1, 2, 3].as_slice()],
        )
        .expect("Cannot create mesh");
        let sf = UniformSizeField::new(1.0);
        let input = Input::default();
        let adapt = Adapt::new(&mut mesh, &sf, &input);
        let tet = adapt.mesh.elements().next().expect("Mesh has no elements");
        sliver_code(&adapt, tet)
    }

    #[test]
    fn t_rotations_are_even() {
        for (r, perm) in TET_ROTATION.iter().enumerate() {
            let mut sorted = *perm;
            sorted.sort();
            assert_eq!(sorted, [0, 1, 2, 3], "rotation {r}");
            let p: Vec<DVec3> = perm
                .iter()
                .map(|i| [BASE[0], BASE[1], BASE[2], DVec3::Z][*i])
                .collect();
            assert!(math::tet_volume(p[0], p[1], p[2], p[3]) > 0.0, "rotation {r}");
        }
        let v: [VH; 4] = [10u32, 11, 12, 13].map(VH::from);
        assert_eq!(rotate_tet(v, 0), v);
        assert_eq!(
            rotate_tet(v, 3),
            [11u32, 13, 12, 10].map(VH::from)
        );
    }

    #[test]
    fn t_table_is_complete() {
        for code in 1u8..8 {
            let m = match_code(code);
            assert!(m.rotation < TET_ROTATION.len());
            let expected = if code.count_ones() == 2 {
                Template::EdgeEdge
            } else {
                Template::FaceVert
            };
            assert_eq!(m.template, expected, "code {code}");
        }
    }

    #[test]
    #[should_panic]
    fn t_code_zero_panics() {
        match_code(0);
    }

    #[test]
    fn t_apex_over_base() {
        assert_eq!(code_of(dvec3(0.25, 0.25, 0.01)), 7);
        assert_eq!(code_of(dvec3(0.3, 0.3, 5.0)), 7);
    }

    #[test]
    fn t_apex_zones() {
        // Beyond a vertex of the base.
        assert_eq!(code_of(dvec3(-0.5, -0.5, 0.01)), 1);
        assert_eq!(code_of(dvec3(2.0, -0.5, 0.01)), 2);
        assert_eq!(code_of(dvec3(-0.5, 2.0, 0.01)), 4);
        // Across an edge of the base.
        assert_eq!(code_of(dvec3(0.5, -0.5, 0.01)), 3);
        assert_eq!(code_of(dvec3(-0.5, 0.5, 0.01)), 5);
        assert_eq!(code_of(dvec3(0.8, 0.8, 0.01)), 6);
    }

    #[test]
    fn t_rotation_presents_the_close_pair() {
        let v: [VH; 4] = [0u32, 1, 2, 3].map(VH::from);
        let has_edge = |rv: [VH; 4], i: usize, j: usize, a: u32, b: u32| {
            let (a, b): (VH, VH) = (a.into(), b.into());
            (rv[i] == a && rv[j] == b) || (rv[i] == b && rv[j] == a)
        };
        // Apex across edge 0-1: edges 0-1 and 2-3 are close.
        let rv = rotate_tet(v, match_code(3).rotation);
        assert!(has_edge(rv, 0, 2, 0, 1));
        assert!(has_edge(rv, 1, 3, 2, 3));
        // Apex beyond vertex 0: vertex 0 is close to the face (1, 2, 3).
        let rv = rotate_tet(v, match_code(1).rotation);
        assert_eq!(rv[3], VH::from(0u32));
        // Apex beyond vertex 2.
        let rv = rotate_tet(v, match_code(4).rotation);
        assert_eq!(rv[3], VH::from(2u32));
    }

    #[test]
    fn t_metric_changes_the_zone() {
        // Apex over the base in physical space, beyond vertex 1 in a sheared
        // metric.
        let mut mesh = Mesh::from_elements(
            3,
            &[BASE[0], BASE[1], BASE[2], dvec3(0.6, 0.1, 0.5)],
            &[[0, 1, 2, 3].as_slice()],
        )
        .expect("Cannot create mesh");
        let input = Input::default();
        let plain = UniformSizeField::new(1.0);
        let adapt = Adapt::new(&mut mesh, &plain, &input);
        let tet = adapt.mesh.elements().next().expect("Mesh has no elements");
        assert_eq!(match_sliver(&adapt, tet).template, Template::FaceVert);
        assert_eq!(sliver_code(&adapt, tet), 7);
        drop(adapt);
        let shear = MetricSizeField::new(glam::DMat3::from_cols(
            dvec3(1.0, 0.0, 0.0),
            dvec3(0.0, 1.0, 0.0),
            dvec3(2.0, -1.0, 1.0),
        ));
        let adapt = Adapt::new(&mut mesh, &shear, &input);
        assert_eq!(sliver_code(&adapt, tet), 2);
    }
}
