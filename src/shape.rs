//! Repair of badly shaped elements.
//!
//! Bad elements are flagged, then repaired by a pass of local rewrites
//! aimed at large angles, followed by a pass aimed at short edges. The
//! passes repeat while the number of bad elements keeps going down.

use std::time::{Duration, Instant};

use arrayvec::ArrayVec;
use tracing::{debug, info};

use crate::{
    adapt::{apply_operator, Adapt, Flags, Operator},
    cavity::CavityOp,
    collapse::ShortEdgeRemover,
    element::{Entity, EH, VH},
    error::Error,
    mesh::Mesh,
    sliver::{match_sliver, rotate_tet, Template},
    split::DoubleSplitCollapse,
    swap::EdgeSwap,
};

/// Removes the shortest edge of bad elements whose edge lengths are too far
/// apart.
#[derive(Debug, Default)]
pub struct ShortEdgeFixer {
    remover: ShortEdgeRemover,
    element: Option<Entity>,
    repaired: usize,
    failed: usize,
}

impl ShortEdgeFixer {
    pub fn new() -> Self {
        ShortEdgeFixer::default()
    }

    pub fn repaired(&self) -> usize {
        self.repaired
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// The edge that will be removed by the next [`Operator::apply`].
    pub fn target(&self) -> Option<EH> {
        self.remover.edge()
    }
}

impl Operator for ShortEdgeFixer {
    fn target_dimension(&self, mesh: &Mesh) -> usize {
        mesh.dimension()
    }

    fn should_apply(&mut self, adapt: &mut Adapt, e: Entity) -> Result<bool, Error> {
        if !adapt.get_flag(e, Flags::BAD_QUALITY)? {
            return Ok(false);
        }
        let mut shortest: Option<(EH, f64)> = None;
        let mut longest = 0.0f64;
        for edge in adapt.mesh.downward_edges(e) {
            let len = adapt.measure(edge);
            longest = longest.max(len);
            if shortest.is_none_or(|(_, s)| len < s) {
                shortest = Some((edge, len));
            }
        }
        let Some((edge, len)) = shortest else {
            return Ok(false);
        };
        if longest / len < adapt.input.maximum_edge_ratio {
            adapt.clear_flag(e, Flags::BAD_QUALITY)?;
            return Ok(false);
        }
        self.element = Some(e);
        self.remover.set_edge(edge);
        Ok(true)
    }

    fn request_locality(&mut self, adapt: &mut Adapt, cavity: &mut CavityOp) -> bool {
        self.remover.request_locality(adapt, cavity)
    }

    fn apply(&mut self, adapt: &mut Adapt) -> Result<(), Error> {
        let Some(e) = self.element.take() else {
            return Ok(());
        };
        if self.remover.run(adapt)? {
            self.repaired += 1;
        } else {
            self.failed += 1;
            adapt.clear_flag(e, Flags::BAD_QUALITY)?;
        }
        Ok(())
    }
}

/// Repair of a tetrahedron presented in the vertex order its template
/// expects.
trait TetFixer {
    fn set_tet(&mut self, mesh: &Mesh, v: [VH; 4]);

    fn edges(&self) -> &[EH];

    fn request_locality(&self, adapt: &mut Adapt, cavity: &mut CavityOp) -> bool {
        let edges: ArrayVec<Entity, 3> = self.edges().iter().map(|e| Entity::from(*e)).collect();
        cavity.request_locality(adapt.mesh, &edges)
    }

    fn run(&mut self, adapt: &mut Adapt) -> Result<bool, Error>;
}

/// Vertex 3 is close to the face (0, 1, 2). Tries to swap each edge of the
/// face.
#[derive(Debug, Default)]
pub struct FaceVertFixer {
    swap: EdgeSwap,
    edges: ArrayVec<EH, 3>,
    swaps: usize,
    failed: usize,
}

impl FaceVertFixer {
    pub fn swaps(&self) -> usize {
        self.swaps
    }

    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl TetFixer for FaceVertFixer {
    fn set_tet(&mut self, mesh: &Mesh, v: [VH; 4]) {
        self.edges.clear();
        for (a, b) in [(v[0], v[1]), (v[1], v[2]), (v[2], v[0])] {
            if let Some(e) = mesh.find_edge(a, b) {
                self.edges.push(e);
            }
        }
    }

    fn edges(&self) -> &[EH] {
        &self.edges
    }

    fn run(&mut self, adapt: &mut Adapt) -> Result<bool, Error> {
        for e in self.edges.clone() {
            if self.swap.run(adapt, e)? {
                self.swaps += 1;
                return Ok(true);
            }
        }
        self.failed += 1;
        Ok(false)
    }
}

/// Edges 0-2 and 1-3 are close to each other. Tries to swap either one,
/// then to replace both with a vertex between them.
#[derive(Debug, Default)]
pub struct EdgeEdgeFixer {
    swap: EdgeSwap,
    double_split_collapse: DoubleSplitCollapse,
    edges: ArrayVec<EH, 2>,
    swaps: usize,
    failed: usize,
}

impl EdgeEdgeFixer {
    pub fn swaps(&self) -> usize {
        self.swaps
    }

    pub fn double_split_collapses(&self) -> usize {
        self.double_split_collapse.applied()
    }

    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl TetFixer for EdgeEdgeFixer {
    fn set_tet(&mut self, mesh: &Mesh, v: [VH; 4]) {
        self.edges.clear();
        for (a, b) in [(v[0], v[2]), (v[1], v[3])] {
            if let Some(e) = mesh.find_edge(a, b) {
                self.edges.push(e);
            }
        }
    }

    fn edges(&self) -> &[EH] {
        &self.edges
    }

    fn run(&mut self, adapt: &mut Adapt) -> Result<bool, Error> {
        for e in self.edges.clone() {
            if self.swap.run(adapt, e)? {
                self.swaps += 1;
                return Ok(true);
            }
        }
        if let [e0, e1] = self.edges[..] {
            let quality_to_beat = [e0, e1]
                .iter()
                .flat_map(|e| adapt.mesh.elements_of_edge(*e))
                .map(|e| adapt.quality(e))
                .fold(f64::INFINITY, f64::min);
            if self
                .double_split_collapse
                .run(adapt, [e0, e1], quality_to_beat)?
            {
                return Ok(true);
            }
        }
        self.failed += 1;
        Ok(false)
    }
}

/// Repairs bad tetrahedra according to their sliver class.
#[derive(Debug, Default)]
pub struct LargeAngleTetFixer {
    edge_edge: EdgeEdgeFixer,
    face_vert: FaceVertFixer,
    tet: Option<(Entity, Template)>,
}

impl LargeAngleTetFixer {
    pub fn new() -> Self {
        LargeAngleTetFixer::default()
    }

    /// The tetrahedron being repaired and its template.
    pub fn candidate(&self) -> Option<(Entity, Template)> {
        self.tet
    }

    pub fn edge_edge(&self) -> &EdgeEdgeFixer {
        &self.edge_edge
    }

    pub fn face_vert(&self) -> &FaceVertFixer {
        &self.face_vert
    }

    fn fixer(&mut self, template: Template) -> &mut dyn TetFixer {
        match template {
            Template::EdgeEdge => &mut self.edge_edge,
            Template::FaceVert => &mut self.face_vert,
        }
    }
}

impl Operator for LargeAngleTetFixer {
    fn target_dimension(&self, _mesh: &Mesh) -> usize {
        3
    }

    fn should_apply(&mut self, adapt: &mut Adapt, e: Entity) -> Result<bool, Error> {
        if !adapt.get_flag(e, Flags::BAD_QUALITY)? {
            return Ok(false);
        }
        let m = match_sliver(adapt, e);
        let Entity::Region(r) = e else {
            return Ok(false);
        };
        let rv = rotate_tet(adapt.mesh.region_vertices(r), m.rotation);
        self.fixer(m.template).set_tet(adapt.mesh, rv);
        self.tet = Some((e, m.template));
        Ok(true)
    }

    fn request_locality(&mut self, adapt: &mut Adapt, cavity: &mut CavityOp) -> bool {
        match self.tet {
            Some((_, template)) => self.fixer(template).request_locality(adapt, cavity),
            None => false,
        }
    }

    fn apply(&mut self, adapt: &mut Adapt) -> Result<(), Error> {
        let Some((tet, template)) = self.tet.take() else {
            return Ok(());
        };
        if !self.fixer(template).run(adapt)? {
            adapt.clear_flag(tet, Flags::BAD_QUALITY)?;
        }
        Ok(())
    }
}

/// Repairs bad triangles by swapping one of their edges.
#[derive(Debug, Default)]
pub struct LargeAngleTriFixer {
    swap: EdgeSwap,
    tri: Option<Entity>,
    edges: ArrayVec<EH, 6>,
    swaps: usize,
    failed: usize,
}

impl LargeAngleTriFixer {
    pub fn new() -> Self {
        LargeAngleTriFixer::default()
    }

    pub fn swaps(&self) -> usize {
        self.swaps
    }

    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl Operator for LargeAngleTriFixer {
    fn target_dimension(&self, _mesh: &Mesh) -> usize {
        2
    }

    fn should_apply(&mut self, adapt: &mut Adapt, e: Entity) -> Result<bool, Error> {
        if !adapt.get_flag(e, Flags::BAD_QUALITY)? {
            return Ok(false);
        }
        self.tri = Some(e);
        self.edges = adapt.mesh.downward_edges(e);
        Ok(true)
    }

    fn request_locality(&mut self, adapt: &mut Adapt, cavity: &mut CavityOp) -> bool {
        let edges: ArrayVec<Entity, 6> = self.edges.iter().map(|e| Entity::from(*e)).collect();
        cavity.request_locality(adapt.mesh, &edges)
    }

    fn apply(&mut self, adapt: &mut Adapt) -> Result<(), Error> {
        let Some(tri) = self.tri.take() else {
            return Ok(());
        };
        for e in self.edges.clone() {
            if self.swap.run(adapt, e)? {
                self.swaps += 1;
                return Ok(());
            }
        }
        self.failed += 1;
        adapt.clear_flag(tri, Flags::BAD_QUALITY)
    }
}

/// Outcome of [`fix_element_shapes`].
#[derive(Debug, Clone, Default)]
pub struct ShapeReport {
    /// Number of bad elements before any repair.
    pub original: usize,
    /// Number of bad elements left.
    pub residual: usize,
    /// Number of large angle and short edge pass pairs run.
    pub passes: usize,
    pub elapsed: Duration,
}

impl ShapeReport {
    pub fn converged(&self) -> bool {
        self.residual == 0
    }
}

fn fix_short_edge_elements(adapt: &mut Adapt, cavity: &mut CavityOp) -> Result<(), Error> {
    let mut fixer = ShortEdgeFixer::new();
    apply_operator(adapt, &mut fixer, cavity)?;
    debug!(
        repaired = fixer.repaired(),
        failed = fixer.failed(),
        "Short edge pass done"
    );
    Ok(())
}

fn fix_large_angle_tets(adapt: &mut Adapt, cavity: &mut CavityOp) -> Result<(), Error> {
    let mut fixer = LargeAngleTetFixer::new();
    apply_operator(adapt, &mut fixer, cavity)?;
    debug!(
        edge_swaps = fixer.edge_edge().swaps(),
        double_split_collapses = fixer.edge_edge().double_split_collapses(),
        edge_edge_failed = fixer.edge_edge().failed(),
        face_swaps = fixer.face_vert().swaps(),
        face_vert_failed = fixer.face_vert().failed(),
        "Large angle tet pass done"
    );
    Ok(())
}

fn fix_large_angle_tris(adapt: &mut Adapt, cavity: &mut CavityOp) -> Result<(), Error> {
    let mut fixer = LargeAngleTriFixer::new();
    apply_operator(adapt, &mut fixer, cavity)?;
    debug!(
        swaps = fixer.swaps(),
        failed = fixer.failed(),
        "Large angle triangle pass done"
    );
    Ok(())
}

fn fix_large_angles(adapt: &mut Adapt, cavity: &mut CavityOp) -> Result<(), Error> {
    if adapt.mesh.dimension() == 3 {
        fix_large_angle_tets(adapt, cavity)
    } else {
        fix_large_angle_tris(adapt, cavity)
    }
}

/// Repair the bad elements of the mesh, alternating large angle and short
/// edge passes while the number of bad elements goes down.
pub fn fix_element_shapes(adapt: &mut Adapt, cavity: &mut CavityOp) -> Result<ShapeReport, Error> {
    if !adapt.input.should_fix_shape {
        return Ok(ShapeReport::default());
    }
    let start = Instant::now();
    let mut count = adapt.mark_bad_quality()?;
    let original = count;
    let mut passes = 0usize;
    while count > 0 {
        let prev_count = count;
        fix_large_angles(adapt, cavity)?;
        adapt.mark_bad_quality()?;
        fix_short_edge_elements(adapt, cavity)?;
        count = adapt.mark_bad_quality()?;
        passes += 1;
        debug!(pass = passes, bad = count, "Shape pass done");
        if count >= prev_count {
            break;
        }
    }
    let elapsed = start.elapsed();
    info!(
        "bad shapes down from {} to {} in {} seconds",
        original,
        count,
        elapsed.as_secs_f64()
    );
    Ok(ShapeReport {
        original,
        residual: count,
        passes,
        elapsed,
    })
}
