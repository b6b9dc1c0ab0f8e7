use arrayvec::ArrayVec;
use glam::DVec3;

use crate::{
    adapt::Adapt,
    collapse::best_collapse,
    element::{EH, VH},
    error::Error,
    mesh::Mesh,
};

/// Split `edge` at `point`, which should lie on the edge, replacing every
/// element around the edge with two. Returns the new vertex.
pub fn split_edge(mesh: &mut Mesh, edge: EH, point: DVec3) -> Result<VH, Error> {
    if !mesh.is_alive(edge.into()) {
        return Err(Error::DeletedEntity(edge.into()));
    }
    let [a, b] = mesh.edge_vertices(edge);
    let old = mesh.elements_of_edge(edge);
    let cp = mesh.begin_edit();
    let result = mesh.add_vertex(point).and_then(|m| {
        let mut new: Vec<ArrayVec<VH, 4>> = Vec::with_capacity(2 * old.len());
        for e in &old {
            let verts = mesh.downward_vertices(*e);
            for replaced in [a, b] {
                new.push(
                    verts
                        .iter()
                        .map(|v| if *v == replaced { m } else { *v })
                        .collect(),
                );
            }
        }
        mesh.replace_elements(&old, new)?;
        Ok(m)
    });
    match result {
        Ok(m) => {
            mesh.commit()?;
            Ok(m)
        }
        Err(e) => {
            mesh.rollback(cp)?;
            Err(e)
        }
    }
}

/// Splits two edges at their midpoints and collapses the edge joining the
/// two new vertices, replacing a pair of close edges with a single vertex
/// between them.
#[derive(Debug, Default)]
pub struct DoubleSplitCollapse {
    applied: usize,
}

impl DoubleSplitCollapse {
    pub fn new() -> Self {
        DoubleSplitCollapse::default()
    }

    /// Number of successful runs.
    pub fn applied(&self) -> usize {
        self.applied
    }

    fn split_and_collapse(&self, adapt: &mut Adapt, edges: [EH; 2]) -> Result<Option<VH>, Error> {
        // Splitting the first edge can delete and recreate the second one
        // under a new handle, so edges are looked up by their vertices.
        let pairs = edges.map(|e| adapt.mesh.edge_vertices(e));
        let mut mids: ArrayVec<VH, 2> = ArrayVec::new();
        for [a, b] in pairs {
            let Some(e) = adapt.mesh.find_edge(a, b) else {
                return Ok(None);
            };
            let mid = (adapt.mesh.point(a) + adapt.mesh.point(b)) * 0.5;
            mids.push(split_edge(adapt.mesh, e, mid)?);
        }
        let Some(edge) = adapt.mesh.find_edge(mids[0], mids[1]) else {
            return Ok(None);
        };
        match best_collapse(adapt, edge) {
            Some((c, _)) => {
                c.apply(adapt.mesh)?;
                Ok(Some(c.kept))
            }
            None => Ok(None),
        }
    }

    /// Apply the rewrite if every element around the remaining vertex ends
    /// up with a quality above `quality_to_beat`. Otherwise the mesh is left
    /// as it was. The two edges must not share a vertex.
    pub fn run(
        &mut self,
        adapt: &mut Adapt,
        edges: [EH; 2],
        quality_to_beat: f64,
    ) -> Result<bool, Error> {
        if edges.iter().any(|e| !adapt.mesh.is_alive((*e).into())) {
            return Ok(false);
        }
        let [a, b] = adapt.mesh.edge_vertices(edges[0]);
        if adapt.mesh.edge_vertices(edges[1]).iter().any(|v| *v == a || *v == b) {
            return Ok(false);
        }
        let cp = adapt.mesh.begin_edit();
        match self.split_and_collapse(adapt, edges) {
            Ok(Some(kept)) => {
                let quality = adapt
                    .mesh
                    .elements_of_vertex(kept)
                    .iter()
                    .map(|e| adapt.quality(*e))
                    .fold(f64::INFINITY, f64::min);
                if quality > quality_to_beat {
                    adapt.mesh.commit()?;
                    self.applied += 1;
                    Ok(true)
                } else {
                    adapt.mesh.rollback(cp)?;
                    Ok(false)
                }
            }
            Ok(None) => {
                adapt.mesh.rollback(cp)?;
                Ok(false)
            }
            Err(e) => {
                adapt.mesh.rollback(cp)?;
                Err(e)
            }
        }
    }
}
