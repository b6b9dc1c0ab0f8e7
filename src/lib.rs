/*!
Correction of badly shaped elements in simplicial meshes.

Adaptive meshing leaves behind elements whose shape is poor as measured by a
size field: flat tetrahedra (slivers), needles, and triangles with a large
angle. This crate finds such elements and repairs them with local rewrites.

# Overview

+ [`Mesh`] is a conforming mesh of triangles (dimension 2) or tetrahedra
  (dimension 3). Edits can be grouped with [`Mesh::begin_edit`] and undone
  with [`Mesh::rollback`].

+ A [`SizeField`] maps physical space into a metric space where the ideal
  element is equilateral with unit edges. Element quality and edge lengths
  are measured in that space. [`UniformSizeField`], [`MetricSizeField`] and
  [`FunctionSizeField`] cover the common cases.

+ [`Adapt`] bundles the mesh, size field, [`Input`] options and the
  per-entity [`Flags`] used to mark bad elements.

+ Tetrahedra are classified by [`sliver_code`]: where the apex projects onto
  the plane of the opposite face. The code selects a repair [`Template`] and a
  vertex rotation through [`SLIVER_TABLE`].

+ [`fix_element_shapes`] drives the repair. It alternates a large angle pass
  ([`LargeAngleTetFixer`] or [`LargeAngleTriFixer`]) with a short edge pass
  ([`ShortEdgeFixer`]) while the number of bad elements keeps decreasing.

```no_run
use glam::dvec3;
use slivr::{fix_element_shapes, Adapt, CavityOp, Input, Mesh, UniformSizeField};

let mut mesh = Mesh::box_tets(4, dvec3(0.0, 0.0, 0.0), dvec3(1.0, 1.0, 1.0))?;
let size = UniformSizeField::from_mesh(&mesh);
let input = Input::default();
let mut adapt = Adapt::new(&mut mesh, &size, &input);
let report = fix_element_shapes(&mut adapt, &mut CavityOp::new())?;
println!("{} bad elements left", report.residual);
# Ok::<(), slivr::Error>(())
```
*/

mod adapt;
mod cavity;
mod check;
mod collapse;
mod element;
mod error;
mod history;
mod math;
mod mesh;
mod primitive;
mod property;
mod shape;
mod size;
mod sliver;
mod split;
mod status;
mod swap;

#[cfg(feature = "obj")]
mod obj;

pub use adapt::{apply_operator, Adapt, Flags, Input, Operator};
pub use cavity::CavityOp;
pub use collapse::{best_collapse, Collapse, ShortEdgeRemover};
pub use element::{Entity, Handle, EH, FH, RH, VH};
pub use error::Error;
pub use history::CheckPoint;
pub use math::{tet_quality, tet_volume, tri_quality};
pub use mesh::Mesh;
pub use property::Tag;
pub use shape::{
    fix_element_shapes, EdgeEdgeFixer, FaceVertFixer, LargeAngleTetFixer, LargeAngleTriFixer,
    ShapeReport, ShortEdgeFixer,
};
pub use size::{FunctionSizeField, MetricSizeField, SizeField, UniformSizeField};
pub use sliver::{
    match_code, match_sliver, rotate_tet, sliver_code, CodeMatch, Template, SLIVER_TABLE,
    TET_ROTATION,
};
pub use split::{split_edge, DoubleSplitCollapse};
pub use swap::EdgeSwap;
