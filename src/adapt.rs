use std::ops::{BitOr, BitOrAssign};

use crate::{
    cavity::CavityOp,
    element::{Entity, EH},
    error::Error,
    mesh::Mesh,
    property::Tag,
    size::SizeField,
};

/// Configuration of a shape correction run.
#[derive(Debug, Clone)]
pub struct Input {
    /// Whether to run the shape correction at all. Default: true
    pub should_fix_shape: bool,

    /// Elements with a quality below this are bad. Default: 0.027, a mean
    /// ratio of 0.3 for tetrahedra.
    pub good_quality: f64,

    /// Elements whose longest to shortest edge length ratio is below this
    /// are not treated as having a short edge. Default: 2.0
    pub maximum_edge_ratio: f64,

    /// Every element created by a rewrite must have at least this quality.
    /// Default: 1e-10
    pub valid_quality: f64,
}

impl Default for Input {
    fn default() -> Self {
        Self {
            should_fix_shape: true,
            good_quality: 0.027,
            maximum_edge_ratio: 2.0,
            valid_quality: 1e-10,
        }
    }
}

impl Input {
    #[must_use]
    pub fn with_good_quality(quality: f64) -> Self {
        Self {
            good_quality: quality,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn maximum_edge_ratio(mut self, ratio: f64) -> Self {
        self.maximum_edge_ratio = ratio;
        self
    }

    #[must_use]
    pub fn valid_quality(mut self, quality: f64) -> Self {
        self.valid_quality = quality;
        self
    }

    /// Input that leaves the mesh alone.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            should_fix_shape: false,
            ..Default::default()
        }
    }
}

/// Bit set of per-entity flags.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flags(u8);

impl Flags {
    pub const NONE: Flags = Flags(0);
    pub const BAD_QUALITY: Flags = Flags(1);
    pub const OK_QUALITY: Flags = Flags(1 << 1);

    pub fn contains(self, other: Flags) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.insert(rhs);
    }
}

/// Everything a shape correction run works with: the mesh being edited, the
/// size field scoring it, the configuration, and the per-entity flags. The
/// flags live as long as this value and are removed from the mesh when it is
/// dropped.
pub struct Adapt<'a> {
    pub mesh: &'a mut Mesh,
    pub size_field: &'a dyn SizeField,
    pub input: &'a Input,
    flags: Tag<Flags>,
}

impl<'a> Adapt<'a> {
    pub fn new(mesh: &'a mut Mesh, size_field: &'a dyn SizeField, input: &'a Input) -> Self {
        let flags = mesh.create_tag(Flags::NONE);
        Adapt {
            mesh,
            size_field,
            input,
            flags,
        }
    }

    pub fn flags(&self, e: Entity) -> Result<Flags, Error> {
        self.flags.get(e)
    }

    pub fn get_flag(&self, e: Entity, flag: Flags) -> Result<bool, Error> {
        Ok(self.flags.get(e)?.contains(flag))
    }

    pub fn set_flag(&mut self, e: Entity, flag: Flags) -> Result<(), Error> {
        let mut f = self.flags.get(e)?;
        f.insert(flag);
        self.flags.set(e, f)
    }

    pub fn clear_flag(&mut self, e: Entity, flag: Flags) -> Result<(), Error> {
        let mut f = self.flags.get(e)?;
        f.remove(flag);
        self.flags.set(e, f)
    }

    /// Quality of an element according to the size field.
    pub fn quality(&self, e: Entity) -> f64 {
        self.size_field.quality(self.mesh, e)
    }

    /// Metric length of an edge.
    pub fn measure(&self, e: EH) -> f64 {
        self.size_field.measure(self.mesh, e)
    }

    /// Evaluate `pred` on every live entity of dimension `dim`. Entities for
    /// which it holds get `true_flag` and lose `false_flag`, the others get
    /// `false_flag` and lose `true_flag`. Returns how many entities hold.
    pub fn mark_entities<P>(
        &mut self,
        dim: usize,
        mut pred: P,
        true_flag: Flags,
        false_flag: Flags,
    ) -> Result<usize, Error>
    where
        P: FnMut(&Adapt, Entity) -> bool,
    {
        let entities: Vec<Entity> = self.mesh.entities(dim).collect();
        let mut count = 0usize;
        for e in entities {
            if pred(self, e) {
                self.set_flag(e, true_flag)?;
                self.clear_flag(e, false_flag)?;
                count += 1;
            } else {
                self.set_flag(e, false_flag)?;
                self.clear_flag(e, true_flag)?;
            }
        }
        Ok(count)
    }

    /// Flag every element whose quality is below [`Input::good_quality`],
    /// returning how many were flagged.
    pub fn mark_bad_quality(&mut self) -> Result<usize, Error> {
        let good = self.input.good_quality;
        self.mark_entities(
            self.mesh.dimension(),
            |a, e| a.quality(e) < good,
            Flags::BAD_QUALITY,
            Flags::OK_QUALITY,
        )
    }

    /// Number of live entities of dimension `dim` carrying `flag`.
    pub fn count_flagged(&self, dim: usize, flag: Flags) -> Result<usize, Error> {
        let mut count = 0usize;
        for e in self.mesh.entities(dim) {
            if self.get_flag(e, flag)? {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// A local rewrite driven over the entities of one dimension by
/// [`apply_operator`].
///
/// The driver calls the methods for one entity at a time, in the order
/// `should_apply`, `request_locality`, `apply`, so an operator can keep the
/// state of its current candidate between them.
pub trait Operator {
    fn target_dimension(&self, mesh: &Mesh) -> usize;

    /// Decide whether to rewrite around `e`. Must not change anything when
    /// `e` is not flagged bad.
    fn should_apply(&mut self, adapt: &mut Adapt, e: Entity) -> Result<bool, Error>;

    /// Lock everything the rewrite of the current candidate will touch.
    fn request_locality(&mut self, adapt: &mut Adapt, cavity: &mut CavityOp) -> bool;

    /// Rewrite around the current candidate. When no rewrite is possible the
    /// candidate's bad quality flag is cleared.
    fn apply(&mut self, adapt: &mut Adapt) -> Result<(), Error>;
}

/// Run an operator over the elements of its target dimension that are alive
/// when the pass starts, in storage order. Elements deleted by earlier
/// rewrites of the pass are skipped. Returns the number of rewrites applied.
pub fn apply_operator(
    adapt: &mut Adapt,
    op: &mut dyn Operator,
    cavity: &mut CavityOp,
) -> Result<usize, Error> {
    let dim = op.target_dimension(adapt.mesh);
    let targets: Vec<Entity> = adapt.mesh.entities(dim).collect();
    let mut applied = 0usize;
    for e in targets {
        if !adapt.mesh.is_alive(e) || !op.should_apply(adapt, e)? {
            continue;
        }
        if !op.request_locality(adapt, cavity) {
            continue;
        }
        let result = op.apply(adapt);
        cavity.release(adapt.mesh);
        result?;
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
mod test {
    use glam::dvec3;

    use super::{Adapt, Flags, Input};
    use crate::{mesh::Mesh, size::UniformSizeField};

    #[test]
    fn t_flags() {
        let mut f = Flags::NONE;
        assert!(f.is_empty());
        f |= Flags::BAD_QUALITY;
        assert!(f.contains(Flags::BAD_QUALITY));
        assert!(!f.contains(Flags::OK_QUALITY));
        assert!(!f.contains(Flags::NONE));
        f.remove(Flags::BAD_QUALITY);
        assert!(f.is_empty());
        assert_eq!(Flags::BAD_QUALITY | Flags::OK_QUALITY, Flags(3));
    }

    #[test]
    fn t_mark_is_idempotent() {
        let mut mesh = Mesh::box_tets(2, dvec3(0.0, 0.0, 0.0), dvec3(1.0, 1.0, 0.1))
            .expect("Cannot create box");
        let sf = UniformSizeField::from_mesh(&mesh);
        let input = Input::default();
        let mut adapt = Adapt::new(&mut mesh, &sf, &input);
        let first = adapt.mark_bad_quality().expect("Cannot mark");
        assert!(first > 0);
        let flagged: Vec<_> = adapt
            .mesh
            .elements()
            .filter(|e| adapt.get_flag(*e, Flags::BAD_QUALITY).expect("Cannot read flag"))
            .collect();
        let second = adapt.mark_bad_quality().expect("Cannot mark");
        assert_eq!(first, second);
        let again: Vec<_> = adapt
            .mesh
            .elements()
            .filter(|e| adapt.get_flag(*e, Flags::BAD_QUALITY).expect("Cannot read flag"))
            .collect();
        assert_eq!(flagged, again);
        assert_eq!(adapt.count_flagged(3, Flags::BAD_QUALITY).expect("Cannot count"), first);
        assert_eq!(
            adapt.count_flagged(3, Flags::OK_QUALITY).expect("Cannot count"),
            adapt.mesh.num_regions() - first
        );
    }

    #[test]
    fn t_flags_removed_with_context() {
        let mut mesh = Mesh::box_tets(1, dvec3(0.0, 0.0, 0.0), dvec3(1.0, 1.0, 1.0))
            .expect("Cannot create box");
        let sf = UniformSizeField::new(1.0);
        let input = Input::default();
        {
            let adapt = Adapt::new(&mut mesh, &sf, &input);
            assert_eq!(adapt.mesh.num_tags(), 1);
        }
        assert_eq!(mesh.num_tags(), 0);
    }
}
