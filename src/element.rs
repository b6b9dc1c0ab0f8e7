use std::fmt::{Debug, Display};

use crate::status::Status;

/**
 * All entities of the mesh implement this trait. They are identified by their
 * index.
 */
pub trait Handle: Copy + 'static {
    /**
     * The dimension of the entities this handle refers to.
     */
    const DIM: usize;

    /**
     * The index of the entity.
     */
    fn index(&self) -> u32;
}

/**
 * Vertex handle.
 */
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VH {
    idx: u32,
}

/**
 * Edge handle.
 */
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EH {
    idx: u32,
}

/**
 * Face (triangle) handle.
 */
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FH {
    idx: u32,
}

/**
 * Region (tetrahedron) handle.
 */
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RH {
    idx: u32,
}

macro_rules! impl_handle {
    ($name:ident, $variant:ident, $dim:expr, $label:literal) => {
        impl Handle for $name {
            const DIM: usize = $dim;

            fn index(&self) -> u32 {
                self.idx
            }
        }

        impl From<u32> for $name {
            fn from(idx: u32) -> Self {
                $name { idx }
            }
        }

        impl From<&u32> for $name {
            fn from(idx: &u32) -> Self {
                $name { idx: *idx }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "({})"), self.idx)
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "({})"), self.idx)
            }
        }

        impl From<$name> for Entity {
            fn from(h: $name) -> Self {
                Entity::$variant(h)
            }
        }
    };
}

impl_handle!(VH, Vertex, 0, "VH");
impl_handle!(EH, Edge, 1, "EH");
impl_handle!(FH, Face, 2, "FH");
impl_handle!(RH, Region, 3, "RH");

/// A mesh entity of any dimension.
///
/// Operators and flags work on entities of the mesh's top dimension, which is
/// either a face (2-D meshes) or a region (3-D meshes), so most of the shape
/// correction code is written against this type rather than a concrete
/// handle.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Entity {
    Vertex(VH),
    Edge(EH),
    Face(FH),
    Region(RH),
}

impl Entity {
    pub fn dim(self) -> usize {
        match self {
            Entity::Vertex(_) => 0,
            Entity::Edge(_) => 1,
            Entity::Face(_) => 2,
            Entity::Region(_) => 3,
        }
    }

    pub fn index(self) -> u32 {
        match self {
            Entity::Vertex(h) => h.index(),
            Entity::Edge(h) => h.index(),
            Entity::Face(h) => h.index(),
            Entity::Region(h) => h.index(),
        }
    }

    /// Build the entity of dimension `dim` with the given index.
    pub fn from_index(dim: usize, idx: u32) -> Option<Entity> {
        match dim {
            0 => Some(Entity::Vertex(idx.into())),
            1 => Some(Entity::Edge(idx.into())),
            2 => Some(Entity::Face(idx.into())),
            3 => Some(Entity::Region(idx.into())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Vertex {
    pub(crate) point: glam::DVec3,
    pub(crate) owner: u32,
    pub(crate) status: Status,
    pub(crate) edges: Vec<EH>,
}

#[derive(Debug, Clone)]
pub(crate) struct Edge {
    pub(crate) verts: [VH; 2],
    pub(crate) status: Status,
    pub(crate) faces: Vec<FH>,
}

#[derive(Debug, Clone)]
pub(crate) struct Face {
    pub(crate) verts: [VH; 3],
    pub(crate) status: Status,
    pub(crate) regions: Vec<RH>,
}

#[derive(Debug, Clone)]
pub(crate) struct Region {
    pub(crate) verts: [VH; 4],
    pub(crate) status: Status,
}

#[cfg(test)]
mod test {
    use super::{Entity, Handle, EH, FH, RH, VH};

    #[test]
    fn t_entity_dims() {
        assert_eq!(Entity::from(VH::from(3u32)).dim(), 0);
        assert_eq!(Entity::from(EH::from(3u32)).dim(), 1);
        assert_eq!(Entity::from(FH::from(3u32)).dim(), 2);
        assert_eq!(Entity::from(RH::from(3u32)).dim(), 3);
        assert_eq!(RH::DIM, 3);
        assert_eq!(Entity::from_index(2, 5), Some(Entity::Face(5u32.into())));
        assert_eq!(Entity::from_index(4, 5), None);
        assert_eq!(format!("{}", RH::from(9u32)), "RH(9)");
    }
}
