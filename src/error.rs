use std::path::PathBuf;

use thiserror::Error;

use crate::element::{EH, Entity, FH, RH, VH};

#[derive(Debug, Error)]
pub enum Error {
    // Properties.
    #[error("property is already borrowed")]
    BorrowedPropertyAccess,
    #[error("mismatched array lengths: {0} and {1}")]
    MismatchedArrayLengths(usize, usize),
    // Topology.
    #[error("unsupported mesh dimension {0}, expected 2 or 3")]
    UnsupportedDimension(usize),
    #[error("an element of a {dim}-dimensional mesh needs {expected} vertices, got {found}")]
    InvalidElementArity {
        dim: usize,
        expected: usize,
        found: usize,
    },
    #[error("{0} is not a valid vertex of this mesh")]
    InvalidVertex(VH),
    #[error("{0} appears more than once in an element")]
    RepeatedVertex(VH),
    #[error("element already exists: {0:?}")]
    DuplicateElement(Entity),
    #[error("{0:?} is deleted")]
    DeletedEntity(Entity),
    #[error("{0} references a deleted or missing vertex")]
    DanglingEdge(EH),
    #[error("{0} is missing a bounding edge")]
    DanglingFace(FH),
    #[error("{0} is missing a bounding face")]
    DanglingRegion(RH),
    #[error("adjacency of {0:?} is inconsistent")]
    InconsistentAdjacency(Entity),
    #[error("{0:?} does not bound any element of the next dimension")]
    OrphanEntity(Entity),
    #[error("{0:?} has non-positive volume")]
    InvertedElement(Entity),
    #[error("{0} is still used by an edge")]
    VertexInUse(VH),
    #[error("{0:?} is not an element of the mesh's top dimension")]
    NotAnElement(Entity),
    #[error("no edit is being recorded")]
    NoActiveEdit,
    // Obj.
    #[error("invalid obj file: {0}")]
    InvalidObjFile(PathBuf),
    #[error("failed to load obj: {0}")]
    ObjLoadFailed(String),
    #[error("obj face with {0} vertices, only triangles are supported")]
    NonTriangularFace(usize),
    #[error("incorrect number of coordinates: {0}")]
    IncorrectNumberOfCoordinates(usize),
}

#[cfg(test)]
mod test {
    use super::Error;

    #[test]
    fn t_error_display() {
        let err = Error::InvalidElementArity {
            dim: 3,
            expected: 4,
            found: 3,
        };
        assert_eq!(
            format!("{err}"),
            "an element of a 3-dimensional mesh needs 4 vertices, got 3"
        );
        let err = Error::InvalidVertex(7.into());
        assert!(format!("{err}").contains("VH(7)"));
    }
}
