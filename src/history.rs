use glam::DVec3;

use crate::element::{Entity, VH};

/// A single recorded change to the mesh.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Change {
    Created(Entity),
    Deleted(Entity),
    Moved(VH, DVec3),
}

/// Position in the edit journal that a mesh can be rolled back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckPoint(usize);

/// Journal of the changes made to a mesh while an edit is open.
///
/// Entities are never reused, and deletion only flips a status bit, so the
/// journal only needs to remember which entities were created, which were
/// deleted, and where moved vertices used to be. Edits nest: the journal is
/// cleared when the outermost edit is committed.
#[derive(Default)]
pub(crate) struct MeshHistory {
    changes: Vec<Change>,
    depth: usize,
}

impl MeshHistory {
    pub fn is_recording(&self) -> bool {
        self.depth > 0
    }

    pub fn record(&mut self, change: Change) {
        if self.is_recording() {
            self.changes.push(change);
        }
    }

    pub fn begin(&mut self) -> CheckPoint {
        self.depth += 1;
        CheckPoint(self.changes.len())
    }

    /// Close the innermost edit, keeping its changes. Returns false if no edit
    /// was open.
    pub fn commit(&mut self) -> bool {
        if self.depth == 0 {
            return false;
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.changes.clear();
        }
        true
    }

    /// Close the innermost edit and hand back the changes made since `cp`,
    /// most recent first, so they can be undone.
    pub fn unwind(&mut self, cp: CheckPoint) -> Option<Vec<Change>> {
        if self.depth == 0 || cp.0 > self.changes.len() {
            return None;
        }
        self.depth -= 1;
        let mut undone = self.changes.split_off(cp.0);
        undone.reverse();
        if self.depth == 0 {
            self.changes.clear();
        }
        Some(undone)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.changes.len()
    }
}
