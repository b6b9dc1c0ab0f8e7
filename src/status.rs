const DELETED: u8 = 1 << 0;
const LOCKED: u8 = 1 << 1;
const TAGGED: u8 = 1 << 2;

/// Status bits kept by the mesh for each of its entities.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct Status {
    flags: u8,
}

impl Status {
    fn check(&self, i: u8) -> bool {
        self.flags & i > 0
    }

    fn set(&mut self, i: u8, flag: bool) {
        if flag {
            self.flags |= i;
        } else {
            self.flags &= !i;
        }
    }

    pub fn deleted(&self) -> bool {
        self.check(DELETED)
    }

    pub fn set_deleted(&mut self, flag: bool) {
        self.set(DELETED, flag);
    }

    /// Vertices are locked while a cavity containing them is reserved for an
    /// edit.
    pub fn locked(&self) -> bool {
        self.check(LOCKED)
    }

    pub fn set_locked(&mut self, flag: bool) {
        self.set(LOCKED, flag)
    }

    /// Scratch bit used by topological checks. Nothing should rely on its
    /// value outside of the function that sets it.
    pub fn tagged(&self) -> bool {
        self.check(TAGGED)
    }

    pub fn set_tagged(&mut self, flag: bool) {
        self.set(TAGGED, flag)
    }
}
