//! Register identity and static per-register metadata.
//!
//! Only the data that does not change across scheduling attempts lives
//! here (def/use counts, the user list, any physical pre-assignment).
//! The mutable, per-attempt state — current-use count, liveness — is
//! the [`crate::tracker::CostTracker`]'s job, so that `schedule`/
//! `unschedule` round-trips never have to touch this struct.
//!
//! The user list is an index list into the DAG's node arena rather than
//! an object-pointer list, avoiding the cyclic back-pointer ownership
//! between registers and instructions that a direct port would carry over.

use cranelift_entity::{entity_impl, PrimaryMap};
use smallvec::SmallVec;

use crate::dag::NodeIndex;
use crate::machine::{MachineModel, RegTypeId};

/// Index of a register within its [`RegisterFile`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RegId(u32);
entity_impl!(RegId, "reg");

/// Global identity of a register: (type, index).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RegRef {
    pub reg_type: RegTypeId,
    pub id: RegId,
}

/// Static metadata for one register.
#[derive(Clone, Debug)]
pub struct RegisterMeta {
    pub def_count: u32,
    pub use_count: u32,
    /// Instructions that consume this register.
    pub users: SmallVec<[NodeIndex; 4]>,
    /// Pre-assigned physical register, if any (drives the clobber check
    /// in the tracker's legality rule).
    pub phys_alias: Option<u32>,
}

impl RegisterMeta {
    fn new(def_count: u32, phys_alias: Option<u32>) -> Self {
        RegisterMeta {
            def_count,
            use_count: 0,
            users: SmallVec::new(),
            phys_alias,
        }
    }
}

/// All registers of one [`crate::machine::RegisterType`].
#[derive(Clone, Debug)]
pub struct RegisterFile {
    pub reg_type: RegTypeId,
    regs: PrimaryMap<RegId, RegisterMeta>,
}

impl RegisterFile {
    fn new(reg_type: RegTypeId) -> Self {
        RegisterFile {
            reg_type,
            regs: PrimaryMap::new(),
        }
    }

    pub fn add_register(&mut self, def_count: u32, phys_alias: Option<u32>) -> RegId {
        self.regs.push(RegisterMeta::new(def_count, phys_alias))
    }

    pub fn record_use(&mut self, id: RegId, user: NodeIndex) {
        let meta = &mut self.regs[id];
        meta.use_count += 1;
        meta.users.push(user);
    }

    pub fn get(&self, id: RegId) -> &RegisterMeta {
        &self.regs[id]
    }

    pub fn len(&self) -> usize {
        self.regs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegId, &RegisterMeta)> {
        self.regs.iter()
    }
}

/// All register files for a region, one per register type in the
/// machine model.
#[derive(Clone, Debug)]
pub struct RegisterBank {
    files: PrimaryMap<RegTypeId, RegisterFile>,
}

impl RegisterBank {
    pub fn new(machine: &MachineModel) -> Self {
        let mut files = PrimaryMap::new();
        for (id, _) in machine.register_types() {
            let pushed = files.push(RegisterFile::new(id));
            debug_assert_eq!(pushed, id);
        }
        RegisterBank { files }
    }

    pub fn file(&self, reg_type: RegTypeId) -> &RegisterFile {
        &self.files[reg_type]
    }

    pub fn file_mut(&mut self, reg_type: RegTypeId) -> &mut RegisterFile {
        &mut self.files[reg_type]
    }

    pub fn get(&self, r: RegRef) -> &RegisterMeta {
        self.files[r.reg_type].get(r.id)
    }

    pub fn iter_files(&self) -> impl Iterator<Item = (RegTypeId, &RegisterFile)> {
        self.files.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::EntityRef;

    #[test]
    fn register_file_tracks_users() {
        let mut file = RegisterFile::new(RegTypeId::new(0));
        let r = file.add_register(1, None);
        file.record_use(r, NodeIndex::new(5));
        file.record_use(r, NodeIndex::new(7));
        let meta = file.get(r);
        assert_eq!(meta.use_count, 2);
        assert_eq!(&meta.users[..], &[NodeIndex::new(5), NodeIndex::new(7)]);
    }
}
