//! Read-only machine-model description.

use cranelift_entity::{entity_impl, PrimaryMap};
use fnv::FnvHashMap;

/// Kind of dependence an edge represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepKind {
    Data,
    Anti,
    Output,
    Other,
}

/// Index of an issue type within a [`MachineModel`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct IssueTypeId(u32);
entity_impl!(IssueTypeId, "issue_type");

/// Index of an instruction type within a [`MachineModel`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct InstrTypeId(u32);
entity_impl!(InstrTypeId, "instr_type");

/// Index of a register type (a distinct physical register file) within a
/// [`MachineModel`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RegTypeId(u32);
entity_impl!(RegTypeId, "reg_type");

/// An issue slot partition: some number of instructions of this issue
/// type may issue per cycle.
#[derive(Clone, Debug)]
pub struct IssueType {
    pub name: String,
    pub slots_per_cycle: u32,
}

/// An instruction type: maps to one issue type, carries a default
/// latency and whether it is pipelined (a pipelined instruction type
/// does not tie up its issue slot for more than one cycle downstream).
#[derive(Clone, Debug)]
pub struct InstrType {
    pub name: String,
    pub issue_type: IssueTypeId,
    pub default_latency: u32,
    pub pipelined: bool,
}

/// A register file: all registers of one type share a physical count.
#[derive(Clone, Debug)]
pub struct RegisterType {
    pub name: String,
    pub phys_count: u32,
}

/// The read-only description handed to the core for one region.
/// Distinct regions may run on distinct threads provided the same
/// `MachineModel` is shared read-only across them.
#[derive(Clone, Debug)]
pub struct MachineModel {
    issue_rate: u32,
    issue_types: PrimaryMap<IssueTypeId, IssueType>,
    instr_types: PrimaryMap<InstrTypeId, InstrType>,
    reg_types: PrimaryMap<RegTypeId, RegisterType>,
    /// Per (producing instruction type, dependence kind) latency
    /// override; falls back to the instruction type's default latency.
    latencies: FnvHashMap<(InstrTypeId, DepKind), u32>,
}

impl MachineModel {
    pub fn new(issue_rate: u32) -> Self {
        MachineModel {
            issue_rate,
            issue_types: PrimaryMap::new(),
            instr_types: PrimaryMap::new(),
            reg_types: PrimaryMap::new(),
            latencies: FnvHashMap::default(),
        }
    }

    pub fn add_issue_type(&mut self, name: impl Into<String>, slots_per_cycle: u32) -> IssueTypeId {
        self.issue_types.push(IssueType {
            name: name.into(),
            slots_per_cycle,
        })
    }

    pub fn add_instr_type(
        &mut self,
        name: impl Into<String>,
        issue_type: IssueTypeId,
        default_latency: u32,
        pipelined: bool,
    ) -> InstrTypeId {
        self.instr_types.push(InstrType {
            name: name.into(),
            issue_type,
            default_latency,
            pipelined,
        })
    }

    pub fn add_register_type(&mut self, name: impl Into<String>, phys_count: u32) -> RegTypeId {
        self.reg_types.push(RegisterType {
            name: name.into(),
            phys_count,
        })
    }

    pub fn set_latency(&mut self, producer: InstrTypeId, dep_kind: DepKind, latency: u32) {
        self.latencies.insert((producer, dep_kind), latency);
    }

    /// Latency for an edge whose producer has instruction type
    /// `producer` and whose dependence kind is `dep_kind`, falling back
    /// to the producing instruction type's default latency.
    pub fn latency(&self, producer: InstrTypeId, dep_kind: DepKind) -> u32 {
        self.latencies
            .get(&(producer, dep_kind))
            .copied()
            .unwrap_or_else(|| self.instr_types[producer].default_latency)
    }

    pub fn issue_rate(&self) -> u32 {
        self.issue_rate
    }

    pub fn issue_type(&self, id: IssueTypeId) -> &IssueType {
        &self.issue_types[id]
    }

    pub fn instr_type(&self, id: InstrTypeId) -> &InstrType {
        &self.instr_types[id]
    }

    pub fn register_type(&self, id: RegTypeId) -> &RegisterType {
        &self.reg_types[id]
    }

    pub fn register_types(&self) -> impl Iterator<Item = (RegTypeId, &RegisterType)> {
        self.reg_types.iter()
    }

    pub fn slots_for_issue_type(&self, id: IssueTypeId) -> u32 {
        self.issue_types[id].slots_per_cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_falls_back_to_default() {
        let mut m = MachineModel::new(2);
        let it = m.add_issue_type("alu", 2);
        let ty = m.add_instr_type("add", it, 1, true);
        assert_eq!(m.latency(ty, DepKind::Data), 1);
        m.set_latency(ty, DepKind::Data, 3);
        assert_eq!(m.latency(ty, DepKind::Data), 3);
        assert_eq!(m.latency(ty, DepKind::Anti), 1);
    }
}
