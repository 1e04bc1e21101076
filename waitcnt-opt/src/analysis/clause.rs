use bitvec::prelude::*;
use waitcnt_ir::{Instruction, NUM_REGS};

/// Tracks the registers touched by a candidate clause and decides whether
/// the next instruction can join it.
///
/// A clause never reads a register it wrote before, and never writes a
/// register it read or wrote before. Whether two instructions may share a
/// clause at all is [Instruction::should_form_clause], checked by the caller.
pub struct ClauseGrouper {
    regs_read: BitVec,
    regs_written: BitVec,
}

impl ClauseGrouper {
    pub fn new(first: &Instruction) -> Self {
        let mut grouper = ClauseGrouper {
            regs_read: bitvec![0; NUM_REGS],
            regs_written: bitvec![0; NUM_REGS],
        };
        grouper.record(first);
        grouper
    }

    fn conflicts(&self, instr: &Instruction) -> bool {
        instr
            .operands
            .iter()
            .flat_map(|op| op.regs())
            .any(|reg| self.regs_written[reg.0 as usize])
            || instr.definitions.iter().flat_map(|def| def.regs()).any(|reg| {
                self.regs_written[reg.0 as usize]
                    || self.regs_read[reg.0 as usize]
            })
    }

    fn record(&mut self, instr: &Instruction) {
        for reg in instr.operands.iter().flat_map(|op| op.regs()) {
            self.regs_read.set(reg.0 as usize, true);
        }
        for reg in instr.definitions.iter().flat_map(|def| def.regs()) {
            self.regs_written.set(reg.0 as usize, true);
        }
    }

    /// Extend the clause by `next` unless it has a register conflict with
    /// the clause so far.
    pub fn admit(&mut self, next: &Instruction) -> bool {
        if self.conflicts(next) {
            return false;
        }
        self.record(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waitcnt_ir::{Definition, Opcode, Operand, PhysReg, RegClass};

    fn load(dst: u16, addr: u16) -> Instruction {
        Instruction::new(Opcode::GlobalLoadDword)
            .with_operands([Operand::reg(PhysReg::vgpr(addr), RegClass::V2)])
            .with_definitions([Definition::new(
                PhysReg::vgpr(dst),
                RegClass::V1,
            )])
    }

    #[test]
    fn disjoint_loads_form_a_clause() {
        let first = load(0, 10);
        let mut clause = ClauseGrouper::new(&first);
        assert!(clause.admit(&load(1, 10)));
        assert!(clause.admit(&load(2, 12)));
        // v1 is now written by the clause.
        assert!(!clause.admit(&load(3, 1)));
    }

    #[test]
    fn read_after_write_ends_the_clause() {
        let first = load(0, 10);
        let mut clause = ClauseGrouper::new(&first);
        // Address in v0:v1 was written by the first load.
        assert!(!clause.admit(&load(2, 0)));
    }

    #[test]
    fn write_after_read_ends_the_clause() {
        let first = load(0, 10);
        let mut clause = ClauseGrouper::new(&first);
        assert!(!clause.admit(&load(11, 12)));
        assert!(!clause.admit(&load(0, 12)));
        // Rejected instructions leave no trace.
        assert!(clause.admit(&load(4, 12)));
    }
}
