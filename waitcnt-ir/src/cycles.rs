//! Coarse timing model of ALU instructions.
use crate::{InstrClass, Instruction, TargetConfig};

/// Cycles until an instruction's result is available and cycles it occupies
/// the issue port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleInfo {
    pub latency: i8,
    pub issue_cycles: i8,
}

pub fn cycle_info(target: &TargetConfig, instr: &Instruction) -> CycleInfo {
    let latency = match instr.opcode.class() {
        InstrClass::Valu32 | InstrClass::Wmma => 5,
        InstrClass::ValuDouble => 8,
        InstrClass::Trans => 10,
        InstrClass::Salu => 2,
        _ => 0,
    };
    // Wave64 VALU instructions issue in two passes.
    let issue_cycles = if instr.is_valu() && target.wave_size == 64 {
        2
    } else {
        1
    };
    CycleInfo {
        latency,
        issue_cycles,
    }
}
