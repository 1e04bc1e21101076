use std::fmt;
use waitcnt_ir::{AluDelayWait, Instruction, Opcode};

/// Distance to the most recent ALU producer of a value, per pipeline.
///
/// From GFX11 on, the SIMD frontend does not switch waves on an ALU stall;
/// `s_delay_alu` tells it which dependency to wait for instead. A missing
/// delay is not a correctness problem, only a stall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AluDelayInfo {
    /// VALU instructions issued since the value was written.
    pub valu_instrs: i8,
    /// Cycles until the writing VALU instruction finishes.
    pub valu_cycles: i8,
    /// Transcendental instructions issued since the value was written.
    pub trans_instrs: i8,
    /// Cycles until the writing transcendental instruction finishes.
    pub trans_cycles: i8,
    /// Cycles until the writing SALU instruction finishes.
    pub salu_cycles: i8,
}

impl Default for AluDelayInfo {
    fn default() -> Self {
        AluDelayInfo {
            valu_instrs: Self::VALU_NOP,
            valu_cycles: 0,
            trans_instrs: Self::TRANS_NOP,
            trans_cycles: 0,
            salu_cycles: 0,
        }
    }
}

impl AluDelayInfo {
    /// One past the largest encodable VALU distance.
    pub const VALU_NOP: i8 = 5;
    /// One past the largest encodable transcendental distance.
    pub const TRANS_NOP: i8 = 4;

    /// Keep the closer producer and the longer latency of both.
    pub fn combine(&mut self, other: &AluDelayInfo) -> bool {
        let changed = other.valu_instrs < self.valu_instrs
            || other.trans_instrs < self.trans_instrs
            || other.salu_cycles > self.salu_cycles
            || other.valu_cycles > self.valu_cycles
            || other.trans_cycles > self.trans_cycles;
        self.valu_instrs = self.valu_instrs.min(other.valu_instrs);
        self.trans_instrs = self.trans_instrs.min(other.trans_instrs);
        self.salu_cycles = self.salu_cycles.max(other.salu_cycles);
        self.valu_cycles = self.valu_cycles.max(other.valu_cycles);
        self.trans_cycles = self.trans_cycles.max(other.trans_cycles);
        changed
    }

    /// Restore consistency after a change: a dependency that is out of range
    /// or already finished is no dependency.
    pub fn fixup(&mut self) {
        if self.valu_instrs >= Self::VALU_NOP || self.valu_cycles <= 0 {
            self.valu_instrs = Self::VALU_NOP;
            self.valu_cycles = 0;
        }
        if self.trans_instrs >= Self::TRANS_NOP || self.trans_cycles <= 0 {
            self.trans_instrs = Self::TRANS_NOP;
            self.trans_cycles = 0;
        }
        self.salu_cycles = self.salu_cycles.max(0);
    }

    /// True if waiting on this would be a no-op.
    pub fn empty(&self) -> bool {
        self.valu_instrs == Self::VALU_NOP
            && self.trans_instrs == Self::TRANS_NOP
            && self.salu_cycles == 0
    }

    /// Advance by one issued instruction that took `cycles` cycles.
    pub fn age(&mut self, is_valu: bool, is_trans: bool, cycles: i8) {
        if is_valu {
            self.valu_instrs = self.valu_instrs.saturating_add(1);
        }
        if is_trans {
            self.trans_instrs = self.trans_instrs.saturating_add(1);
        }
        self.salu_cycles = self.salu_cycles.saturating_sub(cycles);
        self.valu_cycles = self.valu_cycles.saturating_sub(cycles);
        self.trans_cycles = self.trans_cycles.saturating_sub(cycles);
        self.fixup();
    }

    /// The longest latency still covered by this delay.
    pub fn max_cycles(&self) -> i8 {
        self.salu_cycles.max(self.valu_cycles).max(self.trans_cycles)
    }

    /// Read back an `s_delay_alu` emitted by an earlier run. Returns `None`
    /// for any other instruction.
    pub fn parse(instr: &Instruction) -> Option<AluDelayInfo> {
        if instr.opcode != Opcode::SDelayAlu {
            return None;
        }
        let imm = instr.imm()?;
        let mut delay = AluDelayInfo::default();
        for code in [imm & 0xf, (imm >> 7) & 0xf] {
            let Some(wait) = AluDelayWait::from_code(code) else {
                continue;
            };
            match wait {
                AluDelayWait::ValuDep1
                | AluDelayWait::ValuDep2
                | AluDelayWait::ValuDep3
                | AluDelayWait::ValuDep4 => {
                    delay.valu_instrs =
                        (code - AluDelayWait::ValuDep1.code() + 1) as i8;
                }
                AluDelayWait::Trans32Dep1
                | AluDelayWait::Trans32Dep2
                | AluDelayWait::Trans32Dep3 => {
                    delay.trans_instrs =
                        (code - AluDelayWait::Trans32Dep1.code() + 1) as i8;
                }
                AluDelayWait::SaluCycle1
                | AluDelayWait::SaluCycle2
                | AluDelayWait::SaluCycle3 => {
                    delay.salu_cycles =
                        (code - AluDelayWait::SaluCycle1.code() + 1) as i8;
                }
                AluDelayWait::NoDep | AluDelayWait::FmaAccumCycle1 => (),
            }
        }
        delay.valu_cycles = clamp_cycles(instr.pass_flags & 0xffff);
        delay.trans_cycles = clamp_cycles(instr.pass_flags >> 16);
        Some(delay)
    }
}

fn clamp_cycles(cycles: u32) -> i8 {
    cycles.min(i8::MAX as u32) as i8
}

impl fmt::Display for AluDelayInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.valu_instrs != Self::VALU_NOP {
            parts.push(format!(
                "valu:{}@{}",
                self.valu_instrs, self.valu_cycles
            ));
        }
        if self.trans_instrs != Self::TRANS_NOP {
            parts.push(format!(
                "trans:{}@{}",
                self.trans_instrs, self.trans_cycles
            ));
        }
        if self.salu_cycles != 0 {
            parts.push(format!("salu:{}", self.salu_cycles));
        }
        write!(f, "[{}]", parts.join(" "))
    }
}
