//! Wait-count immediates and their encodings.
use crate::{GfxLevel, Instruction, Opcode, Operand, PhysReg};
use std::{fmt, ops};

#[cfg(feature = "serialize")]
use serde::Serialize;

/// Hardware counters an instruction can wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub enum WaitType {
    /// Exports and GPR locks (`expcnt`).
    Exp,
    /// LDS, GDS, scalar memory and messages (`lgkmcnt`, `dscnt` on GFX12).
    Lgkm,
    /// Vector memory loads (`vmcnt`, `loadcnt` on GFX12).
    Vm,
    /// Vector memory stores (`vscnt`, `storecnt` on GFX12).
    Vs,
    /// Sampler loads (GFX12).
    Sample,
    /// Ray-tracing loads (GFX12).
    Bvh,
    /// Scalar memory and messages (GFX12).
    Km,
}

impl WaitType {
    pub const COUNT: usize = 7;
    pub const ALL: [WaitType; WaitType::COUNT] = [
        WaitType::Exp,
        WaitType::Lgkm,
        WaitType::Vm,
        WaitType::Vs,
        WaitType::Sample,
        WaitType::Bvh,
        WaitType::Km,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Self {
        Self::ALL[idx]
    }

    pub fn name(self) -> &'static str {
        match self {
            WaitType::Exp => "exp",
            WaitType::Lgkm => "lgkm",
            WaitType::Vm => "vm",
            WaitType::Vs => "vs",
            WaitType::Sample => "sample",
            WaitType::Bvh => "bvh",
            WaitType::Km => "km",
        }
    }
}

/// A wait requirement: for every counter, the largest number of operations
/// that may still be outstanding, or [WaitImm::UNSET] when no wait is needed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct WaitImm {
    counters: [u8; WaitType::COUNT],
}

impl Default for WaitImm {
    fn default() -> Self {
        WaitImm {
            counters: [Self::UNSET; WaitType::COUNT],
        }
    }
}

impl ops::Index<WaitType> for WaitImm {
    type Output = u8;

    fn index(&self, ty: WaitType) -> &u8 {
        &self.counters[ty.index()]
    }
}

impl ops::IndexMut<WaitType> for WaitImm {
    fn index_mut(&mut self, ty: WaitType) -> &mut u8 {
        &mut self.counters[ty.index()]
    }
}

impl WaitImm {
    pub const UNSET: u8 = 0xff;

    /// Requirement that every counter in `types` drains completely.
    pub fn zero(types: impl IntoIterator<Item = WaitType>) -> Self {
        let mut imm = WaitImm::default();
        for ty in types {
            imm[ty] = 0;
        }
        imm
    }

    pub fn is_set(&self, ty: WaitType) -> bool {
        self[ty] != Self::UNSET
    }

    /// True when no counter needs to be waited on.
    pub fn empty(&self) -> bool {
        self.counters.iter().all(|c| *c == Self::UNSET)
    }

    /// Counters with a requirement and their thresholds.
    pub fn iter(&self) -> impl Iterator<Item = (WaitType, u8)> + '_ {
        WaitType::ALL
            .into_iter()
            .filter(|ty| self.is_set(*ty))
            .map(|ty| (ty, self[ty]))
    }

    /// Tighten every threshold to the stricter of the two. Returns whether
    /// anything changed.
    pub fn combine(&mut self, other: &WaitImm) -> bool {
        let mut changed = false;
        for (mine, theirs) in self.counters.iter_mut().zip(other.counters) {
            if theirs < *mine {
                *mine = theirs;
                changed = true;
            }
        }
        changed
    }

    /// All-ones field value of each counter on `gfx_level`. A counter whose
    /// maximum is zero does not exist on that generation.
    pub fn max(gfx_level: GfxLevel) -> Self {
        let mut imm = WaitImm {
            counters: [0; WaitType::COUNT],
        };
        imm[WaitType::Exp] = 7;
        imm[WaitType::Vm] = if gfx_level >= GfxLevel::Gfx9 { 63 } else { 15 };
        imm[WaitType::Lgkm] = if gfx_level >= GfxLevel::Gfx10 { 63 } else { 15 };
        imm[WaitType::Vs] = if gfx_level >= GfxLevel::Gfx10 { 63 } else { 0 };
        if gfx_level >= GfxLevel::Gfx12 {
            imm[WaitType::Sample] = 63;
            imm[WaitType::Bvh] = 7;
            imm[WaitType::Km] = 31;
        }
        imm
    }

    /// Encode the exp, lgkm and vm thresholds as an `s_waitcnt` immediate.
    pub fn pack(&self, gfx_level: GfxLevel) -> u16 {
        let vm = self[WaitType::Vm] as u16;
        let lgkm = self[WaitType::Lgkm] as u16;
        let exp = self[WaitType::Exp] as u16;
        assert!(
            exp == Self::UNSET as u16 || exp <= 0x7,
            "expcnt {exp} cannot be encoded"
        );

        let mut imm = if gfx_level >= GfxLevel::Gfx11 {
            assert!(
                vm == Self::UNSET as u16 || vm <= 0x3f,
                "vmcnt {vm} cannot be encoded"
            );
            assert!(
                lgkm == Self::UNSET as u16 || lgkm <= 0x3f,
                "lgkmcnt {lgkm} cannot be encoded"
            );
            ((vm & 0x3f) << 10) | ((lgkm & 0x3f) << 4) | (exp & 0x7)
        } else if gfx_level >= GfxLevel::Gfx10 {
            ((vm & 0x30) << 10)
                | ((lgkm & 0x3f) << 8)
                | ((exp & 0x7) << 4)
                | (vm & 0xf)
        } else if gfx_level >= GfxLevel::Gfx9 {
            ((vm & 0x30) << 10)
                | ((lgkm & 0xf) << 8)
                | ((exp & 0x7) << 4)
                | (vm & 0xf)
        } else {
            ((lgkm & 0xf) << 8) | ((exp & 0x7) << 4) | (vm & 0xf)
        };

        // Set the bits later generations use for the wider fields so the
        // immediate reads the same on every generation.
        if gfx_level < GfxLevel::Gfx9 && !self.is_set(WaitType::Vm) {
            imm |= 0xc000;
        }
        if gfx_level < GfxLevel::Gfx10 && !self.is_set(WaitType::Lgkm) {
            imm |= 0x3000;
        }
        imm
    }

    /// Decode an `s_waitcnt` immediate.
    pub fn from_packed(gfx_level: GfxLevel, packed: u16) -> Self {
        let (vm, lgkm, exp) = if gfx_level >= GfxLevel::Gfx11 {
            ((packed >> 10) & 0x3f, (packed >> 4) & 0x3f, packed & 0x7)
        } else {
            let mut vm = packed & 0xf;
            if gfx_level >= GfxLevel::Gfx9 {
                vm |= (packed >> 10) & 0x30;
            }
            let mut lgkm = (packed >> 8) & 0xf;
            if gfx_level >= GfxLevel::Gfx10 {
                lgkm |= (packed >> 8) & 0x30;
            }
            (vm, lgkm, (packed >> 4) & 0x7)
        };

        let max = WaitImm::max(gfx_level);
        let mut imm = WaitImm::default();
        for (ty, value) in [
            (WaitType::Vm, vm),
            (WaitType::Lgkm, lgkm),
            (WaitType::Exp, exp),
        ] {
            if value != max[ty] as u16 {
                imm[ty] = value as u8;
            }
        }
        imm
    }

    /// If `instr` is a wait instruction, fold its requirement into `self` and
    /// return true.
    pub fn unpack(&mut self, gfx_level: GfxLevel, instr: &Instruction) -> bool {
        if !instr.is_salu() {
            return false;
        }
        // Waits on a register value are not counter waits.
        if let Some(op) = instr.operands.first() {
            if !matches!(op, Operand::Reg { reg, .. } if *reg == PhysReg::SGPR_NULL)
            {
                return false;
            }
        }
        let Some(packed) = instr.imm() else {
            return false;
        };

        let single = |ty: WaitType| {
            let mut imm = WaitImm::default();
            imm[ty] = packed.min(Self::UNSET as u16) as u8;
            imm
        };
        let compound = |ty: WaitType| {
            let mut imm = WaitImm::default();
            let hi = (packed >> 8) & 0x3f;
            let ds = packed & 0x3f;
            if hi != 0x3f {
                imm[ty] = hi as u8;
            }
            if ds != 0x3f {
                imm[WaitType::Lgkm] = ds as u8;
            }
            imm
        };

        let imm = match instr.opcode {
            Opcode::SWaitcnt => WaitImm::from_packed(gfx_level, packed),
            Opcode::SWaitcntVscnt | Opcode::SWaitStorecnt => {
                single(WaitType::Vs)
            }
            Opcode::SWaitcntVmcnt | Opcode::SWaitLoadcnt => {
                single(WaitType::Vm)
            }
            Opcode::SWaitcntExpcnt | Opcode::SWaitExpcnt => {
                single(WaitType::Exp)
            }
            Opcode::SWaitcntLgkmcnt | Opcode::SWaitDscnt => {
                single(WaitType::Lgkm)
            }
            Opcode::SWaitSamplecnt => single(WaitType::Sample),
            Opcode::SWaitBvhcnt => single(WaitType::Bvh),
            Opcode::SWaitKmcnt => single(WaitType::Km),
            Opcode::SWaitLoadcntDscnt => compound(WaitType::Vm),
            Opcode::SWaitStorecntDscnt => compound(WaitType::Vs),
            _ => return false,
        };
        self.combine(&imm);
        true
    }
}

impl fmt::Debug for WaitImm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for WaitImm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.empty() {
            return write!(f, "{{}}");
        }
        let parts: Vec<_> = self
            .iter()
            .map(|(ty, value)| format!("{}:{value}", ty.name()))
            .collect();
        write!(f, "{{{}}}", parts.join(" "))
    }
}

/// Dependency codes of the `s_delay_alu` immediate. Each of the two 4-bit
/// condition fields holds one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u16)]
pub enum AluDelayWait {
    NoDep = 0,
    ValuDep1 = 1,
    ValuDep2 = 2,
    ValuDep3 = 3,
    ValuDep4 = 4,
    Trans32Dep1 = 5,
    Trans32Dep2 = 6,
    Trans32Dep3 = 7,
    FmaAccumCycle1 = 8,
    SaluCycle1 = 9,
    SaluCycle2 = 10,
    SaluCycle3 = 11,
}

impl AluDelayWait {
    pub fn from_code(code: u16) -> Option<Self> {
        use AluDelayWait::*;
        let wait = match code {
            0 => NoDep,
            1 => ValuDep1,
            2 => ValuDep2,
            3 => ValuDep3,
            4 => ValuDep4,
            5 => Trans32Dep1,
            6 => Trans32Dep2,
            7 => Trans32Dep3,
            8 => FmaAccumCycle1,
            9 => SaluCycle1,
            10 => SaluCycle2,
            11 => SaluCycle3,
            _ => return None,
        };
        Some(wait)
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Instruction, RegClass};

    #[test]
    fn combine_takes_minimum() {
        let mut a = WaitImm::default();
        a[WaitType::Vm] = 3;
        let mut b = WaitImm::default();
        b[WaitType::Vm] = 1;
        b[WaitType::Exp] = 0;
        assert!(a.combine(&b));
        assert_eq!(a[WaitType::Vm], 1);
        assert_eq!(a[WaitType::Exp], 0);
        assert!(!a.combine(&b));
        assert!(!a.combine(&WaitImm::default()));
    }

    #[test]
    fn packed_encodings() {
        let imm = WaitImm::zero([WaitType::Vm]);
        assert_eq!(imm.pack(GfxLevel::Gfx8), 0x3f70);
        assert_eq!(imm.pack(GfxLevel::Gfx9), 0x3f70);
        assert_eq!(imm.pack(GfxLevel::Gfx10), 0x3f70);
        assert_eq!(imm.pack(GfxLevel::Gfx11), 0x03f7);

        let imm = WaitImm::zero([WaitType::Lgkm]);
        assert_eq!(imm.pack(GfxLevel::Gfx10_3), 0xc07f);
        assert_eq!(imm.pack(GfxLevel::Gfx11), 0xfc07);
    }

    #[test]
    fn decode_matches_encode() {
        for gfx in [
            GfxLevel::Gfx6,
            GfxLevel::Gfx9,
            GfxLevel::Gfx10,
            GfxLevel::Gfx11,
        ] {
            let mut imm = WaitImm::default();
            imm[WaitType::Vm] = 2;
            imm[WaitType::Exp] = 1;
            assert_eq!(WaitImm::from_packed(gfx, imm.pack(gfx)), imm, "{gfx}");
            assert!(WaitImm::from_packed(gfx, WaitImm::default().pack(gfx))
                .empty());
        }
    }

    #[test]
    fn unpack_wait_instructions() {
        let mut imm = WaitImm::default();
        let vscnt = Instruction::sopk(
            Opcode::SWaitcntVscnt,
            Operand::reg(PhysReg::SGPR_NULL, RegClass::S1),
            4,
        );
        assert!(imm.unpack(GfxLevel::Gfx10, &vscnt));
        assert_eq!(imm[WaitType::Vs], 4);

        let mut imm = WaitImm::default();
        let compound = Instruction::sopp(Opcode::SWaitLoadcntDscnt, 0x023f);
        assert!(imm.unpack(GfxLevel::Gfx12, &compound));
        assert_eq!(imm[WaitType::Vm], 2);
        assert!(!imm.is_set(WaitType::Lgkm));

        let mut imm = WaitImm::default();
        assert!(!imm.unpack(GfxLevel::Gfx12, &Instruction::sopp(Opcode::SNop, 0)));
        let on_reg = Instruction::sopk(
            Opcode::SWaitcntVscnt,
            Operand::reg(PhysReg::sgpr(4), RegClass::S1),
            0,
        );
        assert!(!imm.unpack(GfxLevel::Gfx10, &on_reg));
    }
}
