//! Instructions and their operands.
use crate::{
    Format, InstrClass, MemorySyncInfo, Opcode, PhysReg, RegClass,
};
use smallvec::SmallVec;

#[cfg(feature = "serialize")]
use serde::Serialize;

/// `s_sendmsg` message id signalling the end of the ordered section of an
/// overlapped pixel shader.
pub const SENDMSG_ORDERED_PS_DONE: u16 = 3;

/// A source operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub enum Operand {
    Reg { reg: PhysReg, rc: RegClass },
    Constant(u32),
    Undef,
}

impl Operand {
    pub fn reg(reg: PhysReg, rc: RegClass) -> Self {
        Operand::Reg { reg, rc }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Operand::Constant(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Operand::Undef)
    }

    pub fn phys_reg(&self) -> Option<PhysReg> {
        match self {
            Operand::Reg { reg, .. } => Some(*reg),
            _ => None,
        }
    }

    pub fn reg_class(&self) -> Option<RegClass> {
        match self {
            Operand::Reg { rc, .. } => Some(*rc),
            _ => None,
        }
    }

    /// Size in bytes. Constants are one dword.
    pub fn bytes(&self) -> u16 {
        match self {
            Operand::Reg { rc, .. } => rc.bytes(),
            Operand::Constant(_) => 4,
            Operand::Undef => 0,
        }
    }

    /// Every register slot read by this operand.
    pub fn regs(&self) -> impl Iterator<Item = PhysReg> {
        let (reg, size) = match self {
            Operand::Reg { reg, rc } => (*reg, rc.size()),
            _ => (PhysReg(0), 0),
        };
        (0..size).map(move |i| reg.advance(i))
    }
}

/// A destination register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Definition {
    pub reg: PhysReg,
    pub rc: RegClass,
}

impl Definition {
    pub fn new(reg: PhysReg, rc: RegClass) -> Self {
        Definition { reg, rc }
    }

    pub fn size(&self) -> u16 {
        self.rc.size()
    }

    /// Every register slot written by this definition.
    pub fn regs(&self) -> impl Iterator<Item = PhysReg> {
        let reg = self.reg;
        (0..self.size()).map(move |i| reg.advance(i))
    }
}

/// Format-specific payload of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub enum InstrInfo {
    /// Scalar ALU instructions with a 16-bit immediate.
    Salu { imm: u16 },
    /// Scalar, vector and LDS-direct memory accesses.
    Mem { sync: MemorySyncInfo },
    Ds {
        sync: MemorySyncInfo,
        gds: bool,
        offset0: u16,
        offset1: u8,
    },
    Export {
        /// Export target: 0-7 MRTs, 9 null, 12-15 positions, 32+ parameters.
        dest: u8,
        enabled_mask: u8,
        compressed: bool,
        done: bool,
    },
    Barrier { sync: MemorySyncInfo },
    VinterpInreg { wait_exp: u8 },
    None,
}

impl InstrInfo {
    fn for_format(format: Format) -> Self {
        match format {
            f if f.is_salu() => InstrInfo::Salu { imm: 0 },
            Format::Smem
            | Format::Ldsdir
            | Format::Mubuf
            | Format::Mtbuf
            | Format::Mimg
            | Format::Flat
            | Format::Global
            | Format::Scratch => InstrInfo::Mem {
                sync: MemorySyncInfo::default(),
            },
            Format::Ds => InstrInfo::Ds {
                sync: MemorySyncInfo::default(),
                gds: false,
                offset0: 0,
                offset1: 0,
            },
            Format::Exp => InstrInfo::Export {
                dest: 0,
                enabled_mask: 0,
                compressed: false,
                done: false,
            },
            Format::PseudoBarrier => InstrInfo::Barrier {
                sync: MemorySyncInfo::default(),
            },
            Format::VinterpInreg => InstrInfo::VinterpInreg { wait_exp: 7 },
            _ => InstrInfo::None,
        }
    }
}

/// A register-allocated machine instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: SmallVec<[Operand; 4]>,
    pub definitions: SmallVec<[Definition; 2]>,
    pub info: InstrInfo,
    /// Scratch space owned by the pass currently running. `s_delay_alu`
    /// carries the outstanding VALU cycles in the low half and the
    /// transcendental cycles in the high half.
    pub pass_flags: u32,
}

impl Instruction {
    /// Instruction without operands and with the default payload of its
    /// format.
    pub fn new(opcode: Opcode) -> Self {
        Instruction {
            opcode,
            operands: SmallVec::new(),
            definitions: SmallVec::new(),
            info: InstrInfo::for_format(opcode.format()),
            pass_flags: 0,
        }
    }

    pub fn sopp(opcode: Opcode, imm: u16) -> Self {
        Instruction::new(opcode).with_imm(imm)
    }

    pub fn sopk(opcode: Opcode, op: Operand, imm: u16) -> Self {
        Instruction::new(opcode).with_operands([op]).with_imm(imm)
    }

    pub fn with_operands(
        mut self,
        operands: impl IntoIterator<Item = Operand>,
    ) -> Self {
        self.operands.extend(operands);
        self
    }

    pub fn with_definitions(
        mut self,
        definitions: impl IntoIterator<Item = Definition>,
    ) -> Self {
        self.definitions.extend(definitions);
        self
    }

    pub fn with_info(mut self, info: InstrInfo) -> Self {
        self.info = info;
        self
    }

    /// Replace the immediate of a scalar ALU instruction.
    pub fn with_imm(mut self, imm: u16) -> Self {
        assert!(
            matches!(self.info, InstrInfo::Salu { .. }),
            "{} has no immediate",
            self.opcode
        );
        self.info = InstrInfo::Salu { imm };
        self
    }

    pub fn with_sync(mut self, sync: MemorySyncInfo) -> Self {
        self.set_sync(sync);
        self
    }

    /// Replace the synchronization info of a memory instruction or barrier.
    pub fn set_sync(&mut self, new_sync: MemorySyncInfo) {
        match &mut self.info {
            InstrInfo::Mem { sync }
            | InstrInfo::Ds { sync, .. }
            | InstrInfo::Barrier { sync } => *sync = new_sync,
            _ => panic!("{} has no memory synchronization info", self.opcode),
        }
    }

    pub fn format(&self) -> Format {
        self.opcode.format()
    }

    /// Immediate of a scalar ALU instruction.
    pub fn imm(&self) -> Option<u16> {
        match self.info {
            InstrInfo::Salu { imm } => Some(imm),
            _ => None,
        }
    }

    pub fn imm_mut(&mut self) -> Option<&mut u16> {
        match &mut self.info {
            InstrInfo::Salu { imm } => Some(imm),
            _ => None,
        }
    }

    /// Memory synchronization info, or the default (reorderable, no storage)
    /// for instructions that carry none.
    pub fn sync(&self) -> MemorySyncInfo {
        match self.info {
            InstrInfo::Mem { sync }
            | InstrInfo::Ds { sync, .. }
            | InstrInfo::Barrier { sync } => sync,
            _ => MemorySyncInfo::default(),
        }
    }

    pub fn is_salu(&self) -> bool {
        self.format().is_salu()
    }

    pub fn is_valu(&self) -> bool {
        self.format().is_valu()
    }

    pub fn is_trans(&self) -> bool {
        self.opcode.class() == InstrClass::Trans
    }

    pub fn is_wmma(&self) -> bool {
        self.opcode.class() == InstrClass::Wmma
    }

    pub fn is_smem(&self) -> bool {
        self.format() == Format::Smem
    }

    pub fn is_ds(&self) -> bool {
        self.format() == Format::Ds
    }

    pub fn is_gds(&self) -> bool {
        matches!(self.info, InstrInfo::Ds { gds: true, .. })
    }

    pub fn is_exp(&self) -> bool {
        self.format() == Format::Exp
    }

    pub fn is_mimg(&self) -> bool {
        self.format() == Format::Mimg
    }

    /// Buffer and image memory.
    pub fn is_vmem(&self) -> bool {
        self.format().is_vmem()
    }

    pub fn is_flat_like(&self) -> bool {
        self.format().is_flat_like()
    }

    pub fn is_barrier(&self) -> bool {
        self.format() == Format::PseudoBarrier
    }

    pub fn accesses_lds(&self) -> bool {
        (self.is_ds() && !self.is_gds()) || self.format() == Format::Ldsdir
    }

    /// Whether `a` and `b` are likely to access nearby memory and should be
    /// issued back to back without an intervening wait.
    pub fn should_form_clause(a: &Instruction, b: &Instruction) -> bool {
        if a.definitions.is_empty() != b.definitions.is_empty() {
            return false;
        }
        if a.format() != b.format() {
            return false;
        }
        let (Some(a_op), Some(b_op)) = (a.operands.first(), b.operands.first())
        else {
            return false;
        };

        // Accesses without descriptors might be to similar addresses.
        if a.is_flat_like() || a.accesses_lds() {
            return true;
        }
        if a.is_smem() && a_op.bytes() == 8 && b_op.bytes() == 8 {
            return true;
        }
        // Same descriptor, maybe similar addresses.
        if a.is_vmem() || a.is_smem() {
            return a_op == b_op;
        }
        a.is_exp() && b.is_exp()
    }
}
