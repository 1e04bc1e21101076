//! Implements a formatter for the in-memory representation of programs.
//! The output is assembly-like text meant for debugging and test
//! expectations.
use crate::{self as ir, Format, InstrInfo, Operand};
use itertools::Itertools;
use std::{fmt, io};

/// Printer for the IR.
pub struct Printer;

impl Printer {
    /// Formats and writes the whole program.
    pub fn write_program<F: io::Write>(
        prog: &ir::Program,
        f: &mut F,
    ) -> io::Result<()> {
        for block in prog.blocks.values() {
            Self::write_block(block, f)?;
        }
        Ok(())
    }

    /// Formats and writes a block header followed by its instructions.
    pub fn write_block<F: io::Write>(
        block: &ir::Block,
        f: &mut F,
    ) -> io::Result<()> {
        let preds = block.linear_preds.iter().map(|b| b.to_string()).join(", ");
        write!(f, "{}:", block.index)?;
        if !preds.is_empty() {
            write!(f, " /* preds: {preds} */")?;
        }
        writeln!(f)?;
        for instr in &block.instructions {
            writeln!(f, "  {}", Self::instruction_to_str(instr))?;
        }
        Ok(())
    }

    pub fn instruction_to_str(instr: &ir::Instruction) -> String {
        let defs = instr
            .definitions
            .iter()
            .map(|d| format!("{}:{}", d.reg, d.rc))
            .join(", ");
        let ops = instr
            .operands
            .iter()
            .map(Self::operand_to_str)
            .join(", ");
        let mut buf = if defs.is_empty() {
            instr.opcode.to_string()
        } else {
            format!("{} = {}", defs, instr.opcode)
        };
        if !ops.is_empty() {
            buf.push(' ');
            buf.push_str(&ops);
        }
        match instr.info {
            InstrInfo::Salu { imm }
                if imm != 0
                    || matches!(instr.format(), Format::Sopp | Format::Sopk) =>
            {
                buf.push_str(&format!(" imm:{imm:#x}"))
            }
            InstrInfo::Ds { gds: true, .. } => buf.push_str(" gds"),
            InstrInfo::Export { dest, done, .. } => {
                buf.push_str(&format!(" dest:{dest}"));
                if done {
                    buf.push_str(" done");
                }
            }
            InstrInfo::Barrier { sync } => buf.push_str(&format!(" {sync}")),
            InstrInfo::VinterpInreg { wait_exp } if wait_exp < 7 => {
                buf.push_str(&format!(" wait_exp:{wait_exp}"))
            }
            _ => (),
        }
        buf
    }

    pub fn operand_to_str(op: &Operand) -> String {
        match op {
            Operand::Reg { reg, rc } => format!("{reg}:{rc}"),
            Operand::Constant(c) => format!("{c:#x}"),
            Operand::Undef => "undef".to_string(),
        }
    }
}

impl fmt::Display for ir::Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::instruction_to_str(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BlockKind, Builder, Definition, Opcode, PhysReg, Program, RegClass,
    };

    #[test]
    fn prints_program() {
        let mut prog = Program::new();
        let b0 = prog.add_block(BlockKind::TOP_LEVEL);
        let mut bld = Builder::for_block(prog.block_mut(b0));
        bld.load(
            Opcode::GlobalLoadDword,
            Definition::new(PhysReg::vgpr(0), RegClass::V1),
            [Operand::reg(PhysReg::vgpr(2), RegClass::V2)],
        );
        bld.sopp(Opcode::SWaitcnt, 0x3f70);

        let mut out = Vec::new();
        Printer::write_program(&prog, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "BB0:\n  v0:v1 = global_load_dword v2:v2\n  s_waitcnt imm:0x3f70\n"
        );
    }
}
