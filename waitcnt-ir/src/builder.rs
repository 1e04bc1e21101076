//! IR builder. Appends instructions to an instruction list.
use crate::{
    Block, Definition, InstrInfo, Instruction, MemorySyncInfo, Opcode, Operand,
};

/// Appends instructions to the end of a block or instruction list.
pub struct Builder<'a> {
    instructions: &'a mut Vec<Instruction>,
}

impl<'a> Builder<'a> {
    pub fn new(instructions: &'a mut Vec<Instruction>) -> Self {
        Builder { instructions }
    }

    pub fn for_block(block: &'a mut Block) -> Self {
        Builder::new(&mut block.instructions)
    }

    /// Append `instr` and return a reference to it for further tweaking.
    pub fn insert(&mut self, instr: Instruction) -> &mut Instruction {
        self.instructions.push(instr);
        let last = self.instructions.len() - 1;
        &mut self.instructions[last]
    }

    pub fn sopp(&mut self, opcode: Opcode, imm: u16) -> &mut Instruction {
        self.insert(Instruction::sopp(opcode, imm))
    }

    pub fn sopk(
        &mut self,
        opcode: Opcode,
        op: Operand,
        imm: u16,
    ) -> &mut Instruction {
        self.insert(Instruction::sopk(opcode, op, imm))
    }

    /// A memory instruction writing `dst`.
    pub fn load(
        &mut self,
        opcode: Opcode,
        dst: Definition,
        operands: impl IntoIterator<Item = Operand>,
    ) -> &mut Instruction {
        self.insert(
            Instruction::new(opcode)
                .with_definitions([dst])
                .with_operands(operands),
        )
    }

    /// A memory instruction without results.
    pub fn store(
        &mut self,
        opcode: Opcode,
        operands: impl IntoIterator<Item = Operand>,
    ) -> &mut Instruction {
        self.insert(Instruction::new(opcode).with_operands(operands))
    }

    /// A scalar or vector ALU instruction.
    pub fn alu(
        &mut self,
        opcode: Opcode,
        dst: Definition,
        operands: impl IntoIterator<Item = Operand>,
    ) -> &mut Instruction {
        self.load(opcode, dst, operands)
    }

    /// Export of every operand to target `dest`.
    pub fn exp(
        &mut self,
        dest: u8,
        operands: impl IntoIterator<Item = Operand>,
        done: bool,
    ) -> &mut Instruction {
        let instr = Instruction::new(Opcode::Exp).with_operands(operands);
        let enabled_mask = ((1u16 << instr.operands.len()) - 1) as u8;
        self.insert(instr.with_info(InstrInfo::Export {
            dest,
            enabled_mask,
            compressed: false,
            done,
        }))
    }

    pub fn barrier(&mut self, sync: MemorySyncInfo) -> &mut Instruction {
        self.insert(Instruction::new(Opcode::PBarrier).with_sync(sync))
    }
}
