//! Lowering of queued waits to instructions.
use crate::analysis::{AluDelayInfo, TargetInfo};
use waitcnt_ir::{
    AluDelayWait, Builder, GfxLevel, Instruction, Opcode, Operand, PhysReg,
    RegClass, WaitImm, WaitType,
};
use waitcnt_utils::fits_in_bits;

/// Append the instructions waiting for `imm` to `out` and reset `imm`.
///
/// Thresholds the target cannot encode are lowered to 0.
pub fn emit_waitcnt(
    info: &TargetInfo,
    out: &mut Vec<Instruction>,
    imm: &mut WaitImm,
) {
    let mut imm = std::mem::take(imm);
    for ty in WaitType::ALL {
        if imm.is_set(ty) && imm[ty] > info.max_cnt[ty] {
            log::warn!(
                "{} threshold {} exceeds the maximum of {}, waiting for 0",
                ty.name(),
                imm[ty],
                info.max_cnt[ty]
            );
            imm[ty] = 0;
        }
    }

    let gfx_level = info.gfx_level();
    let mut bld = Builder::new(out);
    if gfx_level >= GfxLevel::Gfx12 {
        for (paired, op) in [
            (WaitType::Vm, Opcode::SWaitLoadcntDscnt),
            (WaitType::Vs, Opcode::SWaitStorecntDscnt),
        ] {
            if imm.is_set(paired) && imm.is_set(WaitType::Lgkm) {
                let packed =
                    ((imm[paired] as u16) << 8) | imm[WaitType::Lgkm] as u16;
                bld.sopp(op, packed);
                imm[paired] = WaitImm::UNSET;
                imm[WaitType::Lgkm] = WaitImm::UNSET;
            }
        }

        for (ty, value) in imm.iter() {
            let op = match ty {
                WaitType::Exp => Opcode::SWaitExpcnt,
                WaitType::Lgkm => Opcode::SWaitDscnt,
                WaitType::Vm => Opcode::SWaitLoadcnt,
                WaitType::Vs => Opcode::SWaitStorecnt,
                WaitType::Sample => Opcode::SWaitSamplecnt,
                WaitType::Bvh => Opcode::SWaitBvhcnt,
                WaitType::Km => Opcode::SWaitKmcnt,
            };
            bld.sopp(op, value as u16);
        }
    } else {
        if imm.is_set(WaitType::Vs) {
            assert!(
                gfx_level >= GfxLevel::Gfx10,
                "vscnt does not exist on {gfx_level}"
            );
            bld.sopk(
                Opcode::SWaitcntVscnt,
                Operand::reg(PhysReg::SGPR_NULL, RegClass::S1),
                imm[WaitType::Vs] as u16,
            );
            imm[WaitType::Vs] = WaitImm::UNSET;
        }
        if !imm.empty() {
            bld.sopp(Opcode::SWaitcnt, imm.pack(gfx_level));
        }
    }
}

/// Append an `s_delay_alu` for `delay` to `out` and reset `delay`.
///
/// The instruction holds at most two conditions. With a transcendental and
/// a VALU dependency the SALU one is dropped, which costs a stall at worst.
pub fn emit_delay_alu(out: &mut Vec<Instruction>, delay: &mut AluDelayInfo) {
    let delay = std::mem::take(delay);
    let mut imm: u16 = 0;
    if delay.trans_instrs != AluDelayInfo::TRANS_NOP {
        imm |= (AluDelayWait::Trans32Dep1.code() as i32
            + delay.trans_instrs as i32
            - 1) as u16;
    }
    if delay.valu_instrs != AluDelayInfo::VALU_NOP {
        let code = (AluDelayWait::ValuDep1.code() as i32
            + delay.valu_instrs as i32
            - 1) as u16;
        imm |= code << if imm != 0 { 7 } else { 0 };
    }
    if delay.salu_cycles != 0 && fits_in_bits(imm as u64, 4) {
        let cycles = delay.salu_cycles.min(3) as u16;
        let code = AluDelayWait::SaluCycle1.code() + cycles - 1;
        imm |= code << if imm != 0 { 7 } else { 0 };
    }

    let mut instr = Instruction::sopp(Opcode::SDelayAlu, imm);
    instr.pass_flags = delay.valu_cycles as u8 as u32
        | ((delay.trans_cycles as u8 as u32) << 16);
    out.push(instr);
}
