//! Waits required before issuing an instruction, and the state once they are
//! satisfied.
use super::wait_gen::{vmem_event, vmem_type};
use super::{AluDelayInfo, Counters, WaitCtx, WaitEvent};
use waitcnt_ir::{
    GfxLevel, InstrInfo, Instruction, MemorySyncInfo, Opcode, Semantics,
    StorageClass, SyncScope, WaitImm, WaitType, SENDMSG_ORDERED_PS_DONE,
    STORAGE_COUNT,
};

/// Index of the GDS entry in the barrier table.
fn gds_storage() -> usize {
    StorageClass::GDS.bits().trailing_zeros() as usize
}

/// For `ds_ordered_count`, whether it is the release form (bit 0 of the
/// combined offset) rather than the acquire form.
fn ordered_count_release(instr: &Instruction) -> Option<bool> {
    match instr.info {
        InstrInfo::Ds {
            offset0, offset1, ..
        } if instr.opcode == Opcode::DsOrderedCount => {
            Some((offset1 as u16 | (offset0 >> 8)) & 0x1 != 0)
        }
        _ => None,
    }
}

impl WaitCtx<'_> {
    /// Drop the requirements on counters with nothing in flight.
    pub fn drop_idle_counters(&self, imm: &mut WaitImm) {
        for ty in WaitType::ALL {
            if !self.nonzero.contains(Counters::of(ty)) {
                imm[ty] = WaitImm::UNSET;
            }
        }
    }

    /// Requirement that every outstanding counter drains.
    pub fn force_waitcnt(&self, imm: &mut WaitImm) {
        for ty in self.nonzero.wait_types() {
            imm[ty] = 0;
        }
    }

    /// Fold the waits guarding the registers of `instr` into `wait` and
    /// `delay`.
    pub fn check_instr(
        &self,
        wait: &mut WaitImm,
        delay: &mut AluDelayInfo,
        instr: &Instruction,
    ) {
        let info = self.info;
        for op in &instr.operands {
            for reg in op.regs() {
                let Some(entry) = self.gpr_map.get(reg) else {
                    continue;
                };
                if !entry.wait_on_read {
                    continue;
                }
                wait.combine(&entry.imm);
                if instr.is_valu() || instr.is_salu() {
                    delay.combine(&entry.delay);
                }
            }
        }

        let vmem_ty = vmem_type(instr);
        for def in &instr.definitions {
            for reg in def.regs() {
                let Some(entry) = self.gpr_map.get(reg) else {
                    continue;
                };
                let mut reg_imm = entry.imm;

                // Vector memory accesses of one kind return in issue order.
                if !vmem_ty.is_empty() {
                    let event = vmem_event(self.gfx_level(), instr, vmem_ty);
                    let ty = info
                        .get_counters_for_event(event)
                        .first_wait_type();
                    if let Some(ty) = ty {
                        if (entry.events & info.events_for(ty)) == event
                            && (ty != WaitType::Vm
                                || entry.vmem_types == vmem_ty)
                        {
                            reg_imm[ty] = WaitImm::UNSET;
                        }
                    }
                }

                // So do LDS accesses, and GDS accesses.
                if instr.is_ds() {
                    let event = if instr.is_gds() {
                        WaitEvent::GDS
                    } else {
                        WaitEvent::LDS
                    };
                    if (entry.events & info.events_for(WaitType::Lgkm)) == event
                    {
                        reg_imm[WaitType::Lgkm] = WaitImm::UNSET;
                    }
                }

                wait.combine(&reg_imm);
            }
        }
    }

    /// Pull the barrier state of the storage classes `sync` synchronizes
    /// with into `imm`, if `sync` has any of `semantics` at a scope wider
    /// than a single wave.
    pub fn perform_barrier(
        &self,
        imm: &mut WaitImm,
        sync: MemorySyncInfo,
        semantics: Semantics,
    ) {
        let config = &self.info.config;
        let subgroup_scope = if config.workgroup_size <= config.wave_size {
            SyncScope::Workgroup
        } else {
            SyncScope::Subgroup
        };
        if !sync.semantics.intersects(semantics) || sync.scope <= subgroup_scope
        {
            return;
        }

        for idx in sync.storage.indices() {
            let mut events = self.barrier_events[idx];

            // LDS is private to the workgroup.
            let bar_scope_lds = sync.scope.min(SyncScope::Workgroup);
            if bar_scope_lds <= subgroup_scope {
                events.remove(WaitEvent::LDS);
            }

            // Outside of WGP mode the L0 cache keeps the memory operations
            // of a workgroup in order.
            if !config.wgp_mode && sync.scope <= SyncScope::Workgroup {
                events.remove(
                    WaitEvent::VMEM | WaitEvent::VMEM_STORE | WaitEvent::SMEM,
                );
            }

            if !events.is_empty() {
                imm.combine(&self.barrier_imm[idx]);
            }
        }
    }

    /// Compute the waits `instr` needs before it issues, fold them into
    /// `imm` and `delay`, and advance the state as if they were satisfied.
    ///
    /// `imm` and `delay` hold the waits already queued in front of `instr`;
    /// the state is advanced by the combined requirement.
    pub fn kill(
        &mut self,
        imm: &mut WaitImm,
        delay: &mut AluDelayInfo,
        instr: &Instruction,
        sync: MemorySyncInfo,
    ) {
        let gfx_level = self.gfx_level();
        let mut wait = WaitImm::default();

        // Also before jumping to a shader epilog.
        if instr.opcode == Opcode::SSetpcB64 || self.settings.force_waitcnt {
            self.force_waitcnt(&mut wait);
        }

        // POPS coherent accesses must reach L2 before the overlapped waves
        // enter the ordered section.
        let leaves_ordered_section = if gfx_level >= GfxLevel::Gfx11 {
            matches!(instr.info, InstrInfo::Export { done: true, .. })
        } else {
            instr.opcode == Opcode::SSendmsg
                && instr.imm() == Some(SENDMSG_ORDERED_PS_DONE)
        };
        if self.info.config.errata.pops_overlapped_waves_wait
            && leaves_ordered_section
        {
            let mut c = Counters::VM | Counters::VS;
            if self.settings.has_smem_buffer_or_global_loads {
                c |= Counters::LGKM;
            }
            for ty in (c & self.nonzero).wait_types() {
                wait[ty] = 0;
            }
        }

        self.check_instr(&mut wait, delay, instr);

        // Scalar stores must complete before the cache is written back.
        if instr.opcode == Opcode::SDcacheWb {
            wait[WaitType::Lgkm] = 0;
        }

        // A scalar load after a scalar store to the same address returns
        // stale data unless the store completed first.
        if self.info.config.errata.smem_store_load_hazard
            && gfx_level >= GfxLevel::Gfx10
            && instr.is_smem()
            && self.pending_s_buffer_store
            && !instr.definitions.is_empty()
            && !instr.sync().can_reorder()
        {
            wait[WaitType::Lgkm] = 0;
        }

        if ordered_count_release(instr) == Some(true) {
            wait.combine(&self.barrier_imm[gds_storage()]);
        }

        if instr.opcode == Opcode::PBarrier {
            self.perform_barrier(&mut wait, instr.sync(), Semantics::ACQREL);
        } else {
            self.perform_barrier(&mut wait, sync, Semantics::RELEASE);
        }

        self.drop_idle_counters(&mut wait);
        imm.combine(&wait);

        if !imm.empty() || !delay.empty() {
            if self.pending_flat_vm && imm.is_set(WaitType::Vm) {
                imm[WaitType::Vm] = 0;
            }
            if self.pending_flat_lgkm && imm.is_set(WaitType::Lgkm) {
                imm[WaitType::Lgkm] = 0;
            }
            self.apply_wait(imm, delay);
        }

        if imm[WaitType::Vm] == 0 {
            self.pending_flat_vm = false;
        }
        if imm[WaitType::Lgkm] == 0 {
            self.pending_flat_lgkm = false;
            self.pending_s_buffer_store = false;
        }
    }

    /// Advance the state past a wait for `imm` and `delay`.
    fn apply_wait(&mut self, imm: &WaitImm, delay: &AluDelayInfo) {
        let info = self.info;

        for ty in WaitType::ALL {
            if imm[ty] == 0 {
                self.nonzero.remove(Counters::of(ty));
            }
        }

        for i in 0..STORAGE_COUNT {
            let bar = &mut self.barrier_imm[i];
            let bar_ev = &mut self.barrier_events[i];
            for ty in WaitType::ALL {
                if bar.is_set(ty) && imm[ty] <= bar[ty] {
                    bar[ty] = WaitImm::UNSET;
                    *bar_ev &= info.events_for(ty).complement() | WaitEvent::FLAT;
                }
            }
            if !bar.is_set(WaitType::Vm) && !bar.is_set(WaitType::Lgkm) {
                bar_ev.remove(WaitEvent::FLAT);
            }
        }

        if self.gfx_level() >= GfxLevel::Gfx11 {
            self.update_alu(false, false, false, delay.max_cycles());
        }

        self.gpr_map.retain(|_, entry| {
            for ty in WaitType::ALL {
                if imm.is_set(ty) && imm[ty] <= entry.imm[ty] {
                    entry.remove_wait(ty, info.events_for(ty));
                }
            }
            if delay.valu_instrs <= entry.delay.valu_instrs {
                entry.delay.valu_instrs = AluDelayInfo::VALU_NOP;
            }
            if delay.trans_instrs <= entry.delay.trans_instrs {
                entry.delay.trans_instrs = AluDelayInfo::TRANS_NOP;
            }
            entry.delay.fixup();
            if entry.delay.empty() {
                entry.remove_alu_counter();
            }
            !entry.is_done()
        });
    }

    /// Waits that become due once `instr` has issued: acquire semantics and
    /// the acquire form of `ds_ordered_count`.
    pub fn after_issue(&self, imm: &mut WaitImm, instr: &Instruction) {
        let mut wait = WaitImm::default();
        self.perform_barrier(&mut wait, instr.sync(), Semantics::ACQUIRE);
        if ordered_count_release(instr) == Some(false) {
            wait.combine(&self.barrier_imm[gds_storage()]);
        }
        self.drop_idle_counters(&mut wait);
        imm.combine(&wait);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{TargetInfo, WaitSettings};
    use waitcnt_ir::{
        Builder, Definition, Operand, PhysReg, RegClass, TargetConfig,
    };

    fn info(gfx: GfxLevel) -> TargetInfo {
        TargetInfo::new(&TargetConfig::new(gfx))
    }

    fn global_load(dst: u16) -> Instruction {
        Instruction::new(Opcode::GlobalLoadDword)
            .with_operands([Operand::reg(PhysReg::vgpr(20), RegClass::V2)])
            .with_definitions([Definition::new(
                PhysReg::vgpr(dst),
                RegClass::V1,
            )])
    }

    fn use_of(src: u16) -> Instruction {
        Instruction::new(Opcode::VAddF32)
            .with_operands([Operand::reg(PhysReg::vgpr(src), RegClass::V1)])
            .with_definitions([Definition::new(
                PhysReg::vgpr(40),
                RegClass::V1,
            )])
    }

    fn kill(ctx: &mut WaitCtx, instr: &Instruction) -> WaitImm {
        let mut imm = WaitImm::default();
        let mut delay = AluDelayInfo::default();
        ctx.kill(&mut imm, &mut delay, instr, instr.sync());
        imm
    }

    #[test]
    fn waits_for_the_oldest_needed_load() {
        let info = info(GfxLevel::Gfx10_3);
        let mut ctx = WaitCtx::new(&info, WaitSettings::default());
        for r in 0..3 {
            ctx.gen(&global_load(r));
        }
        let imm = kill(&mut ctx, &use_of(1));
        assert_eq!(imm[WaitType::Vm], 1);
        // v0 and v1 are done, v2 is still in flight.
        assert!(!ctx.gpr_map.contains_key(PhysReg::vgpr(0)));
        assert!(!ctx.gpr_map.contains_key(PhysReg::vgpr(1)));
        assert!(ctx.gpr_map.contains_key(PhysReg::vgpr(2)));
        assert!(ctx.nonzero.contains(Counters::VM));

        let imm = kill(&mut ctx, &use_of(2));
        assert_eq!(imm[WaitType::Vm], 0);
        assert!(ctx.gpr_map.is_empty());
        assert!(ctx.nonzero.is_empty());
        assert!(kill(&mut ctx, &use_of(2)).empty());
    }

    #[test]
    fn overwriting_in_order_load_needs_no_wait() {
        let info = info(GfxLevel::Gfx10_3);
        let mut ctx = WaitCtx::new(&info, WaitSettings::default());
        ctx.gen(&global_load(0));
        assert!(kill(&mut ctx, &global_load(0)).empty());

        // A VALU write of the same register has to wait.
        let overwrite = Instruction::new(Opcode::VMovB32)
            .with_operands([Operand::Constant(0)])
            .with_definitions([Definition::new(PhysReg::vgpr(0), RegClass::V1)]);
        assert_eq!(kill(&mut ctx, &overwrite)[WaitType::Vm], 0);
    }

    #[test]
    fn queued_waits_are_not_repeated() {
        let info = info(GfxLevel::Gfx10_3);
        let mut ctx = WaitCtx::new(&info, WaitSettings::default());
        ctx.gen(&global_load(0));
        // A wait that was requested explicitly.
        let mut imm = WaitImm::zero([WaitType::Vm, WaitType::Lgkm]);
        ctx.drop_idle_counters(&mut imm);
        assert_eq!(imm, WaitImm::zero([WaitType::Vm]));
        let mut delay = AluDelayInfo::default();
        ctx.kill(&mut imm, &mut delay, &use_of(0), MemorySyncInfo::default());
        assert!(ctx.nonzero.is_empty());

        let mut again = WaitImm::zero([WaitType::Vm]);
        ctx.drop_idle_counters(&mut again);
        assert!(again.empty());
    }

    #[test]
    fn setpc_forces_everything() {
        let info = info(GfxLevel::Gfx10_3);
        let mut ctx = WaitCtx::new(&info, WaitSettings::default());
        ctx.gen(&global_load(0));
        let mut instrs = Vec::new();
        Builder::new(&mut instrs).store(
            Opcode::GlobalStoreDword,
            [
                Operand::reg(PhysReg::vgpr(20), RegClass::V2),
                Operand::reg(PhysReg::vgpr(3), RegClass::V1),
            ],
        );
        ctx.gen(&instrs[0]);
        let setpc = Instruction::new(Opcode::SSetpcB64)
            .with_operands([Operand::reg(PhysReg::sgpr(0), RegClass::S2)]);
        let imm = kill(&mut ctx, &setpc);
        assert_eq!(imm, WaitImm::zero([WaitType::Vm, WaitType::Vs]));
    }

    #[test]
    fn release_barrier_waits_for_shared_memory() {
        let info = info(GfxLevel::Gfx10_3);
        let mut ctx = WaitCtx::new(&info, WaitSettings::default());
        let shared = MemorySyncInfo::storage(StorageClass::SHARED);
        let ds_write = Instruction::new(Opcode::DsWriteB32)
            .with_operands([
                Operand::reg(PhysReg::vgpr(0), RegClass::V1),
                Operand::reg(PhysReg::vgpr(1), RegClass::V1),
            ])
            .with_sync(shared);
        ctx.gen(&ds_write);

        // Workgroup-wide barrier on a workgroup larger than a wave.
        let info = TargetInfo::new(
            &TargetConfig::new(GfxLevel::Gfx10_3).with_workgroup_size(256),
        );
        let mut wide = WaitCtx::new(&info, WaitSettings::default());
        wide.gen(&ds_write);
        let barrier = Instruction::new(Opcode::PBarrier).with_sync(
            MemorySyncInfo::new(
                StorageClass::SHARED,
                Semantics::ACQREL,
                SyncScope::Workgroup,
            ),
        );
        assert_eq!(kill(&mut wide, &barrier)[WaitType::Lgkm], 0);
        assert!(wide.barrier_imm[3].empty());

        // With a single wave per workgroup LDS is already coherent.
        assert!(kill(&mut ctx, &barrier).empty());
    }

    #[test]
    fn smem_store_load_erratum() {
        let info = info(GfxLevel::Gfx10_3);
        let mut ctx = WaitCtx::new(&info, WaitSettings::default());
        let buffer = MemorySyncInfo::storage(StorageClass::BUFFER);
        let store = Instruction::new(Opcode::SBufferStoreDword)
            .with_operands([
                Operand::reg(PhysReg::sgpr(0), RegClass::S4),
                Operand::reg(PhysReg::sgpr(8), RegClass::S1),
            ])
            .with_sync(buffer);
        ctx.gen(&store);
        assert!(ctx.pending_s_buffer_store);
        let load = Instruction::new(Opcode::SBufferLoadDword)
            .with_operands([Operand::reg(PhysReg::sgpr(0), RegClass::S4)])
            .with_definitions([Definition::new(
                PhysReg::sgpr(9),
                RegClass::S1,
            )])
            .with_sync(buffer);
        assert_eq!(kill(&mut ctx, &load)[WaitType::Lgkm], 0);
        assert!(!ctx.pending_s_buffer_store);
    }
}
