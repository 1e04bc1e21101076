//! Effects of issuing an instruction on the wait state.
use super::{AluDelayInfo, Counters, VmemType, WaitCtx, WaitEntry, WaitEvent};
use waitcnt_ir::{
    self as ir, Definition, Format, GfxLevel, Instruction, MemorySyncInfo,
    Opcode, Operand, PhysReg, RegClass, Semantics, WaitImm, WaitType,
    STORAGE_COUNT,
};

/// Kind of vector memory access of `instr`, or empty for anything that does
/// not count on `vm`. Image instructions take the sampler descriptor as
/// their second operand.
pub fn vmem_type(instr: &Instruction) -> VmemType {
    if instr.opcode == Opcode::ImageBvh64IntersectRay {
        VmemType::BVH
    } else if instr.is_mimg()
        && instr
            .operands
            .get(1)
            .and_then(Operand::reg_class)
            .is_some_and(|rc| rc == RegClass::S4)
    {
        VmemType::SAMPLER
    } else if instr.is_vmem()
        || matches!(instr.format(), Format::Global | Format::Scratch)
    {
        VmemType::NOSAMPLER
    } else {
        VmemType::empty()
    }
}

/// The event a vector memory access of kind `ty` produces.
pub fn vmem_event(
    gfx_level: GfxLevel,
    instr: &Instruction,
    ty: VmemType,
) -> WaitEvent {
    if instr.definitions.is_empty() && gfx_level >= GfxLevel::Gfx10 {
        return WaitEvent::VMEM_STORE;
    }
    if gfx_level >= GfxLevel::Gfx12 && ty != VmemType::NOSAMPLER {
        if ty == VmemType::BVH {
            WaitEvent::VMEM_BVH
        } else {
            WaitEvent::VMEM_SAMPLE
        }
    } else {
        WaitEvent::VMEM
    }
}

impl WaitCtx<'_> {
    /// Record the accesses to the storage classes of `sync` and age the
    /// other barrier entries by one operation of `event`.
    pub fn update_barrier_imm(
        &mut self,
        counters: Counters,
        event: WaitEvent,
        sync: MemorySyncInfo,
    ) {
        let info = self.info;
        for i in 0..STORAGE_COUNT {
            let bar = &mut self.barrier_imm[i];
            let bar_ev = &mut self.barrier_events[i];
            if sync.storage.bits() & (1 << i) != 0
                && !sync.semantics.contains(Semantics::PRIVATE)
            {
                *bar_ev |= event;
                for ty in counters.wait_types() {
                    bar[ty] = 0;
                }
            } else if !info.is_unordered(*bar_ev) && !info.is_unordered(event)
            {
                for ty in counters.wait_types() {
                    if bar.is_set(ty) && (*bar_ev & info.events_for(ty)) == event
                    {
                        bar[ty] = increment(bar[ty], info.max_cnt[ty]);
                    }
                }
            }
        }
    }

    /// Count one more operation of `event` in flight. Entries produced only
    /// by in-order events of the same kind are now one operation further
    /// back.
    pub fn update_counters(&mut self, event: WaitEvent, sync: MemorySyncInfo) {
        let info = self.info;
        let mut counters = info.get_counters_for_event(event);

        self.nonzero |= counters;
        self.update_barrier_imm(counters, event, sync);

        if info.is_unordered(event) {
            return;
        }

        if self.pending_flat_lgkm {
            counters.remove(Counters::LGKM);
        }
        if self.pending_flat_vm {
            counters.remove(Counters::VM);
        }

        for (_, entry) in self.gpr_map.iter_mut() {
            if info.is_unordered(entry.events) {
                continue;
            }
            for ty in counters.wait_types() {
                if (entry.events & info.events_for(ty)) == event {
                    entry.imm[ty] = increment(entry.imm[ty], info.max_cnt[ty]);
                }
            }
        }
    }

    /// FLAT loads before GFX10 may return out of order with anything on vm
    /// and lgkm, so every pending threshold on these drops to 0.
    pub fn update_counters_for_flat_load(&mut self, sync: MemorySyncInfo) {
        assert!(self.gfx_level() < GfxLevel::Gfx10);

        self.nonzero |= Counters::LGKM | Counters::VM;
        self.update_barrier_imm(
            Counters::VM | Counters::LGKM,
            WaitEvent::FLAT,
            sync,
        );

        for (_, entry) in self.gpr_map.iter_mut() {
            if entry.counters.contains(Counters::VM) {
                entry.imm[WaitType::Vm] = 0;
            }
            if entry.counters.contains(Counters::LGKM) {
                entry.imm[WaitType::Lgkm] = 0;
            }
        }
        self.pending_flat_lgkm = true;
        self.pending_flat_vm = true;
    }

    /// Record `event` as the newest producer of every dword of `reg`.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_wait_entry(
        &mut self,
        reg: PhysReg,
        rc: RegClass,
        event: WaitEvent,
        wait_on_read: bool,
        vmem_types: VmemType,
        cycles: i8,
        force_linear: bool,
    ) {
        let counters = self.info.get_counters_for_event(event);
        let imm = WaitImm::zero((counters & Counters::WAIT).wait_types());

        let mut delay = AluDelayInfo::default();
        if event == WaitEvent::VALU {
            delay.valu_instrs = 0;
            delay.valu_cycles = cycles;
        } else if event == WaitEvent::TRANS {
            delay.trans_instrs = 0;
            delay.trans_cycles = cycles;
        } else if event == WaitEvent::SALU {
            delay.salu_cycles = cycles;
        }

        let mut new_entry = WaitEntry::new(
            event,
            imm,
            delay,
            counters,
            !rc.is_linear() && !force_linear,
            wait_on_read,
        );
        if counters.contains(Counters::VM) {
            new_entry.vmem_types |= vmem_types;
        }

        for i in 0..rc.size() {
            let (entry, fresh) = self
                .gpr_map
                .get_or_insert_with(reg.advance(i), || new_entry);
            if !fresh {
                entry.join(&new_entry);
            }
        }
    }

    /// The registers read by `op` must not be overwritten until `event`
    /// completes.
    pub fn insert_operand_entry(
        &mut self,
        op: &Operand,
        event: WaitEvent,
        vmem_types: VmemType,
    ) {
        if let Operand::Reg { reg, rc } = *op {
            self.insert_wait_entry(reg, rc, event, false, vmem_types, 0, false);
        }
    }

    /// The registers of `def` hold garbage until `event` completes.
    pub fn insert_definition_entry(
        &mut self,
        def: &Definition,
        event: WaitEvent,
        vmem_types: VmemType,
        cycles: i8,
    ) {
        // GFX11 can't write unwritten destination lanes with DS/VMEM without
        // waiting for the load. ALU follows linear control flow as the
        // hardware is unlikely to check dependencies per lane.
        let ds_vmem = WaitEvent::LDS
            | WaitEvent::GDS
            | WaitEvent::VMEM
            | WaitEvent::FLAT;
        let force_linear = self.gfx_level() >= GfxLevel::Gfx11
            && event.intersects(ds_vmem | WaitEvent::ALU);
        self.insert_wait_entry(
            def.reg,
            def.rc,
            event,
            true,
            vmem_types,
            cycles,
            force_linear,
        );
    }

    /// Age the ALU producers by one issued instruction, or drop them all
    /// when `clear` is set.
    pub fn update_alu(
        &mut self,
        is_valu: bool,
        is_trans: bool,
        clear: bool,
        cycles: i8,
    ) {
        self.gpr_map.retain(|_, entry| {
            if clear {
                entry.remove_alu_counter();
            } else {
                entry.delay.age(is_valu, is_trans, cycles);
                if entry.delay.empty() {
                    entry.remove_alu_counter();
                }
            }
            !entry.is_done()
        });
    }

    /// ALU producers on GFX11+.
    pub fn gen_alu(&mut self, instr: &Instruction) {
        let cycles = ir::cycle_info(&self.info.config, instr);
        let is_valu = instr.is_valu();
        let is_trans = instr.is_trans();
        let clear = instr.is_exp()
            || instr.is_ds()
            || instr.is_mimg()
            || instr.is_flat_like()
            || matches!(instr.format(), Format::Mubuf | Format::Mtbuf);

        let event = if is_trans {
            Some(WaitEvent::TRANS)
        } else if is_valu {
            Some(WaitEvent::VALU)
        } else if instr.is_salu() {
            Some(WaitEvent::SALU)
        } else {
            None
        };

        if let Some(event) = event {
            for def in &instr.definitions {
                self.insert_definition_entry(
                    def,
                    event,
                    VmemType::empty(),
                    cycles.latency,
                );
            }
        }
        self.update_alu(
            is_valu && !instr.is_wmma(),
            is_trans,
            clear,
            cycles.issue_cycles,
        );
    }

    /// Asynchronous producers: memory, exports and messages.
    pub fn gen(&mut self, instr: &Instruction) {
        let gfx_level = self.gfx_level();
        let exec = Operand::reg(PhysReg::EXEC, RegClass::S2);
        match instr.format() {
            Format::Exp => {
                let ir::InstrInfo::Export {
                    dest,
                    enabled_mask,
                    compressed,
                    ..
                } = instr.info
                else {
                    panic!("export without export info: {instr}");
                };
                let event = if dest <= 9 {
                    WaitEvent::EXP_MRT_NULL
                } else if dest <= 15 {
                    WaitEvent::EXP_POS
                } else {
                    WaitEvent::EXP_PARAM
                };
                self.update_counters(event, MemorySyncInfo::default());

                // The exported VGPRs can't be overwritten until the export
                // read them.
                for i in 0..4 {
                    if enabled_mask & (1 << i) == 0 {
                        continue;
                    }
                    let idx = if compressed { i >> 1 } else { i };
                    assert!(
                        idx < instr.operands.len(),
                        "export enables missing operand {idx}: {instr}"
                    );
                    self.insert_operand_entry(
                        &instr.operands[idx],
                        event,
                        VmemType::empty(),
                    );
                }
                self.insert_operand_entry(&exec, event, VmemType::empty());
            }
            Format::Flat => {
                if gfx_level < GfxLevel::Gfx10 && !instr.definitions.is_empty()
                {
                    self.update_counters_for_flat_load(instr.sync());
                } else {
                    self.update_counters(WaitEvent::FLAT, instr.sync());
                }
                if let Some(def) = instr.definitions.first() {
                    self.insert_definition_entry(
                        def,
                        WaitEvent::FLAT,
                        VmemType::empty(),
                        0,
                    );
                }
            }
            Format::Smem => {
                let sync = instr.sync();
                self.update_counters(WaitEvent::SMEM, sync);
                if let Some(def) = instr.definitions.first() {
                    self.insert_definition_entry(
                        def,
                        WaitEvent::SMEM,
                        VmemType::empty(),
                        0,
                    );
                } else if gfx_level >= GfxLevel::Gfx10 && !sync.can_reorder() {
                    self.pending_s_buffer_store = true;
                }
            }
            Format::Ds => {
                let gds = instr.is_gds();
                let event = if gds { WaitEvent::GDS } else { WaitEvent::LDS };
                self.update_counters(event, instr.sync());
                if gds {
                    self.update_counters(
                        WaitEvent::GDS_GPR_LOCK,
                        MemorySyncInfo::default(),
                    );
                }
                if let Some(def) = instr.definitions.first() {
                    self.insert_definition_entry(
                        def,
                        event,
                        VmemType::empty(),
                        0,
                    );
                }
                if gds {
                    for op in &instr.operands {
                        self.insert_operand_entry(
                            op,
                            WaitEvent::GDS_GPR_LOCK,
                            VmemType::empty(),
                        );
                    }
                    self.insert_operand_entry(
                        &exec,
                        WaitEvent::GDS_GPR_LOCK,
                        VmemType::empty(),
                    );
                }
            }
            Format::Ldsdir => {
                self.update_counters(WaitEvent::LDSDIR, instr.sync());
                let def = instr.definitions.first().unwrap_or_else(|| {
                    panic!("LDS direct load without destination: {instr}")
                });
                self.insert_definition_entry(
                    def,
                    WaitEvent::LDSDIR,
                    VmemType::empty(),
                    0,
                );
            }
            Format::Mubuf
            | Format::Mtbuf
            | Format::Mimg
            | Format::Global
            | Format::Scratch => {
                let ty = vmem_type(instr);
                let event = vmem_event(gfx_level, instr, ty);
                self.update_counters(event, instr.sync());
                if let Some(def) = instr.definitions.first() {
                    self.insert_definition_entry(def, event, ty, 0);
                }

                // GFX6 reads the store data after issue.
                if gfx_level == GfxLevel::Gfx6 {
                    let locked = if !instr.is_mimg() && instr.operands.len() == 4
                    {
                        Some(&instr.operands[3])
                    } else if instr.is_mimg() {
                        instr.operands.get(2).filter(|op| !op.is_undefined())
                    } else {
                        None
                    };
                    if let Some(op) = locked {
                        self.update_counters(
                            WaitEvent::VMEM_GPR_LOCK,
                            MemorySyncInfo::default(),
                        );
                        self.insert_operand_entry(
                            op,
                            WaitEvent::VMEM_GPR_LOCK,
                            VmemType::empty(),
                        );
                    }
                }
            }
            Format::Sopp => {
                if matches!(instr.opcode, Opcode::SSendmsg | Opcode::SSendmsghalt)
                {
                    self.update_counters(
                        WaitEvent::SENDMSG,
                        MemorySyncInfo::default(),
                    );
                }
            }
            Format::Sop1 => {
                if matches!(
                    instr.opcode,
                    Opcode::SSendmsgRtnB32 | Opcode::SSendmsgRtnB64
                ) {
                    self.update_counters(
                        WaitEvent::SENDMSG,
                        MemorySyncInfo::default(),
                    );
                    let def = instr.definitions.first().unwrap_or_else(|| {
                        panic!("message with return without destination: {instr}")
                    });
                    self.insert_definition_entry(
                        def,
                        WaitEvent::SENDMSG,
                        VmemType::empty(),
                        0,
                    );
                }
            }
            _ => (),
        }
    }

    /// Program entry state: LDS accesses and VMEM loads of arguments issued
    /// by a previous shader part.
    pub fn seed_program_entry(&mut self, prog: &ir::Program) {
        if prog.pending_lds_access {
            let counters = self.info.get_counters_for_event(WaitEvent::LDS);
            self.update_barrier_imm(
                counters,
                WaitEvent::LDS,
                MemorySyncInfo::storage(ir::StorageClass::SHARED),
            );
        }
        for def in &prog.args_pending_vmem {
            self.update_counters(WaitEvent::VMEM, MemorySyncInfo::default());
            self.insert_definition_entry(
                def,
                WaitEvent::VMEM,
                VmemType::empty(),
                0,
            );
        }
    }
}

/// Saturating increment of a pending threshold.
fn increment(value: u8, max: u8) -> u8 {
    value.saturating_add(1).min(max)
}
