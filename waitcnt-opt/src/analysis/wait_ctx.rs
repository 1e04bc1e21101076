use super::{Counters, TargetInfo, WaitEntry, WaitEvent};
use std::fmt;
use waitcnt_idx::maps::SlotMap;
use waitcnt_ir::{self as ir, PhysReg, WaitImm, NUM_REGS, STORAGE_COUNT};

/// Per-program inputs of the analysis that do not come from the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitSettings {
    /// Wait for everything outstanding after every instruction.
    pub force_waitcnt: bool,
    /// The program issues SMEM loads from buffers or global memory.
    pub has_smem_buffer_or_global_loads: bool,
}

impl WaitSettings {
    pub fn for_program(prog: &ir::Program) -> Self {
        WaitSettings {
            force_waitcnt: false,
            has_smem_buffer_or_global_loads: prog
                .has_smem_buffer_or_global_loads,
        }
    }
}

/// Wait state at one point of a program.
#[derive(Clone)]
pub struct WaitCtx<'a> {
    pub(crate) info: &'a TargetInfo,
    pub(crate) settings: WaitSettings,

    /// Counters that may have operations in flight.
    pub nonzero: Counters,
    /// A FLAT load is outstanding on lgkm, so lgkm waits must drain it.
    pub pending_flat_lgkm: bool,
    /// A FLAT load is outstanding on vm, so vm waits must drain it.
    pub pending_flat_vm: bool,
    /// GFX10+ scalar store that a later scalar load may alias.
    pub pending_s_buffer_store: bool,

    /// Wait needed to complete the accesses to each storage class.
    pub barrier_imm: [WaitImm; STORAGE_COUNT],
    /// Events of the accesses to each storage class.
    pub barrier_events: [WaitEvent; STORAGE_COUNT],

    pub gpr_map: SlotMap<PhysReg, WaitEntry>,
}

impl<'a> WaitCtx<'a> {
    pub fn new(info: &'a TargetInfo, settings: WaitSettings) -> Self {
        WaitCtx {
            info,
            settings,
            nonzero: Counters::empty(),
            pending_flat_lgkm: false,
            pending_flat_vm: false,
            pending_s_buffer_store: false,
            barrier_imm: [WaitImm::default(); STORAGE_COUNT],
            barrier_events: [WaitEvent::empty(); STORAGE_COUNT],
            gpr_map: SlotMap::with_capacity(NUM_REGS),
        }
    }

    pub fn info(&self) -> &'a TargetInfo {
        self.info
    }

    pub fn gfx_level(&self) -> ir::GfxLevel {
        self.info.gfx_level()
    }

    /// Merge the state of a predecessor. Only the entries of `other` whose
    /// visibility matches `logical` are taken over. Returns whether `self`
    /// grew.
    pub fn join(&mut self, other: &WaitCtx, logical: bool) -> bool {
        let mut changed = (other.pending_flat_lgkm && !self.pending_flat_lgkm)
            || (other.pending_flat_vm && !self.pending_flat_vm)
            || (other.pending_s_buffer_store && !self.pending_s_buffer_store)
            || !other.nonzero.difference(self.nonzero).is_empty();

        self.nonzero |= other.nonzero;
        self.pending_flat_lgkm |= other.pending_flat_lgkm;
        self.pending_flat_vm |= other.pending_flat_vm;
        self.pending_s_buffer_store |= other.pending_s_buffer_store;

        for (reg, entry) in other.gpr_map.iter() {
            if entry.logical != logical {
                continue;
            }
            let (mine, fresh) = self.gpr_map.get_or_insert_with(reg, || *entry);
            if fresh {
                changed = true;
            } else {
                changed |= mine.join(entry);
            }
        }

        for i in 0..STORAGE_COUNT {
            changed |= self.barrier_imm[i].combine(&other.barrier_imm[i]);
            changed |= !other.barrier_events[i]
                .difference(self.barrier_events[i])
                .is_empty();
            self.barrier_events[i] |= other.barrier_events[i];
        }

        changed
    }
}

impl PartialEq for WaitCtx<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.nonzero == other.nonzero
            && self.pending_flat_lgkm == other.pending_flat_lgkm
            && self.pending_flat_vm == other.pending_flat_vm
            && self.pending_s_buffer_store == other.pending_s_buffer_store
            && self.barrier_imm == other.barrier_imm
            && self.barrier_events == other.barrier_events
            && self.gpr_map == other.gpr_map
    }
}

impl fmt::Debug for WaitCtx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for WaitCtx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nonzero: {:?}", self.nonzero)?;
        if self.pending_flat_lgkm || self.pending_flat_vm {
            write!(
                f,
                " pending flat: lgkm={} vm={}",
                self.pending_flat_lgkm, self.pending_flat_vm
            )?;
        }
        if self.pending_s_buffer_store {
            write!(f, " pending s_buffer_store")?;
        }
        writeln!(f)?;
        for (reg, entry) in self.gpr_map.iter() {
            writeln!(f, "  {reg}: {entry}")?;
        }
        for (i, (imm, events)) in self
            .barrier_imm
            .iter()
            .zip(self.barrier_events.iter())
            .enumerate()
        {
            if !imm.empty() || !events.is_empty() {
                writeln!(
                    f,
                    "  barrier {:?}: {imm:?} {events:?}",
                    ir::StorageClass::from_index(i)
                )?;
            }
        }
        Ok(())
    }
}
