use super::{AluDelayInfo, Counters, WaitEvent};
use bitflags::bitflags;
use std::fmt;
use waitcnt_ir::{WaitImm, WaitType};

bitflags! {
    /// Kinds of vector memory loads. Loads of different kinds return out of
    /// order with respect to each other even though they share a counter.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct VmemType: u8 {
        const NOSAMPLER = 1 << 0;
        const SAMPLER = 1 << 1;
        const BVH = 1 << 2;
    }
}

/// Outstanding producers of one physical register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitEntry {
    /// Thresholds that guarantee the producers completed.
    pub imm: WaitImm,
    pub delay: AluDelayInfo,
    pub events: WaitEvent,
    pub counters: Counters,
    /// Reads of the register wait as well, not only writes.
    pub wait_on_read: bool,
    /// Only visible along the logical (divergence-aware) control flow.
    pub logical: bool,
    /// Kinds of vector memory loads pending on `vm`.
    pub vmem_types: VmemType,
}

impl WaitEntry {
    pub fn new(
        event: WaitEvent,
        imm: WaitImm,
        delay: AluDelayInfo,
        counters: Counters,
        logical: bool,
        wait_on_read: bool,
    ) -> Self {
        WaitEntry {
            imm,
            delay,
            events: event,
            counters,
            wait_on_read,
            logical,
            vmem_types: VmemType::empty(),
        }
    }

    /// Merge the producers of `other` into this entry. Returns whether the
    /// entry grew.
    pub fn join(&mut self, other: &WaitEntry) -> bool {
        let mut changed = !other.events.difference(self.events).is_empty()
            || !other.counters.difference(self.counters).is_empty()
            || (other.wait_on_read && !self.wait_on_read)
            || !other.vmem_types.difference(self.vmem_types).is_empty()
            || (!other.logical && self.logical);
        self.events |= other.events;
        self.counters |= other.counters;
        changed |= self.imm.combine(&other.imm);
        changed |= self.delay.combine(&other.delay);
        self.wait_on_read |= other.wait_on_read;
        self.vmem_types |= other.vmem_types;
        self.logical &= other.logical;
        changed
    }

    /// Forget the ALU producers.
    pub fn remove_alu_counter(&mut self) {
        self.counters.remove(Counters::ALU);
        self.delay = AluDelayInfo::default();
        self.events.remove(WaitEvent::ALU);
    }

    /// Forget the producers counted by `ty`, whose events are `type_events`.
    /// FLAT counts on both vm and lgkm and is only forgotten once neither is
    /// pending anymore.
    pub fn remove_wait(&mut self, ty: WaitType, type_events: WaitEvent) {
        self.counters.remove(Counters::of(ty));
        self.imm[ty] = WaitImm::UNSET;

        self.events &= type_events.complement() | WaitEvent::FLAT;
        if !self.counters.intersects(Counters::LGKM | Counters::VM) {
            self.events.remove(type_events & WaitEvent::FLAT);
        }

        if ty == WaitType::Vm {
            self.vmem_types = VmemType::empty();
        }
    }

    /// True once nothing is pending on the register.
    pub fn is_done(&self) -> bool {
        self.counters.is_empty()
    }
}

impl fmt::Display for WaitEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.imm, self.events)?;
        if !self.delay.empty() {
            write!(f, " {}", self.delay)?;
        }
        if !self.vmem_types.is_empty() {
            write!(f, " {:?}", self.vmem_types)?;
        }
        if !self.wait_on_read {
            write!(f, " write-only")?;
        }
        if !self.logical {
            write!(f, " linear")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vmem_entry(vm: u8) -> WaitEntry {
        let mut imm = WaitImm::default();
        imm[WaitType::Vm] = vm;
        WaitEntry::new(
            WaitEvent::VMEM,
            imm,
            AluDelayInfo::default(),
            Counters::VM,
            true,
            true,
        )
    }

    #[test]
    fn join_unions_and_tightens() {
        let mut a = vmem_entry(3);
        let mut b = vmem_entry(1);
        b.logical = false;
        b.vmem_types = VmemType::SAMPLER;
        assert!(a.join(&b));
        assert_eq!(a.imm[WaitType::Vm], 1);
        assert!(!a.logical);
        assert_eq!(a.vmem_types, VmemType::SAMPLER);
        assert!(!a.join(&b));
    }

    #[test]
    fn flat_survives_until_both_counters_waited() {
        let mut imm = WaitImm::zero([WaitType::Vm, WaitType::Lgkm]);
        imm[WaitType::Exp] = WaitImm::UNSET;
        let mut e = WaitEntry::new(
            WaitEvent::FLAT,
            imm,
            AluDelayInfo::default(),
            Counters::VM | Counters::LGKM,
            true,
            true,
        );
        let vm_events = WaitEvent::VMEM | WaitEvent::FLAT;
        let lgkm_events = WaitEvent::SMEM | WaitEvent::LDS | WaitEvent::FLAT;

        e.remove_wait(WaitType::Vm, vm_events);
        assert_eq!(e.events, WaitEvent::FLAT);
        assert!(!e.imm.is_set(WaitType::Vm));
        assert!(!e.is_done());

        e.remove_wait(WaitType::Lgkm, lgkm_events);
        assert!(e.events.is_empty());
        assert!(e.is_done());
    }

    #[test]
    fn alu_counter_removal_keeps_memory_producers() {
        let mut e = vmem_entry(0);
        e.join(&WaitEntry::new(
            WaitEvent::VALU,
            WaitImm::default(),
            AluDelayInfo {
                valu_instrs: 0,
                valu_cycles: 5,
                ..Default::default()
            },
            Counters::ALU,
            false,
            true,
        ));
        e.remove_alu_counter();
        assert_eq!(e.counters, Counters::VM);
        assert_eq!(e.events, WaitEvent::VMEM);
        assert!(e.delay.empty());
    }
}
