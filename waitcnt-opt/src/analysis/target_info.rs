use bitflags::bitflags;
use waitcnt_ir::{self as ir, GfxLevel, WaitImm, WaitType};

bitflags! {
    /// Kinds of asynchronous side effects an instruction can produce.
    ///
    /// Instructions of the same event complete in issue order, except for
    /// the events in [TargetInfo::unordered_events]. Instructions of
    /// different events may complete in any order.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct WaitEvent: u32 {
        const SMEM = 1 << 0;
        const LDS = 1 << 1;
        const GDS = 1 << 2;
        const VMEM = 1 << 3;
        /// GFX10+
        const VMEM_STORE = 1 << 4;
        const FLAT = 1 << 5;
        const EXP_POS = 1 << 6;
        const EXP_PARAM = 1 << 7;
        const EXP_MRT_NULL = 1 << 8;
        const GDS_GPR_LOCK = 1 << 9;
        const VMEM_GPR_LOCK = 1 << 10;
        const SENDMSG = 1 << 11;
        const LDSDIR = 1 << 12;
        /// GFX12+
        const VMEM_SAMPLE = 1 << 13;
        /// GFX12+
        const VMEM_BVH = 1 << 14;
        const VALU = 1 << 15;
        const TRANS = 1 << 16;
        const SALU = 1 << 17;

        const ALU = Self::VALU.bits() | Self::TRANS.bits() | Self::SALU.bits();
    }
}

/// Number of distinct [WaitEvent]s.
pub const NUM_EVENTS: usize = 18;

bitflags! {
    /// Set of counters. Bit `i` is the counter of `WaitType::from_index(i)`;
    /// [Counters::ALU] stands for the ALU pipelines tracked by `s_delay_alu`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct Counters: u8 {
        const EXP = 1 << 0;
        const LGKM = 1 << 1;
        const VM = 1 << 2;
        const VS = 1 << 3;
        const SAMPLE = 1 << 4;
        const BVH = 1 << 5;
        const KM = 1 << 6;
        const ALU = 1 << 7;

        /// Counters that are waited on with a wait-count instruction.
        const WAIT = (1 << WaitType::COUNT) - 1;
    }
}

impl Counters {
    pub fn of(ty: WaitType) -> Self {
        Counters::from_bits_retain(1 << ty.index())
    }

    /// Wait types of the wait-count counters in this set.
    pub fn wait_types(self) -> impl Iterator<Item = WaitType> {
        WaitType::ALL
            .into_iter()
            .filter(move |ty| self.contains(Counters::of(*ty)))
    }

    /// The lowest wait-count counter in this set.
    pub fn first_wait_type(self) -> Option<WaitType> {
        self.wait_types().next()
    }
}

/// Static counter model of one hardware generation.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub config: ir::TargetConfig,
    /// Largest threshold each counter can be waited on.
    pub max_cnt: WaitImm,
    /// Events that complete out of order even among themselves.
    pub unordered_events: WaitEvent,
    /// Events counted by each counter.
    events: [WaitEvent; WaitType::COUNT],
    /// Counters incremented by each event.
    counters: [Counters; NUM_EVENTS],
}

impl TargetInfo {
    pub fn new(config: &ir::TargetConfig) -> Self {
        let gfx_level = config.gfx_level;

        // The all-ones field value means "don't wait".
        let mut max_cnt = WaitImm::max(gfx_level);
        for ty in WaitType::ALL {
            max_cnt[ty] = max_cnt[ty].saturating_sub(1);
        }

        let mut events = [WaitEvent::empty(); WaitType::COUNT];
        events[WaitType::Exp.index()] = WaitEvent::EXP_POS
            | WaitEvent::EXP_PARAM
            | WaitEvent::EXP_MRT_NULL
            | WaitEvent::GDS_GPR_LOCK
            | WaitEvent::VMEM_GPR_LOCK
            | WaitEvent::LDSDIR;
        events[WaitType::Lgkm.index()] = WaitEvent::SMEM
            | WaitEvent::LDS
            | WaitEvent::GDS
            | WaitEvent::FLAT
            | WaitEvent::SENDMSG;
        events[WaitType::Vm.index()] = WaitEvent::VMEM | WaitEvent::FLAT;
        events[WaitType::Vs.index()] = WaitEvent::VMEM_STORE;
        if gfx_level >= GfxLevel::Gfx12 {
            events[WaitType::Sample.index()] = WaitEvent::VMEM_SAMPLE;
            events[WaitType::Bvh.index()] = WaitEvent::VMEM_BVH;
            events[WaitType::Km.index()] = WaitEvent::SMEM | WaitEvent::SENDMSG;
            events[WaitType::Lgkm.index()] -= events[WaitType::Km.index()];
        }

        let mut counters = [Counters::empty(); NUM_EVENTS];
        for ty in WaitType::ALL {
            for event in events[ty.index()].iter() {
                counters[event_index(event)] |= Counters::of(ty);
            }
        }
        for event in WaitEvent::ALU.iter() {
            counters[event_index(event)] |= Counters::ALU;
        }

        let unordered_events = if gfx_level < GfxLevel::Gfx10 {
            WaitEvent::SMEM | WaitEvent::FLAT
        } else {
            WaitEvent::SMEM
        };

        TargetInfo {
            config: *config,
            max_cnt,
            unordered_events,
            events,
            counters,
        }
    }

    pub fn gfx_level(&self) -> GfxLevel {
        self.config.gfx_level
    }

    /// Counters incremented by a single event.
    pub fn get_counters_for_event(&self, event: WaitEvent) -> Counters {
        self.counters[event_index(event)]
    }

    /// Events counted by the counter of `ty`.
    pub fn events_for(&self, ty: WaitType) -> WaitEvent {
        self.events[ty.index()]
    }

    pub fn is_unordered(&self, events: WaitEvent) -> bool {
        self.unordered_events.intersects(events)
    }
}

/// Position of a single event in the event tables.
fn event_index(event: WaitEvent) -> usize {
    assert!(
        event.bits().count_ones() == 1,
        "expected a single event, got {event:?}"
    );
    event.bits().trailing_zeros() as usize
}
