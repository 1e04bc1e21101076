//! Memory synchronization descriptors attached to memory instructions and
//! barriers.
use bitflags::bitflags;
use std::fmt;

#[cfg(feature = "serialize")]
use serde::Serialize;

/// Number of distinct storage classes. Sizes the per-storage barrier table.
pub const STORAGE_COUNT: usize = 8;

bitflags! {
    /// Kinds of memory an access may touch.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serialize", derive(Serialize))]
    pub struct StorageClass: u8 {
        const BUFFER = 1 << 0;
        const GDS = 1 << 1;
        const IMAGE = 1 << 2;
        const SHARED = 1 << 3;
        const VMEM_OUTPUT = 1 << 4;
        const TASK_PAYLOAD = 1 << 5;
        const SCRATCH = 1 << 6;
        const VGPR_SPILL = 1 << 7;
    }
}

impl StorageClass {
    /// Position of each set storage class in the barrier table.
    pub fn indices(self) -> impl Iterator<Item = usize> {
        (0..STORAGE_COUNT).filter(move |i| self.bits() & (1 << i) != 0)
    }

    pub fn from_index(idx: usize) -> Self {
        assert!(idx < STORAGE_COUNT, "storage index {idx} out of range");
        StorageClass::from_bits_truncate(1 << idx)
    }
}

bitflags! {
    /// Ordering semantics of a memory access or barrier.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serialize", derive(Serialize))]
    pub struct Semantics: u8 {
        const ACQUIRE = 1 << 0;
        const RELEASE = 1 << 1;
        /// Volatile accesses cannot be reordered or removed.
        const VOLATILE = 1 << 2;
        /// Accesses to memory private to the invocation.
        const PRIVATE = 1 << 3;
        /// Explicitly allowed to be reordered with other accesses.
        const CAN_REORDER = 1 << 4;
        const ATOMIC = 1 << 5;
        /// Read-modify-write atomic.
        const RMW = 1 << 6;
        const ACQREL = Self::ACQUIRE.bits() | Self::RELEASE.bits();
    }
}

/// Set of invocations a synchronization applies to, ordered from narrowest to
/// widest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub enum SyncScope {
    #[default]
    Invocation,
    Subgroup,
    Workgroup,
    QueueFamily,
    Device,
}

/// What a memory instruction or barrier synchronizes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize))]
pub struct MemorySyncInfo {
    pub storage: StorageClass,
    pub semantics: Semantics,
    pub scope: SyncScope,
}

impl MemorySyncInfo {
    pub fn new(
        storage: StorageClass,
        semantics: Semantics,
        scope: SyncScope,
    ) -> Self {
        Self {
            storage,
            semantics,
            scope,
        }
    }

    pub fn storage(storage: StorageClass) -> Self {
        Self {
            storage,
            ..Default::default()
        }
    }

    /// Whether the access may be reordered with surrounding accesses.
    /// A default descriptor (no storage) can always be reordered.
    pub fn can_reorder(&self) -> bool {
        if self.semantics.intersects(Semantics::ACQREL) {
            return false;
        }
        (self.storage.is_empty()
            || self.semantics.contains(Semantics::CAN_REORDER))
            && !self.semantics.contains(Semantics::VOLATILE)
    }
}

impl fmt::Display for MemorySyncInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "storage:{:?} semantics:{:?} scope:{:?}",
            self.storage, self.semantics, self.scope
        )
    }
}
