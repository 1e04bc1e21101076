//! Typed indices and index-keyed containers.
//!
//! Blocks, registers, and other small dense identifiers are plain integers
//! wrapped in newtypes implementing [IndexRef]. The containers here store data
//! in vectors keyed by those newtypes so lookups are O(1) and iteration order
//! is the key order.
mod index_trait;
mod indexed_map;
mod macros;
mod slot_map;

pub mod maps {
    pub use super::indexed_map::IndexedMap;
    pub use super::slot_map::SlotMap;
}

pub mod iter {
    pub use super::index_trait::{IndexRange, OwnedIndexRangeIterator};
}

pub use index_trait::IndexRef;
