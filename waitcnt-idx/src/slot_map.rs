use super::index_trait::IndexRef;
use std::marker::PhantomData;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A map over a small, bounded key space stored as one slot per possible key.
///
/// Every key below the capacity has a slot, so lookups never hash and
/// iteration visits occupied slots in ascending key order. Suitable for keys
/// such as physical registers where the full key space is known up front.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotMap<K, D>
where
    K: IndexRef,
{
    slots: Vec<Option<D>>,
    len: usize,
    phantom: PhantomData<K>,
}

impl<K, D> SlotMap<K, D>
where
    K: IndexRef,
{
    /// Creates a map that can hold every key in `0..capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            len: 0,
            phantom: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot(&self, key: K) -> &Option<D> {
        let idx = key.index();
        assert!(
            idx < self.slots.len(),
            "key {idx} outside of slot map capacity {}",
            self.slots.len()
        );
        &self.slots[idx]
    }

    fn slot_mut(&mut self, key: K) -> &mut Option<D> {
        let idx = key.index();
        assert!(
            idx < self.slots.len(),
            "key {idx} outside of slot map capacity {}",
            self.slots.len()
        );
        &mut self.slots[idx]
    }

    pub fn get(&self, key: K) -> Option<&D> {
        self.slot(key).as_ref()
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut D> {
        self.slot_mut(key).as_mut()
    }

    pub fn contains_key(&self, key: K) -> bool {
        self.slot(key).is_some()
    }

    /// Stores `value` at `key` and returns the previous value, if any.
    pub fn insert(&mut self, key: K, value: D) -> Option<D> {
        let old = self.slot_mut(key).replace(value);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    pub fn remove(&mut self, key: K) -> Option<D> {
        let old = self.slot_mut(key).take();
        if old.is_some() {
            self.len -= 1;
        }
        old
    }

    /// Returns the value at `key`, creating it with `init` if the slot is
    /// empty. The flag is true when the value was freshly created.
    pub fn get_or_insert_with(
        &mut self,
        key: K,
        init: impl FnOnce() -> D,
    ) -> (&mut D, bool) {
        let idx = key.index();
        let fresh = self.slot(key).is_none();
        if fresh {
            self.len += 1;
            self.slots[idx] = Some(init());
        }
        match &mut self.slots[idx] {
            Some(value) => (value, fresh),
            None => unreachable!("slot was just filled"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &D)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (K::new(i), v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut D)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (K::new(i), v)))
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &D> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(K, &mut D) -> bool) {
        let mut len = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot {
                if keep(K::new(i), value) {
                    len += 1;
                } else {
                    *slot = None;
                }
            }
        }
        self.len = len;
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::SlotMap;
    use crate::{impl_index, IndexRef};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct Reg(u16);
    impl_index!(Reg, u16);

    #[test]
    fn get_or_insert_reports_fresh_slots() {
        let mut map: SlotMap<Reg, u32> = SlotMap::with_capacity(8);
        let (v, fresh) = map.get_or_insert_with(Reg(3), || 10);
        assert!(fresh);
        *v += 1;
        let (v, fresh) = map.get_or_insert_with(Reg(3), || 99);
        assert!(!fresh);
        assert_eq!(*v, 11);
        assert_eq!(map.len(), 1);
    }

    #[test]
    #[should_panic]
    fn out_of_range_key_panics() {
        let map: SlotMap<Reg, u32> = SlotMap::with_capacity(4);
        map.get(Reg(4));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(u16, u32),
        Remove(u16),
        RetainEven,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u16..64, any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
            (0u16..64).prop_map(Op::Remove),
            Just(Op::RetainEven),
        ]
    }

    proptest! {
        #[test]
        fn behaves_like_ordered_map(ops in prop::collection::vec(op(), 0..200)) {
            let mut map: SlotMap<Reg, u32> = SlotMap::with_capacity(64);
            let mut model: BTreeMap<u16, u32> = BTreeMap::new();
            for op in ops {
                match op {
                    Op::Insert(k, v) => {
                        prop_assert_eq!(map.insert(Reg(k), v), model.insert(k, v));
                    }
                    Op::Remove(k) => {
                        prop_assert_eq!(map.remove(Reg(k)), model.remove(&k));
                    }
                    Op::RetainEven => {
                        map.retain(|_, v| *v % 2 == 0);
                        model.retain(|_, v| *v % 2 == 0);
                    }
                }
                prop_assert_eq!(map.len(), model.len());
            }
            let ours: Vec<_> = map.iter().map(|(k, v)| (k.index() as u16, *v)).collect();
            let theirs: Vec<_> = model.into_iter().collect();
            prop_assert_eq!(ours, theirs);
        }
    }
}
