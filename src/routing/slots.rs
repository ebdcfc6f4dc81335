//! Stereo slot allocation
//!
//! Each external source node is pinned to one of a fixed number of stereo
//! slots. Slot `s` feeds filter inputs `2s` (left) and `2s + 1` (right).
//! Admission is a hard limit: when every slot is taken, allocation fails and
//! the caller destroys the offending link instead of queueing it.

use crate::registry::ObjectId;

/// Result of a successful allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub slot: usize,
    /// True when the slot was claimed by this call
    pub fresh: bool,
}

/// Fixed table of stereo slots
pub struct StereoSlotAllocator {
    owners: Box<[Option<ObjectId>]>,
}

impl StereoSlotAllocator {
    pub fn new(slot_count: usize) -> Self {
        Self {
            owners: vec![None; slot_count].into_boxed_slice(),
        }
    }

    /// Slot already owned by `node`, else the first free one
    pub fn allocate(&mut self, node: ObjectId) -> Option<Allocation> {
        self.allocate_where(node, |_| true)
    }

    /// Like [`allocate`](Self::allocate), but only free slots passing
    /// `eligible` are handed out
    pub fn allocate_where(
        &mut self,
        node: ObjectId,
        eligible: impl Fn(usize) -> bool,
    ) -> Option<Allocation> {
        if let Some(slot) = self.slot_of(node) {
            return Some(Allocation { slot, fresh: false });
        }

        let slot = (0..self.owners.len())
            .find(|&slot| self.owners[slot].is_none() && eligible(slot))?;
        self.owners[slot] = Some(node);
        tracing::info!("Allocated slot {} for node {}", slot, node);
        Some(Allocation { slot, fresh: true })
    }

    /// Claim a specific slot for `node` if it is free and `node` owns nothing else
    pub fn claim(&mut self, slot: usize, node: ObjectId) -> bool {
        if slot >= self.owners.len() {
            return false;
        }

        match self.owners[slot] {
            Some(owner) => owner == node,
            None if self.slot_of(node).is_some() => false,
            None => {
                self.owners[slot] = Some(node);
                tracing::info!("Claimed slot {} for node {}", slot, node);
                true
            }
        }
    }

    /// Release the slot owned by `node`
    pub fn free(&mut self, node: ObjectId) -> Option<usize> {
        let slot = self.slot_of(node)?;
        self.owners[slot] = None;
        tracing::info!("Freed slot {} for node {}", slot, node);
        Some(slot)
    }

    pub fn slot_of(&self, node: ObjectId) -> Option<usize> {
        self.owners.iter().position(|owner| *owner == Some(node))
    }

    pub fn owner(&self, slot: usize) -> Option<ObjectId> {
        self.owners.get(slot).copied().flatten()
    }

    pub fn is_occupied(&self, slot: usize) -> bool {
        self.owner(slot).is_some()
    }

    /// Release a slot whoever owns it
    pub fn release(&mut self, slot: usize) -> Option<ObjectId> {
        let owner = self.owners.get_mut(slot)?.take()?;
        tracing::info!("Released slot {} from node {}", slot, owner);
        Some(owner)
    }

    /// Drop every ownership
    pub fn clear(&mut self) {
        self.owners.iter_mut().for_each(|owner| *owner = None);
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Owner per slot, in slot order
    pub fn owners(&self) -> &[Option<ObjectId>] {
        &self.owners
    }
}

/// Slot feeding a filter input
pub fn slot_of_input(index: usize) -> usize {
    index / 2
}

/// Filter input for a slot and channel parity (0 = left, 1 = right)
pub fn input_of(slot: usize, parity: usize) -> usize {
    slot * 2 + parity
}

/// The other filter input of the same slot
pub fn sibling_input(index: usize) -> usize {
    index ^ 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_allocate_reuses_owned_slot() {
        let mut slots = StereoSlotAllocator::new(4);

        assert_eq!(slots.allocate(50), Some(Allocation { slot: 0, fresh: true }));
        assert_eq!(slots.allocate(60), Some(Allocation { slot: 1, fresh: true }));
        assert_eq!(slots.allocate(50), Some(Allocation { slot: 0, fresh: false }));
    }

    #[test]
    fn test_allocate_full() {
        let mut slots = StereoSlotAllocator::new(2);
        slots.allocate(1);
        slots.allocate(2);

        assert_eq!(slots.allocate(3), None);
        assert_eq!(slots.owners(), &[Some(1), Some(2)]);
    }

    #[test]
    fn test_free_and_reuse_first_free() {
        let mut slots = StereoSlotAllocator::new(3);
        slots.allocate(1);
        slots.allocate(2);
        slots.allocate(3);

        assert_eq!(slots.free(2), Some(1));
        assert_eq!(slots.free(2), None);
        assert_eq!(slots.allocate(9).map(|a| a.slot), Some(1));
    }

    #[test]
    fn test_allocate_skips_ineligible() {
        let mut slots = StereoSlotAllocator::new(3);
        let allocation = slots.allocate_where(5, |slot| slot != 0);
        assert_eq!(allocation, Some(Allocation { slot: 1, fresh: true }));
        assert_eq!(slots.allocate_where(6, |_| false), None);
        assert_eq!(slots.allocate_where(5, |_| false).map(|a| a.slot), Some(1));

        assert_eq!(slots.release(1), Some(5));
        assert_eq!(slots.release(1), None);
        assert_eq!(slots.release(9), None);
    }

    #[test]
    fn test_claim() {
        let mut slots = StereoSlotAllocator::new(3);
        slots.allocate(1);

        assert!(!slots.claim(0, 2));
        assert!(slots.claim(0, 1));
        assert!(!slots.claim(2, 1));
        assert!(slots.claim(2, 7));
        assert_eq!(slots.owner(2), Some(7));
        assert!(!slots.claim(5, 8));
    }

    #[test]
    fn test_input_addressing() {
        assert_eq!(input_of(2, 1), 5);
        assert_eq!(slot_of_input(5), 2);
        assert_eq!(sibling_input(4), 5);
        assert_eq!(sibling_input(5), 4);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Allocate(u32),
        Free(u32),
        Claim(usize, u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..8).prop_map(Op::Allocate),
            (0u32..8).prop_map(Op::Free),
            (0usize..5, 0u32..8).prop_map(|(s, n)| Op::Claim(s, n)),
        ]
    }

    proptest! {
        #[test]
        fn prop_ownership_is_injective(ops in proptest::collection::vec(op(), 0..64)) {
            let mut slots = StereoSlotAllocator::new(4);
            for op in ops {
                match op {
                    Op::Allocate(n) => { slots.allocate(n); }
                    Op::Free(n) => { slots.free(n); }
                    Op::Claim(s, n) => { slots.claim(s, n); }
                }

                let mut owners: Vec<_> = slots.owners().iter().flatten().copied().collect();
                let total = owners.len();
                owners.sort_unstable();
                owners.dedup();
                prop_assert_eq!(owners.len(), total);
            }
        }
    }
}
