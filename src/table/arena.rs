//! Slot storage for table members.
//!
//! Members live in a contiguous slot vector with free-list reuse. Every
//! cross-reference the table keeps between members (incoming sets, index
//! buckets) is an [`AtomId`] into this arena, never an owning handle, so
//! back-references cannot form reference cycles.
//!
//! Iteration is by slot index, which keeps index scans deterministic for a
//! given sequence of inserts and removals.

use std::fmt;

/// Dense slot identifier within one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomId(u32);

impl AtomId {
    /// Raw slot index.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtomId({})", self.0)
    }
}

#[derive(Debug)]
struct Slot<T> {
    data: Option<T>,
    next_free: Option<u32>,
}

/// Slot vector with free-list reuse.
#[derive(Debug)]
pub(crate) struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    live: usize,
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            live: 0,
        }
    }
}

impl<T> SlotArena<T> {
    /// Store `data`, reusing the most recently freed slot if any.
    pub(crate) fn allocate(&mut self, data: T) -> AtomId {
        self.live += 1;
        if let Some(idx) = self.free_head {
            let slot = &mut self.slots[idx as usize];
            debug_assert!(slot.data.is_none(), "free slot should be empty");
            self.free_head = slot.next_free.take();
            slot.data = Some(data);
            return AtomId(idx);
        }
        let idx = self.slots.len() as u32;
        self.slots.push(Slot {
            data: Some(data),
            next_free: None,
        });
        AtomId(idx)
    }

    /// Free the slot and return its contents.
    pub(crate) fn deallocate(&mut self, id: AtomId) -> Option<T> {
        let slot = self.slots.get_mut(id.0 as usize)?;
        let data = slot.data.take()?;
        slot.next_free = self.free_head;
        self.free_head = Some(id.0);
        self.live -= 1;
        Some(data)
    }

    pub(crate) fn get(&self, id: AtomId) -> Option<&T> {
        self.slots.get(id.0 as usize).and_then(|s| s.data.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: AtomId) -> Option<&mut T> {
        self.slots.get_mut(id.0 as usize).and_then(|s| s.data.as_mut())
    }

    /// Live slots in index order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (AtomId, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.data.as_ref().map(|d| (AtomId(i as u32), d)))
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.live = 0;
    }
}
