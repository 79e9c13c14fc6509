//! C1 -- append-only arena of variable-size items with stable opaque handles.
//!
//! OSM ways can run to hundreds of KB and are cited by many relations; a
//! single arena with pointer-stable handles lets `MembersDatabase` and
//! `RelationsDatabase` share payloads without reference counting each byte.
//! Both databases instantiate their own `ItemStash<T>` -- one arena per item
//! kind, the same append/free-list idea applied twice.

use std::marker::PhantomData;

use crate::error::{Error, Result};

/// Stable handle into an `ItemStash<T>`. The only way to obtain one is
/// `ItemStash::add`; it cannot be forged and a handle from one stash cannot
/// be silently mistaken for one from another stash of a different item
/// type, since `T` is part of the handle's type.
pub struct ItemHandle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ItemHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ItemHandle<T> {}

impl<T> PartialEq for ItemHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for ItemHandle<T> {}

impl<T> std::hash::Hash for ItemHandle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> std::fmt::Debug for ItemHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemHandle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish()
    }
}

enum Slot<T> {
    Occupied {
        value: T,
        generation: u32,
        size: usize,
    },
    Free {
        next_free: Option<u32>,
        generation: u32,
    },
}

/// Append-only arena of `T`. Freed slots are reused by later `add` calls
/// (physical reclamation is deferred to the next `add`), guarded by a
/// per-slot generation counter so a stale handle into a reused slot is
/// rejected rather than silently returning the wrong value.
pub struct ItemStash<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    used_memory: usize,
}

impl<T> Default for ItemStash<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ItemStash<T> {
    pub fn new() -> Self {
        ItemStash {
            slots: Vec::new(),
            free_head: None,
            used_memory: 0,
        }
    }

    /// Copies `item` into the arena and returns a stable handle to it.
    pub fn add(&mut self, item: T, size: usize) -> ItemHandle<T> {
        self.used_memory += size;
        match self.free_head {
            Some(index) => {
                let generation = match &self.slots[index as usize] {
                    Slot::Free { generation, .. } => *generation,
                    Slot::Occupied { .. } => {
                        unreachable!("free list points at an occupied slot")
                    }
                };
                self.free_head = match &self.slots[index as usize] {
                    Slot::Free { next_free, .. } => *next_free,
                    Slot::Occupied { .. } => unreachable!(),
                };
                self.slots[index as usize] = Slot::Occupied {
                    value: item,
                    generation,
                    size,
                };
                ItemHandle {
                    index,
                    generation,
                    _marker: PhantomData,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot::Occupied {
                    value: item,
                    generation: 0,
                    size,
                });
                ItemHandle {
                    index,
                    generation: 0,
                    _marker: PhantomData,
                }
            }
        }
    }

    /// O(1) read. Errors (rather than panics) on a stale or unknown handle,
    /// since a library consumer, not just this module, can trigger this by
    /// misusing the public API.
    pub fn get(&self, handle: ItemHandle<T>) -> Result<&T> {
        match self.slots.get(handle.index as usize) {
            Some(Slot::Occupied {
                value, generation, ..
            }) if *generation == handle.generation => Ok(value),
            _ => Err(Error::StashCorruption("get() on an unknown or released handle")),
        }
    }

    pub fn get_mut(&mut self, handle: ItemHandle<T>) -> Result<&mut T> {
        match self.slots.get_mut(handle.index as usize) {
            Some(Slot::Occupied {
                value, generation, ..
            }) if *generation == handle.generation => Ok(value),
            _ => Err(Error::StashCorruption("get_mut() on an unknown or released handle")),
        }
    }

    /// Marks the slot free; the physical slot is recycled by a later `add`.
    /// A `get`/`remove` on this handle afterwards is a contract violation.
    pub fn remove(&mut self, handle: ItemHandle<T>) -> Result<T> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .ok_or(Error::StashCorruption("remove() on an unknown handle"))?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == handle.generation => {
                let freed = std::mem::replace(
                    slot,
                    Slot::Free {
                        next_free: self.free_head,
                        generation: handle.generation.wrapping_add(1),
                    },
                );
                self.free_head = Some(handle.index);
                match freed {
                    Slot::Occupied { value, size, .. } => {
                        self.used_memory -= size;
                        Ok(value)
                    }
                    Slot::Free { .. } => unreachable!(),
                }
            }
            _ => Err(Error::StashCorruption("double remove or unknown handle")),
        }
    }

    pub fn used_memory(&self) -> usize {
        self.used_memory
    }

    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Occupied { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over every still-live handle and its value, for end-of-pass
    /// diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = (ItemHandle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Occupied { value, generation, .. } => Some((
                ItemHandle {
                    index: index as u32,
                    generation: *generation,
                    _marker: PhantomData,
                },
                value,
            )),
            Slot::Free { .. } => None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_get_remove_roundtrip() {
        let mut stash: ItemStash<String> = ItemStash::new();
        let h = stash.add("hello".to_string(), 5);
        assert_eq!(stash.get(h).unwrap(), "hello");
        assert_eq!(stash.used_memory(), 5);
        assert_eq!(stash.remove(h).unwrap(), "hello");
        assert_eq!(stash.used_memory(), 0);
    }

    #[test]
    fn get_after_remove_is_stash_corruption() {
        let mut stash: ItemStash<u32> = ItemStash::new();
        let h = stash.add(42, 4);
        stash.remove(h).unwrap();
        assert!(matches!(stash.get(h), Err(Error::StashCorruption(_))));
    }

    #[test]
    fn double_remove_is_stash_corruption() {
        let mut stash: ItemStash<u32> = ItemStash::new();
        let h = stash.add(42, 4);
        stash.remove(h).unwrap();
        assert!(matches!(stash.remove(h), Err(Error::StashCorruption(_))));
    }

    #[test]
    fn freed_slot_is_reused_with_new_generation() {
        let mut stash: ItemStash<u32> = ItemStash::new();
        let h1 = stash.add(1, 4);
        stash.remove(h1).unwrap();
        let h2 = stash.add(2, 4);
        // same physical slot, different generation: stale h1 must not alias h2
        assert!(stash.get(h1).is_err());
        assert_eq!(*stash.get(h2).unwrap(), 2);
    }

    #[test]
    fn len_counts_only_occupied_slots() {
        let mut stash: ItemStash<u32> = ItemStash::new();
        let h1 = stash.add(1, 4);
        let _h2 = stash.add(2, 4);
        assert_eq!(stash.len(), 2);
        stash.remove(h1).unwrap();
        assert_eq!(stash.len(), 1);
    }
}
