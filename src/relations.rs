//! C3 -- the set of kept relations, their outstanding-member counts, and
//! their resolved way-member handles.

use crate::error::Result;
use crate::model::{Relation, Way};
use crate::stash::{ItemHandle, ItemStash};

/// Opaque cursor into the `RelationsDatabase` identifying one kept relation.
pub type RelationHandle = ItemHandle<StoredRelation>;

/// A kept relation plus the bookkeeping `RelationsDatabase` needs: the
/// member slots resolved so far (set by `MembersDatabase::add` as matching
/// ways arrive) and the count of members still outstanding.
pub struct StoredRelation {
    pub relation: Relation,
    resolved: Vec<Option<ItemHandle<Way>>>,
    outstanding: u32,
}

impl StoredRelation {
    fn approx_size(&self) -> usize {
        self.relation.approx_size()
            + self.resolved.len() * std::mem::size_of::<Option<ItemHandle<Way>>>()
    }
}

#[derive(Default)]
pub struct RelationsDatabase {
    stash: ItemStash<StoredRelation>,
}

impl RelationsDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies `relation` in, installs an outstanding-member count of
    /// `outstanding` (the number of way members pass 1 found), and returns a
    /// handle to it.
    pub fn add(&mut self, relation: Relation, outstanding: u32) -> RelationHandle {
        let len = relation.members.len();
        let stored = StoredRelation {
            relation,
            resolved: vec![None; len],
            outstanding,
        };
        let size = stored.approx_size();
        self.stash.add(stored, size)
    }

    pub fn relation(&self, handle: RelationHandle) -> Result<&Relation> {
        Ok(&self.stash.get(handle)?.relation)
    }

    pub fn outstanding(&self, handle: RelationHandle) -> Result<u32> {
        Ok(self.stash.get(handle)?.outstanding)
    }

    /// Attaches a resolved way handle into the relation's member slot and
    /// decrements its outstanding-member count, returning the new count.
    pub fn resolve_member(
        &mut self,
        handle: RelationHandle,
        slot: usize,
        way: ItemHandle<Way>,
    ) -> Result<u32> {
        let stored = self.stash.get_mut(handle)?;
        stored.resolved[slot] = Some(way);
        stored.outstanding = stored.outstanding.saturating_sub(1);
        Ok(stored.outstanding)
    }

    pub fn resolved_member(
        &self,
        handle: RelationHandle,
        slot: usize,
    ) -> Result<Option<ItemHandle<Way>>> {
        Ok(self.stash.get(handle)?.resolved[slot])
    }

    /// Releases a kept relation. I1/I4 require no live interests still
    /// reference it -- callers (`MembersDatabase`) arrange that before
    /// calling this.
    pub fn remove(&mut self, handle: RelationHandle) -> Result<Relation> {
        Ok(self.stash.remove(handle)?.relation)
    }

    pub fn len(&self) -> usize {
        self.stash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stash.is_empty()
    }

    pub fn used_memory(&self) -> usize {
        self.stash.used_memory()
    }

    /// Iterates over relations still held at the moment it's called -- used
    /// by the manager to report incomplete relations once pass 2 ends.
    pub fn iter(&self) -> impl Iterator<Item = (RelationHandle, &Relation)> {
        self.stash.iter().map(|(handle, stored)| (handle, &stored.relation))
    }
}
