//! C2 -- tracks every `(way_id -> [(relation, slot)])` interest registered
//! during pass 1, then matches incoming pass-2 ways against them.
//!
//! Three phases, enforced by a small state check rather than the type
//! system, since the manager owns one long-lived instance across both
//! passes: **collecting** (pass 1, `track`), **prepared** (`prepare` sorts
//! once), **draining** (pass 2, `add`/`remove`).

use std::collections::HashMap;

use itertools::Itertools;

use crate::error::{Error, Result};
use crate::model::Way;
use crate::relations::{RelationHandle, RelationsDatabase};
use crate::stash::{ItemHandle, ItemStash};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Collecting,
    Prepared,
}

#[derive(Debug, Clone, Copy)]
struct MemberInterest {
    way_id: i64,
    relation: RelationHandle,
    slot: usize,
}

pub struct MembersDatabase {
    phase: Phase,
    /// Sorted ascending by `way_id` once prepared; insertion order is a
    /// stable sort key, matching the `IdTableBuilder`-style
    /// collect-then-sort two-phase pattern this is built on.
    interests: Vec<MemberInterest>,
    /// Parallel to `interests`: false once matched or explicitly removed.
    live: Vec<bool>,
    ways: ItemStash<Way>,
    way_handles: HashMap<i64, ItemHandle<Way>>,
    /// Number of live interests still citing a given way id; the way's
    /// stash entry is evicted once this reaches zero (I5).
    refs_remaining: HashMap<i64, u32>,
}

impl Default for MembersDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MembersDatabase {
    pub fn new() -> Self {
        MembersDatabase {
            phase: Phase::Collecting,
            interests: Vec::new(),
            live: Vec::new(),
            ways: ItemStash::new(),
            way_handles: HashMap::new(),
            refs_remaining: HashMap::new(),
        }
    }

    /// Appends a `MemberInterest`. Requires `collecting`.
    pub fn track(&mut self, relation: RelationHandle, way_id: i64, slot: usize) -> Result<()> {
        if self.phase != Phase::Collecting {
            return Err(Error::StashCorruption("track() called after prepare()"));
        }
        self.interests.push(MemberInterest {
            way_id,
            relation,
            slot,
        });
        self.live.push(true);
        *self.refs_remaining.entry(way_id).or_insert(0) += 1;
        Ok(())
    }

    /// Transitions `collecting -> prepared`, sorting interests ascending by
    /// `way_id` with a stable sort so ties keep registration order (P2, P6).
    pub fn prepare(&mut self) -> Result<()> {
        if self.phase != Phase::Collecting {
            return Err(Error::StashCorruption("prepare() called more than once"));
        }
        let (interests, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.interests)
            .into_iter()
            .zip(std::mem::take(&mut self.live))
            .sorted_by_key(|(interest, _)| interest.way_id)
            .unzip();
        self.interests = interests;
        self.live = live;
        self.phase = Phase::Prepared;
        Ok(())
    }

    fn range_for(&self, way_id: i64) -> std::ops::Range<usize> {
        let start = self.interests.partition_point(|it| it.way_id < way_id);
        let end = self.interests.partition_point(|it| it.way_id <= way_id);
        start..end
    }

    /// Offers `way` to the database. Requires `prepared`. If no interest
    /// matches, the way is discarded and `Ok(false)` is returned.
    /// Otherwise the way is stored once, every matching interest's relation
    /// slot is resolved, and for each relation whose outstanding count
    /// reaches zero, `on_complete` is invoked synchronously with every way
    /// the relation's members now resolve to (in slot order). Returns
    /// `Ok(true)` iff at least one relation was interested in this way.
    ///
    /// `on_complete`'s job is purely to build and emit an area (C5 + C7);
    /// the completion bookkeeping -- defensively erasing any interests
    /// still registered for the relation and releasing the relation handle
    /// -- is this method's own responsibility, since it alone has a live
    /// borrow of both databases at the point completion is detected.
    pub fn add<F>(
        &mut self,
        relations: &mut RelationsDatabase,
        way: Way,
        mut on_complete: F,
    ) -> Result<bool>
    where
        F: for<'w> FnMut(&mut RelationsDatabase, RelationHandle, &[(usize, &'w Way)]) -> Result<()>,
    {
        if self.phase != Phase::Prepared {
            return Err(Error::StashCorruption("add() called before prepare()"));
        }

        let way_id = way.id;
        let range = self.range_for(way_id);
        if range.start == range.end {
            return Ok(false);
        }

        let size = way.approx_size();
        let handle = self.ways.add(way, size);
        self.way_handles.insert(way_id, handle);

        let mut completed = Vec::new();
        for idx in range {
            if !self.live[idx] {
                continue;
            }
            self.live[idx] = false;
            let interest = self.interests[idx];
            relations.resolve_member(interest.relation, interest.slot, handle)?;
            if relations.outstanding(interest.relation)? == 0 {
                completed.push(interest.relation);
            }
        }

        for relation_handle in completed {
            let resolved: Vec<(usize, &Way)> = {
                let relation = relations.relation(relation_handle)?;
                let mut resolved = Vec::with_capacity(relation.members.len());
                for (slot, member) in relation.members.iter().enumerate() {
                    if !member.is_of_interest() {
                        continue;
                    }
                    if let Some(h) = relations.resolved_member(relation_handle, slot)? {
                        resolved.push((slot, self.ways.get(h)?));
                    }
                }
                resolved
            };

            on_complete(relations, relation_handle, &resolved)?;
            drop(resolved);

            let way_ids: Vec<i64> = relations
                .relation(relation_handle)?
                .members
                .iter()
                .filter(|m| m.is_of_interest())
                .map(|m| m.id)
                .collect();
            self.remove_all_for_relation(relation_handle)?;
            relations.remove(relation_handle)?;
            for id in way_ids {
                self.release_way(id)?;
            }
        }

        Ok(true)
    }

    /// Removes all interests matching both `way_id` and `relation` (spec
    /// signature `remove(way_id, relation_id)`; relation identity here is
    /// the handle `track` was called with, matching how `MemberInterest`
    /// itself addresses a relation).
    pub fn remove(&mut self, way_id: i64, relation: RelationHandle) -> Result<()> {
        let ids: Vec<usize> = (0..self.interests.len())
            .filter(|&i| self.live[i] && self.interests[i].way_id == way_id && self.interests[i].relation == relation)
            .collect();
        for idx in ids {
            self.live[idx] = false;
            self.release_way(way_id)?;
        }
        Ok(())
    }

    /// Removes every remaining interest registered for `relation`,
    /// regardless of way id -- the defensive bulk variant used when a
    /// relation is dropped or (normally a no-op) right after completion.
    pub fn remove_all_for_relation(&mut self, relation: RelationHandle) -> Result<()> {
        let matches: Vec<(usize, i64)> = self
            .interests
            .iter()
            .enumerate()
            .filter(|(i, it)| self.live[*i] && it.relation == relation)
            .map(|(i, it)| (i, it.way_id))
            .collect();
        for (idx, way_id) in matches {
            self.live[idx] = false;
            self.release_way(way_id)?;
        }
        Ok(())
    }

    /// Read-only access to a stored way's payload.
    pub fn get(&self, way_id: i64) -> Result<&Way> {
        let handle = *self
            .way_handles
            .get(&way_id)
            .ok_or(Error::StashCorruption("get() on a way that was never stored"))?;
        self.ways.get(handle)
    }

    fn release_way(&mut self, way_id: i64) -> Result<()> {
        let evict = match self.refs_remaining.get_mut(&way_id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => false,
        };
        if evict {
            self.refs_remaining.remove(&way_id);
            if let Some(handle) = self.way_handles.remove(&way_id) {
                self.ways.remove(handle)?;
            }
        }
        Ok(())
    }

    /// Bytes held in the way payload arena (the `stash` component of
    /// `used_memory()`'s three-way split).
    pub fn used_memory(&self) -> usize {
        self.ways.used_memory()
    }

    /// Approximate bytes held by interest bookkeeping itself (the
    /// `members` component of `used_memory()`'s three-way split) -- the
    /// sorted/unsorted interest list plus the id-indexed lookup tables,
    /// distinct from the way payloads those interests eventually resolve
    /// to.
    pub fn bookkeeping_memory(&self) -> usize {
        self.interests.len() * std::mem::size_of::<MemberInterest>()
            + self.live.len()
            + self.way_handles.len() * (std::mem::size_of::<i64>() + std::mem::size_of::<ItemHandle<Way>>())
            + self.refs_remaining.len() * (std::mem::size_of::<i64>() + std::mem::size_of::<u32>())
    }

    #[cfg(test)]
    fn sorted_way_ids(&self) -> Vec<i64> {
        self.interests.iter().map(|i| i.way_id).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Relation;

    fn rel_handle(relations: &mut RelationsDatabase, n_way_members: usize) -> RelationHandle {
        let relation = Relation::new(1);
        relations.add(relation, n_way_members as u32)
    }

    #[test]
    fn prepare_sorts_interests_ascending_by_way_id_stably() {
        let mut relations = RelationsDatabase::new();
        let mut members = MembersDatabase::new();
        let h = rel_handle(&mut relations, 3);
        members.track(h, 30, 0).unwrap();
        members.track(h, 10, 1).unwrap();
        members.track(h, 20, 2).unwrap();
        members.prepare().unwrap();
        assert_eq!(members.sorted_way_ids(), vec![10, 20, 30]);
    }

    #[test]
    fn unmatched_way_is_discarded() {
        let mut relations = RelationsDatabase::new();
        let mut members = MembersDatabase::new();
        let h = rel_handle(&mut relations, 1);
        members.track(h, 10, 0).unwrap();
        members.prepare().unwrap();

        let way = Way::new(999);
        let matched = members
            .add(&mut relations, way, |_, _, _| Ok(()))
            .unwrap();
        assert!(!matched);
    }

    #[test]
    fn single_member_relation_completes_on_its_only_way() {
        let mut relations = RelationsDatabase::new();
        let mut members = MembersDatabase::new();
        let h = rel_handle(&mut relations, 1);
        members.track(h, 10, 0).unwrap();
        members.prepare().unwrap();

        let mut completed = Vec::new();
        members
            .add(&mut relations, Way::new(10), |_, rh, ways| {
                completed.push((rh, ways.len()));
                Ok(())
            })
            .unwrap();

        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].1, 1);
        assert_eq!(relations.len(), 0);
    }

    #[test]
    fn shared_way_completes_relations_in_registration_order() {
        let mut relations = RelationsDatabase::new();
        let mut members = MembersDatabase::new();
        let a = rel_handle(&mut relations, 1);
        let b = rel_handle(&mut relations, 1);
        members.track(a, 5, 0).unwrap();
        members.track(b, 5, 0).unwrap();
        members.prepare().unwrap();

        let mut order = Vec::new();
        members
            .add(&mut relations, Way::new(5), |_, rh, _| {
                order.push(rh);
                Ok(())
            })
            .unwrap();

        assert_eq!(order, vec![a, b]);
    }
}
