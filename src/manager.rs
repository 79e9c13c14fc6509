//! C6 -- the orchestrator. Owns one instance each of C2/C3/C7 plus the
//! pluggable C5 collaborator and drives the two-pass protocol: `relation`
//! calls during pass 1, `prepare` at the pass boundary, `way` calls during
//! pass 2.
//!
//! Threads one pass's output into the next while accumulating `AreaStats`
//! along the way, the same role `osmflatc`'s own staged conversion pipeline
//! plays across its decode/serialize steps.

use log::{debug, info, warn};

use crate::assembler::{from_way, Area};
use crate::buffer::{BufferSink, CallbackBuffer};
use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::filter::{is_area_no, relation_qualifies};
use crate::members::MembersDatabase;
use crate::model::{MemberType, ObjectType, Relation, Way};
use crate::order::OrderCheck;
use crate::relations::RelationsDatabase;
use crate::stats::{AreaStats, MemoryStats};

fn record_area(stats: &mut AreaStats, buffer: &mut CallbackBuffer<Area>, area: Area) {
    if from_way(area.id()) {
        stats.areas_from_ways += 1;
    } else {
        stats.areas_from_relations += 1;
    }
    stats.rings_built += area.outers().iter().map(|o| 1 + o.inners.len()).sum::<usize>();
    debug!("assembled area {} ({} outer ring(s))", area.id(), area.outers().len());
    let size = area.approx_size();
    buffer.push(area, size);
    buffer.possibly_flush();
}

/// Routes an assembler failure into `stats` (`InvalidLocation` and
/// `AssemblerFailure` are both "skip this object, count it, carry on");
/// anything else is a structural error the caller must see.
fn record_failure(stats: &mut AreaStats, err: Error) -> Result<()> {
    match err {
        Error::InvalidLocation => {
            warn!("dropping object: {}", err);
            stats.invalid_location_failures += 1;
            Ok(())
        }
        Error::AssemblerFailure { .. } => {
            warn!("dropping object: {}", err);
            stats.assembler_failures += 1;
            Ok(())
        }
        other => Err(other),
    }
}

/// Drives the two-pass multipolygon area assembly protocol over a stream of
/// relations (pass 1) and ways (pass 2), emitting `Area`s through a
/// `CallbackBuffer`.
///
/// The embedder owns canonical-order enforcement of its own raw input
/// stream via a standalone [`OrderCheck`] if it wants to validate
/// interleaved nodes and relations too; this manager keeps its own
/// `OrderCheck` scoped to the `way` ids it actually receives in pass 2,
/// since that's the only object type its own protocol consumes.
pub struct MultipolygonManager {
    config: ManagerConfig,
    relations: RelationsDatabase,
    members: MembersDatabase,
    order: OrderCheck,
    buffer: CallbackBuffer<Area>,
    stats: AreaStats,
    prepared: bool,
}

impl MultipolygonManager {
    pub fn new(config: ManagerConfig) -> Self {
        let buffer = CallbackBuffer::new(config.flush_threshold);
        MultipolygonManager {
            config,
            relations: RelationsDatabase::new(),
            members: MembersDatabase::new(),
            order: OrderCheck::new(),
            buffer,
            stats: AreaStats::default(),
            prepared: false,
        }
    }

    /// Installs (or clears, with `None`) the sink completed area buffers are
    /// handed to. Without one, `read_output` is the only way to retrieve
    /// assembled areas.
    pub fn set_output_callback(&mut self, sink: Option<Box<dyn BufferSink<Area>>>) {
        self.buffer.set_callback(sink);
    }

    /// Pulls whatever areas are currently buffered, in pull mode.
    pub fn read_output(&mut self) -> Vec<Area> {
        self.buffer.read()
    }

    /// Forces a hand-off of the current buffer regardless of its size.
    pub fn flush_output(&mut self) {
        self.buffer.flush();
    }

    /// Pass 1: offers one relation. Applies the area filter (C4) first; a
    /// rejected relation is dropped without further bookkeeping. A
    /// qualifying relation is kept in C3, and each way member's interest is
    /// registered with C2 under its slot index, so pass 2 can resolve it
    /// back into the relation regardless of which way arrives first.
    ///
    /// Non-way members are marked not-of-interest (their `id` cleared) but
    /// keep their slot, preserving the role ordering an assembler needs.
    pub fn relation(&mut self, mut relation: Relation) -> Result<()> {
        if self.prepared {
            return Err(Error::StashCorruption("relation() called after prepare()"));
        }
        if !relation_qualifies(&relation.tags, &self.config.filter) {
            return Ok(());
        }

        for member in relation.members.iter_mut() {
            if member.member_type != MemberType::Way {
                member.clear_id();
            }
        }
        let interests: Vec<(usize, i64)> = relation
            .members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_of_interest())
            .map(|(slot, m)| (slot, m.id))
            .collect();

        let handle = self.relations.add(relation, interests.len() as u32);
        debug!("kept relation with {} way member(s) of interest", interests.len());
        for (slot, way_id) in interests {
            self.members.track(handle, way_id, slot)?;
        }
        Ok(())
    }

    /// Pass boundary: sorts C2's interests so pass 2 can resolve each
    /// incoming way in a single range lookup. Idempotent guard against a
    /// caller invoking it twice; must run exactly once, after the last
    /// `relation` call and before the first `way` call.
    pub fn prepare(&mut self) -> Result<()> {
        self.members.prepare()?;
        self.prepared = true;
        info!("prepared {} kept relation(s) for pass 2", self.relations.len());
        Ok(())
    }

    /// Pass 2: offers one way. Two independent things can happen, in this
    /// fixed order: the way may complete one or more pending relations
    /// (emitting a relation-sourced area per completion), and -- separately
    /// -- the way itself may qualify as a standalone closed-way area. A way
    /// can do both: a closed way that is also a relation member still gets
    /// checked against both paths.
    pub fn way(&mut self, way: Way) -> Result<()> {
        if !self.prepared {
            return Err(Error::StashCorruption("way() called before prepare()"));
        }
        self.order.check(ObjectType::Way, way.id)?;

        let closed_candidate =
            way.is_closed() && !is_area_no(&way.tags) && self.config.filter.matches(&way.tags);
        let way_for_closed = if closed_candidate { Some(way.clone()) } else { None };

        {
            let assembler = &self.config.assembler;
            let assembler_config = &self.config.assembler_config;
            let stats = &mut self.stats;
            let buffer = &mut self.buffer;
            self.members
                .add(&mut self.relations, way, |relations, relation_handle, resolved| {
                    let relation = relations.relation(relation_handle)?;
                    match assembler.assemble_relation(relation, resolved, assembler_config) {
                        Ok(area) => {
                            record_area(stats, buffer, area);
                            Ok(())
                        }
                        Err(e) => record_failure(stats, e),
                    }
                })?;
        }

        if let Some(way) = way_for_closed {
            match self.config.assembler.assemble_way(&way, &self.config.assembler_config) {
                Ok(area) => record_area(&mut self.stats, &mut self.buffer, area),
                Err(e) => record_failure(&mut self.stats, e)?,
            }
        }

        Ok(())
    }

    /// Call once after the last `way`. Counts whatever relations are still
    /// held in C3 as incomplete (one or more members never arrived) and
    /// forces a terminal flush, returning the final tally.
    pub fn finish_pass2(&mut self) -> AreaStats {
        self.stats.incomplete_relations = self.relations.len();
        if self.stats.incomplete_relations > 0 {
            for (_, relation) in self.relations.iter() {
                debug!("relation {} never completed: a way member never arrived", relation.id);
            }
            info!("{} relation(s) never completed", self.stats.incomplete_relations);
        }
        self.buffer.flush();
        self.stats
    }

    pub fn stats(&self) -> AreaStats {
        self.stats
    }

    pub fn used_memory(&self) -> MemoryStats {
        MemoryStats {
            relations: self.relations.used_memory(),
            members: self.members.bookkeeping_memory(),
            stash: self.members.used_memory(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::assembler::RingAssembler;
    use crate::filter::TagMatcher;
    use crate::model::{Member, NodeRef};

    fn manager() -> MultipolygonManager {
        env_logger::try_init().ok();
        MultipolygonManager::new(ManagerConfig::new(Box::new(RingAssembler::new())))
    }

    fn closed_square(id: i64) -> Way {
        let mut way = Way::new(id);
        way.push_ref(NodeRef::with_location(1, 0.0, 0.0));
        way.push_ref(NodeRef::with_location(2, 1.0, 0.0));
        way.push_ref(NodeRef::with_location(3, 1.0, 1.0));
        way.push_ref(NodeRef::with_location(4, 0.0, 0.0));
        way
    }

    #[test]
    fn single_closed_way_becomes_an_area() {
        let mut m = manager();
        m.prepare().unwrap();
        let mut way = closed_square(42);
        way.push_tag("building", "yes");
        m.way(way).unwrap();
        let out = m.read_output();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id(), 84);
        assert_eq!(m.stats().areas_from_ways, 1);
    }

    #[test]
    fn simple_multipolygon_relation_assembles_to_one_area() {
        let mut m = manager();
        let mut relation = Relation::new(7);
        relation.push_tag("type", "multipolygon");
        relation.push_member(Member::new(MemberType::Way, 10, "outer"));
        relation.push_member(Member::new(MemberType::Way, 11, "inner"));
        m.relation(relation).unwrap();
        m.prepare().unwrap();
        m.way(closed_square(10)).unwrap();
        m.way(closed_square(11)).unwrap();

        let out = m.read_output();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id(), 15);
        assert_eq!(out[0].outers().len(), 1);
        assert_eq!(out[0].outers()[0].inners.len(), 1);
        assert_eq!(m.stats().areas_from_relations, 1);
        assert_eq!(m.finish_pass2().incomplete_relations, 0);
    }

    #[test]
    fn area_no_suppresses_closed_way_area() {
        let mut m = manager();
        m.prepare().unwrap();
        let mut way = closed_square(5);
        way.push_tag("area", "no");
        m.way(way).unwrap();
        assert!(m.read_output().is_empty());
    }

    #[test]
    fn incomplete_relation_is_counted_not_errored() {
        let mut m = manager();
        let mut relation = Relation::new(20);
        relation.push_tag("type", "multipolygon");
        relation.push_member(Member::new(MemberType::Way, 99, "outer"));
        m.relation(relation).unwrap();
        m.prepare().unwrap();
        // way 99 never arrives
        assert_eq!(m.finish_pass2().incomplete_relations, 1);
    }

    #[test]
    fn shared_way_completes_both_relations_in_registration_order() {
        let mut m = manager();
        let mut a = Relation::new(1);
        a.push_tag("type", "multipolygon");
        a.push_member(Member::new(MemberType::Way, 5, "outer"));
        let mut b = Relation::new(2);
        b.push_tag("type", "multipolygon");
        b.push_member(Member::new(MemberType::Way, 5, "outer"));
        m.relation(a).unwrap();
        m.relation(b).unwrap();
        m.prepare().unwrap();
        m.way(closed_square(5)).unwrap();

        let out = m.read_output();
        assert_eq!(out.len(), 2);
        // relation 1 -> area id 3, relation 2 -> area id 5
        assert_eq!(out[0].id(), 3);
        assert_eq!(out[1].id(), 5);
    }

    #[test]
    fn out_of_order_ways_are_a_fatal_error() {
        let mut m = manager();
        m.prepare().unwrap();
        m.way(closed_square(10)).unwrap();
        assert!(matches!(m.way(closed_square(9)), Err(Error::InvalidOrder(_))));
    }

    #[test]
    fn relation_rejected_by_user_filter_registers_no_interests() {
        let mut m = MultipolygonManager::new(
            ManagerConfig::new(Box::new(RingAssembler::new())).with_filter(TagMatcher::key("landuse")),
        );
        let mut relation = Relation::new(3);
        relation.push_tag("type", "multipolygon");
        relation.push_member(Member::new(MemberType::Way, 10, "outer"));
        m.relation(relation).unwrap();
        m.prepare().unwrap();
        m.way(closed_square(10)).unwrap();
        // no relation was kept, and the way itself has no area=-qualifying tags
        assert!(m.read_output().is_empty());
        assert_eq!(m.finish_pass2().incomplete_relations, 0);
    }

    #[test]
    fn relation_and_way_before_prepare_or_after_are_rejected() {
        let mut m = manager();
        assert!(matches!(
            m.way(closed_square(1)),
            Err(Error::StashCorruption(_))
        ));
        m.prepare().unwrap();
        assert!(matches!(
            m.relation(Relation::new(1)),
            Err(Error::StashCorruption(_))
        ));
    }
}
