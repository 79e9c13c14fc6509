//! C5 -- the ring-assembly geometry collaborator.
//!
//! The contract (two call shapes, producing one `Area` or a
//! recoverable/fatal error) is fixed; the algorithm behind it is not. This
//! module defines the contract plus the area-id bijection, and ships one
//! reference implementation, `RingAssembler`: it treats an already-closed
//! way as a complete ring and assigns relation-member ways to outer/inner
//! rings by role. Full topology repair (self-intersection, dangling
//! segments) is explicitly out of scope.

use geo_types::Coord;

use crate::config::AssemblerConfig;
use crate::error::{Error, Result};
use crate::model::{Member, NodeRef, Relation, Tag, Way};

/// Computes an area id from an object id and whether it came from a
/// relation: `area_id = (|object_id| * 2 + (from_relation ? 1 : 0)) * sign(object_id)`.
///
/// Valid for object ids that fit comfortably under `i64::MAX / 2` (true of
/// every real OSM id); ids near the `i64` extremes are out of this
/// bijection's domain.
pub fn object_id_to_area_id(object_id: i64, from_relation: bool) -> i64 {
    let sign: i64 = if object_id < 0 { -1 } else { 1 };
    let magnitude = object_id.abs() * 2 + if from_relation { 1 } else { 0 };
    magnitude * sign
}

/// Inverts `object_id_to_area_id`'s id component: `area_id / 2`.
pub fn area_id_to_object_id(area_id: i64) -> i64 {
    area_id / 2
}

/// True iff `area_id` was produced from a way (the bijection's low bit is
/// clear).
pub fn from_way(area_id: i64) -> bool {
    (area_id.abs() & 1) == 0
}

/// A closed ring: an ordered sequence of node references, front == back.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub nodes: Vec<NodeRef>,
}

impl Ring {
    pub fn points(&self) -> impl Iterator<Item = Coord<f64>> + '_ {
        self.nodes.iter().filter_map(|n| n.location).map(|(lon, lat)| Coord { x: lon, y: lat })
    }
}

/// One outer ring plus the inner rings (holes) nested inside it. Inner
/// rings are carried directly under their enclosing outer, which is what
/// gives "inner-ring enumeration for an outer is contiguous" for free in
/// this in-memory representation (a binary child-sequence ordering would be
/// a property of an external writer, not of this type).
#[derive(Debug, Clone, PartialEq)]
pub struct OuterRing {
    pub ring: Ring,
    pub inners: Vec<Ring>,
}

/// The reconstructed polygonal object this crate exists to produce.
///
/// Fields are private: `from_way`/`from_relation` are the only way to build
/// one, so an `Area`'s id is always the bijection in this module's own
/// `object_id_to_area_id`, never a value a caller assembled by hand (the
/// "friend-class backdoor" spec.md §9 calls out -- closed here by a
/// module-private constructor rather than a privileged builder type).
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    id: i64,
    tags: Vec<Tag>,
    outers: Vec<OuterRing>,
}

impl Area {
    pub fn from_way(way_id: i64, tags: Vec<Tag>, ring: Ring) -> Self {
        Area {
            id: object_id_to_area_id(way_id, false),
            tags,
            outers: vec![OuterRing { ring, inners: Vec::new() }],
        }
    }

    pub fn from_relation(relation_id: i64, tags: Vec<Tag>, outers: Vec<OuterRing>) -> Self {
        Area {
            id: object_id_to_area_id(relation_id, true),
            tags,
            outers,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn outers(&self) -> &[OuterRing] {
        &self.outers
    }

    pub fn is_multipolygon(&self) -> bool {
        self.outers.len() > 1
    }

    /// Rough heap footprint in bytes, used by `CallbackBuffer`'s
    /// size-threshold accounting.
    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Area>()
            + self.tags.iter().map(|(k, v)| k.capacity() + v.capacity()).sum::<usize>()
            + self
                .outers
                .iter()
                .map(|o| {
                    (o.ring.nodes.len() + o.inners.iter().map(|i| i.nodes.len()).sum::<usize>())
                        * std::mem::size_of::<NodeRef>()
                })
                .sum::<usize>()
    }
}

/// A failure category the manager records in `stats` without emitting an
/// area, distinct from `InvalidLocation` (which the manager swallows
/// entirely).
#[derive(Debug, thiserror::Error)]
pub enum AssemblerFailure {
    #[error("way has an unrecognized member role: {0:?}")]
    UnrecognizedRole(String),
    #[error("relation has no resolvable outer ring")]
    NoOuterRing,
}

/// The ring-assembly geometry contract. Two call shapes, matching the two
/// ways an area can originate: a standalone closed way, or a relation's
/// resolved way members. Dispatched dynamically (`Box<dyn Assembler>`).
///
/// `config` is the `AssemblerConfig` installed on the manager, forwarded
/// verbatim on every call -- this crate never inspects it, only threads it
/// through to whichever `Assembler` is plugged in.
pub trait Assembler: Send + Sync {
    /// Assembles a single closed way (already verified closed, filter
    /// matched, and not `area=no` by the caller) into an `Area`.
    fn assemble_way(&self, way: &Way, config: &AssemblerConfig) -> Result<Area>;

    /// Assembles a relation's resolved way members -- `(slot, &Way)` pairs,
    /// already filtered down to members of interest -- into one `Area`.
    fn assemble_relation(
        &self,
        relation: &Relation,
        members: &[(usize, &Way)],
        config: &AssemblerConfig,
    ) -> Result<Area>;
}

/// Reference `Assembler`: treats each already-closed way as a complete
/// ring, with no boolean polygon operations or self-intersection repair
/// (both are Non-goals). Relation members are assigned to outer/inner by
/// their declared role.
#[derive(Debug, Default, Clone, Copy)]
pub struct RingAssembler;

impl RingAssembler {
    pub fn new() -> Self {
        RingAssembler
    }

    fn way_ring(way: &Way) -> Result<Ring> {
        let has_bad_location = way.refs.iter().any(|n| match n.location {
            None => true,
            Some((lon, lat)) => lon.is_nan() || lat.is_nan(),
        });
        if has_bad_location {
            return Err(Error::InvalidLocation);
        }
        Ok(Ring { nodes: way.refs.clone() })
    }
}

impl Assembler for RingAssembler {
    fn assemble_way(&self, way: &Way, _config: &AssemblerConfig) -> Result<Area> {
        let ring = Self::way_ring(way)?;
        Ok(Area::from_way(way.id, way.tags.clone(), ring))
    }

    fn assemble_relation(
        &self,
        relation: &Relation,
        members: &[(usize, &Way)],
        _config: &AssemblerConfig,
    ) -> Result<Area> {
        let member_by_slot = |slot: usize| -> Option<&Member> { relation.members.get(slot) };

        let mut outers: Vec<OuterRing> = Vec::new();
        let mut pending_inners: Vec<Ring> = Vec::new();

        for &(slot, way) in members {
            let member = member_by_slot(slot).ok_or(Error::AssemblerFailure {
                object_id: relation.id,
                source: Box::new(AssemblerFailure::NoOuterRing),
            })?;
            let ring = Self::way_ring(way)?;
            match member.role.as_str() {
                "outer" | "" => outers.push(OuterRing { ring, inners: Vec::new() }),
                "inner" => pending_inners.push(ring),
                other => {
                    return Err(Error::AssemblerFailure {
                        object_id: relation.id,
                        source: Box::new(AssemblerFailure::UnrecognizedRole(other.to_string())),
                    })
                }
            }
        }

        if outers.is_empty() {
            return Err(Error::AssemblerFailure {
                object_id: relation.id,
                source: Box::new(AssemblerFailure::NoOuterRing),
            });
        }

        // A single outer takes every inner; multiple outers with mixed
        // holes would need point-in-polygon containment, which is
        // topology repair and out of scope -- this reference assembler
        // only handles the common single-outer case precisely.
        if outers.len() == 1 {
            outers[0].inners = pending_inners;
        }

        Ok(Area::from_relation(relation.id, relation.tags.clone(), outers))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::MemberType;
    use proptest::prelude::*;

    fn closed_square(id: i64) -> Way {
        let mut way = Way::new(id);
        way.push_ref(NodeRef::with_location(1, 0.0, 0.0));
        way.push_ref(NodeRef::with_location(2, 1.0, 0.0));
        way.push_ref(NodeRef::with_location(3, 1.0, 1.0));
        way.push_ref(NodeRef::with_location(4, 0.0, 0.0));
        way
    }

    #[test]
    fn assembles_single_closed_way() {
        let mut way = closed_square(42);
        way.push_tag("building", "yes");
        let area = RingAssembler::new()
            .assemble_way(&way, &AssemblerConfig::default())
            .unwrap();
        assert_eq!(area.id(), 84);
        assert_eq!(area.outers().len(), 1);
        assert_eq!(area.outers()[0].ring.nodes.len(), 4);
        assert!(area.outers()[0].inners.is_empty());
    }

    #[test]
    fn missing_location_is_invalid_location() {
        let mut way = Way::new(1);
        way.push_ref(NodeRef::new(1));
        way.push_ref(NodeRef::new(2));
        way.push_ref(NodeRef::new(3));
        way.push_ref(NodeRef::new(1));
        assert!(matches!(
            RingAssembler::new().assemble_way(&way, &AssemblerConfig::default()),
            Err(Error::InvalidLocation)
        ));
    }

    #[test]
    fn nan_location_is_invalid_location() {
        let mut way = closed_square(2);
        way.refs[1] = NodeRef::with_location(2, f64::NAN, 0.0);
        assert!(matches!(
            RingAssembler::new().assemble_way(&way, &AssemblerConfig::default()),
            Err(Error::InvalidLocation)
        ));
    }

    #[test]
    fn assembles_relation_with_outer_and_inner() {
        let mut relation = Relation::new(7);
        relation.push_tag("type", "multipolygon");
        relation.push_member(Member::new(MemberType::Way, 10, "outer"));
        relation.push_member(Member::new(MemberType::Way, 11, "inner"));

        let outer_way = closed_square(10);
        let inner_way = closed_square(11);
        let members: Vec<(usize, &Way)> = vec![(0, &outer_way), (1, &inner_way)];

        let area = RingAssembler::new()
            .assemble_relation(&relation, &members, &AssemblerConfig::default())
            .unwrap();
        assert_eq!(area.id(), 15);
        assert_eq!(area.outers().len(), 1);
        assert_eq!(area.outers()[0].inners.len(), 1);
    }

    #[test]
    fn unrecognized_role_is_assembler_failure() {
        let mut relation = Relation::new(1);
        relation.push_member(Member::new(MemberType::Way, 10, "subarea"));
        let way = closed_square(10);
        let members: Vec<(usize, &Way)> = vec![(0, &way)];
        assert!(matches!(
            RingAssembler::new().assemble_relation(&relation, &members, &AssemblerConfig::default()),
            Err(Error::AssemblerFailure { .. })
        ));
    }

    proptest! {
        // P3: area_id_to_object_id(object_id_to_area_id(id, t)) == id
        #[test]
        fn bijection_roundtrips(id in -(1i64 << 59)..(1i64 << 59), from_relation in any::<bool>()) {
            let area_id = object_id_to_area_id(id, from_relation);
            prop_assert_eq!(area_id_to_object_id(area_id), id);
        }

        // P4: from_way reports the encoded kind correctly.
        #[test]
        fn bijection_preserves_kind(id in -(1i64 << 59)..(1i64 << 59)) {
            prop_assert!(from_way(object_id_to_area_id(id, false)));
            prop_assert!(!from_way(object_id_to_area_id(id, true)));
        }
    }
}
