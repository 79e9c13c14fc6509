//! OSM object views the manager consumes.
//!
//! These are plain owned records, not a binding to any particular decoder's
//! wire format -- the decoder producing them, and the writer consuming the
//! `Area`s this crate emits, are both external collaborators (see crate
//! docs).

/// One key/value tag pair.
pub type Tag = (String, String);

/// A reference to a node inside a way's geometry.
///
/// `location` is `None` when the upstream decoder hasn't resolved the
/// reference (e.g. the referenced node lies outside an extract); ring
/// assembly that needs the coordinate then fails with `InvalidLocation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRef {
    pub id: i64,
    pub location: Option<(f64, f64)>,
}

impl NodeRef {
    pub fn new(id: i64) -> Self {
        NodeRef { id, location: None }
    }

    pub fn with_location(id: i64, lon: f64, lat: f64) -> Self {
        NodeRef {
            id,
            location: Some((lon, lat)),
        }
    }
}

/// An OSM way: an ordered sequence of node references plus tags.
#[derive(Debug, Clone, Default)]
pub struct Way {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub refs: Vec<NodeRef>,
}

impl Way {
    pub fn new(id: i64) -> Self {
        Way {
            id,
            tags: Vec::new(),
            refs: Vec::new(),
        }
    }

    pub fn push_ref(&mut self, node_ref: NodeRef) -> &mut Self {
        self.refs.push(node_ref);
        self
    }

    pub fn push_tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// A way is closed iff it has at least 4 node refs and its front and
    /// back locations are present and bit-exact equal.
    pub fn is_closed(&self) -> bool {
        if self.refs.len() < 4 {
            return false;
        }
        match (self.refs.first(), self.refs.last()) {
            (Some(front), Some(back)) => match (front.location, back.location) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }

    /// Rough heap footprint in bytes, used for `used_memory()` reporting.
    pub(crate) fn approx_size(&self) -> usize {
        std::mem::size_of::<Way>()
            + self.refs.len() * std::mem::size_of::<NodeRef>()
            + self
                .tags
                .iter()
                .map(|(k, v)| k.capacity() + v.capacity())
                .sum::<usize>()
    }
}

/// The type of an OSM relation member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

/// One member of a relation.
///
/// `id` is the referenced object's id while the member is of interest to
/// area building; pass 1 zeroes it for members the core doesn't track
/// (non-way members) while leaving the slot position intact, per the
/// member-slot addressing `MembersDatabase` and `RelationsDatabase` rely on.
#[derive(Debug, Clone)]
pub struct Member {
    pub member_type: MemberType,
    pub id: i64,
    pub role: String,
}

impl Member {
    pub fn new(member_type: MemberType, id: i64, role: impl Into<String>) -> Self {
        Member {
            member_type,
            id,
            role: role.into(),
        }
    }

    /// Marks this member as not of interest, preserving its slot position.
    pub fn clear_id(&mut self) {
        self.id = 0;
    }

    pub fn is_of_interest(&self) -> bool {
        self.id != 0
    }
}

/// An OSM relation: an ordered sequence of members plus tags.
#[derive(Debug, Clone, Default)]
pub struct Relation {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub members: Vec<Member>,
}

impl Relation {
    pub fn new(id: i64) -> Self {
        Relation {
            id,
            tags: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn push_member(&mut self, member: Member) -> &mut Self {
        self.members.push(member);
        self
    }

    pub fn push_tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn approx_size(&self) -> usize {
        std::mem::size_of::<Relation>()
            + self.members.len() * std::mem::size_of::<Member>()
            + self
                .members
                .iter()
                .map(|m| m.role.capacity())
                .sum::<usize>()
            + self
                .tags
                .iter()
                .map(|(k, v)| k.capacity() + v.capacity())
                .sum::<usize>()
    }
}

/// OSM object kind, used by the area id bijection (`assembler::area_id`) and
/// the canonical-order check (`order`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ObjectType {
    Node,
    Way,
    Relation,
}
