//! Multipolygon area assembly core.
//!
//! Consumes relations during a first streaming pass and ways during a
//! second, and emits reconstructed polygonal `Area`s as soon as every way a
//! relation needs has arrived. Decoding the source OSM extract and writing
//! the assembled areas back out in whatever binary form a downstream
//! consumer wants are both outside this crate -- it only does the area
//! bookkeeping in between.
//!
//! ```
//! use osm_area_core::{
//!     assembler::RingAssembler,
//!     config::ManagerConfig,
//!     manager::MultipolygonManager,
//!     model::{Member, MemberType, NodeRef, Relation, Way},
//! };
//!
//! let mut manager = MultipolygonManager::new(ManagerConfig::new(Box::new(RingAssembler::new())));
//!
//! let mut relation = Relation::new(7);
//! relation.push_tag("type", "multipolygon");
//! relation.push_member(Member::new(MemberType::Way, 10, "outer"));
//! manager.relation(relation).unwrap();
//! manager.prepare().unwrap();
//!
//! let mut way = Way::new(10);
//! way.push_ref(NodeRef::with_location(1, 0.0, 0.0));
//! way.push_ref(NodeRef::with_location(2, 1.0, 0.0));
//! way.push_ref(NodeRef::with_location(3, 1.0, 1.0));
//! way.push_ref(NodeRef::with_location(4, 0.0, 0.0));
//! manager.way(way).unwrap();
//!
//! assert_eq!(manager.read_output().len(), 1);
//! ```

pub mod assembler;
pub mod buffer;
pub mod config;
pub mod error;
pub mod filter;
pub mod manager;
pub mod members;
pub mod model;
pub mod order;
pub mod relations;
pub mod stash;
pub mod stats;

pub use crate::error::{Error, Result};
pub use crate::manager::MultipolygonManager;
