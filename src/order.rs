//! C8 -- asserts pass-2 input obeys OSM canonical order: item-type
//! non-decreasing (nodes <= ways <= relations), `id` strictly ascending
//! within each type.
//!
//! A violation here is caller input (a malformed extract), not a
//! programmer error, so it's a recoverable `Err`, not a panic.

use crate::error::{Error, Result};
use crate::model::ObjectType;

#[derive(Debug, Default)]
pub struct OrderCheck {
    last_type: Option<ObjectType>,
    last_id: Option<i64>,
}

impl OrderCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call once per object in the pass-2 stream, in the order it arrives.
    pub fn check(&mut self, object_type: ObjectType, id: i64) -> Result<()> {
        match self.last_type {
            Some(last) if last > object_type => {
                return Err(Error::InvalidOrder(format!(
                    "object type went backwards: {:?} after {:?}",
                    object_type, last
                )));
            }
            Some(last) if last == object_type => {
                if let Some(last_id) = self.last_id {
                    if id <= last_id {
                        return Err(Error::InvalidOrder(format!(
                            "{:?} id {} did not increase past {}",
                            object_type, id, last_id
                        )));
                    }
                }
            }
            _ => {}
        }
        self.last_type = Some(object_type);
        self.last_id = Some(id);
        Ok(())
    }
}
