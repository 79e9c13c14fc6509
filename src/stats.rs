//! Additive counters the manager updates from each assembler invocation,
//! exposed through `MultipolygonManager::stats`.

use std::fmt;
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AreaStats {
    pub areas_from_ways: usize,
    pub areas_from_relations: usize,
    pub rings_built: usize,
    pub invalid_location_failures: usize,
    pub assembler_failures: usize,
    /// Relations still held in `RelationsDatabase` after pass 2: one or
    /// more way members never arrived. Not an error, just a count.
    pub incomplete_relations: usize,
}

impl AreaStats {
    pub fn areas_built(&self) -> usize {
        self.areas_from_ways + self.areas_from_relations
    }
}

impl AddAssign for AreaStats {
    fn add_assign(&mut self, other: Self) {
        self.areas_from_ways += other.areas_from_ways;
        self.areas_from_relations += other.areas_from_relations;
        self.rings_built += other.rings_built;
        self.invalid_location_failures += other.invalid_location_failures;
        self.assembler_failures += other.assembler_failures;
        self.incomplete_relations += other.incomplete_relations;
    }
}

impl fmt::Display for AreaStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            r#"Areas built:
  from ways:      {}
  from relations: {}
  rings:          {}
Failures:
  invalid location: {}
  assembler:        {}
Incomplete relations: {}"#,
            self.areas_from_ways,
            self.areas_from_relations,
            self.rings_built,
            self.invalid_location_failures,
            self.assembler_failures,
            self.incomplete_relations,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub relations: usize,
    pub members: usize,
    pub stash: usize,
}
