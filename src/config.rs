//! Ambient configuration surface: built programmatically (no CLI, per the
//! crate's scope), analogous in shape to how `osmflat::OsmBuilder::new`
//! takes storage and the caller drives a sequence of `start_*` calls rather
//! than parsing flags.

use crate::assembler::Assembler;
use crate::buffer::DEFAULT_FLUSH_THRESHOLD;
use crate::filter::TagMatcher;

/// Opaque configuration forwarded verbatim to every assembler invocation.
/// The manager never inspects it; it only threads it through to whichever
/// `Assembler` implementation the embedder installed.
#[derive(Debug, Clone, Default)]
pub struct AssemblerConfig(pub std::collections::BTreeMap<String, String>);

pub struct ManagerConfig {
    pub filter: TagMatcher,
    pub assembler: Box<dyn Assembler>,
    pub assembler_config: AssemblerConfig,
    pub flush_threshold: usize,
}

impl ManagerConfig {
    pub fn new(assembler: Box<dyn Assembler>) -> Self {
        ManagerConfig {
            filter: TagMatcher::always_true(),
            assembler,
            assembler_config: AssemblerConfig::default(),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }

    pub fn with_filter(mut self, filter: TagMatcher) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_assembler_config(mut self, config: AssemblerConfig) -> Self {
        self.assembler_config = config;
        self
    }

    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self
    }
}
