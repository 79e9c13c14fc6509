use thiserror::Error;

/// Crate-wide error type.
///
/// Per-object failures (`InvalidLocation`, `AssemblerFailure`) are local: the
/// manager catches `InvalidLocation` itself and continues with the next
/// object. Everything else invalidates a structural invariant and is meant
/// to propagate to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// A ring or closed-way assembly needed a node location that was missing
    /// or not finite. Swallowed by the manager; the object is skipped.
    #[error("missing or invalid node location during area assembly")]
    InvalidLocation,

    /// Pass-2 input violated OSM canonical order (see `order`). Fatal.
    #[error("input violates OSM canonical order: {0}")]
    InvalidOrder(String),

    /// The assembler rejected an object for a reason other than a missing
    /// location (self-intersection, unclosed ring, mismatched roles, ...).
    #[error("assembler failed to build area for object {object_id}: {source}")]
    AssemblerFailure {
        object_id: i64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A handle was used after release, released twice, or never existed.
    /// Always a programmer error on the caller's side, never input-driven.
    #[error("stash contract violation: {0}")]
    StashCorruption(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
