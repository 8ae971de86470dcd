//! Error taxonomy of the engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BddError>;

#[derive(Debug, Error)]
pub enum BddError {
    /// Undeclared variable, dead node id, non-adjacent swap target,
    /// level out of range, non-Boolean cofactor value.
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// Detected canonicity or refcount violation. Never raised by a
    /// correct implementation; documents a bug when it appears.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Hit `max_nodes`, `max_memory`, or the cache bound with no
    /// forward progress possible.
    #[error("exhausted: {0}")]
    Exhausted(String),

    /// Variable or node missing where one is required.
    #[error("not found: {0}")]
    NotFound(String),

    /// A level still holds live nodes, or a reorder was requested while
    /// one is already running.
    #[error("in use: {0}")]
    InUse(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or truncated dump file.
    #[error("malformed dump: {0}")]
    Malformed(String),
}
