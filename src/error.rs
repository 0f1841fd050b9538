//! Typed errors for the invariants internal to this crate's library surface.
//!
//! Everything else (I/O, SQLite, JSON parsing) is threaded through
//! `anyhow::Context` at the call site instead of being wrapped here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PmtError {
    #[error("tile coordinate out of range: z={z} x={x} y={y}")]
    CoordinateOutOfRange { z: u8, x: u32, y: u32 },

    #[error("invalid directory entry while decoding: {0}")]
    InvalidDirectoryEntry(String),

    #[error("root directory still exceeds budget ({size} > {budget} bytes) at the largest attempted leaf size")]
    RootBudgetExceeded { size: usize, budget: usize },

    #[error("tile id {id} was indexed but its row is missing on re-read")]
    MissingRow { id: u64 },

    #[error("malformed header: {0}")]
    MalformedHeader(String),
}
