//! Unified error types for the bedclock daemon.
//!
//! Only *fatal* conditions are represented here: a full event bus (stuck
//! consumer) and a dead worker.  Both unwind to the top-level run loop,
//! which shuts the remaining workers down and exits non-zero so the
//! supervisor can restart the process.  Recoverable conditions (a full
//! command queue, an oversized payload, an unrecognised topic) are logged
//! and handled at the point of detection and never propagate.

use std::fmt;

use crate::events::EventKind;

/// Every fatal condition in the daemon funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The event bus is full; the dispatcher is stuck.
    BusFull(EventKind),
    /// The event bus consumer is gone (normal only during shutdown).
    BusClosed,
    /// A worker thread terminated unexpectedly.
    WorkerDied(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusFull(kind) => {
                write!(f, "event bus is full, cannot add {kind:?} event")
            }
            Self::BusClosed => write!(f, "event bus consumer is gone"),
            Self::WorkerDied(name) => write!(f, "{name} worker terminated unexpectedly"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Daemon-wide `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;
