//! Bedside-clock daemon: concurrent orchestration of a light/proximity
//! sensor, an LED-matrix clock display and a pub/sub broker bridge.
//!
//! The architecture is a hub and spokes:
//!
//! ```text
//!   motion worker ─┐                       ┌─▶ motion cmdq
//!   screen worker ─┼─▶ event bus ─▶ dispatcher ─▶ screen cmdq
//!   bridge worker ─┘      (mpsc)        │   └─▶ bridge cmdq
//!                                       └─ liveness checks
//! ```
//!
//! Workers publish immutable [`events::Event`] facts onto one bounded
//! bus; the dispatcher consumes them in order and translates each into
//! commands on the target workers' bounded queues.  Workers never talk
//! to each other directly and share no state, so every control policy
//! ([`workers::motion::MotionState`], [`workers::screen::ScreenState`])
//! is a plain struct testable without threads or hardware.
//!
//! Hardware and the broker sit behind the [`ports`] traits; see
//! [`adapters`] for the host implementations.

pub mod adapters;
pub mod bus;
pub mod cmdq;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod ports;
pub mod shutdown;
pub mod workers;

pub use config::Config;
pub use error::{Error, Result};
