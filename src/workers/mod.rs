//! Worker loops.
//!
//! Each worker is an independent OS thread running its own bounded loop:
//! it owns its hardware port and local state exclusively, drains its
//! command queue, and publishes events to the bus.  No state is shared
//! across workers; all cross-worker communication goes through the
//! bounded queues.

use std::thread::JoinHandle;

use crate::bus::EventPublisher;
use crate::cmdq::CommandSender;
use crate::error::{Error, Result};
use crate::events::Event;

pub mod bridge;
pub mod motion;
pub mod screen;

/// Command-queue senders for every worker, used by dispatcher handlers
/// (and external collaborators) to schedule work inside a worker.
#[derive(Clone)]
pub struct WorkerHandles {
    pub motion: CommandSender<motion::MotionCommand>,
    pub screen: CommandSender<screen::ScreenCommand>,
    pub bridge: CommandSender<bridge::BridgeCommand>,
}

/// A spawned worker thread, tracked by the dispatcher for liveness.
pub struct WorkerThread {
    pub name: &'static str,
    pub handle: JoinHandle<Result<()>>,
}

/// Publish an event from inside a worker loop.
///
/// `Ok(false)` means the bus consumer is gone and the worker should wind
/// down quietly (normal during shutdown).  A full bus stays fatal.
pub(crate) fn publish_or_stop(bus: &EventPublisher, event: Event) -> Result<bool> {
    match bus.publish(event) {
        Ok(()) => Ok(true),
        Err(Error::BusClosed) => Ok(false),
        Err(e) => Err(e),
    }
}
