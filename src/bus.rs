//! The event bus: a single bounded multi-producer/single-consumer queue
//! funnelling every worker's output to the dispatcher.
//!
//! Publishing never blocks.  A full bus means the consumer is stuck and
//! the whole device is unresponsive, so it is a *fatal* error for the
//! publishing worker.  Events are functionally meaningful (motion
//! detected, lux changed) and must never be silently dropped.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error};

use crate::error::{Error, Result};
use crate::events::Event;

/// Create the bus.  One consumer (the dispatcher), any number of
/// publisher clones.
pub fn bounded(capacity: usize) -> (EventPublisher, EventBus) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (EventPublisher { tx }, EventBus { rx })
}

/// Producer half, cloned into every worker.
#[derive(Clone)]
pub struct EventPublisher {
    tx: Sender<Event>,
}

impl EventPublisher {
    /// Non-blocking publish.
    ///
    /// `Error::BusFull` is fatal to the caller's loop; `Error::BusClosed`
    /// only occurs while the process is already shutting down.
    pub fn publish(&self, event: Event) -> Result<()> {
        debug!("generating event: {}", event.description());
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(ev)) => {
                error!(
                    "event bus is stuck, cannot add event: {}",
                    ev.description()
                );
                Err(Error::BusFull(ev.kind()))
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::BusClosed),
        }
    }
}

/// Consumer half, owned by the dispatcher.
pub struct EventBus {
    rx: Receiver<Event>,
}

impl EventBus {
    /// Block up to `timeout` for the next event.  `None` on timeout;
    /// the dispatcher uses that as its liveness-check heartbeat.
    pub fn consume(&self, timeout: Duration) -> Option<Event> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}
