//! Bounded per-worker command queues.
//!
//! A command queue is a deferred-invocation channel: any caller (a
//! dispatcher handler, another worker, an external collaborator) may
//! enqueue, but only the owning worker dequeues and executes, in FIFO
//! order.  Enqueueing is lossy: commands are low-frequency admin toggles,
//! so a full queue logs an error and drops the command instead of
//! blocking or escalating.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use log::{debug, error};

/// Create a bounded command queue for one worker.
///
/// The `label` names the owning worker in log lines.
pub fn bounded<C>(label: &'static str, capacity: usize) -> (CommandSender<C>, CommandReceiver<C>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (CommandSender { tx, label }, CommandReceiver { rx, label })
}

/// Producer half.  Cheap to clone; safe to share across threads.
pub struct CommandSender<C> {
    tx: Sender<C>,
    label: &'static str,
}

impl<C> Clone for CommandSender<C> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone(), label: self.label }
    }
}

impl<C> CommandSender<C> {
    /// Non-blocking enqueue.  Returns `false` when the command was dropped
    /// (queue full or the owning worker is gone).
    pub fn send(&self, cmd: C) -> bool {
        match self.tx.try_send(cmd) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                error!("{} command queue is full: cannot add", self.label);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("{} command queue is closed: dropping command", self.label);
                false
            }
        }
    }

    /// Whether the queue currently has no pending commands.
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// What a dequeue attempt produced.
#[derive(Debug)]
pub enum Dequeued<C> {
    /// A command to execute.
    Command(C),
    /// No command within the wait budget.
    Empty,
    /// Every sender is gone; the worker should wind down.
    Closed,
}

/// Consumer half, held only by the owning worker.
pub struct CommandReceiver<C> {
    rx: Receiver<C>,
    label: &'static str,
}

impl<C> CommandReceiver<C> {
    /// Non-blocking dequeue (sensor worker: never suspend sampling).
    pub fn try_recv(&self) -> Dequeued<C> {
        match self.rx.try_recv() {
            Ok(cmd) => Dequeued::Command(cmd),
            Err(TryRecvError::Empty) => Dequeued::Empty,
            Err(TryRecvError::Disconnected) => Dequeued::Closed,
        }
    }

    /// Dequeue, waiting up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Dequeued<C> {
        match self.rx.recv_timeout(timeout) {
            Ok(cmd) => Dequeued::Command(cmd),
            Err(RecvTimeoutError::Timeout) => Dequeued::Empty,
            Err(RecvTimeoutError::Disconnected) => Dequeued::Closed,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}
