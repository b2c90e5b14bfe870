//! The dispatcher: single consumer of the event bus, routing each event
//! to its handler on the main thread.
//!
//! Handlers are small and non-blocking.  Each translates one event into
//! a command on a worker queue; they never touch hardware and never
//! wait.  A kind may carry several handlers, run in registration order.
//! Ordering is therefore exactly bus order: events are consumed one at a
//! time, and every command for one event lands in its queue before any
//! command from the next event.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::bus::EventBus;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{Event, EventKind};
use crate::shutdown::ShutdownToken;
use crate::workers::bridge::{BridgeCommand, PubTopic, STATE_OFF, STATE_ON};
use crate::workers::motion::MotionCommand;
use crate::workers::screen::ScreenCommand;
use crate::workers::{WorkerHandles, WorkerThread};

/// An event handler: reads one event, schedules follow-up work on a
/// worker command queue.
pub type Handler = fn(&Event, &WorkerHandles);

/// The routing table: handlers per kind, run in registration order.
pub type Routes = HashMap<EventKind, Vec<Handler>>;

// ───────────────────────────────────────────────────────────────
// Handlers
// ───────────────────────────────────────────────────────────────

fn forward_lux_to_screen(event: &Event, workers: &WorkerHandles) {
    let Event::MotionLux(lux) = event else { return };
    workers.screen.send(ScreenCommand::MotionLux(*lux));
}

fn publish_lux_to_broker(event: &Event, workers: &WorkerHandles) {
    let Event::MotionLux(lux) = event else { return };
    workers.bridge.send(BridgeCommand::Publish {
        topic: PubTopic::Light,
        value: lux.to_string(),
    });
}

fn forward_proximity_to_screen(event: &Event, workers: &WorkerHandles) {
    let Event::MotionProximity(proximity) = event else { return };
    workers.screen.send(ScreenCommand::MotionProximity(*proximity));
}

fn publish_motion_gone_to_broker(event: &Event, workers: &WorkerHandles) {
    // The departure edge is published here; the arrival edge rides on
    // the dedicated MotionDetected event.
    let Event::MotionProximity(0) = event else { return };
    workers.bridge.send(BridgeCommand::Publish {
        topic: PubTopic::Motion,
        value: STATE_OFF.to_string(),
    });
}

fn publish_motion_to_broker(_event: &Event, workers: &WorkerHandles) {
    workers.bridge.send(BridgeCommand::Publish {
        topic: PubTopic::Motion,
        value: STATE_ON.to_string(),
    });
}

fn force_lux_report(event: &Event, workers: &WorkerHandles) {
    let Event::LuxUpdateRequest { requester } = event else { return };
    debug!("forcing a lux report for {requester}");
    workers.motion.send(MotionCommand::ForceLuxReport);
}

fn forward_stays_on_to_screen(event: &Event, workers: &WorkerHandles) {
    let Event::ScreenStaysOn { enable, .. } = event else { return };
    workers.screen.send(ScreenCommand::StaysOn(*enable));
}

fn forward_temperature_to_screen(event: &Event, workers: &WorkerHandles) {
    let Event::OutsideTemperature { value, .. } = event else { return };
    workers.screen.send(ScreenCommand::OutsideTemperature(*value));
}

fn forward_message_to_screen(event: &Event, workers: &WorkerHandles) {
    let Event::DisplayMessage { text, .. } = event else { return };
    workers.screen.send(ScreenCommand::DisplayMessage(text.clone()));
}

/// The full routing table.
pub fn default_routes() -> Routes {
    HashMap::from([
        (
            EventKind::MotionLux,
            vec![forward_lux_to_screen as Handler, publish_lux_to_broker],
        ),
        (
            EventKind::MotionProximity,
            vec![
                forward_proximity_to_screen as Handler,
                publish_motion_gone_to_broker,
            ],
        ),
        (EventKind::MotionDetected, vec![publish_motion_to_broker as Handler]),
        (EventKind::LuxUpdateRequest, vec![force_lux_report as Handler]),
        (EventKind::ScreenStaysOn, vec![forward_stays_on_to_screen as Handler]),
        (
            EventKind::OutsideTemperature,
            vec![forward_temperature_to_screen as Handler],
        ),
        (EventKind::DisplayMessage, vec![forward_message_to_screen as Handler]),
    ])
}

// ───────────────────────────────────────────────────────────────
// Dispatch loop
// ───────────────────────────────────────────────────────────────

pub struct Dispatcher {
    bus: EventBus,
    routes: Routes,
    handles: WorkerHandles,
    config: Config,
    shutdown: ShutdownToken,
}

impl Dispatcher {
    pub fn new(
        bus: EventBus,
        handles: WorkerHandles,
        config: Config,
        shutdown: ShutdownToken,
    ) -> Self {
        Self::with_routes(bus, default_routes(), handles, config, shutdown)
    }

    pub fn with_routes(
        bus: EventBus,
        routes: Routes,
        handles: WorkerHandles,
        config: Config,
        shutdown: ShutdownToken,
    ) -> Self {
        Self { bus, routes, handles, config, shutdown }
    }

    /// Route a single event.
    pub fn dispatch(&self, event: Event) {
        debug!("handling event: {}", event.description());
        match self.routes.get(&event.kind()) {
            Some(handlers) => {
                for handler in handlers {
                    handler(&event, &self.handles);
                }
            }
            None => warn!("no handler registered for {:?}", event.kind()),
        }
    }

    /// Main loop: consume events until shutdown or a dead worker.
    ///
    /// A quiet bus (receive timeout) doubles as the liveness heartbeat:
    /// a worker found dead is fatal and the error propagates to the
    /// caller, which triggers shutdown of the rest.
    pub fn run(&self, workers: &[WorkerThread]) -> Result<()> {
        info!("dispatcher started");
        while !self.shutdown.is_triggered() {
            match self.bus.consume(self.config.event_recv_timeout()) {
                Some(event) => self.dispatch(event),
                None => check_liveness(workers)?,
            }
        }
        info!("dispatcher stopped");
        Ok(())
    }
}

/// Verify every worker thread is still running.
fn check_liveness(workers: &[WorkerThread]) -> Result<()> {
    for worker in workers {
        if worker.handle.is_finished() {
            return Err(Error::WorkerDied(worker.name));
        }
    }
    debug!("no events, all workers alive");
    Ok(())
}
