//! Motion (sensor) worker: lux reporting policy and proximity debounce.
//!
//! The worker busy-polls the sensor, so it never blocks on its command
//! queue: each iteration drains at most one pending command, otherwise
//! sleeps a short fixed interval and samples.  All state mutation happens
//! on this thread only; external callers toggle behaviour through
//! [`MotionCommand`]s.

use std::thread;
use std::time::Instant;

use log::{debug, info};

use crate::bus::EventPublisher;
use crate::cmdq::{CommandReceiver, Dequeued};
use crate::config::Config;
use crate::error::Result;
use crate::events::Event;
use crate::ports::MotionSensor;
use crate::shutdown::ShutdownToken;

use super::publish_or_stop;

/// Magnitude at or below which a proximity change counts as noise.
const PROXIMITY_NOISE_BAND: i64 = 2;

/// Deferred invocations executed by the motion worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionCommand {
    /// Enable or disable `MotionLux` event emission.
    LuxNotify(bool),
    /// Enable or disable `MotionProximity`/`MotionDetected` emission.
    ProximityNotify(bool),
    /// Force the next lux sample to be reported regardless of policy.
    ForceLuxReport,
}

/// Sensor-side state, owned exclusively by the worker loop.
#[derive(Debug)]
pub struct MotionState {
    pub current_lux: i32,
    pub last_reported_lux: i32,
    pub lux_above_watermark: bool,
    pub last_periodic_report: Instant,
    pub force_next_lux_event: bool,
    pub current_proximity: u32,
    pub last_raw_proximity: u32,
    pub proximity_dampen_until: Instant,
    pub lux_notify_enabled: bool,
    pub proximity_notify_enabled: bool,
}

/// An accepted proximity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProximityUpdate {
    pub previous: u32,
    pub value: u32,
    /// Edge trigger: nothing was in range before, something is now.
    pub motion_detected: bool,
}

impl MotionState {
    pub fn new(config: &Config, now: Instant) -> Self {
        Self {
            // Fudge an initial lux value until the first real read.
            current_lux: config.lux_max,
            last_reported_lux: -1,
            lux_above_watermark: true,
            last_periodic_report: now,
            force_next_lux_event: true,
            current_proximity: 0,
            last_raw_proximity: 0,
            proximity_dampen_until: now + config.proximity_dampen(),
            lux_notify_enabled: false,
            proximity_notify_enabled: false,
        }
    }

    /// Fold a lux sample into the state.  Returns whether the reporting
    /// policy fired (the notify gate is applied by the caller).
    ///
    /// Reasons why lux gets reported:
    /// 1) explicitly asked to do so
    /// 2) predetermined report interval elapsed
    /// 3) high/low watermark crossed
    /// 4) big delta vs the last report
    pub fn apply_lux_sample(&mut self, lux: i32, now: Instant, config: &Config) -> bool {
        let previous = self.current_lux;
        self.current_lux = lux.max(0);

        let mut send = false;
        if self.force_next_lux_event {
            self.force_next_lux_event = false;
            send = true;
        } else if now.duration_since(self.last_periodic_report) > config.lux_report_period() {
            send = true;
        } else if self.current_lux >= config.lux_high_watermark && !self.lux_above_watermark {
            self.lux_above_watermark = true;
            send = true;
        } else if self.current_lux <= config.lux_low_watermark && self.lux_above_watermark {
            self.lux_above_watermark = false;
            send = true;
        } else if (self.last_reported_lux - self.current_lux).abs() >= config.lux_delta_threshold {
            send = true;
        }

        if !send {
            return false;
        }

        debug!("lux update from {} to {}", previous, self.current_lux);
        self.last_periodic_report = now;
        self.last_reported_lux = self.current_lux;
        true
    }

    /// Fold a raw proximity sample into the state.  `None` when the
    /// sample was dampened or filtered as noise.
    pub fn apply_proximity_sample(
        &mut self,
        raw: u32,
        now: Instant,
        config: &Config,
    ) -> Option<ProximityUpdate> {
        // Dampen how often proximity is looked at, based on the last
        // accepted update.
        if now < self.proximity_dampen_until {
            return None;
        }

        self.last_raw_proximity = raw;
        let previous = self.current_proximity;
        let value = if raw < config.proximity_min_threshold { 0 } else { raw };

        if (i64::from(value) - i64::from(previous)).abs() <= PROXIMITY_NOISE_BAND {
            // Too small of a change... filter it out, unless this is
            // going to 0.
            if previous == value || value != 0 {
                return None;
            }
        }

        debug!(
            "proximity update: from {} to {} (raw {})",
            previous, value, raw
        );
        self.current_proximity = value;
        self.proximity_dampen_until = now + config.proximity_dampen();

        Some(ProximityUpdate {
            previous,
            value,
            motion_detected: previous == 0 && value > 2,
        })
    }
}

/// The sensor worker loop.
pub struct MotionWorker<S: MotionSensor> {
    config: Config,
    sensor: S,
    state: MotionState,
    cmdq: CommandReceiver<MotionCommand>,
    bus: EventPublisher,
    shutdown: ShutdownToken,
}

impl<S: MotionSensor> MotionWorker<S> {
    pub fn new(
        config: Config,
        sensor: S,
        cmdq: CommandReceiver<MotionCommand>,
        bus: EventPublisher,
        shutdown: ShutdownToken,
    ) -> Self {
        let state = MotionState::new(&config, Instant::now());
        Self { config, sensor, state, cmdq, bus, shutdown }
    }

    /// Run until shutdown.  Returns an error only on a fatal condition
    /// (full event bus).
    pub fn run(mut self) -> Result<()> {
        info!("motion worker started");
        // Notifications start enabled when the daemon drives the sensor.
        self.apply_command(MotionCommand::LuxNotify(true));
        self.apply_command(MotionCommand::ProximityNotify(true));

        while !self.shutdown.is_triggered() {
            if !self.iterate()? {
                break;
            }
        }
        info!("motion worker stopped");
        Ok(())
    }

    /// One loop iteration.  Returns `false` when the worker should wind
    /// down (queues or bus closed).
    fn iterate(&mut self) -> Result<bool> {
        // Never block on the command queue: sampling has priority.
        match self.cmdq.try_recv() {
            Dequeued::Command(cmd) => {
                self.apply_command(cmd);
                // Did some work this iteration; sample next time around.
                return Ok(true);
            }
            Dequeued::Closed => return Ok(false),
            Dequeued::Empty => {}
        }

        thread::sleep(self.config.motion_poll_interval());
        let now = Instant::now();

        if let Some(lux) = self.sensor.read_lux() {
            let fired = self.state.apply_lux_sample(lux, now, &self.config);
            if fired && self.state.lux_notify_enabled {
                let event = Event::MotionLux(self.state.current_lux);
                if !publish_or_stop(&self.bus, event)? {
                    return Ok(false);
                }
            }
        }

        let raw = self.sensor.read_proximity();
        if let Some(update) = self.state.apply_proximity_sample(raw, now, &self.config) {
            if self.state.proximity_notify_enabled {
                let event = Event::MotionProximity(update.value);
                if !publish_or_stop(&self.bus, event)? {
                    return Ok(false);
                }
                // Emitted in a fixed order after the proximity event, for
                // consumers that only care that something just arrived.
                if update.motion_detected
                    && !publish_or_stop(&self.bus, Event::MotionDetected)?
                {
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    fn apply_command(&mut self, cmd: MotionCommand) {
        match cmd {
            MotionCommand::LuxNotify(enable) => {
                info!("notify lux is now {}", on_off(enable));
                self.state.lux_notify_enabled = enable;
            }
            MotionCommand::ProximityNotify(enable) => {
                info!("notify motion is now {}", on_off(enable));
                self.state.proximity_notify_enabled = enable;
            }
            MotionCommand::ForceLuxReport => {
                debug!("lux report forced");
                self.state.force_next_lux_event = true;
            }
        }
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
