//! Screen (display) worker: timer-tick scheduling and brightness control.
//!
//! Each iteration blocks briefly on the command queue, executes at most
//! one command, then always runs the tick scheduler, so a burst of
//! commands can never starve the periodic work.  Brightness converges toward its
//! target one unit per tick; while a ramp is in flight the worker
//! self-schedules extra ticks so the ramp completes faster than the
//! tick-unit cadence without busy-looping.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::bus::EventPublisher;
use crate::cmdq::{CommandReceiver, CommandSender, Dequeued};
use crate::config::Config;
use crate::error::Result;
use crate::events::Event;
use crate::ports::{Frame, MatrixDisplay};
use crate::shutdown::ShutdownToken;

use super::publish_or_stop;

/// Requester tag on events this worker emits.
const REQUESTER: &str = "screen";

/// Deferred invocations executed by the screen worker.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenCommand {
    /// A fresh raw lux value from the sensor worker.
    MotionLux(i32),
    /// A fresh proximity value from the sensor worker.
    MotionProximity(u32),
    /// Toggle stay-on-in-dark-room behaviour.
    StaysOn(bool),
    /// Outside temperature for the clock face.
    OutsideTemperature(f32),
    /// Free-form message for the clock face (empty clears it).
    DisplayMessage(String),
    /// Self-scheduled wake: run the tick scheduler without waiting out
    /// the tick unit (speeds up brightness ramps).
    TimerTick,
}

// ───────────────────────────────────────────────────────────────
// Timer-tick scheduler
// ───────────────────────────────────────────────────────────────

/// Periodic jobs multiplexed onto the display loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickTask {
    /// Refresh the motion-indicator pixel (250 ms).
    MotionPixel,
    /// Second bucket: stay-on countdown (1 s).
    Second,
    /// Clock face redraw (15 s).
    Redraw,
    /// Full redraw with a fresh date line (60 s).
    Minute,
}

#[derive(Debug)]
struct TickEntry {
    interval: Duration,
    task: TickTask,
    next_fire: Instant,
}

/// Fixed registry of periodic callbacks, evaluated once per display-loop
/// iteration.  Entries fire at-or-after their deadline, never early, and
/// reschedule from "now"; drift relative to the configured interval is
/// accepted for a low-precision clock display.
#[derive(Debug)]
pub struct TickScheduler {
    entries: Vec<TickEntry>,
}

impl TickScheduler {
    pub fn new(now: Instant) -> Self {
        let registry = [
            (250, TickTask::MotionPixel),
            (1_000, TickTask::Second),
            (15_000, TickTask::Redraw),
            (60_000, TickTask::Minute),
        ];
        let entries = registry
            .into_iter()
            .map(|(ms, task)| {
                let interval = Duration::from_millis(ms);
                TickEntry { interval, task, next_fire: now + interval }
            })
            .collect();
        Self { entries }
    }

    /// Collect every task whose deadline has passed, rescheduling each
    /// from `now`.
    pub fn due(&mut self, now: Instant) -> Vec<TickTask> {
        let mut fired = Vec::new();
        for entry in &mut self.entries {
            if entry.next_fire <= now {
                fired.push(entry.task);
                entry.next_fire = now + entry.interval;
            }
        }
        fired
    }
}

// ───────────────────────────────────────────────────────────────
// Display state
// ───────────────────────────────────────────────────────────────

/// One brightness convergence step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrightnessStep {
    /// Already at the target; nothing to do.
    AtTarget,
    /// Moved one unit toward the target.
    Stepped,
    /// Moved one unit and reached the target.
    Reached,
}

/// Display-side state, owned exclusively by the worker loop.
#[derive(Debug)]
pub struct ScreenState {
    pub current_brightness: u8,
    pub wanted_brightness: u8,
    /// Seconds of "do not touch brightness".  0 means lux may drive the
    /// target; negative means never converge automatically.
    pub stay_on_countdown_secs: i32,
    pub use_lux_for_brightness: bool,
    pub stay_on_in_dark_room: bool,
    pub cached_normalized_lux: u8,
    pub cached_proximity: u32,
    pub message: Option<String>,
    pub outside_temperature: Option<f32>,
    pub motion_pixel_on: bool,
}

impl ScreenState {
    pub fn new(config: &Config) -> Self {
        Self {
            current_brightness: config.brightness_max,
            wanted_brightness: config.brightness_max,
            stay_on_countdown_secs: config.wake_timeout_secs,
            use_lux_for_brightness: true,
            stay_on_in_dark_room: config.stay_on_in_dark_room,
            cached_normalized_lux: config.brightness_max,
            cached_proximity: 0,
            message: None,
            outside_temperature: None,
            motion_pixel_on: true,
        }
    }

    /// Move `current_brightness` one unit toward `wanted_brightness`.
    pub fn step_brightness(&mut self) -> BrightnessStep {
        if self.current_brightness == self.wanted_brightness {
            return BrightnessStep::AtTarget;
        }
        if self.wanted_brightness < self.current_brightness {
            self.current_brightness -= 1;
        } else {
            self.current_brightness += 1;
        }
        if self.current_brightness == self.wanted_brightness {
            BrightnessStep::Reached
        } else {
            BrightnessStep::Stepped
        }
    }

    /// One-second bucket: run the stay-on countdown.  Returns whether a
    /// fresh lux-based brightness decision should be requested.
    pub fn tick_second(&mut self) -> bool {
        if self.stay_on_countdown_secs <= 0 {
            return false;
        }
        self.stay_on_countdown_secs -= 1;
        if self.stay_on_countdown_secs != 0 {
            return false;
        }
        info!("stay-on countdown is now zero");
        self.use_lux_for_brightness
    }

    /// Apply a fresh raw lux value: normalize, cache, and only steer the
    /// brightness target outside a wake/override window.
    pub fn apply_lux(&mut self, raw_lux: i32, config: &Config) {
        let normalized = normalize_lux(raw_lux, self.stay_on_in_dark_room, config);
        if self.cached_normalized_lux == normalized {
            debug!("motion lux raw {raw_lux} remains normalized as {normalized}");
        } else {
            info!(
                "motion lux raw {} set normalized from {} to {}",
                raw_lux, self.cached_normalized_lux, normalized
            );
            self.cached_normalized_lux = normalized;
        }
        if self.use_lux_for_brightness && self.stay_on_countdown_secs == 0 {
            self.wanted_brightness = self.cached_normalized_lux;
        }
    }

    /// Apply a fresh proximity value.  Returns whether the display woke
    /// up (proximity did not decrease).
    pub fn apply_proximity(&mut self, proximity: u32, config: &Config) -> bool {
        let previous = self.cached_proximity;
        debug!("motion proximity set from {previous} to {proximity}");
        self.cached_proximity = proximity;

        if proximity < previous {
            return false;
        }

        // Wake: hold brightness for the timeout, jump-start the ramp so
        // it is visible from near-zero immediately, and aim for max.
        self.stay_on_countdown_secs = config.wake_timeout_secs;
        let jumpstart = config.brightness_max / 6;
        self.current_brightness = self.current_brightness.max(jumpstart);
        self.wanted_brightness = config.brightness_max;
        true
    }

    /// Build the frame for the display port.  A brightness at the off
    /// value blanks the clock face.
    pub fn frame(&self, config: &Config) -> Frame {
        let show_clock = self.current_brightness != config.brightness_off;
        Frame {
            brightness: if show_clock {
                self.current_brightness
            } else {
                config.brightness_min
            },
            show_clock,
            motion_pixel_on: self.cached_proximity != 0,
            message: self.message.clone(),
            outside_temperature: self.outside_temperature,
        }
    }
}

/// Map raw lux into a panel brightness.
///
/// In a dark room the display blanks unless `stay_on_in_dark_room` is
/// set; otherwise raw lux is clamped to `[lux_min, lux_max]` and linearly
/// rescaled into `[brightness_min, brightness_max]`.
pub fn normalize_lux(raw_lux: i32, stay_on_in_dark_room: bool, config: &Config) -> u8 {
    if raw_lux <= config.lux_dark_room_threshold && !stay_on_in_dark_room {
        return config.brightness_off;
    }
    let clamped = raw_lux.clamp(config.lux_min, config.lux_max);
    let (a, b) = (f64::from(config.lux_min), f64::from(config.lux_max));
    let (c, d) = (
        f64::from(config.brightness_min),
        f64::from(config.brightness_max),
    );
    ((f64::from(clamped) - a) / (b - a) * (d - c) + c) as u8
}

// ───────────────────────────────────────────────────────────────
// Worker loop
// ───────────────────────────────────────────────────────────────

pub struct ScreenWorker<D: MatrixDisplay> {
    config: Config,
    display: D,
    state: ScreenState,
    ticks: TickScheduler,
    cmdq: CommandReceiver<ScreenCommand>,
    /// Clone of our own sender, for self-scheduled ticks.
    self_cmdq: CommandSender<ScreenCommand>,
    bus: EventPublisher,
    shutdown: ShutdownToken,
}

impl<D: MatrixDisplay> ScreenWorker<D> {
    pub fn new(
        config: Config,
        display: D,
        cmdq: CommandReceiver<ScreenCommand>,
        self_cmdq: CommandSender<ScreenCommand>,
        bus: EventPublisher,
        shutdown: ShutdownToken,
    ) -> Self {
        let state = ScreenState::new(&config);
        let ticks = TickScheduler::new(Instant::now());
        Self { config, display, state, ticks, cmdq, self_cmdq, bus, shutdown }
    }

    /// Run until shutdown.  Returns an error only on a fatal condition
    /// (full event bus).
    pub fn run(mut self) -> Result<()> {
        info!("screen worker started");
        // First frame, then ask for an initial lux-based brightness.
        self.draw_clock();
        if !self.request_lux_update()? {
            return Ok(());
        }

        while !self.shutdown.is_triggered() {
            match self.cmdq.recv_timeout(self.config.tick_unit()) {
                Dequeued::Command(cmd) => {
                    if !self.apply_command(cmd)? {
                        break;
                    }
                }
                Dequeued::Empty => {}
                Dequeued::Closed => break,
            }
            // The scheduler runs even when a command executed, so bursts
            // of commands cannot starve periodic work.
            if !self.run_ticks(Instant::now())? {
                break;
            }
        }
        info!("screen worker stopped");
        Ok(())
    }

    fn apply_command(&mut self, cmd: ScreenCommand) -> Result<bool> {
        match cmd {
            ScreenCommand::MotionLux(raw) => {
                self.state.apply_lux(raw, &self.config);
            }
            ScreenCommand::MotionProximity(proximity) => {
                if self.state.apply_proximity(proximity, &self.config) {
                    info!("woke screen up");
                    self.adjust_brightness();
                }
            }
            ScreenCommand::StaysOn(enable) => {
                self.state.stay_on_in_dark_room = enable;
                info!("stay on in dark room is now {enable}");
                if self.state.use_lux_for_brightness {
                    return self.request_lux_update();
                }
            }
            ScreenCommand::OutsideTemperature(value) => {
                self.state.outside_temperature = Some(value);
                self.draw_clock();
            }
            ScreenCommand::DisplayMessage(text) => {
                self.state.message = if text.is_empty() { None } else { Some(text) };
                self.draw_clock();
            }
            ScreenCommand::TimerTick => {
                // Self-scheduled wake: run the scheduler right away.  It
                // runs again after this command returns, which is harmless.
                return self.run_ticks(Instant::now());
            }
        }
        Ok(true)
    }

    fn run_ticks(&mut self, now: Instant) -> Result<bool> {
        // The "always" callback: brightness stepping every tick, so ramps
        // feel smooth regardless of tick bucket granularity.
        self.adjust_brightness();

        for task in self.ticks.due(now) {
            match task {
                TickTask::MotionPixel => self.update_motion_pixel(),
                TickTask::Second => {
                    if self.state.tick_second() && !self.request_lux_update()? {
                        return Ok(false);
                    }
                }
                TickTask::Redraw | TickTask::Minute => self.draw_clock(),
            }
        }
        Ok(true)
    }

    fn adjust_brightness(&mut self) {
        match self.state.step_brightness() {
            BrightnessStep::AtTarget => {}
            BrightnessStep::Stepped => {
                self.draw_clock();
                // Queue a wake to self so the ramp is not bound to the
                // tick-unit timeout, but only when there is no pending
                // work already.
                if self.self_cmdq.is_empty() {
                    self.self_cmdq.send(ScreenCommand::TimerTick);
                }
            }
            BrightnessStep::Reached => {
                self.draw_clock();
                debug!(
                    "brightness reached target value of {}",
                    self.state.wanted_brightness
                );
                // One more draw so the final frame reflects the reached
                // value.
                if self.state.current_brightness != self.config.brightness_off {
                    self.draw_clock();
                }
            }
        }
    }

    fn update_motion_pixel(&mut self) {
        let on = self.state.cached_proximity != 0;
        // Off-and-still-off is a no-op; a lit pixel is rewritten every
        // time because the canvas may have been cleared by a redraw.
        if on || self.state.motion_pixel_on {
            self.display.set_motion_pixel(on);
            self.state.motion_pixel_on = on;
        }
    }

    fn draw_clock(&mut self) {
        let frame = self.state.frame(&self.config);
        self.display.draw_clock(&frame);
    }

    fn request_lux_update(&mut self) -> Result<bool> {
        publish_or_stop(&self.bus, Event::LuxUpdateRequest { requester: REQUESTER })
    }
}
