//! Host adapters: implementations of the port traits that need no
//! hardware or broker.
//!
//! These back the default binary so the daemon runs anywhere.  Real
//! deployments swap in adapters for the actual sensor, LED matrix and
//! broker client; the workers are generic over the port traits and do
//! not change.

use log::{debug, info};

use crate::ports::{Frame, LinkError, MatrixDisplay, MessageLink, MotionSensor};

// ───────────────────────────────────────────────────────────────
// Simulated motion sensor
// ───────────────────────────────────────────────────────────────

/// Deterministic lux/proximity source for exercising the full pipeline.
///
/// Lux sweeps a triangle wave between 0 and `lux_peak`; proximity pulses
/// for a few reads out of every cycle, which drives the wake path.
pub struct SimMotionSensor {
    step: u32,
    lux_peak: i32,
}

impl SimMotionSensor {
    pub fn new(lux_peak: i32) -> Self {
        Self { step: 0, lux_peak }
    }
}

impl MotionSensor for SimMotionSensor {
    fn read_lux(&mut self) -> Option<i32> {
        self.step = self.step.wrapping_add(1);
        // Every fourth read the colour engine has no fresh data.
        if self.step % 4 == 0 {
            return None;
        }
        let period = 200;
        let phase = i32::try_from(self.step % period).unwrap_or(0);
        let half = i32::try_from(period / 2).unwrap_or(1);
        let lux = if phase < half {
            self.lux_peak * phase / half
        } else {
            self.lux_peak * (half * 2 - phase) / half
        };
        Some(lux)
    }

    fn read_proximity(&mut self) -> u32 {
        // A short "hand wave" once per lux cycle.
        match self.step % 200 {
            40..=45 => 50,
            _ => 0,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Logging display
// ───────────────────────────────────────────────────────────────

/// Display adapter that renders frames as log lines.
#[derive(Default)]
pub struct LogDisplay;

impl MatrixDisplay for LogDisplay {
    fn draw_clock(&mut self, frame: &Frame) {
        if !frame.show_clock {
            debug!("display: blank");
            return;
        }
        let temp = frame
            .outside_temperature
            .map_or_else(String::new, |t| format!(" outside {t:.1}"));
        let msg = frame
            .message
            .as_deref()
            .map_or_else(String::new, |m| format!(" message {m:?}"));
        info!("display: brightness {}{temp}{msg}", frame.brightness);
    }

    fn set_motion_pixel(&mut self, on: bool) {
        debug!("display: motion pixel {}", if on { "on" } else { "off" });
    }
}

// ───────────────────────────────────────────────────────────────
// Logging message link
// ───────────────────────────────────────────────────────────────

/// Always-connected link adapter that logs instead of publishing.
#[derive(Default)]
pub struct LogLink;

impl MessageLink for LogLink {
    fn is_connected(&self) -> bool {
        true
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), LinkError> {
        info!("link: {topic} <- {payload}");
        Ok(())
    }
}
