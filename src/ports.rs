//! Port traits: the boundary between the orchestration core and the
//! hardware/network collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Worker (domain)
//! ```
//!
//! Raw I2C register access, LED-matrix pixel rendering and the pub/sub
//! wire protocol all live behind these traits.  The workers consume them
//! via generics, so the orchestration layer never touches hardware and
//! every control-loop algorithm is testable with mock adapters.

use std::fmt;

// ───────────────────────────────────────────────────────────────
// Motion sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Ambient-light / proximity sensor, sampled by the motion worker.
pub trait MotionSensor: Send {
    /// Current lux, or `None` when the colour engine has no fresh data.
    fn read_lux(&mut self) -> Option<i32>;

    /// Raw proximity reading (0 = nothing in range).
    fn read_proximity(&mut self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Display port (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// One rendered clock frame.  The orchestration layer decides *what* to
/// show; the adapter decides *how* (fonts, colours, layout).
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Panel brightness for this frame.
    pub brightness: u8,
    /// When false the clock face is blanked (dark room, display off).
    pub show_clock: bool,
    /// Corner pixel indicating something is in proximity range.
    pub motion_pixel_on: bool,
    /// Optional free-form message line.
    pub message: Option<String>,
    /// Optional outside temperature readout.
    pub outside_temperature: Option<f32>,
}

/// Pixel-matrix display, driven by the screen worker.
pub trait MatrixDisplay: Send {
    /// Redraw the whole clock face.
    fn draw_clock(&mut self, frame: &Frame);

    /// Update only the motion-indicator pixel (cheap partial update).
    fn set_motion_pixel(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Message link port (domain ↔ pub/sub broker)
// ───────────────────────────────────────────────────────────────

/// Errors from [`MessageLink`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// No live broker connection.
    NotConnected,
    /// The underlying client rejected the publish.
    PublishFailed(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "no live connection"),
            Self::PublishFailed(msg) => write!(f, "publish failed: {msg}"),
        }
    }
}

/// Outbound pub/sub connection.  Connection management, QoS handling and
/// retries belong to the adapter; the bridge worker only chooses topics
/// and payloads.  Inbound messages are delivered by the adapter as
/// [`BridgeCommand::Inbound`](crate::workers::bridge::BridgeCommand)
/// into the bridge worker's command queue.
pub trait MessageLink: Send {
    /// Whether a broker connection is currently live.
    fn is_connected(&self) -> bool;

    /// Publish `payload` on `topic` (at-least-once delivery).
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), LinkError>;
}
