//! Event values flowing through the bus.
//!
//! Events are immutable facts: a worker creates one, the dispatcher
//! consumes it exactly once and routes it to handlers by kind.  Each
//! event renders a human-readable description for log lines.

/// All events a worker can publish, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The motion sensor reported a fresh lux value.
    MotionLux(i32),
    /// The motion sensor accepted a new proximity value.
    MotionProximity(u32),
    /// Proximity went from "nothing there" to "something arrived".
    MotionDetected,
    /// Someone wants a fresh lux report from the sensor worker.
    LuxUpdateRequest { requester: &'static str },
    /// Toggle the display's stay-on-in-dark-room behaviour.
    ScreenStaysOn { enable: bool, requester: &'static str },
    /// Outside temperature, for display on the clock face.
    OutsideTemperature { value: f32, requester: &'static str },
    /// Free-form text to show on the clock face.
    DisplayMessage { text: String, requester: &'static str },
}

/// Fieldless discriminant of [`Event`], used as the dispatcher routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MotionLux,
    MotionProximity,
    MotionDetected,
    LuxUpdateRequest,
    ScreenStaysOn,
    OutsideTemperature,
    DisplayMessage,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MotionLux(_) => EventKind::MotionLux,
            Self::MotionProximity(_) => EventKind::MotionProximity,
            Self::MotionDetected => EventKind::MotionDetected,
            Self::LuxUpdateRequest { .. } => EventKind::LuxUpdateRequest,
            Self::ScreenStaysOn { .. } => EventKind::ScreenStaysOn,
            Self::OutsideTemperature { .. } => EventKind::OutsideTemperature,
            Self::DisplayMessage { .. } => EventKind::DisplayMessage,
        }
    }

    /// Human-readable description, for log lines.
    pub fn description(&self) -> String {
        match self {
            Self::MotionLux(lux) => format!("motion detector current lux is {lux}"),
            Self::MotionProximity(p) => format!("motion detector proximity at {p}"),
            Self::MotionDetected => "motion detected".to_string(),
            Self::LuxUpdateRequest { requester } => {
                format!("lux update requested by {requester}")
            }
            Self::ScreenStaysOn { enable, requester } => {
                format!("screen stays on {enable} requested by {requester}")
            }
            Self::OutsideTemperature { value, requester } => {
                format!("outside temperature {value} reported by {requester}")
            }
            Self::DisplayMessage { requester, .. } => {
                format!("display message from {requester}")
            }
        }
    }
}
