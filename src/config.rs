//! System configuration parameters.
//!
//! Every tunable of the daemon lives here as a named, defaulted field.
//! A JSON file (path via argv / `BEDCLOCK_CONFIG`) can override any subset
//! of the defaults.  All intervals and timeouts are explicit so tests can
//! run the control loops with compressed time.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- Lux reporting ---
    /// Lux at or below which a downward watermark crossing is reported.
    pub lux_low_watermark: i32,
    /// Lux at or above which an upward watermark crossing is reported.
    pub lux_high_watermark: i32,
    /// Absolute lux delta (vs last report) that forces a report.
    pub lux_delta_threshold: i32,
    /// Maximum interval between periodic lux reports (seconds).
    pub lux_report_period_secs: u64,

    // --- Proximity ---
    /// Raw proximity readings below this clamp to 0.
    pub proximity_min_threshold: u32,
    /// Minimum interval between accepted proximity samples (seconds).
    pub proximity_dampen_secs: u64,

    // --- Lux -> brightness mapping ---
    /// Lowest meaningful lux value.
    pub lux_min: i32,
    /// Lux at or above this maps to maximum brightness.
    pub lux_max: i32,
    /// At or below this lux the room counts as dark (display may blank).
    pub lux_dark_room_threshold: i32,
    /// Brightness used for a blanked display.
    pub brightness_off: u8,
    /// Lowest visible brightness.
    pub brightness_min: u8,
    /// Highest brightness.
    pub brightness_max: u8,

    // --- Display behaviour ---
    /// Seconds the display holds full brightness after a wake.
    pub wake_timeout_secs: i32,
    /// Keep the display lit even when the room is dark.
    pub stay_on_in_dark_room: bool,
    /// Base polling interval of the display loop (milliseconds).
    pub tick_unit_ms: u64,

    // --- Queues & timing ---
    /// Event bus capacity; a full bus is fatal.
    pub event_bus_capacity: usize,
    /// Dispatcher receive timeout, doubling as the liveness-check period (seconds).
    pub event_recv_timeout_secs: u64,
    /// Sensor worker command queue capacity (lossy on overflow).
    pub motion_cmdq_capacity: usize,
    /// Bridge worker command queue capacity (lossy on overflow).
    pub bridge_cmdq_capacity: usize,
    /// Display worker command queue capacity (sized for brightness-ramp bursts).
    pub screen_cmdq_capacity: usize,
    /// Sensor worker polling throttle (milliseconds).
    pub motion_poll_interval_ms: u64,
    /// Bridge worker command wait; effectively "until there is work" (seconds).
    pub bridge_cmdq_timeout_secs: u64,

    // --- Bridge topics ---
    /// Inbound payloads above this size are rejected (bytes).
    pub max_payload_bytes: usize,
    /// Namespace prefix for this device's topics.
    pub topic_prefix: String,
    /// Published topic carrying the current lux value.
    pub topic_pub_light: String,
    /// Published topic carrying motion on/off state.
    pub topic_pub_motion: String,
    /// Subscribed topic toggling stay-on-in-dark-room.
    pub topic_sub_stay: String,
    /// Namespace prefix of the outside-temperature topic.
    pub topic_sub_temperature_prefix: String,
    /// Subscribed topic carrying the outside temperature.
    pub topic_sub_temperature: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Lux reporting
            lux_low_watermark: 6,
            lux_high_watermark: 19,
            lux_delta_threshold: 196,
            lux_report_period_secs: 601,

            // Proximity
            proximity_min_threshold: 6,
            proximity_dampen_secs: 3,

            // Lux can go to 7k, but anything beyond ~2k is max bright.
            lux_min: 0,
            lux_max: 2123,
            lux_dark_room_threshold: 6,
            brightness_off: 0,
            brightness_min: 8,
            brightness_max: 98,

            // Display behaviour
            wake_timeout_secs: 12,
            stay_on_in_dark_room: false,
            tick_unit_ms: 250,

            // Queues & timing
            event_bus_capacity: 1000,
            event_recv_timeout_secs: 15,
            motion_cmdq_capacity: 5,
            bridge_cmdq_capacity: 10,
            screen_cmdq_capacity: 100,
            motion_poll_interval_ms: 321,
            bridge_cmdq_timeout_secs: 3600,

            // Bridge topics
            max_payload_bytes: 2048,
            topic_prefix: "bedclock".to_string(),
            topic_pub_light: "light".to_string(),
            topic_pub_motion: "motion".to_string(),
            topic_sub_stay: "stay".to_string(),
            topic_sub_temperature_prefix: "sensor".to_string(),
            topic_sub_temperature: "temperature_outside".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for
    /// any field the file omits.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make the control loops misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.lux_low_watermark >= self.lux_high_watermark {
            return Err(Error::Config(
                "lux_low_watermark must be below lux_high_watermark".to_string(),
            ));
        }
        if self.lux_min >= self.lux_max {
            return Err(Error::Config("lux_min must be below lux_max".to_string()));
        }
        if self.brightness_min > self.brightness_max {
            return Err(Error::Config(
                "brightness_min must not exceed brightness_max".to_string(),
            ));
        }
        if self.lux_delta_threshold <= 0 {
            return Err(Error::Config(
                "lux_delta_threshold must be positive".to_string(),
            ));
        }
        if self.event_bus_capacity == 0
            || self.motion_cmdq_capacity == 0
            || self.bridge_cmdq_capacity == 0
            || self.screen_cmdq_capacity == 0
        {
            return Err(Error::Config(
                "queue capacities must be positive".to_string(),
            ));
        }
        if self.tick_unit_ms == 0 {
            return Err(Error::Config("tick_unit_ms must be positive".to_string()));
        }
        Ok(())
    }

    // -- Duration accessors -------------------------------------------------

    pub fn tick_unit(&self) -> Duration {
        Duration::from_millis(self.tick_unit_ms)
    }

    pub fn motion_poll_interval(&self) -> Duration {
        Duration::from_millis(self.motion_poll_interval_ms)
    }

    pub fn event_recv_timeout(&self) -> Duration {
        Duration::from_secs(self.event_recv_timeout_secs)
    }

    pub fn bridge_cmdq_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge_cmdq_timeout_secs)
    }

    pub fn proximity_dampen(&self) -> Duration {
        Duration::from_secs(self.proximity_dampen_secs)
    }

    pub fn lux_report_period(&self) -> Duration {
        Duration::from_secs(self.lux_report_period_secs)
    }

    // -- Topic names --------------------------------------------------------

    pub fn pub_light_topic(&self) -> String {
        format!("/{}/{}", self.topic_prefix, self.topic_pub_light)
    }

    pub fn pub_motion_topic(&self) -> String {
        format!("/{}/{}", self.topic_prefix, self.topic_pub_motion)
    }

    pub fn sub_stay_topic(&self) -> String {
        format!("/{}/{}", self.topic_prefix, self.topic_sub_stay)
    }

    pub fn sub_temperature_topic(&self) -> String {
        format!(
            "/{}/{}",
            self.topic_sub_temperature_prefix, self.topic_sub_temperature
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = Config::default();
        assert!(c.validate().is_ok());
        assert!(c.lux_low_watermark < c.lux_high_watermark);
        assert!(c.brightness_min <= c.brightness_max);
        assert!(c.lux_min < c.lux_max);
        assert!(c.event_bus_capacity > 0);
        assert!(c.tick_unit_ms > 0);
    }

    #[test]
    fn serde_roundtrip() {
        let c = Config::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(c.lux_delta_threshold, c2.lux_delta_threshold);
        assert_eq!(c.brightness_max, c2.brightness_max);
        assert_eq!(c.topic_prefix, c2.topic_prefix);
    }

    #[test]
    fn partial_file_overrides_single_field() {
        let c: Config = serde_json::from_str(r#"{"lux_delta_threshold": 42}"#).unwrap();
        assert_eq!(c.lux_delta_threshold, 42);
        // untouched fields keep their defaults
        assert_eq!(c.lux_high_watermark, 19);
        assert_eq!(c.event_bus_capacity, 1000);
    }

    #[test]
    fn crossed_watermarks_are_rejected() {
        let c = Config {
            lux_low_watermark: 20,
            lux_high_watermark: 19,
            ..Config::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn topic_names_are_namespaced() {
        let c = Config::default();
        assert_eq!(c.pub_light_topic(), "/bedclock/light");
        assert_eq!(c.pub_motion_topic(), "/bedclock/motion");
        assert_eq!(c.sub_stay_topic(), "/bedclock/stay");
        assert_eq!(c.sub_temperature_topic(), "/sensor/temperature_outside");
    }
}
