//! Bridge worker: translates between the internal event world and the
//! external pub/sub broker.
//!
//! Outbound, it publishes lux and motion state on the device topics.
//! Inbound, the link adapter enqueues raw broker messages as commands;
//! the worker validates, parses and converts them into bus events.  The
//! worker is fully idle between commands: there is no periodic work on
//! this thread, so it blocks for a long timeout instead of polling.

use log::{debug, info, warn};

use crate::bus::EventPublisher;
use crate::cmdq::{CommandReceiver, Dequeued};
use crate::config::Config;
use crate::error::Result;
use crate::events::Event;
use crate::ports::MessageLink;
use crate::shutdown::ShutdownToken;

use super::publish_or_stop;

/// Requester tag on events this worker emits.
const REQUESTER: &str = "bridge";

/// Payload for a truthy boolean state.
pub const STATE_ON: &str = "on";
/// Payload for a falsy boolean state.
pub const STATE_OFF: &str = "off";

/// Payloads accepted as "enable" on the stay-on topic (case-insensitive).
const TRUTHY: [&str; 10] = [
    "on", "true", "enable", "enabled", "1", "up", "yes", "yeah", "yup", "y",
];

/// Outbound topics the bridge can publish on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PubTopic {
    /// Current ambient light level.
    Light,
    /// Motion on/off state.
    Motion,
}

/// Deferred invocations executed by the bridge worker.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCommand {
    /// Publish `value` on one of the device topics.
    Publish { topic: PubTopic, value: String },
    /// A raw message that arrived from the broker.
    Inbound { topic: String, payload: Vec<u8> },
}

pub struct BridgeWorker<L: MessageLink> {
    config: Config,
    link: L,
    cmdq: CommandReceiver<BridgeCommand>,
    bus: EventPublisher,
    shutdown: ShutdownToken,
    /// Initial motion-off announcement done.
    announced: bool,
}

impl<L: MessageLink> BridgeWorker<L> {
    pub fn new(
        config: Config,
        link: L,
        cmdq: CommandReceiver<BridgeCommand>,
        bus: EventPublisher,
        shutdown: ShutdownToken,
    ) -> Self {
        Self { config, link, cmdq, bus, shutdown, announced: false }
    }

    /// Run until shutdown.  The dispatcher closing our command queue is
    /// the wake-up during shutdown; the long timeout only bounds how
    /// stale the shutdown check can get when nothing else happens.
    pub fn run(mut self) -> Result<()> {
        info!("bridge worker started");
        while !self.shutdown.is_triggered() {
            self.announce_if_ready();
            match self.cmdq.recv_timeout(self.config.bridge_cmdq_timeout()) {
                Dequeued::Command(cmd) => {
                    if !self.apply_command(cmd)? {
                        break;
                    }
                }
                Dequeued::Empty => {}
                Dequeued::Closed => break,
            }
        }
        info!("bridge worker stopped");
        Ok(())
    }

    /// Tell the world motion is off, once, as soon as the link is up.
    fn announce_if_ready(&mut self) {
        if !self.announced && self.link.is_connected() {
            self.publish(PubTopic::Motion, STATE_OFF);
            self.announced = true;
        }
    }

    fn apply_command(&mut self, cmd: BridgeCommand) -> Result<bool> {
        match cmd {
            BridgeCommand::Publish { topic, value } => {
                self.publish(topic, &value);
                Ok(true)
            }
            BridgeCommand::Inbound { topic, payload } => {
                match route_inbound(&topic, &payload, &self.config) {
                    Some(event) => publish_or_stop(&self.bus, event),
                    None => Ok(true),
                }
            }
        }
    }

    /// Best-effort outbound publish.  A dead link or a rejected publish
    /// drops the value; the next state change will carry fresher data
    /// anyway.
    fn publish(&mut self, topic: PubTopic, value: &str) {
        if !self.link.is_connected() {
            warn!("no connection to broker, not publishing {value}");
            return;
        }
        let topic = match topic {
            PubTopic::Light => self.config.pub_light_topic(),
            PubTopic::Motion => self.config.pub_motion_topic(),
        };
        match self.link.publish(&topic, value) {
            Ok(()) => debug!("published {value} on {topic}"),
            Err(e) => warn!("failed publishing {value} on {topic}: {e}"),
        }
    }
}

/// Validate and parse one inbound broker message into a bus event.
///
/// Anything malformed or unrecognised is logged and discarded; inbound
/// traffic is untrusted and must never take the daemon down.
pub fn route_inbound(topic: &str, payload: &[u8], config: &Config) -> Option<Event> {
    if payload.len() > config.max_payload_bytes {
        warn!(
            "ignoring oversized payload on {topic}: {} bytes",
            payload.len()
        );
        return None;
    }
    let Ok(text) = std::str::from_utf8(payload) else {
        warn!("ignoring non-utf8 payload on {topic}");
        return None;
    };
    if !text.is_ascii() {
        warn!("ignoring non-ascii payload on {topic}");
        return None;
    }

    if topic == config.sub_stay_topic() {
        let enable = is_truthy(text);
        info!("received stay-on request: {text} -> {enable}");
        return Some(Event::ScreenStaysOn { enable, requester: REQUESTER });
    }
    if topic == config.sub_temperature_topic() {
        return match text.trim().parse::<f32>() {
            Ok(value) => Some(Event::OutsideTemperature { value, requester: REQUESTER }),
            Err(_) => {
                warn!("ignoring unparsable temperature payload: {text}");
                None
            }
        };
    }

    debug!("ignoring message on unhandled topic {topic}");
    None
}

fn is_truthy(payload: &str) -> bool {
    let lowered = payload.trim().to_ascii_lowercase();
    TRUTHY.contains(&lowered.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn stay_topic_accepts_the_truthy_vocabulary() {
        let c = config();
        for word in ["on", "ON", " True ", "yup", "1", "enabled", "y"] {
            let event = route_inbound("/bedclock/stay", word.as_bytes(), &c);
            assert_eq!(
                event,
                Some(Event::ScreenStaysOn { enable: true, requester: "bridge" }),
                "{word:?} should enable"
            );
        }
    }

    #[test]
    fn stay_topic_treats_everything_else_as_disable() {
        let c = config();
        for word in ["off", "0", "no", "disable", "banana", ""] {
            let event = route_inbound("/bedclock/stay", word.as_bytes(), &c);
            assert_eq!(
                event,
                Some(Event::ScreenStaysOn { enable: false, requester: "bridge" }),
                "{word:?} should disable"
            );
        }
    }

    #[test]
    fn temperature_topic_parses_floats() {
        let c = config();
        let event = route_inbound("/sensor/temperature_outside", b" -3.5 ", &c);
        assert_eq!(
            event,
            Some(Event::OutsideTemperature { value: -3.5, requester: "bridge" })
        );
    }

    #[test]
    fn unparsable_temperature_is_dropped() {
        let c = config();
        assert_eq!(
            route_inbound("/sensor/temperature_outside", b"warm-ish", &c),
            None
        );
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let c = config();
        let big = vec![b'1'; c.max_payload_bytes + 1];
        assert_eq!(route_inbound("/sensor/temperature_outside", &big, &c), None);
        // exactly at the cap is still fine
        let ok = b"1".repeat(1);
        assert!(route_inbound("/sensor/temperature_outside", &ok, &c).is_some());
    }

    #[test]
    fn non_utf8_and_non_ascii_payloads_are_rejected() {
        let c = config();
        assert_eq!(route_inbound("/bedclock/stay", &[0xff, 0xfe], &c), None);
        assert_eq!(route_inbound("/bedclock/stay", "oñ".as_bytes(), &c), None);
    }

    #[test]
    fn unknown_topics_are_ignored() {
        let c = config();
        assert_eq!(route_inbound("/bedclock/unknown", b"on", &c), None);
    }
}
