//! End-to-end pipeline tests: real threads, real bus, real queues, mock
//! hardware.
//!
//! Each test builds the full daemon wiring with scripted adapters and
//! compressed timings, drives one scenario through sensor -> bus ->
//! dispatcher -> worker -> port, and asserts on what reached the mock
//! display and mock broker link.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bedclock::config::Config;
use bedclock::dispatcher::Dispatcher;
use bedclock::ports::{Frame, LinkError, MatrixDisplay, MessageLink, MotionSensor};
use bedclock::shutdown::ShutdownToken;
use bedclock::workers::bridge::{BridgeCommand, BridgeWorker};
use bedclock::workers::motion::MotionWorker;
use bedclock::workers::screen::ScreenWorker;
use bedclock::workers::{WorkerHandles, WorkerThread};
use bedclock::{bus, cmdq};

// ───────────────────────────────────────────────────────────────
// Mock hardware
// ───────────────────────────────────────────────────────────────

/// Scripted sensor: pops readings from the front, holds the last value
/// once the script runs out.
#[derive(Clone)]
struct MockSensor {
    lux: Arc<Mutex<VecDeque<Option<i32>>>>,
    proximity: Arc<Mutex<VecDeque<u32>>>,
    held_lux: Arc<Mutex<Option<i32>>>,
    held_proximity: Arc<Mutex<u32>>,
}

impl MockSensor {
    fn new(lux: Vec<Option<i32>>, proximity: Vec<u32>) -> Self {
        Self {
            lux: Arc::new(Mutex::new(lux.into())),
            proximity: Arc::new(Mutex::new(proximity.into())),
            held_lux: Arc::new(Mutex::new(None)),
            held_proximity: Arc::new(Mutex::new(0)),
        }
    }
}

impl MotionSensor for MockSensor {
    fn read_lux(&mut self) -> Option<i32> {
        let mut script = self.lux.lock().unwrap();
        let mut held = self.held_lux.lock().unwrap();
        if let Some(next) = script.pop_front() {
            *held = next;
        }
        *held
    }

    fn read_proximity(&mut self) -> u32 {
        let mut script = self.proximity.lock().unwrap();
        let mut held = self.held_proximity.lock().unwrap();
        if let Some(next) = script.pop_front() {
            *held = next;
        }
        *held
    }
}

/// Display that records every frame it is asked to draw.
#[derive(Clone, Default)]
struct MockDisplay {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl MatrixDisplay for MockDisplay {
    fn draw_clock(&mut self, frame: &Frame) {
        self.frames.lock().unwrap().push(frame.clone());
    }

    fn set_motion_pixel(&mut self, _on: bool) {}
}

/// Broker link that records publishes; connectivity is switchable.
#[derive(Clone)]
struct MockLink {
    connected: Arc<AtomicBool>,
    published: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockLink {
    fn new(connected: bool) -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(connected)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MessageLink for MockLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), LinkError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Harness
// ───────────────────────────────────────────────────────────────

fn test_config() -> Config {
    Config {
        tick_unit_ms: 10,
        motion_poll_interval_ms: 5,
        proximity_dampen_secs: 0,
        wake_timeout_secs: 1,
        bridge_cmdq_timeout_secs: 1,
        event_recv_timeout_secs: 5,
        ..Config::default()
    }
}

struct Harness {
    display: MockDisplay,
    link: MockLink,
    bridge_tx: cmdq::CommandSender<BridgeCommand>,
    shutdown: ShutdownToken,
    dispatcher_thread: thread::JoinHandle<bedclock::Result<()>>,
    workers_done: Arc<Mutex<Option<Vec<(&'static str, bool)>>>>,
}

impl Harness {
    fn start(config: Config, sensor: MockSensor, link: MockLink) -> Self {
        let display = MockDisplay::default();
        let shutdown = ShutdownToken::new();

        let (publisher, event_bus) = bus::bounded(config.event_bus_capacity);
        let (motion_tx, motion_rx) = cmdq::bounded("motion", config.motion_cmdq_capacity);
        let (screen_tx, screen_rx) = cmdq::bounded("screen", config.screen_cmdq_capacity);
        let (bridge_tx, bridge_rx) = cmdq::bounded("bridge", config.bridge_cmdq_capacity);
        let handles = WorkerHandles {
            motion: motion_tx,
            screen: screen_tx.clone(),
            bridge: bridge_tx.clone(),
        };

        let motion = MotionWorker::new(
            config.clone(),
            sensor,
            motion_rx,
            publisher.clone(),
            shutdown.clone(),
        );
        let screen = ScreenWorker::new(
            config.clone(),
            display.clone(),
            screen_rx,
            screen_tx,
            publisher.clone(),
            shutdown.clone(),
        );
        let bridge = BridgeWorker::new(
            config.clone(),
            link.clone(),
            bridge_rx,
            publisher.clone(),
            shutdown.clone(),
        );
        drop(publisher);

        let workers = vec![
            WorkerThread {
                name: "motion",
                handle: thread::spawn(move || motion.run()),
            },
            WorkerThread {
                name: "screen",
                handle: thread::spawn(move || screen.run()),
            },
            WorkerThread {
                name: "bridge",
                handle: thread::spawn(move || bridge.run()),
            },
        ];

        let dispatcher = Dispatcher::new(event_bus, handles, config, shutdown.clone());
        let workers_done: Arc<Mutex<Option<Vec<(&'static str, bool)>>>> =
            Arc::new(Mutex::new(None));
        let done = Arc::clone(&workers_done);
        let dispatcher_thread = thread::spawn(move || {
            let outcome = dispatcher.run(&workers);
            drop(dispatcher);
            let results = workers
                .into_iter()
                .map(|w| (w.name, matches!(w.handle.join(), Ok(Ok(())))))
                .collect();
            *done.lock().unwrap() = Some(results);
            outcome
        });

        Self {
            display,
            link,
            bridge_tx,
            shutdown,
            dispatcher_thread,
            workers_done,
        }
    }

    fn stop(self) {
        self.shutdown.trigger();
        let outcome = self.dispatcher_thread.join().expect("dispatcher panicked");
        assert!(outcome.is_ok(), "dispatcher failed: {outcome:?}");
        let done = self.workers_done.lock().unwrap().take();
        let done = done.expect("workers were not joined");
        for (name, clean) in done {
            assert!(clean, "{name} worker did not exit cleanly");
        }
    }
}

/// Poll until `predicate` holds, panicking after five seconds.
fn wait_for(what: &str, mut predicate: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if predicate() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {what}");
}

// ───────────────────────────────────────────────────────────────
// Scenarios
// ───────────────────────────────────────────────────────────────

#[test]
fn startup_announces_motion_off_and_reports_lux() {
    let sensor = MockSensor::new(vec![Some(500)], vec![0]);
    let link = MockLink::new(true);
    let harness = Harness::start(test_config(), sensor, link.clone());

    // The bridge announces "off" once connected, and the initial forced
    // lux report travels sensor -> bus -> dispatcher -> bridge -> broker.
    wait_for("initial motion announcement and lux publish", || {
        let published = link.published.lock().unwrap();
        published
            .iter()
            .any(|(t, v)| t == "/bedclock/motion" && v == "off")
            && published
                .iter()
                .any(|(t, v)| t == "/bedclock/light" && v == "500")
    });

    harness.stop();
}

#[test]
fn proximity_pulse_publishes_motion_on_then_off() {
    // Nothing, then a hand at 50, then gone again.
    let proximity = vec![0, 0, 0, 50, 50, 50, 0];
    let sensor = MockSensor::new(vec![Some(500)], proximity);
    let link = MockLink::new(true);
    let harness = Harness::start(test_config(), sensor, link.clone());

    wait_for("motion on then off on the broker", || {
        let published = link.published.lock().unwrap();
        let motion: Vec<&str> = published
            .iter()
            .filter(|(t, _)| t == "/bedclock/motion")
            .map(|(_, v)| v.as_str())
            .collect();
        // initial announcement, arrival, departure
        motion == ["off", "on", "off"]
    });

    harness.stop();
}

#[test]
fn proximity_wake_ramps_the_display_brightness() {
    let config = test_config();
    // Dark room: lux 0 keeps the wanted brightness at off until the wake.
    let sensor = MockSensor::new(vec![Some(0)], vec![0, 0, 0, 80]);
    let link = MockLink::new(true);
    let harness = Harness::start(config.clone(), sensor, link);

    wait_for("display to reach full brightness", || {
        let frames = harness.display.frames.lock().unwrap();
        frames
            .iter()
            .any(|f| f.show_clock && f.brightness == config.brightness_max)
    });
    // The ramp is gradual: some frame sits strictly between the
    // jump-start value and the maximum.
    {
        let frames = harness.display.frames.lock().unwrap();
        let jumpstart = config.brightness_max / 6;
        assert!(
            frames
                .iter()
                .any(|f| f.brightness > jumpstart && f.brightness < config.brightness_max),
            "no intermediate brightness frame recorded"
        );
    }

    harness.stop();
}

#[test]
fn inbound_temperature_reaches_the_clock_face() {
    let sensor = MockSensor::new(vec![None], vec![0]);
    let link = MockLink::new(true);
    let harness = Harness::start(test_config(), sensor, link);

    // Play the broker adapter: deliver an inbound message.
    assert!(harness.bridge_tx.send(BridgeCommand::Inbound {
        topic: "/sensor/temperature_outside".to_string(),
        payload: b"-3.5".to_vec(),
    }));

    wait_for("temperature on a drawn frame", || {
        let frames = harness.display.frames.lock().unwrap();
        frames.iter().any(|f| f.outside_temperature == Some(-3.5))
    });

    harness.stop();
}

#[test]
fn inbound_stay_on_keeps_a_dark_room_lit() {
    let config = test_config();
    // Dark room the whole time.
    let sensor = MockSensor::new(vec![Some(0)], vec![0]);
    let link = MockLink::new(true);
    let harness = Harness::start(config.clone(), sensor, link);

    // Without stay-on, the display blanks.
    wait_for("display to blank in the dark", || {
        let frames = harness.display.frames.lock().unwrap();
        frames.iter().any(|f| !f.show_clock)
    });

    assert!(harness.bridge_tx.send(BridgeCommand::Inbound {
        topic: "/bedclock/stay".to_string(),
        payload: b"on".to_vec(),
    }));

    // Stay-on forces a fresh lux decision; dark now maps to minimum
    // visible brightness instead of off.
    wait_for("display to come back at minimum brightness", || {
        let frames = harness.display.frames.lock().unwrap();
        frames
            .last()
            .is_some_and(|f| f.show_clock && f.brightness == config.brightness_min)
    });

    harness.stop();
}

#[test]
fn disconnected_link_drops_publishes_without_failing() {
    let sensor = MockSensor::new(vec![Some(500)], vec![0, 0, 50]);
    let link = MockLink::new(false);
    let harness = Harness::start(test_config(), sensor, link.clone());

    // Give the pipeline time to produce events; nothing may reach the
    // broker and nothing may crash.
    thread::sleep(Duration::from_millis(300));
    assert!(link.published.lock().unwrap().is_empty());

    harness.stop();
}

#[test]
fn shutdown_joins_every_worker_quickly() {
    let sensor = MockSensor::new(vec![Some(500)], vec![0]);
    let link = MockLink::new(true);
    let harness = Harness::start(test_config(), sensor, link);

    // Let the pipeline settle into its idle loops first.
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    harness.stop();
    // The bridge blocks for up to bridge_cmdq_timeout_secs, but closing
    // its queue wakes it immediately.
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "shutdown took {:?}",
        started.elapsed()
    );
}
