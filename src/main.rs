//! Daemon entry point: wire the adapters, workers, bus and dispatcher
//! together and run until a worker dies.

use std::env;
use std::path::PathBuf;
use std::thread;

use anyhow::Context;
use log::{error, info, warn};

use bedclock::adapters::{LogDisplay, LogLink, SimMotionSensor};
use bedclock::config::Config;
use bedclock::dispatcher::Dispatcher;
use bedclock::error::Result;
use bedclock::shutdown::ShutdownToken;
use bedclock::workers::bridge::BridgeWorker;
use bedclock::workers::motion::MotionWorker;
use bedclock::workers::screen::ScreenWorker;
use bedclock::workers::{WorkerHandles, WorkerThread};
use bedclock::{bus, cmdq};

fn load_config() -> anyhow::Result<Config> {
    let path = env::args()
        .nth(1)
        .or_else(|| env::var("BEDCLOCK_CONFIG").ok())
        .map(PathBuf::from);
    match path {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            Ok(Config::load(&path)?)
        }
        None => {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn spawn_worker<F>(name: &'static str, body: F) -> anyhow::Result<WorkerThread>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .with_context(|| format!("cannot spawn {name} worker"))?;
    Ok(WorkerThread { name, handle })
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let shutdown = ShutdownToken::new();

    let (publisher, event_bus) = bus::bounded(config.event_bus_capacity);
    let (motion_tx, motion_rx) = cmdq::bounded("motion", config.motion_cmdq_capacity);
    let (screen_tx, screen_rx) = cmdq::bounded("screen", config.screen_cmdq_capacity);
    let (bridge_tx, bridge_rx) = cmdq::bounded("bridge", config.bridge_cmdq_capacity);
    let handles = WorkerHandles {
        motion: motion_tx,
        screen: screen_tx.clone(),
        bridge: bridge_tx,
    };

    let motion = MotionWorker::new(
        config.clone(),
        SimMotionSensor::new(config.lux_max),
        motion_rx,
        publisher.clone(),
        shutdown.clone(),
    );
    let screen = ScreenWorker::new(
        config.clone(),
        LogDisplay,
        screen_rx,
        screen_tx,
        publisher.clone(),
        shutdown.clone(),
    );
    let bridge = BridgeWorker::new(
        config.clone(),
        LogLink,
        bridge_rx,
        publisher.clone(),
        shutdown.clone(),
    );
    drop(publisher);

    let workers = vec![
        spawn_worker("motion", move || motion.run())?,
        spawn_worker("screen", move || screen.run())?,
        spawn_worker("bridge", move || bridge.run())?,
    ];

    let dispatcher = Dispatcher::new(event_bus, handles, config, shutdown.clone());
    let outcome = dispatcher.run(&workers);
    if let Err(e) = &outcome {
        error!("dispatcher stopped: {e}");
    }

    // Teardown: flip the token, then drop the dispatcher so the worker
    // command queues close and any blocked worker wakes immediately.
    shutdown.trigger();
    drop(dispatcher);
    for worker in workers {
        match worker.handle.join() {
            Ok(Ok(())) => info!("{} worker joined", worker.name),
            Ok(Err(e)) => warn!("{} worker failed: {e}", worker.name),
            Err(_) => warn!("{} worker panicked", worker.name),
        }
    }

    outcome.context("daemon terminated abnormally")
}
