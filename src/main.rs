// src/main.rs
mod book;
mod config;
mod net;
mod parser;
mod process;
mod rx;
mod spsc;
mod stats;
mod util;
mod wire;

use crate::config::{Config, RING_CAPACITY};
use crate::process::Processor;
use crate::rx::Receiver;
use crate::spsc::SpscRing;
use crate::util::ShutdownFlag;
use crate::wire::RawFrame;
use anyhow::Context;
use clap::Parser;
use hashbrown::HashSet;
use log::info;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> anyhow::Result<()> {
    let cfg = Config::parse();
    cfg.validate()?;

    // Telemetry goes to stdout; diagnostics share the same stream.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();

    info!("joining multicast {}:{}", cfg.multicast, cfg.port);

    let ring: Arc<SpscRing<RawFrame>> = Arc::new(SpscRing::new(RING_CAPACITY));
    let shutdown = Arc::new(ShutdownFlag::default());
    {
        let s = shutdown.clone();
        ctrlc::set_handler(move || s.raise()).context("install signal handler")?;
    }

    // Socket setup errors are fatal before any thread spawns.
    let mut receiver = Receiver::new(cfg.multicast, cfg.port)?;
    receiver.start(ring.clone(), shutdown.clone())?;

    let watched: HashSet<u32> = cfg.symbols.iter().copied().collect();
    let processor_thread = {
        let ring = ring.clone();
        let shutdown = shutdown.clone();
        let mut processor = Processor::new(watched);
        thread::Builder::new()
            .name("proc".into())
            .spawn(move || processor.run(&ring, &shutdown))
            .context("spawn processor thread")?
    };

    let started = Instant::now();
    while !shutdown.is_raised() {
        if cfg.duration > 0 && started.elapsed() >= Duration::from_secs(cfg.duration) {
            shutdown.raise();
            break;
        }
        thread::sleep(Duration::from_millis(200));
    }

    // Processor drains the ring first; ingest is stopped and joined last.
    if processor_thread.join().is_err() {
        log::error!("processor thread panicked");
    }
    receiver.stop();

    let counters = receiver.counters();
    info!(
        "final: received={} msgs ({} bytes), ring push failures={}",
        counters.messages_received(),
        counters.bytes_received(),
        counters.push_failures(),
    );

    if receiver.failed() {
        anyhow::bail!("ingest terminated on socket error");
    }
    Ok(())
}
