//! sightsensed - obstacle warning daemon
//!
//! This daemon:
//! 1. Pulls frames from the configured source at the target rate
//! 2. Runs the default detector backend on each frame
//! 3. Feeds the detections through the alert session (select, classify, gate)
//! 4. Speaks emitted warnings one at a time through the speech queue
//!
//! Configuration comes from `SIGHT_CONFIG` plus `SIGHT_*` overrides.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sightsense::config::{DetectorKind, SightConfig, SpeechEngine};
use sightsense::{
    AlertPipeline, AlertSession, BackendRegistry, CommandSpeechDevice, FrameOutcome, LabelMap,
    LogSpeechDevice, MonotonicClock, ScriptedBackend, SpeechDevice, SpeechQueue,
    SyntheticConfig, SyntheticSource,
};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "sightsensed", about = "Speak obstacle warnings from object detections")]
struct Args {
    /// Stop after this many frames (runs until Ctrl-C when omitted).
    #[arg(long, value_name = "N")]
    max_frames: Option<u64>,
}

#[derive(Default)]
struct RunCounters {
    frames: u64,
    emitted: u64,
    suppressed: u64,
    rejected: u64,
    /// Worst capture-to-decision latency since the last health line.
    max_latency: Duration,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = SightConfig::load()?;
    log::info!(
        "sightsensed {} starting: detector={} speech={:?}",
        env!("CARGO_PKG_VERSION"),
        cfg.detector.backend.as_str(),
        cfg.speech.engine
    );

    let labels = LabelMap::load(&cfg.labels_path)?;
    let registry = build_registry(&cfg)?;
    registry.warm_up_all()?;

    let queue = SpeechQueue::new(build_speech_device(&cfg));

    let pipeline = AlertPipeline::new(
        cfg.thresholds.clone(),
        Arc::new(labels),
        Arc::new(MonotonicClock::new()),
    )?;
    let mut session = AlertSession::new(pipeline, queue);
    log::info!(
        "speech device: {}, cooldown {} ms",
        session.queue().device_name(),
        session.pipeline().thresholds().cooldown_ms
    );

    let mut source = SyntheticSource::new(SyntheticConfig {
        width: cfg.source.width,
        height: cfg.source.height,
        target_fps: cfg.source.target_fps,
    })?;
    source.connect()?;
    let frame_interval = source.frame_interval();
    let geometry = source.geometry();

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    log::info!(
        "sightsensed running ({}x{} @ {} fps)",
        geometry.width,
        geometry.height,
        cfg.source.target_fps
    );

    let mut counters = RunCounters::default();
    let mut last_health_log = Instant::now();

    loop {
        if rx.try_recv().is_ok() {
            log::info!("shutdown signal received");
            break;
        }
        if args.max_frames.is_some_and(|max| counters.frames >= max) {
            log::info!("frame limit reached");
            break;
        }

        let started = Instant::now();
        let frame = source.next_frame()?;
        counters.frames += 1;

        match registry.detect_with_default(&frame) {
            Ok(batch) => {
                let report = session.on_frame(&batch)?;
                counters.rejected += (report.stats.malformed + report.stats.unknown_class) as u64;
                match report.outcome {
                    FrameOutcome::Emitted(_) => counters.emitted += 1,
                    FrameOutcome::Suppressed(_) => counters.suppressed += 1,
                    FrameOutcome::NoQualifyingDetections
                    | FrameOutcome::BelowProximityThreshold => {}
                }
            }
            Err(e) => log::warn!("detector failed on frame {}: {}", frame.sequence(), e),
        }
        counters.max_latency = counters.max_latency.max(frame.age());

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let snapshot = session.queue().snapshot()?;
            log::info!(
                "health source={} frames={} emitted={} suppressed={} rejected={} max_latency={}ms speaking={} pending={}",
                source.is_healthy(),
                counters.frames,
                counters.emitted,
                counters.suppressed,
                counters.rejected,
                counters.max_latency.as_millis(),
                snapshot.speaking,
                snapshot.pending.len()
            );
            counters.max_latency = Duration::ZERO;
            last_health_log = Instant::now();
        }

        if let Some(remaining) = frame_interval.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }

    session.shutdown()?;
    log::info!(
        "sightsensed stopped after {} frames ({} warnings emitted)",
        counters.frames,
        counters.emitted
    );
    Ok(())
}

fn build_registry(cfg: &SightConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    match cfg.detector.backend {
        DetectorKind::Scripted => {
            let backend = match &cfg.detector.script_path {
                Some(path) => {
                    let backend = ScriptedBackend::from_jsonl(path)?;
                    log::info!(
                        "scripted detector: {} frames from {}",
                        backend.len(),
                        path.display()
                    );
                    backend
                }
                None => {
                    log::warn!("no detector script configured; every frame will be empty");
                    ScriptedBackend::new(Vec::new())
                }
            };
            registry.register(backend);
        }
        DetectorKind::Tract => {
            let model_path = cfg
                .detector
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("detector.model_path is required for the tract backend"))?;
            registry.register(load_tract(model_path)?);
        }
    }
    registry.set_default(cfg.detector.backend.as_str())?;
    Ok(registry)
}

#[cfg(feature = "backend-tract")]
fn load_tract(model_path: &std::path::Path) -> Result<sightsense::detect::TractBackend> {
    sightsense::detect::TractBackend::new(model_path)
        .with_context(|| format!("failed to load detector model {}", model_path.display()))
}

#[cfg(not(feature = "backend-tract"))]
fn load_tract(model_path: &std::path::Path) -> Result<ScriptedBackend> {
    Err(anyhow!(
        "cannot load {}: tract backend requires the backend-tract feature",
        model_path.display()
    ))
    .context("detector setup failed")
}

fn build_speech_device(cfg: &SightConfig) -> Arc<dyn SpeechDevice> {
    match cfg.speech.engine {
        SpeechEngine::Log => Arc::new(LogSpeechDevice::new(cfg.speech.words_per_minute)),
        SpeechEngine::Command => {
            let device = CommandSpeechDevice::new(cfg.speech.program.clone(), cfg.speech.args.clone());
            log::info!("speaking through {}", device.program());
            Arc::new(device)
        }
    }
}
