//! demo - scripted end-to-end runs of the alert chain
//!
//! Replays fixed frame sequences through a full `AlertSession` on a manual
//! clock and a recording speech device, then checks what was spoken:
//! - near person, centered: one STOP warning
//! - small box on the left: silence
//! - two warnings 100ms apart: the second waits for the first to finish
//! - two warnings alternating every frame: every frame speaks (no cooldown)

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use sightsense::ui::Ui;
use sightsense::{
    AlertPipeline, AlertSession, AlertThresholds, Detection, DetectionBatch, FrameGeometry,
    FrameOutcome, LabelMap, LabelResolver, ManualClock, RecordingSpeechDevice, SpeechQueue,
};

const DEMO_LABELS: [&str; 6] = ["???", "person", "bicycle", "car", "chair", "dog"];
const PERSON: u32 = 1;
const CHAIR: u32 = 4;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Optional labels file (defaults to a built-in six-entry list).
    #[arg(long)]
    labels: Option<String>,
    /// Frames in the oscillation run.
    #[arg(long, default_value_t = 6)]
    oscillation_frames: u32,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

enum Step {
    /// Advance the clock, then process one frame.
    Frame { after_ms: u64, detections: Vec<Detection> },
    /// The speech device finishes its current utterance.
    Complete,
}

struct Scenario {
    name: &'static str,
    steps: Vec<Step>,
    expect_spoken: Vec<&'static str>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let labels: Arc<dyn LabelResolver> = match &args.labels {
        Some(path) => Arc::new(LabelMap::load(path)?),
        None => Arc::new(LabelMap::from_lines(DEMO_LABELS)),
    };
    let geometry = FrameGeometry::new(640, 480)?;

    let mut failures = 0usize;
    for scenario in scenarios(args.oscillation_frames) {
        let stage = ui.stage(scenario.name);
        let spoken = run_scenario(&scenario, geometry, Arc::clone(&labels), &stage)?;
        drop(stage);
        let ok = spoken == scenario.expect_spoken;
        println!("{}: {}", scenario.name, if ok { "ok" } else { "MISMATCH" });
        for text in &spoken {
            println!("  spoke: {}", text);
        }
        if !ok {
            println!("  expected: {:?}", scenario.expect_spoken);
            failures += 1;
        }
    }

    if failures > 0 {
        return Err(anyhow!("{} scenario(s) did not speak as expected", failures));
    }
    Ok(())
}

fn run_scenario(
    scenario: &Scenario,
    geometry: FrameGeometry,
    labels: Arc<dyn LabelResolver>,
    stage: &sightsense::ui::StageGuard,
) -> Result<Vec<String>> {
    let clock = ManualClock::new(0);
    let device = Arc::new(RecordingSpeechDevice::new());
    let pipeline = AlertPipeline::new(AlertThresholds::default(), labels, Arc::new(clock.clone()))?;
    let mut session = AlertSession::new(pipeline, SpeechQueue::new(device.clone()));

    for step in &scenario.steps {
        match step {
            Step::Frame {
                after_ms,
                detections,
            } => {
                clock.advance(Duration::from_millis(*after_ms));
                let batch = DetectionBatch::new(geometry, detections.clone());
                let report = session.on_frame(&batch)?;
                stage.note(&describe(&report.outcome));
            }
            Step::Complete => {
                device.complete_next()?;
            }
        }
    }
    session.shutdown()?;
    Ok(device.spoken_texts())
}

fn describe(outcome: &FrameOutcome) -> String {
    match outcome {
        FrameOutcome::NoQualifyingDetections => "no qualifying detections".to_string(),
        FrameOutcome::BelowProximityThreshold => "nothing close enough".to_string(),
        FrameOutcome::Suppressed(w) => format!("suppressed \"{}\"", w),
        FrameOutcome::Emitted(w) => format!("emitted \"{}\"", w),
    }
}

fn scenarios(oscillation_frames: u32) -> Vec<Scenario> {
    let near_person = Detection::new(0.1, 0.1, 0.9, 0.9, PERSON, 0.9);
    let small_left = Detection::new(0.3, 0.02, 0.7, 0.3, PERSON, 0.9);
    let chair_left = Detection::new(0.0, 0.0, 1.0, 0.4, CHAIR, 0.8);

    let mut oscillation = Vec::new();
    let mut oscillation_spoken = Vec::new();
    for i in 0..oscillation_frames {
        let (detection, text) = if i % 2 == 0 {
            (near_person, "STOP! Step back! person ahead")
        } else {
            (chair_left, "Move right! chair on left")
        };
        oscillation.push(Step::Frame {
            after_ms: 100,
            detections: vec![detection],
        });
        oscillation.push(Step::Complete);
        oscillation_spoken.push(text);
    }

    vec![
        Scenario {
            name: "near person, centered",
            steps: vec![
                Step::Frame {
                    after_ms: 0,
                    detections: vec![near_person],
                },
                Step::Frame {
                    after_ms: 500,
                    detections: vec![near_person],
                },
            ],
            expect_spoken: vec!["STOP! Step back! person ahead"],
        },
        Scenario {
            name: "small box on the left",
            steps: vec![Step::Frame {
                after_ms: 0,
                detections: vec![small_left],
            }],
            expect_spoken: Vec::new(),
        },
        Scenario {
            name: "second warning waits its turn",
            steps: vec![
                Step::Frame {
                    after_ms: 0,
                    detections: vec![near_person],
                },
                Step::Frame {
                    after_ms: 100,
                    detections: vec![chair_left],
                },
                Step::Complete,
            ],
            expect_spoken: vec!["STOP! Step back! person ahead", "Move right! chair on left"],
        },
        Scenario {
            name: "alternating warnings",
            steps: oscillation,
            expect_spoken: oscillation_spoken,
        },
    ]
}
