//! Runs the picker end to end on the simulated bench:
//!
//! 1. Resolve the controller board and the arm among the configured endpoints
//! 2. Feed synthetic detections (and alignment updates) as the vision pipeline would
//! 3. Report each accepted pick on the telemetry stream
//!
//! Triggers arriving while a pick is in flight are dropped, so with a short trigger interval
//! most of them never start a sequence.

use std::fs::File;
use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;
use rand::Rng;
use tokio::time::{sleep, Duration};

use harvest_picker::config::PickConfig;
use harvest_picker::harvester::Harvester;
use harvest_picker::harvester_hal_factory::HarvesterHalFactory;
use harvest_picker::sequence_coordinator::SequenceState;
use harvest_picker::sim::{SimBench, SimConnector};
use harvest_picker::telemetry::{JsonLinesTelemetry, TelemetryMessage, TelemetrySink};
use harvest_picker::vision::{AlignmentEvent, DetectionEvent, VisionEventSender};

#[derive(Parser, Debug)]
#[clap(name = "harvester")]
struct Opts {
    /// JSON file overriding the default pick parameters.
    #[clap(long)]
    config: Option<PathBuf>,

    #[clap(short = 'n', long, default_value = "5")]
    triggers: usize,

    #[clap(long, default_value = "4000")]
    trigger_interval_ms: u64,

    /// Endpoints with simulated hardware behind them (default: /dev/ttyACM1 and 192.168.0.6).
    #[clap(long)]
    present: Vec<String>,

    /// Write telemetry lines here instead of stdout.
    #[clap(long)]
    telemetry_out: Option<PathBuf>,

    /// Peak-to-peak simulated sensor noise.
    #[clap(long, default_value = "4.0")]
    noise_mm: f64,
}

const ALIGNMENTS_PER_TRIGGER: u32 = 4;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opts: Opts = Opts::parse();

    let config = match &opts.config {
        Some(path) => PickConfig::load(path)?,
        None => PickConfig::default(),
    };
    let present = if opts.present.is_empty() {
        vec!["/dev/ttyACM1".to_owned(), "192.168.0.6".to_owned()]
    } else {
        opts.present.clone()
    };

    let bench = SimBench::default();
    bench.world().noise_mm = opts.noise_mm;
    let connector = SimConnector::new(bench.clone(), present);
    let hal = HarvesterHalFactory::new(&connector, &config.hardware).create_hal()?;

    let mut telemetry = open_telemetry(opts.telemetry_out.as_ref())?;
    telemetry.record(&TelemetryMessage::Clear)?;

    let (harvester, sender) = Harvester::start(hal, config, telemetry).await;
    let interval = Duration::from_millis(opts.trigger_interval_ms);
    feed_detections(&harvester, &bench, &sender, opts.triggers, interval).await;
    drop(sender);

    while harvester.state() != SequenceState::Idle {
        sleep(Duration::from_millis(100)).await;
    }
    let stats = harvester.shutdown().await?;
    info!("Done: {stats:?}");
    Ok(())
}

fn open_telemetry(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn TelemetrySink>> {
    Ok(match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating telemetry output {}", path.display()))?;
            Box::new(JsonLinesTelemetry::new(file))
        }
        None => Box::new(JsonLinesTelemetry::new(io::stdout())),
    })
}

/// A detection that can start a pick places a fresh target in front of the gripper.  The others
/// are sent anyway and get dropped by the picker.
async fn feed_detections(
    harvester: &Harvester,
    bench: &SimBench,
    sender: &VisionEventSender,
    triggers: usize,
    interval: Duration,
) {
    let mut rng = rand::thread_rng();
    for _ in 0..triggers {
        let detection = DetectionEvent::new(
            rng.gen_range(-0.15..0.15),
            rng.gen_range(0.25..0.45),
            rng.gen_range(0.30..0.50),
            rng.gen_range(0.10..0.30),
            rng.gen_range(-45.0..45.0),
        );
        if harvester.state() == SequenceState::Idle {
            bench.world().standoff_mm = detection.distance * 1000.0;
        }
        sender.send_pick_trigger(detection);
        for _ in 0..ALIGNMENTS_PER_TRIGGER {
            sleep(interval / ALIGNMENTS_PER_TRIGGER).await;
            let jitter = rng.gen_range(-0.005..0.005);
            sender.send_alignment(AlignmentEvent::new(
                detection.x + jitter, detection.y, detection.z + jitter, detection.distance));
        }
    }
}
