//! parkwatch - parking occupancy over a frame source
//!
//! This tool:
//! 1. Loads engine configuration (PARKWATCH_CONFIG + env), then CLI overrides
//! 2. Opens a local frame source (image, directory of images, or stub://)
//! 3. Runs detections (replayed from a JSON-lines file) through the engine
//! 4. Writes annotated JPEGs and prints one JSON summary per frame on stdout

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parkwatch::config::parse_classes;
use parkwatch::ui::Ui;
use parkwatch::{
    DetectorBackend, EngineConfig, FileConfig, FileSource, Pipeline, ReplayBackend, Session,
    StubBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frame source: image file, directory of images, or stub://WIDTHxHEIGHT?frames=N.
    #[arg(long)]
    input: String,
    /// Region document (overrides config).
    #[arg(long)]
    regions: Option<PathBuf>,
    /// Recorded detections, one JSON object per frame.
    #[arg(long)]
    detections: Option<PathBuf>,
    /// Directory for annotated frames (frame_000000.jpg, ...).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Overlay occupant confidence on occupied regions.
    #[arg(long)]
    show_labels: bool,
    /// Outline every eligible detection box.
    #[arg(long)]
    draw_detections: bool,
    /// Minimum detection confidence in [0, 1].
    #[arg(long)]
    confidence: Option<f32>,
    /// Comma-separated eligible class ids; empty admits all.
    #[arg(long)]
    classes: Option<String>,
    /// Keep a region occupied for this many frames after its occupant is lost.
    #[arg(long)]
    hold_frames: Option<u64>,
    /// Region reload policy: reload or cached.
    #[arg(long)]
    cache: Option<String>,
    /// TrueType font for labels and the analytics panel.
    #[arg(long)]
    font: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// UI mode: auto, plain, pretty.
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::from_flag(args.ui.as_deref());

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = EngineConfig::load()?;
        apply_args(&mut cfg, &args)?;
        cfg.validate()?;
        cfg
    };

    let detector: Box<dyn DetectorBackend> = match &args.detections {
        Some(path) => {
            let _stage = ui.stage("Load recorded detections");
            Box::new(ReplayBackend::from_path(path)?)
        }
        None => {
            log::warn!("no --detections given; every region will read available");
            Box::new(StubBackend::new())
        }
    };

    let mut source = FileSource::new(FileConfig {
        path: args.input.clone(),
        max_frames: args.max_frames,
    })?;

    if let Some(out) = &args.out {
        std::fs::create_dir_all(out)
            .with_context(|| format!("failed to create output directory {}", out.display()))?;
    }

    let session = Session::start(cfg.engine()?, cfg.region_cache());
    let mut pipeline = Pipeline::new(detector, cfg.detect.clone(), session)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let progress = ui.frames(source.stats().frames_total);
    let stdout = std::io::stdout();
    while !stop.load(Ordering::SeqCst) {
        let Some(frame) = source.next_frame()? else {
            break;
        };
        let outcome = pipeline.step(&frame)?;
        if let Some(out) = &args.out {
            let path = out.join(format!("frame_{:06}.jpg", frame.index()));
            outcome
                .annotated
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        let line = serde_json::to_string(&outcome.summary)?;
        writeln!(stdout.lock(), "{}", line)?;
        progress.advance(outcome.summary.occupied, outcome.summary.free);
    }
    progress.finish();
    if stop.load(Ordering::SeqCst) {
        log::info!("shutdown signal received, stopping");
    }

    let report = pipeline.finish();
    log::info!(
        "processed {} frames from {}",
        report.frames,
        source.stats().path
    );
    Ok(())
}

fn apply_args(cfg: &mut EngineConfig, args: &Args) -> Result<()> {
    if let Some(path) = &args.regions {
        cfg.regions_path = path.clone();
    }
    if args.show_labels {
        cfg.annotate.show_labels = true;
    }
    if args.draw_detections {
        cfg.annotate.draw_detections = true;
    }
    if let Some(confidence) = args.confidence {
        cfg.detect.confidence_threshold = confidence;
    }
    if let Some(classes) = &args.classes {
        cfg.detect.class_filter = parse_classes(classes)?;
    }
    if let Some(hold) = args.hold_frames {
        cfg.hold_frames = hold;
    }
    if let Some(policy) = &args.cache {
        cfg.region_cache = policy.parse()?;
    }
    if let Some(font) = &args.font {
        cfg.label_font = Some(font.clone());
    }
    Ok(())
}
