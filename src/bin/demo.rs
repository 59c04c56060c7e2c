//! demo - end-to-end synthetic run of the parking occupancy kernel
//!
//! Writes a two-slot region document, scripts a car that parks in slot A,
//! drops out of detection for one frame, then moves to slot B, and writes
//! the annotated frames plus a session report.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use parkwatch::annotate::AnnotateOptions;
use parkwatch::ui::Ui;
use parkwatch::{
    Annotator, BoundingBox, CachePolicy, DetectOptions, Detection, FileConfig, FileSource,
    FrameEngine, Pipeline, Point, Region, RegionCache, RegionSet, RegionStore, Session,
    StubBackend,
};

const FRAME_WIDTH: u32 = 320;
const FRAME_HEIGHT: u32 = 120;
const CAR_CLASS: u32 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of synthetic frames.
    #[arg(long, default_value_t = 8)]
    frames: u64,
    /// Output directory for regions, annotated frames and the report.
    #[arg(long, default_value = "demo_out")]
    out: String,
    /// Frames a slot stays occupied after its car is lost.
    #[arg(long, default_value_t = 0)]
    hold_frames: u64,
    /// UI mode: auto, plain, pretty.
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.frames == 0 {
        return Err(anyhow!("frames must be >= 1"));
    }
    let ui = Ui::from_flag(args.ui.as_deref());

    let out_dir = PathBuf::from(&args.out);
    fs::create_dir_all(&out_dir)?;

    let store = RegionStore::new(out_dir.join("regions.json"));
    {
        let _stage = ui.stage("Write region document");
        let set = RegionSet::from_regions([
            Region::from_rect("A", Some("left".into()), Point::new(20.0, 20.0), Point::new(140.0, 100.0))?,
            Region::from_rect("B", Some("right".into()), Point::new(180.0, 20.0), Point::new(300.0, 100.0))?,
        ])?;
        store.save(&set)?;
    }

    let detector = script(args.frames);
    let options = DetectOptions::default();
    let annotator = Annotator::new(AnnotateOptions {
        show_labels: true,
        draw_detections: true,
        ..AnnotateOptions::default()
    });
    let engine = FrameEngine::new(options.clone(), annotator).with_hold_frames(args.hold_frames);
    let session = Session::start(engine, RegionCache::from_store(store, CachePolicy::Cached));
    let mut pipeline = Pipeline::new(Box::new(detector), options, session)?;

    let source = FileSource::new(FileConfig::new(format!(
        "stub://{}x{}?frames={}",
        FRAME_WIDTH, FRAME_HEIGHT, args.frames
    )))?;

    {
        let _stage = ui.stage("Process frames");
        for frame in source {
            let frame = frame?;
            let outcome = pipeline.step(&frame)?;
            let path = out_dir.join(format!("frame_{:06}.png", frame.index()));
            outcome
                .annotated
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{}", serde_json::to_string(&outcome.summary)?);
        }
    }

    let report = pipeline.finish();
    let report_path = out_dir.join("report.json");
    fs::write(&report_path, serde_json::to_vec_pretty(&report)?)?;
    log::info!("demo complete: {}", report_path.display());
    Ok(())
}

/// Car in A for the first half (missing on frame 3), in B afterwards, plus a
/// pedestrian in B that the class filter ignores.
fn script(frames: u64) -> StubBackend {
    let in_a = Detection::new(BoundingBox::new(50.0, 40.0, 110.0, 80.0), CAR_CLASS, 0.91).with_track_id(1);
    let in_b = Detection::new(BoundingBox::new(210.0, 40.0, 270.0, 80.0), CAR_CLASS, 0.88).with_track_id(1);
    let pedestrian = Detection::new(BoundingBox::new(230.0, 30.0, 250.0, 90.0), 0, 0.95);
    let half = frames / 2;

    let mut stub = StubBackend::new();
    for index in 0..frames {
        let detections = if index == 3 {
            vec![]
        } else if index < half {
            vec![in_a.clone(), pedestrian.clone()]
        } else {
            vec![in_b.clone()]
        };
        stub = stub.with_frame(index, detections);
    }
    stub
}
