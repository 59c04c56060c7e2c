//! region_tool - inspect and edit a parking-slot region document
//!
//! Every edit goes through the region store, so the document on disk is
//! always validated and replaced atomically.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use parkwatch::regions::{self, RegionError, RegionStore};
use parkwatch::{Point, Region};

#[derive(Parser, Debug)]
#[command(name = "region_tool", about = "Validate, list and edit parking-slot regions")]
struct Args {
    /// Region document.
    #[arg(long, env = "PARKWATCH_REGIONS", default_value = "bounding_boxes.json")]
    regions: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the document and report the first problem, if any
    Validate,

    /// Print one line per region: id, label, vertices, bounds
    List,

    /// Add (or replace with --replace) an axis-aligned rectangle region
    AddRect {
        #[arg(long)]
        id: String,
        #[arg(long)]
        label: Option<String>,
        /// Corner as x,y
        #[arg(long)]
        from: String,
        /// Opposite corner as x,y
        #[arg(long)]
        to: String,
        #[arg(long)]
        replace: bool,
    },

    /// Remove a region by id
    Remove {
        #[arg(long)]
        id: String,
    },

    /// Convert a legacy point list ([{"points": ...}]) into a region document
    Import {
        #[arg(long)]
        legacy: PathBuf,
    },

    /// Print the document fingerprint
    Fingerprint,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let store = RegionStore::new(&args.regions);

    match args.command {
        Command::Validate => match store.load() {
            Ok(set) => {
                println!("ok: {} regions in {}", set.len(), store.path().display());
            }
            Err(err) => {
                let code = err
                    .downcast_ref::<RegionError>()
                    .map(RegionError::code)
                    .unwrap_or("REGION_ERROR");
                eprintln!("{}: {}", store.path().display(), err);
                return Err(anyhow!("validation failed ({})", code));
            }
        },
        Command::List => {
            let set = store.load()?;
            for region in &set {
                let b = region.bounds();
                println!(
                    "{}\t{}\t{} vertices\t[{:.1}, {:.1}, {:.1}, {:.1}]",
                    region.id(),
                    region.label().unwrap_or("-"),
                    region.points().len(),
                    b.x1,
                    b.y1,
                    b.x2,
                    b.y2
                );
            }
        }
        Command::AddRect {
            id,
            label,
            from,
            to,
            replace,
        } => {
            let region = Region::from_rect(id, label, parse_point(&from)?, parse_point(&to)?)?;
            let set = store.update(|set| {
                if replace {
                    set.upsert(region);
                    Ok(())
                } else {
                    set.insert(region)
                }
            })?;
            println!("{} regions", set.len());
        }
        Command::Remove { id } => {
            let set = store.update(|set| {
                set.remove(&id)
                    .map(|_| ())
                    .ok_or_else(|| anyhow!("no region with id {:?}", id))
            })?;
            println!("{} regions", set.len());
        }
        Command::Import { legacy } => {
            let set = regions::load(&legacy)?;
            store.save(&set)?;
            println!(
                "imported {} regions from {} into {}",
                set.len(),
                legacy.display(),
                store.path().display()
            );
        }
        Command::Fingerprint => {
            println!("{}", store.load()?.fingerprint());
        }
    }
    Ok(())
}

fn parse_point(value: &str) -> Result<Point> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| anyhow!("point must look like x,y: {:?}", value))?;
    let x: f64 = x
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid x coordinate {:?}", x))?;
    let y: f64 = y
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid y coordinate {:?}", y))?;
    Ok(Point::new(x, y))
}
