//! mark_spaces - headless parking space annotation
//!
//! Replays pointer gestures through the annotation session so spaces can be
//! marked from scripts or the command line. Every completed drag is saved
//! immediately.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use parking_occupancy::{AnnotationSession, FileRegionStore, Point, PointerEvent};

const DEFAULT_REGIONS_PATH: &str = "CarParkPos.json";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Region file to read and update.
    #[arg(long, global = true, env = "PARKING_REGIONS_PATH", default_value = DEFAULT_REGIONS_PATH)]
    regions: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add one space by dragging between two corners.
    Add {
        /// Drag start as X,Y.
        #[arg(long, value_parser = parse_point)]
        from: Point,
        /// Drag end as X,Y.
        #[arg(long, value_parser = parse_point)]
        to: Point,
    },
    /// Replay a file of `down|move|up X Y` pointer events, one per line.
    Replay {
        #[arg(long)]
        script: PathBuf,
    },
    /// Print the stored spaces.
    List,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut session = AnnotationSession::open(FileRegionStore::new(&args.regions));

    match args.command {
        Command::Add { from, to } => match session.drag(from, to)? {
            Some(index) => println!("added space {}", index),
            None => println!("drag from {:?} to {:?} has no area; nothing added", from, to),
        },
        Command::Replay { script } => {
            let text = std::fs::read_to_string(&script)
                .with_context(|| format!("failed to read script {}", script.display()))?;
            let mut added = 0usize;
            for (line_no, line) in text.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let event: PointerEvent = line
                    .parse()
                    .with_context(|| format!("{}:{}", script.display(), line_no + 1))?;
                if session.handle(event)?.is_some() {
                    added += 1;
                }
            }
            println!("added {} spaces", added);
        }
        Command::List => {}
    }

    let regions = session.regions();
    println!("{} spaces in {}", regions.len(), args.regions.display());
    for (index, region) in regions.iter().enumerate() {
        println!("{:>3}: {}", index, region);
    }
    Ok(())
}

fn parse_point(value: &str) -> Result<Point> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| anyhow!("expected X,Y, got '{}'", value))?;
    let x = x.trim().parse().with_context(|| format!("bad x in '{}'", value))?;
    let y = y.trim().parse().with_context(|| format!("bad y in '{}'", value))?;
    Ok(Point::new(x, y))
}
