// src/main.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{error, info, warn};

use fly_courtship_tracking::behavior::BoutEvent;
use fly_courtship_tracking::config::{ArenaEntry, Config};
use fly_courtship_tracking::io::{FrameSource, RawMaskFile};
use fly_courtship_tracking::tracking::{annotation, Arena, Calibration};

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(Path::new(&config_path))?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("fly_courtship_tracking={}", config.logging.level))
        .init();

    info!("fly courtship tracking starting");
    info!(
        arenas = config.arenas.len(),
        output = %config.output.dir,
        "configuration loaded"
    );
    if config.arenas.is_empty() {
        error!("no arenas configured, nothing to do");
        return Ok(());
    }

    let output_root = PathBuf::from(&config.output.dir);
    fs::create_dir_all(&output_root)
        .with_context(|| format!("creating output dir {}", output_root.display()))?;

    // Arenas are independent; everything inside one arena is sequential.
    let results: Vec<(usize, Result<f32>)> = config
        .arenas
        .par_iter()
        .enumerate()
        .map(|(index, entry)| (index, process_arena(index, entry, &config, &output_root)))
        .collect();

    let mut failures = 0usize;
    for (index, result) in results {
        match result {
            Ok(quality) => info!(arena = index, quality, "arena complete"),
            Err(e) => {
                failures += 1;
                error!(arena = index, error = %e, "arena failed");
            }
        }
    }
    info!(
        total = config.arenas.len(),
        failed = failures,
        "all arenas processed"
    );
    Ok(())
}

fn process_arena(
    index: usize,
    entry: &ArenaEntry,
    config: &Config,
    output_root: &Path,
) -> Result<f32> {
    let calibration = Calibration {
        pixel_per_millimeter: entry.pixel_per_millimeter,
        source_frame_rate: entry.frame_rate,
        fly_count: entry.fly_count,
    };
    let mut arena = Arena::new(index, calibration, config.tracking.clone());
    let arena_dir = output_root.join(format!("arena{index}"));

    let mut source = RawMaskFile::open(Path::new(&entry.masks_file))?;
    info!(
        arena = index,
        frames = source.frame_count(),
        masks = %entry.masks_file,
        "processing arena"
    );

    let bouts = arena.process(&mut source, &arena_dir.join("store"))?;

    if let Some(annotation_file) = &entry.annotation_file {
        match annotation::apply_annotations(Path::new(annotation_file), &mut arena) {
            Ok(corrected) if corrected > 0 => {
                info!(arena = index, corrected, "annotation corrections merged")
            }
            Ok(_) => {}
            // Bad annotation tables degrade, they do not fail the arena.
            Err(e) => warn!(arena = index, error = %e, "annotation import skipped"),
        }
    }

    if config.output.export_attributes {
        arena.export(&arena_dir)?;
    }
    if config.output.export_events {
        write_events(&arena_dir.join("events.json"), &bouts)?;
    }
    Ok(arena.quality())
}

fn write_events(path: &Path, bouts: &[BoutEvent]) -> Result<()> {
    let json = serde_json::to_string_pretty(bouts)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}
