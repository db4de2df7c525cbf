use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;
use std::fs;
use strata_core::reconstruct::{survey, ArchiveSurvey, SurveyReport};
use strata_core::constants::MANIFEST_SUFFIX;
use strata_core::FrameStore;
use tracing::info;

/// Stripes listed per archive before the output is truncated
const MAX_LISTED_STRIPES: usize = 32;

/// What `inspect` found in a frame directory
#[derive(Debug, Serialize)]
pub struct InspectReport {
    /// Directory as given
    pub directory: String,
    /// Files that were neither frames nor manifests
    pub skipped_files: usize,
    pub survey: SurveyReport,
}

/// Survey every frame file in `input` without decoding
pub fn inspect_dir(input: &str) -> Result<InspectReport> {
    let loaded = FrameStore::open(input)
        .and_then(|store| store.read_frames())
        .with_context(|| format!("Failed to read frame directory: {}", input))?;

    Ok(InspectReport {
        directory: input.to_string(),
        skipped_files: loaded
            .skipped
            .iter()
            .filter(|s| !s.path.to_string_lossy().ends_with(MANIFEST_SUFFIX))
            .count(),
        survey: survey(loaded.frames),
    })
}

/// Print the stripe health of `input`, optionally saving it as JSON
pub fn execute(input: &str, json_output: Option<&str>) -> Result<()> {
    info!("Inspecting {}", input);
    let report = inspect_dir(input)?;

    println!("\n=== Inspect Results ===");
    println!("Frames read:     {}", report.survey.frames_seen);
    if report.skipped_files > 0 {
        println!("Skipped files:   {}", report.skipped_files.to_string().yellow());
    }
    if report.survey.archives.is_empty() {
        println!("{} No frames found", "✗".red());
    }
    for archive in &report.survey.archives {
        print_archive(archive);
    }

    if let Some(path) = json_output {
        let json = serde_json::to_string_pretty(&report)
            .context("Failed to serialize inspect report")?;
        fs::write(path, json).with_context(|| format!("Failed to write report: {}", path))?;
        info!("Report written to {}", path);
    }

    Ok(())
}

fn print_archive(archive: &ArchiveSurvey) {
    let layout = &archive.layout;
    println!("\nArchive {}", layout.archive_id.to_string().cyan());
    println!(
        "  Geometry:      k={} m={} block={} blocks={} stripes={}",
        layout.params.data_shards,
        layout.params.parity_shards,
        layout.params.block_size,
        layout.total_blocks,
        layout.stripe_count()
    );
    println!("  Frames:        {}", archive.frames);
    if archive.duplicates > 0 {
        println!("  Duplicates:    {}", archive.duplicates);
    }
    if archive.mismatched_layout > 0 {
        println!("  Odd layout:    {}", archive.mismatched_layout.to_string().yellow());
    }
    if archive.empty_stripes > 0 {
        println!("  Empty stripes: {}", archive.empty_stripes.to_string().red());
    }

    for health in archive.stripes.iter().take(MAX_LISTED_STRIPES) {
        let mark = if health.recoverable {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "  {} stripe {:>6}: {}/{}",
            mark, health.stripe, health.available, health.required
        );
    }
    if archive.stripes.len() > MAX_LISTED_STRIPES {
        println!("  ... {} more stripes", archive.stripes.len() - MAX_LISTED_STRIPES);
    }

    match archive.first_unrecoverable {
        None => println!("  {} Recoverable", "✓".green()),
        Some(stripe) => println!(
            "  {} Not recoverable (stripe {} short of frames)",
            "✗".red(),
            stripe
        ),
    }
}
