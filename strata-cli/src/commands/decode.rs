use anyhow::{Context, Result};
use colored::*;
use std::path::Path;
use strata_core::{decode_to_tar, ArchiveId, DecodeOptions};
use tracing::info;

/// Rebuild the archive held in `input` and write it to `output` as tar
pub fn execute(input: &str, output: &str, archive_id: Option<&str>) -> Result<()> {
    info!("Decoding frames from {} into {}", input, output);

    let archive_id = archive_id
        .map(|hex| {
            hex.parse::<ArchiveId>()
                .with_context(|| format!("Invalid archive id: {}", hex))
        })
        .transpose()?;

    let options = DecodeOptions {
        archive_id,
        ..DecodeOptions::default()
    };
    let summary = decode_to_tar(Path::new(input), Path::new(output), &options)
        .with_context(|| format!("Failed to decode {}", input))?;

    let stats = &summary.stats;
    println!("\n=== Decode Results ===");
    println!("Archive id:      {}", summary.archive_id.to_string().cyan());
    println!("Entries:         {}", summary.entries);
    println!("Archive size:    {} bytes", summary.archive_len);
    println!("Frames used:     {}", stats.accepted);
    println!("Blocks rebuilt:  {}", stats.recovered_blocks);
    if !summary.skipped.is_empty() {
        println!("Files skipped:   {}", summary.skipped.len());
    }
    let ignored = stats.duplicates + stats.invalid + stats.foreign + stats.mismatched_layout;
    if ignored > 0 {
        println!("Frames ignored:  {}", ignored.to_string().yellow());
    }
    println!("{} Wrote {}", "✓".green(), output);

    Ok(())
}
