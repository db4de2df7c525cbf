use anyhow::{Context, Result};
use colored::*;
use std::path::Path;
use strata_core::pipeline::pack_to_tar;
use tracing::info;

/// Write the canonical tar of `input` to `output`
pub fn execute(input: &str, output: &str) -> Result<()> {
    info!("Packing {} into {}", input, output);

    let written = pack_to_tar(Path::new(input), Path::new(output))
        .with_context(|| format!("Failed to pack {}", input))?;

    println!("{} Wrote {} ({} bytes)", "✓".green(), output, written);
    Ok(())
}
