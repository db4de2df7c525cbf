use anyhow::{Context, Result};
use colored::*;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use strata_core::{pack_and_encode, CodecParams, EncodeOptions, Profile};
use tracing::{debug, info};

/// Stripe geometry given per field on the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct ParamOverrides {
    /// `--data-shards`
    pub data_shards: Option<usize>,
    /// `--parity-shards`
    pub parity_shards: Option<usize>,
    /// `--block-size`
    pub block_size: Option<usize>,
}

/// JSON params file; absent fields keep the profile's value
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParamsFile {
    data_shards: Option<usize>,
    parity_shards: Option<usize>,
    block_size: Option<usize>,
}

impl ParamOverrides {
    fn apply(&self, params: &mut CodecParams) {
        if let Some(k) = self.data_shards {
            params.data_shards = k;
        }
        if let Some(m) = self.parity_shards {
            params.parity_shards = m;
        }
        if let Some(b) = self.block_size {
            params.block_size = b;
        }
    }
}

impl From<ParamsFile> for ParamOverrides {
    fn from(file: ParamsFile) -> Self {
        Self {
            data_shards: file.data_shards,
            parity_shards: file.parity_shards,
            block_size: file.block_size,
        }
    }
}

/// Layer flags over the params file over the profile, then validate
pub fn resolve_params(
    profile: Profile,
    params_file: Option<&str>,
    flags: ParamOverrides,
) -> Result<CodecParams> {
    let mut params = profile.params();

    if let Some(path) = params_file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read params file: {}", path))?;
        let file: ParamsFile = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse params file: {}", path))?;
        ParamOverrides::from(file).apply(&mut params);
    }
    flags.apply(&mut params);

    params
        .validate()
        .with_context(|| format!("Rejected parameters {:?}", params))?;
    debug!("Using {:?} (profile {})", params, profile.name());
    Ok(params)
}

/// Pack `input` and write its frames and manifest into `output`
pub fn execute(input: &str, output: &str, params: CodecParams) -> Result<()> {
    info!("Encoding {} into {}", input, output);

    let options = EncodeOptions {
        params,
        ..EncodeOptions::default()
    };
    let summary = pack_and_encode(Path::new(input), Path::new(output), &options)
        .with_context(|| format!("Failed to encode {} into {}", input, output))?;
    let manifest = &summary.manifest;

    println!("\n=== Encode Results ===");
    println!("Archive id:      {}", manifest.archive_id.to_string().cyan());
    println!("Entries:         {}", manifest.entries);
    println!("Archive size:    {} bytes", manifest.archive_len);
    println!(
        "Geometry:        k={} m={} block={}",
        manifest.params.data_shards, manifest.params.parity_shards, manifest.params.block_size
    );
    println!(
        "Frames:          {} ({} stripes)",
        manifest.frames, manifest.stripes
    );
    println!("Newly written:   {}", summary.written.to_string().green());
    if summary.already_present > 0 {
        println!("Already present: {}", summary.already_present);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_profile_only() {
        let params = resolve_params(Profile::Scan, None, ParamOverrides::default()).unwrap();
        assert_eq!(params, CodecParams::new(12, 12, 768));
    }

    #[test]
    fn test_flags_beat_file_beat_profile() {
        let td = tempdir().unwrap();
        let path = td.path().join("params.json");
        fs::write(&path, r#"{"data_shards": 6, "block_size": 1024}"#).unwrap();

        let flags = ParamOverrides {
            block_size: Some(512),
            ..Default::default()
        };
        let params = resolve_params(Profile::Archive, path.to_str(), flags).unwrap();

        assert_eq!(params, CodecParams::new(6, 3, 512));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let td = tempdir().unwrap();
        let path = td.path().join("params.json");
        fs::write(&path, r#"{"shards": 6}"#).unwrap();

        let err = resolve_params(Profile::Archive, path.to_str(), ParamOverrides::default())
            .unwrap_err();
        assert_eq!(crate::exit_code(&err), 1);
    }

    #[test]
    fn test_invalid_geometry_maps_to_status() {
        let flags = ParamOverrides {
            data_shards: Some(200),
            parity_shards: Some(100),
            ..Default::default()
        };
        let err = resolve_params(Profile::Archive, None, flags).unwrap_err();
        assert_eq!(crate::exit_code(&err), 5);
    }
}
