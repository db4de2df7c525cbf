use anyhow::Result;
use clap::{Parser, Subcommand};
use strata_cli::commands::{self, encode::ParamOverrides};
use strata_cli::{exit_code, ProfileArg};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata - Erasure-coded archival frames", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a file tree and write its frames into a directory
    Encode {
        /// File or directory to archive
        #[arg(short, long)]
        input: String,

        /// Directory receiving one file per frame
        #[arg(short, long)]
        output: String,

        /// Parameter preset
        #[arg(long, value_enum, default_value_t = ProfileArg::Archive)]
        profile: ProfileArg,

        /// JSON file with data_shards, parity_shards, block_size
        #[arg(long)]
        params: Option<String>,

        /// Data blocks per stripe
        #[arg(long)]
        data_shards: Option<usize>,

        /// Parity blocks per stripe
        #[arg(long)]
        parity_shards: Option<usize>,

        /// Bytes per block
        #[arg(long)]
        block_size: Option<usize>,
    },

    /// Rebuild the archive from surviving frames
    Decode {
        /// Directory of frame files
        #[arg(short, long)]
        input: String,

        /// Output tar file
        #[arg(short, long)]
        output: String,

        /// Archive to rebuild when frames of several are present
        #[arg(long)]
        archive_id: Option<String>,
    },

    /// Report stripe health of a frame directory
    Inspect {
        /// Directory of frame files
        #[arg(short, long)]
        input: String,

        /// Also write the report as JSON
        #[arg(long)]
        json: Option<String>,
    },

    /// Write the canonical tar of a file tree, without frames
    Pack {
        /// File or directory to archive
        #[arg(short, long)]
        input: String,

        /// Output tar file
        #[arg(short, long)]
        output: String,
    },
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Encode {
            input,
            output,
            profile,
            params,
            data_shards,
            parity_shards,
            block_size,
        } => {
            let flags = ParamOverrides {
                data_shards,
                parity_shards,
                block_size,
            };
            let params =
                commands::encode::resolve_params(profile.into(), params.as_deref(), flags)?;
            commands::encode::execute(&input, &output, params)
        }

        Commands::Decode {
            input,
            output,
            archive_id,
        } => commands::decode::execute(&input, &output, archive_id.as_deref()),

        Commands::Inspect { input, json } => commands::inspect::execute(&input, json.as_deref()),

        Commands::Pack { input, output } => commands::pack::execute(&input, &output),
    }
}

fn main() {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if let Err(err) = run(cli.command) {
        error!("{:#}", err);
        std::process::exit(exit_code(&err));
    }
}
