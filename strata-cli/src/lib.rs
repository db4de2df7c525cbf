//! Library entry for strata-cli used by integration tests and embedding.

pub mod commands;

pub use commands::*;

use strata_core::Profile;

/// Parameter preset selectable on the command line
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ProfileArg {
    /// k=10, m=3, 4096-byte blocks
    #[default]
    Archive,
    /// k=12, m=12, 768-byte blocks
    Scan,
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Archive => Profile::Archive,
            ProfileArg::Scan => Profile::Scan,
        }
    }
}

/// Process exit status for a failed command
///
/// Failures from the core taxonomy keep their status code; anything else
/// (bad arguments, malformed JSON) exits with 1.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<strata_core::Error>())
        .map(strata_core::Error::status_code)
        .unwrap_or(1)
}
