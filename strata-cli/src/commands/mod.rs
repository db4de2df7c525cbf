//! Subcommand implementations

pub mod decode;
pub mod encode;
pub mod inspect;
pub mod pack;
