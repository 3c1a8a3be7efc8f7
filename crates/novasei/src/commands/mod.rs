//! CLI subcommands.

pub mod build;
pub mod dev;
pub mod relay;
pub mod serve;
