//! Subcommand implementations

pub mod config;
pub mod fetch;
pub mod plan;
pub mod post;
pub mod queue;
pub mod run;
