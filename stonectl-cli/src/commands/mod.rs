//! Subcommand implementations.

pub mod check;
pub mod install;
pub mod launch;
