//! Subcommand implementations.

pub mod clear;
pub mod index;
pub mod query;
pub mod status;
pub mod tree;
pub mod watch;
