//! CLI subcommands.

pub mod bench;
pub mod common;
pub mod simulate;
