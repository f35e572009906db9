//! CLI subcommands

pub mod check;
pub mod edges;
