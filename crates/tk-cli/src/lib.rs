//! Time tracker CLI library.
//!
//! This crate provides the `tk` command-line interface: argument parsing,
//! configuration, device identity, and one module per subcommand.

mod cli;
pub mod commands;
mod config;
pub mod device;
pub mod tracker;

pub use cli::{Cli, Commands, QueryArgs, RangeArgs};
pub use config::Config;
