//! CLI subcommand implementations.

pub mod devices;
pub mod edit;
pub mod init;
pub mod log;
pub mod start;
pub mod status;
pub mod summary;
pub mod tags;
pub mod util;
pub mod week;
