//! Subcommand implementations.

pub mod catalog;
pub mod init;
pub mod run;
pub mod status;
