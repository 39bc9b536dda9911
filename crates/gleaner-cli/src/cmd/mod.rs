//! Command handlers for the `gln` binary.
//!
//! Each submodule owns one subcommand: its clap `Args` struct (when it
//! takes any), the handler, and the JSON output shape.

pub mod commit;
pub mod extract;
pub mod init;
