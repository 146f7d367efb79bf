//! Logging setup.
//!
//! The crate logs through the `log` facade; this module installs the
//! `env_logger` backend for binaries that want one.

mod init;

pub use init::{init_logging, LoggingConfig};
