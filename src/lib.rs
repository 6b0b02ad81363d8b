//! Shipwright library exports.
//!
//! The binary is a thin clap front end over [`dispatch::Dispatcher`]; the
//! modules are public so integration tests can drive operations with a
//! recording runner instead of real tools.

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod mount;
pub mod preconditions;
pub mod process;
pub mod prompt;
pub mod timing;
pub mod workspace;
