//! The `eqdb` command line tool
//!
//! Compiles LaTeX fragments and manages the equation database from the
//! shell. The binary in `main.rs` only parses arguments and sets up
//! logging; everything else lives here so it can be tested.

pub mod cli;
pub mod commands;
pub mod config;
pub mod output;

pub use cli::Cli;
pub use commands::{execute, run, Session};
pub use config::Config;
