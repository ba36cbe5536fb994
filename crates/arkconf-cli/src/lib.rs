//! arkconf CLI library
//!
//! Exposes the CLI entry point so the binary stays a one-liner.

mod cli;
mod render;

pub use cli::run;
