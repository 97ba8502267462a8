//! # capseo-cli: Capseo command-line tools
//!
//! - **info**: print a stream's header and per-record statistics
//!   (frame count, cursor updates, duration, average fps, data rate).
//! - **synth**: encode a synthetic colour sweep with a moving cursor.
//! - **gen-config**: print the default TOML configuration.

pub mod config;
pub mod info;
pub mod synth;
