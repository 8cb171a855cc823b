//! # CLI Command Implementations
//!
//! Each subcommand of the `linuxuapi` tool lives in its own file with:
//! - an `Args` struct derived with `clap`,
//! - an `execute` function taking the parsed `Args`.
//!
//! The commands resolve their inputs (descriptor files, presets, device
//! paths) and call into the `linuxuapi` library for the actual work.

pub mod completions;
pub mod gadget;
pub mod hid;
#[cfg(unix)]
pub mod i2c;
