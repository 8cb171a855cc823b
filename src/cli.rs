//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::commands;

/// linuxuapi - Compose USB gadgets and talk to HID and I2C devices
#[derive(Parser, Debug)]
#[command(name = "linuxuapi")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, remove and inspect USB gadgets in configfs
    Gadget(commands::gadget::GadgetArgs),

    /// Type text through a HID keyboard gadget
    Hid(commands::hid::HidArgs),

    /// Read and write registers on an I2C bus
    #[cfg(unix)]
    I2c(commands::i2c::I2cArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(self.log_level);

        match self.command {
            Commands::Gadget(args) => commands::gadget::execute(args),
            Commands::Hid(args) => commands::hid::execute(args),
            #[cfg(unix)]
            Commands::I2c(args) => commands::i2c::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Log to stderr at `level`; `RUST_LOG` can still refine it per module.
fn init_logging(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
