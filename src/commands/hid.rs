//! `hid` subcommand: type text through a HID keyboard gadget.

use std::io::{self, BufRead};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use log::debug;

use linuxuapi::hid::Keyboard;

/// Arguments for the hid command
#[derive(Args, Debug)]
pub struct HidArgs {
    #[command(subcommand)]
    command: HidCommand,
}

#[derive(Subcommand, Debug)]
enum HidCommand {
    /// Type text, or stdin line by line when no text is given
    Type(TypeArgs),
}

#[derive(Args, Debug)]
pub struct TypeArgs {
    /// HID gadget device; bare names are looked up in /dev
    #[arg(short, long, value_name = "PATH", default_value = "/dev/hidg0")]
    pub dev: String,

    /// Key press hold time in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 25)]
    pub hold_ms: u64,

    /// Text to type, followed by Enter
    pub text: Option<String>,
}

/// Execute the hid command
pub fn execute(args: HidArgs) -> Result<()> {
    match args.command {
        HidCommand::Type(args) => type_text(args),
    }
}

fn type_text(args: TypeArgs) -> Result<()> {
    let mut keyboard = Keyboard::open(&args.dev, Duration::from_millis(args.hold_ms))?;
    debug!("typing with {:?} hold", keyboard.hold());

    if let Some(text) = args.text {
        keyboard.type_text(&format!("{}\n", text), None)?;
        return Ok(());
    }

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        keyboard.type_text(&format!("{}\n", line), None)?;
    }
    Ok(())
}
