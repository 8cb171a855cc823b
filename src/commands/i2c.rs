//! `i2c` subcommands: single register reads and writes, and a 256-byte dump.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use linuxuapi::i2c::Device;

/// Arguments for the i2c command
#[derive(Args, Debug)]
pub struct I2cArgs {
    #[command(subcommand)]
    command: I2cCommand,
}

#[derive(Subcommand, Debug)]
enum I2cCommand {
    /// Read one register
    Read(RegArgs),
    /// Write one register
    Write(WriteArgs),
    /// Read 256 bytes starting at register 0
    Dump(BusArgs),
}

#[derive(Args, Debug)]
pub struct BusArgs {
    /// Character device, e.g. /dev/i2c-1
    #[arg(short, long, value_name = "PATH")]
    pub dev: PathBuf,

    /// Target address (hex)
    #[arg(short, long, value_name = "ADDR", value_parser = parse_hex_u16)]
    pub addr: u16,
}

#[derive(Args, Debug)]
pub struct RegArgs {
    #[command(flatten)]
    pub bus: BusArgs,

    /// Register number (hex)
    #[arg(short, long, value_name = "REG", value_parser = parse_hex_u8)]
    pub reg: u8,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    #[command(flatten)]
    pub reg: RegArgs,

    /// Byte to write (hex)
    #[arg(short, long, value_name = "BYTE", value_parser = parse_hex_u8)]
    pub value: u8,
}

/// Execute the i2c command
pub fn execute(args: I2cArgs) -> Result<()> {
    match args.command {
        I2cCommand::Read(args) => {
            let dev = open(&args.bus)?;
            println!("Reading register 0x{:02x}", args.reg);
            let value = dev
                .read_reg(args.bus.addr, args.reg)
                .context("Register read failed")?;
            println!("0x{:02x}", value);
        }
        I2cCommand::Write(args) => {
            let dev = open(&args.reg.bus)?;
            println!(
                "Write 0x{:02x} to register 0x{:02x}",
                args.value, args.reg.reg
            );
            dev.write_reg(args.reg.bus.addr, args.reg.reg, args.value)
                .context("Register write failed")?;
        }
        I2cCommand::Dump(args) => {
            let dev = open(&args)?;
            let mut buf = [0u8; 256];
            dev.txn(args.addr, &[], &mut buf)
                .context("Dump transfer failed")?;
            print!("{}", hex_dump(&buf));
        }
    }
    Ok(())
}

fn open(bus: &BusArgs) -> Result<Device> {
    println!(
        "Using device {}, address 0x{:02x}",
        bus.dev.display(),
        bus.addr
    );
    Ok(Device::open(&bus.dev)?)
}

fn parse_hex(value: &str) -> std::result::Result<u64, String> {
    let lower = value.trim().to_ascii_lowercase();
    let digits = lower.strip_prefix("0x").unwrap_or(&lower);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("bad hex value `{}`: {}", value, e))
}

/// Parse a hex number with or without `0x`.
pub fn parse_hex_u16(value: &str) -> std::result::Result<u16, String> {
    let n = parse_hex(value)?;
    u16::try_from(n).map_err(|_| format!("`{}` does not fit in 16 bits", value))
}

pub fn parse_hex_u8(value: &str) -> std::result::Result<u8, String> {
    let n = parse_hex(value)?;
    u8::try_from(n).map_err(|_| format!("`{}` does not fit in 8 bits", value))
}

/// Classic hex dump: offset, 16 bytes in two groups, printable ASCII.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (line, chunk) in data.chunks(16).enumerate() {
        let mut hex = String::new();
        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(hex, "{:02x} ", b);
                }
                None => hex.push_str("   "),
            }
            if i == 7 {
                hex.push(' ');
            }
        }
        let ascii: String = chunk
            .iter()
            .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
            .collect();
        let _ = writeln!(out, "{:08x}  {} |{}|", line * 16, hex, ascii);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex_u16("0x50").unwrap(), 0x50);
        assert_eq!(parse_hex_u16("50").unwrap(), 0x50);
        assert_eq!(parse_hex_u16("0X1A").unwrap(), 0x1a);
        assert_eq!(parse_hex_u8("").unwrap(), 0);
        assert!(parse_hex_u8("0x100").unwrap_err().contains("8 bits"));
        assert!(parse_hex_u8("zz").unwrap_err().contains("bad hex value"));
    }

    #[test]
    fn test_hex_dump() {
        let data: Vec<u8> = (0x41..0x53).collect();
        assert_eq!(
            hex_dump(&data),
            "00000000  41 42 43 44 45 46 47 48  49 4a 4b 4c 4d 4e 4f 50  |ABCDEFGHIJKLMNOP|\n\
             00000010  51 52                                             |QR|\n"
        );
    }

    #[test]
    fn test_hex_dump_non_printable() {
        let dump = hex_dump(&[0x00, 0x7f, 0x20]);
        assert!(dump.ends_with("|. .|\n"), "{dump}");
    }
}
