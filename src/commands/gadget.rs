//! `gadget` subcommands
//!
//! - `create`: build the gadget in configfs (or print the script with `--shell`)
//! - `remove`: tear it down again (or print the teardown script)
//! - `status`: report whether it exists, its UDC, and network interfaces
//! - `udc`: list the USB device controllers available for binding
//!
//! The gadget comes from a descriptor file (`--config`) or one of the
//! built-in presets (`--preset`, default `multifunction`).

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::builder::PossibleValuesParser;
use clap::{Args, Subcommand};
use log::{debug, info};

use linuxuapi::config;
use linuxuapi::filesystem::HostFs;
use linuxuapi::gadget::function::Function;
use linuxuapi::gadget::{self, presets, Gadget, UDC_CLASS_DIR};

/// Size of a mass storage backing file created on demand.
pub const BACKING_FILE_SIZE: u64 = 64 << 10;

/// Arguments for the gadget command
#[derive(Args, Debug)]
pub struct GadgetArgs {
    #[command(subcommand)]
    command: GadgetCommand,
}

#[derive(Subcommand, Debug)]
enum GadgetCommand {
    /// Create the gadget and bind it to a UDC
    Create(CreateArgs),
    /// Remove the gadget
    Remove(RemoveArgs),
    /// Show whether the gadget exists and what it is bound to
    Status(StatusArgs),
    /// List available USB device controllers
    Udc(UdcArgs),
}

/// Which gadget to work on and where
#[derive(Args, Debug)]
pub struct DescriptorArgs {
    /// Gadget descriptor file (YAML)
    #[arg(short, long, value_name = "PATH", env = "GADGET_CONFIG", conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Built-in gadget to use when no descriptor file is given
    #[arg(long, value_name = "NAME", value_parser = PossibleValuesParser::new(presets::PRESET_NAMES))]
    pub preset: Option<String>,

    /// Directory holding gadgets, instead of the kernel's configfs mount
    #[arg(long, value_name = "DIR", env = "GADGET_CONFIGFS")]
    pub configfs: Option<PathBuf>,

    /// Backing file for the multifunction preset's mass storage
    #[arg(long, value_name = "PATH")]
    pub storage_file: Option<PathBuf>,
}

impl DescriptorArgs {
    /// Load and check the selected gadget.
    pub fn load(&self) -> Result<Gadget> {
        let mut gadget = match &self.config {
            Some(path) => config::from_file(path)
                .with_context(|| format!("Failed to load descriptor {}", path.display()))?,
            None => {
                let name = self.preset.as_deref().unwrap_or("multifunction");
                presets::by_name(name, self.storage_file.as_deref())
                    .ok_or_else(|| anyhow!("Unknown preset `{}`", name))?
            }
        };
        config::validate(&gadget)?;

        if let Some(base) = &self.configfs {
            if gadget.path.is_none() {
                gadget.path = Some(base.join(&gadget.name));
            }
        }
        debug!("gadget `{}` rooted at {}", gadget.name, gadget.root_path().display());
        Ok(gadget)
    }
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub descriptor: DescriptorArgs,

    /// UDC to bind to (default: the descriptor's, else the first available)
    #[arg(long, value_name = "NAME", env = "GADGET_UDC")]
    pub udc: Option<String>,

    /// Create the gadget without binding it
    #[arg(long)]
    pub no_bind: bool,

    /// Where to look for UDCs
    #[arg(long, value_name = "DIR", default_value = UDC_CLASS_DIR)]
    pub udc_class: PathBuf,

    /// Print the shell commands instead of running them
    #[arg(long)]
    pub shell: bool,

    /// With --shell, print a complete script with interpreter line
    #[arg(long, requires = "shell")]
    pub script: bool,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub descriptor: DescriptorArgs,

    /// Print the shell commands instead of running them
    #[arg(long)]
    pub shell: bool,

    /// With --shell, print a complete script with interpreter line
    #[arg(long, requires = "shell")]
    pub script: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub descriptor: DescriptorArgs,
}

#[derive(Args, Debug)]
pub struct UdcArgs {
    /// Where to look for UDCs
    #[arg(long, value_name = "DIR", default_value = UDC_CLASS_DIR)]
    pub udc_class: PathBuf,
}

/// Execute the gadget command
pub fn execute(args: GadgetArgs) -> Result<()> {
    match args.command {
        GadgetCommand::Create(args) => create(args),
        GadgetCommand::Remove(args) => remove(args),
        GadgetCommand::Status(args) => status(args),
        GadgetCommand::Udc(args) => udc(args),
    }
}

fn create(args: CreateArgs) -> Result<()> {
    let mut gadget = args.descriptor.load()?;

    if args.no_bind {
        gadget.udc = None;
    } else if let Some(udc) = args.udc {
        gadget.udc = Some(udc);
    } else if gadget.udc.as_deref().unwrap_or("").is_empty() {
        let udc = gadget::first_udc(&HostFs, &args.udc_class)?;
        info!("using UDC {}", udc);
        gadget.udc = Some(udc);
    }

    if args.shell {
        let shell = gadget.shell_create();
        if args.script {
            print!("{}", shell.to_script());
        } else {
            print!("{}", shell);
        }
        return Ok(());
    }

    let mut fs = HostFs;
    if gadget.exists(&fs) {
        bail!(
            "Cannot create gadget `{}`: {} already exists",
            gadget.name,
            gadget.root_path().display()
        );
    }

    ensure_backing_files(&gadget)?;
    gadget
        .create(&mut fs)
        .with_context(|| format!("Failed to create gadget `{}`", gadget.name))?;

    info!("created gadget `{}`", gadget.name);
    println!(
        "✅ Created gadget `{}` at {}",
        gadget.name,
        gadget.root_path().display()
    );
    Ok(())
}

fn remove(args: RemoveArgs) -> Result<()> {
    let gadget = args.descriptor.load()?;

    if args.shell {
        let shell = gadget.shell_remove();
        if args.script {
            print!("{}", shell.to_script());
        } else {
            print!("{}", shell);
        }
        return Ok(());
    }

    let mut fs = HostFs;
    if !gadget.exists(&fs) {
        bail!(
            "Cannot remove gadget `{}`: {} does not exist",
            gadget.name,
            gadget.root_path().display()
        );
    }

    gadget
        .remove(&mut fs)
        .with_context(|| format!("Failed to remove gadget `{}`", gadget.name))?;

    info!("removed gadget `{}`", gadget.name);
    println!("✅ Removed gadget `{}`", gadget.name);
    Ok(())
}

fn status(args: StatusArgs) -> Result<()> {
    let gadget = args.descriptor.load()?;
    let fs = HostFs;
    let root = gadget.root_path();

    if !gadget.exists(&fs) {
        println!("Gadget `{}`: absent ({})", gadget.name, root.display());
        return Ok(());
    }

    println!("Gadget `{}`: present ({})", gadget.name, root.display());
    match gadget.bound_udc(&fs) {
        Some(udc) => println!("  UDC: {}", udc),
        None => println!("  UDC: unbound"),
    }

    for function in gadget.functions() {
        let ifname = match function {
            Function::Eem(f) => f.ifname(&gadget, &fs),
            Function::Ncm(f) => f.ifname(&gadget, &fs),
            _ => None,
        };
        match ifname {
            Some(ifname) => println!("  {}: interface {}", function.name(), ifname),
            None => println!("  {}", function.name()),
        }
    }
    Ok(())
}

fn udc(args: UdcArgs) -> Result<()> {
    let udcs = gadget::find_udc(&HostFs, &args.udc_class)?;
    if udcs.is_empty() {
        bail!("No UDC found in {}", args.udc_class.display());
    }

    for udc in udcs {
        println!("{}", udc);
    }
    Ok(())
}

/// Create missing mass storage backing files as empty 64 KiB files.
pub fn ensure_backing_files(gadget: &Gadget) -> Result<()> {
    for function in gadget.functions() {
        if let Function::MassStorage(storage) = function {
            for lun in &storage.luns {
                ensure_backing_file(&lun.file)?;
            }
        }
    }
    Ok(())
}

fn ensure_backing_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    info!(
        "backing file {} does not exist, creating {} KiB file",
        path.display(),
        BACKING_FILE_SIZE >> 10
    );
    let file = File::create(path)
        .with_context(|| format!("Failed to create backing file {}", path.display()))?;
    file.set_len(BACKING_FILE_SIZE)
        .with_context(|| format!("Failed to size backing file {}", path.display()))?;
    Ok(())
}
