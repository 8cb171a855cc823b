//! # USB Gadget Descriptors
//!
//! A [`Gadget`] describes a composite USB device: its identity, its
//! configurations, and the functions each configuration exposes. Nothing
//! touches the system until the gadget is compiled into [`Steps`] and those
//! steps are run against a [`ConfigFs`].
//!
//! ## Layout
//!
//! For a gadget rooted at `R`, configuration `C`, and function `F`:
//!
//! ```text
//! R/idVendor, R/idProduct
//! R/strings/0x409/{serialnumber,manufacturer,product}
//! R/configs/C/strings/0x409/configuration
//! R/functions/F/...
//! R/configs/C/F -> R/functions/F
//! R/UDC
//! ```
//!
//! Functions live in the shared `functions/` directory and are linked into
//! each configuration that uses them, so a function name is unique across
//! the whole gadget.
//!
//! ## Example
//!
//! ```
//! use linuxuapi::gadget::{Configuration, Gadget};
//! use linuxuapi::gadget::function::AcmFunction;
//!
//! let gadget = Gadget::new("g1")
//!     .path("g1")
//!     .ids(0x1d6b, 0x0104)
//!     .config(Configuration::new("c.1", "Serial").function(AcmFunction::new("usb0")));
//!
//! let script = gadget.shell_create().to_string();
//! assert!(script.contains("ln -s g1/functions/acm.usb0 g1/configs/c.1/acm.usb0"));
//! ```

mod compile;
pub mod function;
pub mod presets;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::{Error, Result};
use crate::filesystem::ConfigFs;
use crate::shell::ShellSteps;
use crate::step::{join_prefix, Step, Steps};

pub use function::Function;

/// Where the kernel mounts the gadget configfs tree.
pub const GADGET_CONFIG_BASE_PATH: &str = "/sys/kernel/config/usb_gadget";

/// Where the kernel lists USB device controllers.
pub const UDC_CLASS_DIR: &str = "/sys/class/udc";

/// Language id of the string descriptors (US English).
pub const STR_ENGLISH: &str = "0x409";

/// A composite USB gadget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gadget {
    pub name: String,
    /// Explicit root directory. Defaults to `GADGET_CONFIG_BASE_PATH/<name>`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    pub id_vendor: u16,
    pub id_product: u16,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub product: String,
    /// Controller to bind to once everything else exists.
    #[serde(default)]
    pub udc: Option<String>,
    #[serde(default)]
    pub configs: Vec<Configuration>,
}

impl Gadget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            id_vendor: 0,
            id_product: 0,
            serial_number: String::new(),
            manufacturer: String::new(),
            product: String::new(),
            udc: None,
            configs: Vec::new(),
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn ids(mut self, id_vendor: u16, id_product: u16) -> Self {
        self.id_vendor = id_vendor;
        self.id_product = id_product;
        self
    }

    pub fn strings(
        mut self,
        serial_number: impl Into<String>,
        manufacturer: impl Into<String>,
        product: impl Into<String>,
    ) -> Self {
        self.serial_number = serial_number.into();
        self.manufacturer = manufacturer.into();
        self.product = product.into();
        self
    }

    pub fn udc(mut self, udc: impl Into<String>) -> Self {
        self.udc = Some(udc.into());
        self
    }

    pub fn config(mut self, config: Configuration) -> Self {
        self.configs.push(config);
        self
    }

    /// The gadget's root directory.
    pub fn root_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None => join_prefix(Path::new(GADGET_CONFIG_BASE_PATH), Path::new(&self.name)),
        }
    }

    /// Steps that tear the gadget down.
    ///
    /// The UDC write has no inverse, so the gadget is not unbound before its
    /// directories are removed.
    pub fn remove_steps(&self) -> Steps {
        self.create_steps().teardown()
    }

    pub fn shell_create(&self) -> ShellSteps {
        self.create_steps().shell_args()
    }

    pub fn shell_remove(&self) -> ShellSteps {
        self.remove_steps().shell_args()
    }

    pub fn exists<F: ConfigFs + ?Sized>(&self, fs: &F) -> bool {
        fs.exists(&self.root_path())
    }

    /// Check the gadget with [`config::validate`], then run its creation
    /// steps against `fs`.
    pub fn create<F: ConfigFs + ?Sized>(&self, fs: &mut F) -> Result<()> {
        config::validate(self)?;
        self.create_steps().run(fs)
    }

    pub fn remove<F: ConfigFs + ?Sized>(&self, fs: &mut F) -> Result<()> {
        config::validate(self)?;
        self.remove_steps().run(fs)
    }

    /// Read an attribute below the root, without trailing newlines.
    ///
    /// Returns `None` when the attribute cannot be read.
    pub fn read_attr<F: ConfigFs + ?Sized>(&self, fs: &F, elems: &[&str]) -> Option<String> {
        let path = elems
            .iter()
            .fold(self.root_path(), |path, elem| path.join(elem));
        let content = fs.read_file(&path).ok()?;
        Some(
            String::from_utf8_lossy(&content)
                .trim_end_matches('\n')
                .to_string(),
        )
    }

    /// The controller the gadget is currently bound to, if any.
    pub fn bound_udc<F: ConfigFs + ?Sized>(&self, fs: &F) -> Option<String> {
        self.read_attr(fs, &["UDC"]).filter(|udc| !udc.is_empty())
    }

    /// All functions of the gadget, each once, in first-use order.
    pub fn functions(&self) -> Vec<&Function> {
        let mut seen: Vec<&Function> = Vec::new();
        for function in self.configs.iter().flat_map(|c| c.functions.iter()) {
            if !seen.iter().any(|f| f.name() == function.name()) {
                seen.push(function);
            }
        }
        seen
    }
}

/// A configuration of a gadget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Directory name under `configs/`, e.g. `c.1`.
    pub name: String,
    /// Human readable description.
    #[serde(default)]
    pub configuration: String,
    #[serde(default)]
    pub functions: Vec<Function>,
}

impl Configuration {
    pub fn new(name: impl Into<String>, configuration: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            configuration: configuration.into(),
            functions: Vec::new(),
        }
    }

    pub fn function(mut self, function: impl Into<Function>) -> Self {
        self.functions.push(function.into());
        self
    }

    /// Steps that create the configuration directory, relative to it.
    fn create_steps(&self) -> Steps {
        let strings = Path::new("strings").join(STR_ENGLISH);
        Steps::from(vec![
            Step::comment(format!("config `{}`", self.name)),
            Step::mkdir(""),
            Step::mkdir(&strings),
            Step::write(strings.join("configuration"), &self.configuration),
        ])
    }
}

/// Names of the available USB device controllers in `class_dir`.
pub fn find_udc<F: ConfigFs + ?Sized>(fs: &F, class_dir: &Path) -> Result<Vec<String>> {
    let pattern = format!(
        "{}/*",
        glob::Pattern::escape(&class_dir.to_string_lossy())
    );
    fs.list_matching_names(&pattern)
}

/// The first available controller in `class_dir`.
pub fn first_udc<F: ConfigFs + ?Sized>(fs: &F, class_dir: &Path) -> Result<String> {
    find_udc(fs, class_dir)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::NoUdc {
            pattern: format!("{}/*", class_dir.display()),
        })
}
