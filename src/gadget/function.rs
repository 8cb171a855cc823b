//! USB gadget functions.
//!
//! The set of functions is closed: [`Function`] has one variant per kernel
//! function driver this crate knows how to configure. Each variant produces
//! the steps that fill in its own directory under `functions/`, with paths
//! relative to that directory.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::filesystem::ConfigFs;
use crate::gadget::Gadget;
use crate::step::{Step, Steps};

/// One function of a composite gadget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    /// CDC ACM serial port. Needs no attributes.
    Acm(AcmFunction),
    /// CDC EEM ethernet.
    Eem(EemFunction),
    /// CDC NCM ethernet.
    Ncm(NcmFunction),
    Hid(HidFunction),
    MassStorage(MassStorageFunction),
}

impl Function {
    /// The function's directory name under `functions/`, e.g. `hid.kbd`.
    pub fn name(&self) -> String {
        match self {
            Function::Acm(f) => format!("acm.{}", f.name),
            Function::Eem(f) => format!("eem.{}", f.name),
            Function::Ncm(f) => format!("ncm.{}", f.name),
            Function::Hid(f) => format!("hid.{}", f.name),
            Function::MassStorage(f) => format!("mass_storage.{}", f.name),
        }
    }

    /// Steps that populate the function directory, relative to it.
    pub fn create_steps(&self) -> Steps {
        match self {
            Function::Acm(_) => Steps::new(),
            Function::Eem(f) => ethernet_steps(&f.dev_addr, &f.host_addr),
            Function::Ncm(f) => ethernet_steps(&f.dev_addr, &f.host_addr),
            Function::Hid(f) => f.create_steps(),
            Function::MassStorage(f) => f.create_steps(),
        }
    }
}

fn ethernet_steps(dev_addr: &str, host_addr: &str) -> Steps {
    Steps::from(vec![
        Step::write("dev_addr", dev_addr),
        Step::write("host_addr", host_addr),
    ])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcmFunction {
    pub name: String,
}

impl AcmFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// CDC EEM ethernet. Empty addresses leave the choice to the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EemFunction {
    pub name: String,
    #[serde(default)]
    pub dev_addr: String,
    #[serde(default)]
    pub host_addr: String,
}

impl EemFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dev_addr: String::new(),
            host_addr: String::new(),
        }
    }

    /// Network interface the kernel created for this function.
    pub fn ifname<F: ConfigFs + ?Sized>(&self, gadget: &Gadget, fs: &F) -> Option<String> {
        gadget.read_attr(fs, &["functions", &format!("eem.{}", self.name), "ifname"])
    }
}

/// CDC NCM ethernet. Empty addresses leave the choice to the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NcmFunction {
    pub name: String,
    #[serde(default)]
    pub dev_addr: String,
    #[serde(default)]
    pub host_addr: String,
}

impl NcmFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dev_addr: String::new(),
            host_addr: String::new(),
        }
    }

    pub fn addresses(mut self, dev_addr: impl Into<String>, host_addr: impl Into<String>) -> Self {
        self.dev_addr = dev_addr.into();
        self.host_addr = host_addr.into();
        self
    }

    /// Network interface the kernel created for this function.
    pub fn ifname<F: ConfigFs + ?Sized>(&self, gadget: &Gadget, fs: &F) -> Option<String> {
        gadget.read_attr(fs, &["functions", &format!("ncm.{}", self.name), "ifname"])
    }
}

/// HID function with a raw report descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HidFunction {
    pub name: String,
    pub protocol: u8,
    pub subclass: u8,
    pub report_length: u16,
    /// Report descriptor bytes. Descriptor files may give either a list of
    /// bytes or a base64 string.
    #[serde(deserialize_with = "deserialize_descriptor")]
    pub descriptor: Vec<u8>,
}

fn deserialize_descriptor<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Descriptor {
        Bytes(Vec<u8>),
        Base64(String),
    }

    match Descriptor::deserialize(deserializer)? {
        Descriptor::Bytes(bytes) => Ok(bytes),
        Descriptor::Base64(text) => STANDARD
            .decode(text.trim())
            .map_err(|e| serde::de::Error::custom(format!("invalid base64 descriptor: {}", e))),
    }
}

impl HidFunction {
    fn create_steps(&self) -> Steps {
        Steps::from(vec![
            Step::write("protocol", self.protocol.to_string()),
            Step::write("subclass", self.subclass.to_string()),
            Step::write("report_length", self.report_length.to_string()),
            Step::write_binary("report_desc", self.descriptor.clone()),
        ])
    }
}

/// Mass storage with one or more logical units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MassStorageFunction {
    pub name: String,
    pub luns: Vec<Lun>,
}

impl MassStorageFunction {
    /// One `lun.<name>` subtree per unit. Units without a name are numbered
    /// by position.
    fn create_steps(&self) -> Steps {
        let mut steps = Steps::new();

        for (index, lun) in self.luns.iter().enumerate() {
            let mut lun_steps = Steps::from(vec![Step::mkdir_create_only("")]);
            lun_steps.extend(lun.create_steps());
            steps.extend(lun_steps.prefix(format!("lun.{}", lun.dir_name(index))));
        }

        steps
    }
}

/// A logical unit of a mass storage function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lun {
    #[serde(default)]
    pub name: Option<String>,
    /// Backing file or block device.
    pub file: PathBuf,
    #[serde(default)]
    pub removable: bool,
    #[serde(default)]
    pub cdrom: bool,
}

impl Lun {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            file: file.into(),
            removable: false,
            cdrom: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn dir_name(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => index.to_string(),
        }
    }

    fn create_steps(&self) -> Steps {
        Steps::from(vec![
            Step::write("file", self.file.display().to_string()),
            Step::write("removable", flag(self.removable)),
            Step::write("cdrom", flag(self.cdrom)),
        ])
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

impl From<AcmFunction> for Function {
    fn from(f: AcmFunction) -> Self {
        Function::Acm(f)
    }
}

impl From<EemFunction> for Function {
    fn from(f: EemFunction) -> Self {
        Function::Eem(f)
    }
}

impl From<NcmFunction> for Function {
    fn from(f: NcmFunction) -> Self {
        Function::Ncm(f)
    }
}

impl From<HidFunction> for Function {
    fn from(f: HidFunction) -> Self {
        Function::Hid(f)
    }
}

impl From<MassStorageFunction> for Function {
    fn from(f: MassStorageFunction) -> Self {
        Function::MassStorage(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(luns: Vec<Lun>) -> Function {
        MassStorageFunction {
            name: "disk".to_string(),
            luns,
        }
        .into()
    }

    #[test]
    fn test_canonical_names() {
        assert_eq!(Function::from(AcmFunction::new("usb0")).name(), "acm.usb0");
        assert_eq!(Function::from(EemFunction::new("net")).name(), "eem.net");
        assert_eq!(Function::from(NcmFunction::new("net")).name(), "ncm.net");
        assert_eq!(disk(Vec::new()).name(), "mass_storage.disk");
        let hid = HidFunction {
            name: "kbd".to_string(),
            protocol: 1,
            subclass: 1,
            report_length: 8,
            descriptor: vec![],
        };
        assert_eq!(Function::from(hid).name(), "hid.kbd");
    }

    #[test]
    fn test_acm_has_no_attributes() {
        assert!(Function::from(AcmFunction::new("usb0")).create_steps().is_empty());
    }

    #[test]
    fn test_ncm_writes_addresses() {
        let ncm = NcmFunction::new("gadgetnet").addresses("16:76:99:89:44:cd", "26:f8:5e:d8:ce:42");
        assert_eq!(
            Function::from(ncm).create_steps(),
            Steps::from(vec![
                Step::write("dev_addr", "16:76:99:89:44:cd"),
                Step::write("host_addr", "26:f8:5e:d8:ce:42"),
            ])
        );
    }

    #[test]
    fn test_hid_attributes() {
        let hid = HidFunction {
            name: "kbd".to_string(),
            protocol: 1,
            subclass: 1,
            report_length: 8,
            descriptor: vec![0x05, 0x01],
        };
        assert_eq!(
            Function::from(hid).create_steps(),
            Steps::from(vec![
                Step::write("protocol", "1"),
                Step::write("subclass", "1"),
                Step::write("report_length", "8"),
                Step::write_binary("report_desc", vec![0x05, 0x01]),
            ])
        );
    }

    #[test]
    fn test_mass_storage_luns_are_independent_subtrees() {
        let luns = (0..3).map(|_| Lun::new("/tmp/disk0.img")).collect();
        let steps = disk(luns).create_steps();
        assert_eq!(steps.len(), 12);

        let chunks: Vec<&[Step]> = steps.as_slice().chunks(4).collect();
        for (index, chunk) in chunks.iter().enumerate() {
            let base = PathBuf::from(format!("lun.{}", index));
            assert_eq!(
                chunk.to_vec(),
                vec![
                    Step::mkdir_create_only(&base),
                    Step::write(base.join("file"), "/tmp/disk0.img"),
                    Step::write(base.join("removable"), "0"),
                    Step::write(base.join("cdrom"), "0"),
                ]
            );
        }
    }

    #[test]
    fn test_mass_storage_named_luns() {
        let mut cdrom = Lun::new("/srv/install.iso").named("cd");
        cdrom.removable = true;
        cdrom.cdrom = true;

        let steps = disk(vec![cdrom]).create_steps();
        assert_eq!(
            steps,
            Steps::from(vec![
                Step::mkdir_create_only("lun.cd"),
                Step::write("lun.cd/file", "/srv/install.iso"),
                Step::write("lun.cd/removable", "1"),
                Step::write("lun.cd/cdrom", "1"),
            ])
        );
    }
}
