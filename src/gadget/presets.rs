//! Built-in gadget descriptors.
//!
//! Each preset is a fresh value; callers adjust the copy they get back (for
//! example to set a UDC) without affecting anyone else.

use std::path::{Path, PathBuf};

use crate::gadget::function::{HidFunction, Lun, MassStorageFunction, NcmFunction};
use crate::gadget::{Configuration, Gadget};

/// Backing file of the multifunction preset's mass storage unit.
pub const DEFAULT_MASS_STORAGE_BACKING_FILE: &str = "/tmp/disk0.img";

/// The Linux Foundation.
pub const LINUX_FOUNDATION_VENDOR_ID: u16 = 0x1d6b;

/// Multifunction Composite Gadget.
pub const MULTIFUNCTION_COMPOSITE_PRODUCT_ID: u16 = 0x0104;

/// Report descriptor of a boot protocol keyboard: one modifier byte, one
/// reserved byte, five LED bits plus padding, and six keycodes.
pub const BOOT_KEYBOARD_REPORT_DESCRIPTOR: [u8; 63] = [
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xa1, 0x01, // Collection (Application)
    0x05, 0x07, //   Usage Page (Key Codes)
    0x19, 0xe0, //   Usage Minimum (224)
    0x29, 0xe7, //   Usage Maximum (231)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data, Variable, Absolute) modifiers
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x03, //   Input (Constant) reserved
    0x95, 0x05, //   Report Count (5)
    0x75, 0x01, //   Report Size (1)
    0x05, 0x08, //   Usage Page (LEDs)
    0x19, 0x01, //   Usage Minimum (1)
    0x29, 0x05, //   Usage Maximum (5)
    0x91, 0x02, //   Output (Data, Variable, Absolute) LEDs
    0x95, 0x01, //   Report Count (1)
    0x75, 0x03, //   Report Size (3)
    0x91, 0x03, //   Output (Constant) padding
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x65, //   Logical Maximum (101)
    0x05, 0x07, //   Usage Page (Key Codes)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0x65, //   Usage Maximum (101)
    0x81, 0x00, //   Input (Data, Array) keycodes
    0xc0, // End Collection
];

/// The boot keyboard function used by both presets.
pub fn keyboard_function() -> HidFunction {
    HidFunction {
        name: "kbd".to_string(),
        protocol: 1,
        subclass: 1,
        report_length: 8,
        descriptor: BOOT_KEYBOARD_REPORT_DESCRIPTOR.to_vec(),
    }
}

fn base_gadget() -> Gadget {
    Gadget::new("g1")
        .ids(LINUX_FOUNDATION_VENDOR_ID, MULTIFUNCTION_COMPOSITE_PRODUCT_ID)
        .strings("0123456789", "Example Manufacturer", "Example Product")
}

/// NCM ethernet, a boot keyboard, and one mass storage unit backed by
/// `storage_file`, all in configuration `c.1`.
pub fn multifunction(storage_file: impl Into<PathBuf>) -> Gadget {
    let net = NcmFunction::new("gadgetnet").addresses("16:76:99:89:44:cd", "26:f8:5e:d8:ce:42");
    let disk = MassStorageFunction {
        name: "disk".to_string(),
        luns: vec![Lun::new(storage_file).named("0")],
    };

    base_gadget().config(
        Configuration::new("c.1", "Example Config")
            .function(net)
            .function(keyboard_function())
            .function(disk),
    )
}

/// A gadget exposing only a boot keyboard.
pub fn keyboard() -> Gadget {
    base_gadget().config(Configuration::new("c.1", "Keyboard").function(keyboard_function()))
}

/// Look a preset up by name.
pub fn by_name(name: &str, storage_file: Option<&Path>) -> Option<Gadget> {
    match name {
        "multifunction" => Some(multifunction(
            storage_file.unwrap_or(Path::new(DEFAULT_MASS_STORAGE_BACKING_FILE)),
        )),
        "keyboard" => Some(keyboard()),
        _ => None,
    }
}

/// Names accepted by [`by_name`].
pub const PRESET_NAMES: &[&str] = &["multifunction", "keyboard"];
