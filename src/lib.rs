//! # linuxuapi
//!
//! Building blocks for Linux userspace device APIs, centred on composing USB
//! gadgets through configfs.
//!
//! ## Quick Example
//!
//! ```
//! use linuxuapi::filesystem::MemoryFs;
//! use linuxuapi::gadget::function::NcmFunction;
//! use linuxuapi::gadget::{Configuration, Gadget};
//!
//! let gadget = Gadget::new("g1")
//!     .path("g1")
//!     .ids(0x1d6b, 0x0104)
//!     .config(Configuration::new("c.1", "Network").function(NcmFunction::new("usb0")))
//!     .udc("fe980000.usb");
//!
//! // Apply to an in-memory configfs, then tear it down again.
//! let mut fs = MemoryFs::new();
//! gadget.create(&mut fs).unwrap();
//! assert_eq!(fs.read_string("g1/UDC").unwrap(), "fe980000.usb");
//!
//! gadget.remove(&mut fs).unwrap();
//! assert!(fs.is_empty());
//! ```
//!
//! ## Core Concepts
//!
//! - **Steps (`step`)**: atomic filesystem operations with an inverse and a
//!   path prefix transform. Creation sequences are compiled once; teardown is
//!   derived from them by undoing every step and reversing the order.
//! - **Gadget model (`gadget`)**: gadgets, configurations and functions, and
//!   the compiler that turns them into steps.
//! - **Filesystems (`filesystem`)**: where steps run. `HostFs` is the real
//!   system, `MemoryFs` an in-memory model of configfs.
//! - **Shell rendering (`shell`)**: the same steps as a reviewable script.
//! - **Descriptor files (`config`)**: gadgets written in YAML.
//!
//! The `hid` and `i2c` modules are thin wrappers over the matching character
//! devices.

pub mod config;
pub mod error;
pub mod filesystem;
pub mod gadget;
pub mod hid;
#[cfg(unix)]
pub mod i2c;
pub mod shell;
pub mod step;

#[cfg(test)]
mod step_proptest;
