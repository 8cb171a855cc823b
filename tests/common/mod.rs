//! Shared test utilities for integration and E2E tests.
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = TestFixture::new().with_descriptor(descriptors::SERIAL);
//! fixture.command().args(["gadget", "create", "--no-bind"]).assert().success();
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::descriptors;
    pub use super::TestFixture;
}

/// Descriptor files used across tests.
#[allow(dead_code)]
pub mod descriptors {
    /// One configuration with a single serial function.
    pub const SERIAL: &str = r#"
name: g1
id_vendor: 0x1d6b
id_product: 0x0104
serial_number: "0123"
manufacturer: Maker
product: Thing
configs:
  - name: c.1
    configuration: Serial
    functions:
      - acm:
          name: usb0
"#;

    /// The keyboard gadget from the HID walkthrough.
    pub const KEYBOARD: &str = r#"
name: g1
id_vendor: 0x1d6b
id_product: 0x0104
serial_number: "0123456789"
manufacturer: Example Manufacturer
product: Example Product
configs:
  - name: c.1
    configuration: Example Config
    functions:
      - hid:
          name: kbd
          protocol: 1
          subclass: 1
          report_length: 8
          descriptor: [5, 1]
"#;

    /// Two configurations naming the same function differently.
    pub const CONFLICTING: &str = r#"
name: g1
id_vendor: 1
id_product: 2
configs:
  - name: c.1
    functions:
      - ncm: { name: net }
  - name: c.2
    functions:
      - ncm: { name: net, dev_addr: "02:00:00:00:00:01" }
"#;

    pub const INVALID_YAML: &str = "name: [g1";
}

/// A temporary directory holding a descriptor file and a fake configfs tree.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `gadget.yaml` with the given content.
    pub fn with_descriptor(self, content: &str) -> Self {
        self.temp_dir
            .child("gadget.yaml")
            .write_str(content)
            .expect("Failed to write descriptor");
        self
    }

    /// Add a directory under the fake UDC class directory.
    #[allow(dead_code)]
    pub fn with_udc(self, name: &str) -> Self {
        self.temp_dir
            .child("udc")
            .child(name)
            .create_dir_all()
            .expect("Failed to create UDC directory");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.path().join("gadget.yaml")
    }

    /// Stand-in for `/sys/kernel/config/usb_gadget`.
    pub fn configfs(&self) -> PathBuf {
        self.path().join("configfs")
    }

    /// Stand-in for `/sys/class/udc`.
    #[allow(dead_code)]
    pub fn udc_class(&self) -> PathBuf {
        self.path().join("udc")
    }

    /// A command running in the fixture directory with the descriptor and
    /// configfs variables pointing into it.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("linuxuapi");
        cmd.current_dir(self.path())
            .env("GADGET_CONFIG", self.descriptor_path())
            .env("GADGET_CONFIGFS", self.configfs())
            .env_remove("GADGET_UDC");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_descriptor() {
        let fixture = TestFixture::new().with_descriptor(descriptors::SERIAL);
        assert!(fixture.descriptor_path().exists());
    }

    #[test]
    fn test_descriptors_parse() {
        for descriptor in [descriptors::SERIAL, descriptors::KEYBOARD] {
            linuxuapi::config::parse(descriptor).unwrap();
        }
        assert!(linuxuapi::config::parse(descriptors::CONFLICTING).is_err());
    }
}
