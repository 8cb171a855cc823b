//! # Descriptor Files
//!
//! Gadgets can be described in YAML instead of code. A descriptor file maps
//! directly onto [`Gadget`]: identity fields at the top, then a list of
//! configurations, each with a list of functions. Functions are written as
//! single-key mappings naming their kind:
//!
//! ```yaml
//! name: g1
//! id_vendor: 0x1d6b
//! id_product: 0x0104
//! serial_number: "0123456789"
//! manufacturer: Example Manufacturer
//! product: Example Product
//! configs:
//!   - name: c.1
//!     configuration: Example Config
//!     functions:
//!       - ncm:
//!           name: gadgetnet
//!           dev_addr: "16:76:99:89:44:cd"
//!           host_addr: "26:f8:5e:d8:ce:42"
//!       - mass_storage:
//!           name: disk
//!           luns:
//!             - file: /tmp/disk0.img
//! ```
//!
//! Parsing also checks what serde cannot: names must be usable as single
//! directory names, configuration names must be unique, and a function name
//! that appears in several configurations must describe the same function
//! every time.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};
use crate::gadget::{Function, Gadget};

/// Parse a descriptor from YAML text and check it.
pub fn parse(yaml_content: &str) -> Result<Gadget> {
    let gadget: Gadget = serde_yaml::from_str(yaml_content)?;
    validate(&gadget)?;
    Ok(gadget)
}

/// Parse a descriptor from a YAML file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Gadget> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

/// Structural checks on a gadget, whether parsed or built in code.
pub fn validate(gadget: &Gadget) -> Result<()> {
    check_name("gadget", &gadget.name)?;

    let mut config_names = HashSet::new();
    let mut functions: HashMap<String, &Function> = HashMap::new();

    for config in &gadget.configs {
        check_name("configuration", &config.name)?;
        if !config_names.insert(config.name.as_str()) {
            return Err(Error::ConfigParse {
                message: format!("duplicate configuration `{}`", config.name),
                hint: Some("configuration names are directories under configs/, e.g. c.1, c.2".to_string()),
            });
        }

        for function in &config.functions {
            let name = function.name();
            check_function(function)?;

            match functions.get(&name) {
                Some(previous) if *previous != function => {
                    return Err(Error::ConfigParse {
                        message: format!(
                            "function `{}` in configuration `{}` differs from its earlier definition",
                            name, config.name
                        ),
                        hint: Some(
                            "functions share one namespace; rename one of them or repeat the identical definition"
                                .to_string(),
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    functions.insert(name, function);
                }
            }
        }
    }

    Ok(())
}

fn check_function(function: &Function) -> Result<()> {
    match function {
        Function::Acm(f) => check_name("function", &f.name),
        Function::Eem(f) => check_name("function", &f.name),
        Function::Ncm(f) => check_name("function", &f.name),
        Function::Hid(f) => check_name("function", &f.name),
        Function::MassStorage(f) => {
            check_name("function", &f.name)?;

            let mut seen = HashSet::new();
            for (index, lun) in f.luns.iter().enumerate() {
                let dir = match &lun.name {
                    Some(name) => {
                        check_name("lun", name)?;
                        name.clone()
                    }
                    None => index.to_string(),
                };
                if !seen.insert(dir.clone()) {
                    return Err(Error::ConfigParse {
                        message: format!("duplicate lun `lun.{}` in `{}`", dir, function.name()),
                        hint: Some("unnamed luns are numbered by position".to_string()),
                    });
                }
            }
            Ok(())
        }
    }
}

fn check_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::ConfigParse {
            message: format!("{} name is empty", what),
            hint: None,
        });
    }
    if name.contains('/') || name == "." || name == ".." {
        return Err(Error::ConfigParse {
            message: format!("{} name `{}` is not a single path component", what, name),
            hint: Some("names become directory names in configfs".to_string()),
        });
    }
    Ok(())
}
