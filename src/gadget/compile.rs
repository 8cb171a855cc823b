//! Compiling a [`Gadget`] into the steps that create it.

use std::collections::HashSet;
use std::path::Path;

use crate::gadget::{Gadget, STR_ENGLISH};
use crate::step::{join_prefix, Step, Steps};

impl Gadget {
    /// Steps that create the gadget from nothing, in execution order.
    ///
    /// Every directory is created before anything is written into it, every
    /// function exists before it is linked into a configuration, and the UDC
    /// is written last, after the gadget is complete.
    ///
    /// A function name seen again is linked without being recreated, so two
    /// different definitions under one name compile to the first one.
    /// [`Gadget::create`] refuses such gadgets through
    /// [`crate::config::validate`].
    pub fn create_steps(&self) -> Steps {
        let strings = Path::new("strings").join(STR_ENGLISH);

        let mut steps = Steps::from(vec![
            Step::mkdir(""),
            Step::write("idVendor", format!("0x{:04x}", self.id_vendor)),
            Step::write("idProduct", format!("0x{:04x}", self.id_product)),
            Step::mkdir(&strings),
            Step::write(strings.join("serialnumber"), &self.serial_number),
            Step::write(strings.join("manufacturer"), &self.manufacturer),
            Step::write(strings.join("product"), &self.product),
        ]);

        let mut materialized = HashSet::new();
        for config in &self.configs {
            let config_path = join_prefix(Path::new("configs"), Path::new(&config.name));
            steps.extend(config.create_steps().prefix(&config_path));

            for function in &config.functions {
                let name = function.name();
                let function_path = Path::new("functions").join(&name);

                steps.push(Step::comment(format!(
                    "config `{}`, function `{}`",
                    config.name, name
                )));
                // A function shared by several configurations is only created
                // once; later configurations just link it.
                if materialized.insert(name.clone()) {
                    steps.push(Step::mkdir(&function_path));
                    steps.extend(function.create_steps().prefix(&function_path));
                }
                steps.push(Step::symlink(&function_path, config_path.join(&name)));
            }
        }

        if let Some(udc) = self.udc.as_deref().filter(|udc| !udc.is_empty()) {
            steps.push(Step::write("UDC", udc));
        }

        steps.prefix(self.root_path())
    }
}
