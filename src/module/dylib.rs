// Modules compiled as shared libraries, opened through libloading.
use std::path::Path;

use libloading::Library;

use super::{Module, ModuleOpener, Registrar};
use crate::error::Result;

/// Symbol every module library exports; see [`export_module!`](crate::export_module).
pub const MODULE_INIT_SYMBOL: &[u8] = b"spicy_bridge_module_init\0";

/// Signature of the exported entry point. Modules must be built with the
/// same compiler as the plugin, since this crosses the Rust ABI.
pub type ModuleInitFn = fn(&mut dyn Registrar) -> Result<()>;

pub struct DylibModule {
    init: ModuleInitFn,
    // Keeps the code behind `init` mapped.
    _library: Library,
}

impl Module for DylibModule {
    fn register(&self, registrar: &mut dyn Registrar) -> Result<()> {
        (self.init)(registrar)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DylibOpener;

impl ModuleOpener for DylibOpener {
    fn open(&self, path: &Path) -> std::result::Result<Box<dyn Module>, String> {
        let library = unsafe { Library::new(path) }.map_err(|e| e.to_string())?;

        let init: ModuleInitFn = unsafe {
            *library
                .get::<ModuleInitFn>(MODULE_INIT_SYMBOL)
                .map_err(|e| format!("missing module entry point: {}", e))?
        };

        Ok(Box::new(DylibModule {
            init,
            _library: library,
        }))
    }
}

/// Exports `$init` as a module's registration entry point.
///
/// ```ignore
/// fn register(registrar: &mut dyn spicy_bridge::module::Registrar) -> spicy_bridge::Result<()> {
///     registrar.register_parser(spicy_bridge::runtime::Parser::new("foo::Message"))
/// }
///
/// spicy_bridge::export_module!(register);
/// ```
#[macro_export]
macro_rules! export_module {
    ($init:path) => {
        #[no_mangle]
        pub fn spicy_bridge_module_init(
            registrar: &mut dyn $crate::module::Registrar,
        ) -> $crate::error::Result<()> {
            $init(registrar)
        }
    };
}
