//! Loading of precompiled parser modules.
//!
//! A module is opened at most once per canonical path. Opening it runs its
//! registration entry point, which calls back into a [`Registrar`] for every
//! parser, analyzer and event it provides.

pub mod discovery;
pub mod dylib;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::analyzer::{FileAnalyzerSpec, PacketAnalyzerSpec, ProtocolAnalyzerSpec};
use crate::error::{BridgeError, Result};
use crate::runtime::Parser;

pub use discovery::{find_modules, module_search_paths, split_search_path};
pub use dylib::{DylibOpener, ModuleInitFn, MODULE_INIT_SYMBOL};

/// Callback surface modules register themselves through.
pub trait Registrar {
    fn register_protocol_analyzer(&mut self, spec: ProtocolAnalyzerSpec) -> Result<()>;

    fn register_file_analyzer(&mut self, spec: FileAnalyzerSpec) -> Result<()>;

    fn register_packet_analyzer(&mut self, spec: PacketAnalyzerSpec) -> Result<()>;

    fn register_parser(&mut self, parser: Parser) -> Result<()>;

    fn register_event(&mut self, name: &str) -> Result<()>;

    fn register_enum_type(&mut self, ns: &str, id: &str, labels: &[(String, i64)]) -> Result<()>;
}

/// An opened module.
pub trait Module {
    /// Runs the module's self-registration.
    fn register(&self, registrar: &mut dyn Registrar) -> Result<()>;
}

/// Turns a module file into an opened [`Module`].
pub trait ModuleOpener {
    fn open(&self, path: &Path) -> std::result::Result<Box<dyn Module>, String>;
}

pub struct LoadedModule {
    pub path: PathBuf,
    pub loaded_at: DateTime<Utc>,
    module: Box<dyn Module>,
}

/// Registry of opened modules, keyed by canonical path. Modules are never
/// unloaded.
pub struct ModuleLoader {
    opener: Box<dyn ModuleOpener>,
    modules: BTreeMap<PathBuf, LoadedModule>,
}

impl ModuleLoader {
    pub fn new(opener: Box<dyn ModuleOpener>) -> Self {
        Self {
            opener,
            modules: BTreeMap::new(),
        }
    }

    /// Opens the module at `path` and runs its registration against
    /// `registrar`, unless the same file was loaded before.
    ///
    /// Returns whether the module was newly loaded.
    pub fn load(&mut self, path: &Path, registrar: &mut dyn Registrar) -> Result<bool> {
        // Discovery can find the same module several times, possibly under
        // different spellings.
        let canonical_path = std::fs::canonicalize(path).map_err(|source| BridgeError::Environment {
            path: path.to_path_buf(),
            source,
        })?;

        if self.modules.contains_key(&canonical_path) {
            debug!("Ignoring duplicate loading request for {}", canonical_path.display());
            return Ok(false);
        }

        debug!("Loading {}", canonical_path.display());
        let module = self
            .opener
            .open(&canonical_path)
            .map_err(|reason| BridgeError::ModuleOpen {
                path: canonical_path.clone(),
                reason,
            })?;

        let loaded = self.modules.entry(canonical_path.clone()).or_insert(LoadedModule {
            path: canonical_path,
            loaded_at: Utc::now(),
            module,
        });
        loaded.module.register(registrar)?;

        Ok(true)
    }

    pub fn is_loaded(&self, path: &Path) -> bool {
        std::fs::canonicalize(path)
            .map(|p| self.modules.contains_key(&p))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn modules(&self) -> impl Iterator<Item = &LoadedModule> {
        self.modules.values()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;

    /// A module that replays a fixed list of registrations.
    #[derive(Clone, Default)]
    pub struct ScriptedModule {
        pub parsers: Vec<Parser>,
        pub protocol: Vec<ProtocolAnalyzerSpec>,
        pub file: Vec<FileAnalyzerSpec>,
        pub events: Vec<String>,
    }

    impl Module for ScriptedModule {
        fn register(&self, registrar: &mut dyn Registrar) -> Result<()> {
            for parser in &self.parsers {
                registrar.register_parser(parser.clone())?;
            }
            for spec in &self.protocol {
                registrar.register_protocol_analyzer(spec.clone())?;
            }
            for spec in &self.file {
                registrar.register_file_analyzer(spec.clone())?;
            }
            for event in &self.events {
                registrar.register_event(event)?;
            }
            Ok(())
        }
    }

    /// Opens modules by file name from a fixed map, counting every open.
    #[derive(Clone, Default)]
    pub struct ScriptedOpener {
        pub modules: HashMap<String, ScriptedModule>,
        pub opened: Rc<RefCell<Vec<PathBuf>>>,
    }

    impl ModuleOpener for ScriptedOpener {
        fn open(&self, path: &Path) -> std::result::Result<Box<dyn Module>, String> {
            self.opened.borrow_mut().push(path.to_path_buf());
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| "invalid module name".to_string())?;
            self.modules
                .get(name)
                .cloned()
                .map(|m| Box::new(m) as Box<dyn Module>)
                .ok_or_else(|| format!("{} is not a valid module", name))
        }
    }
}
