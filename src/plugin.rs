//! The plugin context: owns every piece of process-wide state and drives the
//! host's lifecycle hooks.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::analyzer::{
    AnalyzerRegistry, FileAnalyzerSpec, PacketAnalyzerSpec, ProtocolAnalyzerSpec,
};
use crate::config::{Config, ABORT_ON_EXCEPTIONS_CONST, ENABLE_PRINT_CONST, SHOW_BACKTRACES_CONST};
use crate::error::{BridgeError, Result};
use crate::events::{register_enum_type, EventTable};
use crate::host::{AnalyzerTag, EnumVal, FileTag, Host, PacketTag, ProtocolTag};
use crate::module::{find_modules, module_search_paths, split_search_path, ModuleLoader, ModuleOpener, Registrar};
use crate::runtime::{Parser, Runtime, RuntimeConfig, RuntimeError};

/// Where the plugin is in the host's boot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Modules may load and register analyzers.
    Registering,
    /// Parsers are resolved and bound; no more registrations.
    Resolved,
    /// The runtime has been shut down.
    Done,
}

/// Outcome of the host's load-file hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadFileOutcome {
    /// A module file, loaded (or already loaded before).
    Module,
    /// Not an extension we handle; the host should try elsewhere.
    NotOurs,
}

pub struct Plugin<H: Host> {
    config: Config,
    host: H,
    runtime: Box<dyn Runtime>,
    loader: ModuleLoader,
    analyzers: AnalyzerRegistry,
    events: EventTable,
    phase: Phase,
}

impl<H: Host> Plugin<H> {
    /// Fails if the host is not the version the plugin was built for.
    pub fn new(config: Config, host: H, runtime: Box<dyn Runtime>, opener: Box<dyn ModuleOpener>) -> Result<Self> {
        if let Some(compiled) = config.compiled_host_version {
            if compiled != host.version() {
                return Err(BridgeError::VersionMismatch {
                    running: host.version(),
                    compiled,
                });
            }
        }

        Ok(Self {
            config,
            host,
            runtime,
            loader: ModuleLoader::new(opener),
            analyzers: AnalyzerRegistry::new(),
            events: EventTable::new(),
            phase: Phase::Registering,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn runtime(&self) -> &dyn Runtime {
        self.runtime.as_ref()
    }

    pub fn modules(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn analyzers(&self) -> &AnalyzerRegistry {
        &self.analyzers
    }

    pub fn events(&self) -> &EventTable {
        &self.events
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn ensure_registering(&self, operation: &'static str) -> Result<()> {
        if self.phase == Phase::Registering {
            Ok(())
        } else {
            Err(BridgeError::PhaseViolation { operation })
        }
    }

    /// Adds each directory of a colon-separated list to the host's search path.
    pub fn add_library_paths(&mut self, dirs: &str) {
        for dir in split_search_path(dirs) {
            self.host.add_to_search_path(dir);
        }
    }

    pub fn init_pre_script(&mut self) -> Result<()> {
        debug!("Beginning pre-script initialization");

        if let Some(dirs) = self.config.library_path_override.clone() {
            self.add_library_paths(&dirs);
        }

        let plugin_dir = self.config.plugin_directory()?;
        self.add_library_paths(&plugin_dir.join("spicy").display().to_string());

        self.auto_discover_modules()?;

        debug!("Done with pre-script initialization");
        Ok(())
    }

    pub fn auto_discover_modules(&mut self) -> Result<()> {
        let host_plugin_path = self.host.plugin_path();
        let search_paths = module_search_paths(&self.config, &host_plugin_path);
        for paths in search_paths {
            self.search_modules(&paths)?;
        }
        Ok(())
    }

    /// Loads every module file found below the directories in `paths`.
    pub fn search_modules(&mut self, paths: &str) -> Result<()> {
        for path in find_modules(paths, &self.config.module_extension) {
            self.load_module(&path)?;
        }
        Ok(())
    }

    /// Loads one module; returns false if it had been loaded already.
    pub fn load_module(&mut self, path: &Path) -> Result<bool> {
        self.ensure_registering("loading a module")?;

        let mut registration = Registration {
            host: &mut self.host,
            analyzers: &mut self.analyzers,
            events: &mut self.events,
            runtime: self.runtime.as_mut(),
        };
        self.loader.load(path, &mut registration)
    }

    /// The host's load-file hook.
    pub fn hook_load_file(&mut self, file: &Path) -> Result<LoadFileOutcome> {
        if self.config.is_module_file(file) {
            self.load_module(file)?;
            return Ok(LoadFileOutcome::Module);
        }

        if self.config.is_source_file(file) {
            return Err(BridgeError::JitUnsupported(file.to_path_buf()));
        }

        Ok(LoadFileOutcome::NotOurs)
    }

    /// Phase two. Runs once, after the host has finished loading scripts
    /// and with them all modules.
    pub fn init_post_script(&mut self) -> Result<()> {
        self.ensure_registering("post-script initialization")?;
        debug!("Beginning post-script initialization");

        self.events.assign_dummy_types(&mut self.host);

        debug!("Initializing parser runtime");
        let config = RuntimeConfig {
            enable_print: self.host.find_const_bool(ENABLE_PRINT_CONST).unwrap_or(false),
            abort_on_exceptions: self.host.find_const_bool(ABORT_ON_EXCEPTIONS_CONST).unwrap_or(false),
            show_backtraces: self.host.find_const_bool(SHOW_BACKTRACES_CONST).unwrap_or(false),
        };

        self.runtime.init(&config).map_err(|err| match err {
            RuntimeError::Exception { kind, message } => BridgeError::RuntimeInit { kind, message },
        })?;

        self.analyzers.resolve(&mut self.host, self.runtime.parsers())?;
        self.phase = Phase::Resolved;

        debug!("Done with post-script initialization");
        Ok(())
    }

    pub fn done(&mut self) {
        if self.phase == Phase::Done {
            return;
        }

        debug!("Shutting down parser runtime");
        self.runtime.done();
        self.phase = Phase::Done;
    }

    pub fn toggle_analyzer(&mut self, tag: impl Into<AnalyzerTag>, enable: bool) -> Result<bool> {
        self.analyzers.toggle(&mut self.host, tag.into(), enable)
    }

    /// Toggle entry point for script-level tag values of any analyzer kind.
    pub fn toggle_enum(&mut self, val: &EnumVal, enable: bool) -> Result<bool> {
        self.analyzers.toggle_enum(&mut self.host, val, enable)
    }

    pub fn parser_for_protocol_analyzer(&self, tag: ProtocolTag, is_orig: bool) -> Option<&Arc<Parser>> {
        self.analyzers.parser_for_protocol_analyzer(tag, is_orig)
    }

    pub fn parser_for_file_analyzer(&self, tag: FileTag) -> Option<&Arc<Parser>> {
        self.analyzers.parser_for_file_analyzer(tag)
    }

    pub fn parser_for_packet_analyzer(&self, tag: PacketTag) -> Option<&Arc<Parser>> {
        self.analyzers.parser_for_packet_analyzer(tag)
    }

    pub fn tag_for_protocol_analyzer(&self, tag: ProtocolTag) -> ProtocolTag {
        self.analyzers.tag_for_protocol_analyzer(tag)
    }

    pub fn tag_for_file_analyzer(&self, tag: FileTag) -> FileTag {
        self.analyzers.tag_for_file_analyzer(tag)
    }

    pub fn tag_for_packet_analyzer(&self, tag: PacketTag) -> PacketTag {
        self.analyzers.tag_for_packet_analyzer(tag)
    }
}

impl<H: Host> Registrar for Plugin<H> {
    fn register_protocol_analyzer(&mut self, spec: ProtocolAnalyzerSpec) -> Result<()> {
        self.ensure_registering("registering a protocol analyzer")?;
        self.analyzers.register_protocol_analyzer(&mut self.host, spec)
    }

    fn register_file_analyzer(&mut self, spec: FileAnalyzerSpec) -> Result<()> {
        self.ensure_registering("registering a file analyzer")?;
        self.analyzers.register_file_analyzer(&mut self.host, spec)
    }

    fn register_packet_analyzer(&mut self, spec: PacketAnalyzerSpec) -> Result<()> {
        self.ensure_registering("registering a packet analyzer")?;
        self.analyzers.register_packet_analyzer(&mut self.host, spec)
    }

    fn register_parser(&mut self, parser: Parser) -> Result<()> {
        self.ensure_registering("registering a parser")?;
        self.runtime.register_parser(parser);
        Ok(())
    }

    fn register_event(&mut self, name: &str) -> Result<()> {
        self.ensure_registering("registering an event")?;
        self.events.register_event(&mut self.host, name);
        Ok(())
    }

    fn register_enum_type(&mut self, ns: &str, id: &str, labels: &[(String, i64)]) -> Result<()> {
        self.ensure_registering("registering an enum type")?;
        register_enum_type(&mut self.host, ns, id, labels);
        Ok(())
    }
}

/// Borrowed view of the plugin's state handed to a loading module.
struct Registration<'a> {
    host: &'a mut dyn Host,
    analyzers: &'a mut AnalyzerRegistry,
    events: &'a mut EventTable,
    runtime: &'a mut dyn Runtime,
}

impl Registrar for Registration<'_> {
    fn register_protocol_analyzer(&mut self, spec: ProtocolAnalyzerSpec) -> Result<()> {
        self.analyzers.register_protocol_analyzer(self.host, spec)
    }

    fn register_file_analyzer(&mut self, spec: FileAnalyzerSpec) -> Result<()> {
        self.analyzers.register_file_analyzer(self.host, spec)
    }

    fn register_packet_analyzer(&mut self, spec: PacketAnalyzerSpec) -> Result<()> {
        self.analyzers.register_packet_analyzer(self.host, spec)
    }

    fn register_parser(&mut self, parser: Parser) -> Result<()> {
        self.runtime.register_parser(parser);
        Ok(())
    }

    fn register_event(&mut self, name: &str) -> Result<()> {
        self.events.register_event(self.host, name);
        Ok(())
    }

    fn register_enum_type(&mut self, ns: &str, id: &str, labels: &[(String, i64)]) -> Result<()> {
        register_enum_type(self.host, ns, id, labels);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::host::{AnalyzerKind, MemoryHost};
    use crate::module::testing::{ScriptedModule, ScriptedOpener};
    use crate::runtime::{LocalRuntime, Port, Protocol};

    fn config(dir: &Path) -> Config {
        Config {
            plugin_directory: Some(dir.to_path_buf()),
            plugin_module_directory: dir.join("modules"),
            ..Config::default()
        }
    }

    fn plugin(dir: &Path, opener: ScriptedOpener) -> Plugin<MemoryHost> {
        Plugin::new(
            config(dir),
            MemoryHost::new(40100),
            Box::new(LocalRuntime::new()),
            Box::new(opener),
        )
        .unwrap()
    }

    fn foo_module() -> ScriptedModule {
        ScriptedModule {
            parsers: vec![Parser::new("foo::Request"), Parser::new("foo::Reply")],
            protocol: vec![ProtocolAnalyzerSpec {
                name: "FOO".to_string(),
                protocol: Protocol::Tcp,
                ports: vec![Port::tcp(4242)],
                parser_orig: "foo::Request".to_string(),
                parser_resp: "foo::Reply".to_string(),
                replaces: String::new(),
            }],
            events: vec!["foo::request".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_version_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            compiled_host_version: Some(40000),
            ..config(dir.path())
        };
        let result = Plugin::new(
            config,
            MemoryHost::new(40100),
            Box::new(LocalRuntime::new()),
            Box::new(ScriptedOpener::default()),
        );
        assert!(matches!(
            result,
            Err(BridgeError::VersionMismatch { running: 40100, compiled: 40000 })
        ));
    }

    #[test]
    fn test_pre_script_adds_library_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = Plugin::new(
            Config {
                library_path_override: Some("/extra/a:/extra/b".to_string()),
                ..config(dir.path())
            },
            MemoryHost::new(40100),
            Box::new(LocalRuntime::new()),
            Box::new(ScriptedOpener::default()),
        )
        .unwrap();

        plugin.init_pre_script().unwrap();

        let expected = vec![
            "/extra/a".to_string(),
            "/extra/b".to_string(),
            dir.path().join("spicy").display().to_string(),
        ];
        assert_eq!(plugin.host().search_path(), expected.as_slice());
    }

    #[test]
    fn test_full_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let modules = dir.path().join("modules");
        std::fs::create_dir(&modules).unwrap();
        std::fs::write(modules.join("foo.hlto"), b"").unwrap();

        let mut opener = ScriptedOpener::default();
        opener.modules.insert("foo.hlto".to_string(), foo_module());
        let mut plugin = plugin(dir.path(), opener);

        plugin.init_pre_script().unwrap();
        assert_eq!(plugin.modules().len(), 1);

        let tag = plugin.host().protocol_analyzer_tag("FOO").unwrap();
        assert!(plugin.parser_for_protocol_analyzer(tag, true).is_none());

        plugin.init_post_script().unwrap();
        assert_eq!(plugin.phase(), Phase::Resolved);
        assert_eq!(
            plugin.parser_for_protocol_analyzer(tag, true).map(|p| p.name.as_str()),
            Some("foo::Request")
        );
        assert_eq!(plugin.host().port_bindings().len(), 1);
        assert!(plugin.host().id("foo::request").unwrap().ty.is_some());

        plugin.done();
        assert_eq!(plugin.phase(), Phase::Done);
    }

    #[test]
    fn test_runtime_config_from_host_constants() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = MemoryHost::new(40100);
        host.set_const(ENABLE_PRINT_CONST, true);
        host.set_const(SHOW_BACKTRACES_CONST, true);

        struct Recording(Arc<std::sync::Mutex<Option<RuntimeConfig>>>, Vec<Arc<Parser>>);
        impl Runtime for Recording {
            fn register_parser(&mut self, parser: Parser) {
                self.1.push(Arc::new(parser));
            }
            fn init(&mut self, config: &RuntimeConfig) -> std::result::Result<(), RuntimeError> {
                *self.0.lock().unwrap() = Some(*config);
                Ok(())
            }
            fn done(&mut self) {}
            fn parsers(&self) -> &[Arc<Parser>] {
                &self.1
            }
        }

        let seen = Arc::new(std::sync::Mutex::new(None));
        let mut plugin = Plugin::new(
            config(dir.path()),
            host,
            Box::new(Recording(seen.clone(), Vec::new())),
            Box::new(ScriptedOpener::default()),
        )
        .unwrap();
        plugin.init_post_script().unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            Some(RuntimeConfig {
                enable_print: true,
                abort_on_exceptions: false,
                show_backtraces: true,
            })
        );
    }

    #[test]
    fn test_runtime_init_failure() {
        struct Failing;
        impl Runtime for Failing {
            fn register_parser(&mut self, _parser: Parser) {}
            fn init(&mut self, _config: &RuntimeConfig) -> std::result::Result<(), RuntimeError> {
                Err(RuntimeError::Exception {
                    kind: "RuntimeError".to_string(),
                    message: "boom".to_string(),
                })
            }
            fn done(&mut self) {}
            fn parsers(&self) -> &[Arc<Parser>] {
                &[]
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut plugin = Plugin::new(
            config(dir.path()),
            MemoryHost::new(40100),
            Box::new(Failing),
            Box::new(ScriptedOpener::default()),
        )
        .unwrap();

        let err = plugin.init_post_script().unwrap_err();
        assert_eq!(err.to_string(), "uncaught runtime exception RuntimeError during initialization: boom");
        assert_eq!(plugin.phase(), Phase::Registering);
    }

    #[test]
    fn test_registration_after_post_script_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = plugin(dir.path(), ScriptedOpener::default());
        plugin.init_post_script().unwrap();

        let err = plugin
            .register_packet_analyzer(PacketAnalyzerSpec {
                name: "LATE".to_string(),
                parser: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, BridgeError::PhaseViolation { .. }));
        assert!(plugin.init_post_script().is_err());
        assert!(plugin.load_module(&PathBuf::from("late.hlto")).is_err());
    }

    #[test]
    fn test_hook_load_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("foo.hlto"), b"").unwrap();
        let mut opener = ScriptedOpener::default();
        opener.modules.insert("foo.hlto".to_string(), foo_module());
        let mut plugin = plugin(dir.path(), opener);

        assert_eq!(
            plugin.hook_load_file(&dir.path().join("foo.hlto")).unwrap(),
            LoadFileOutcome::Module
        );
        assert_eq!(
            plugin.hook_load_file(Path::new("site/local.zeek")).unwrap(),
            LoadFileOutcome::NotOurs
        );
        assert!(matches!(
            plugin.hook_load_file(Path::new("foo.evt")),
            Err(BridgeError::JitUnsupported(_))
        ));
        assert_eq!(plugin.host().is_enabled(AnalyzerKind::Protocol, "FOO"), Some(true));
    }

    #[test]
    fn test_enum_registration_through_plugin() {
        let dir = tempfile::tempdir().unwrap();
        let mut plugin = plugin(dir.path(), ScriptedOpener::default());

        plugin
            .register_enum_type("foo", "Mode", &[("ON".to_string(), 1)])
            .unwrap();
        assert!(plugin.host().id("foo::Mode").is_some());
    }
}
