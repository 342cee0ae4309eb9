use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Overrides the module search path entirely.
pub const MODULE_PATH_ENV: &str = "SPICY_MODULE_PATH";

/// Extra library directories, searched before the plugin's own.
pub const LIBRARY_PATH_ENV: &str = "ZEEK_SPICY_PATH";

/// The host's own plugin search path.
pub const HOST_PLUGIN_PATH_ENV: &str = "ZEEK_PLUGIN_PATH";

/// Host script constants controlling the parser runtime.
pub const ENABLE_PRINT_CONST: &str = "Spicy::enable_print";
pub const ABORT_ON_EXCEPTIONS_CONST: &str = "Spicy::abort_on_exceptions";
pub const SHOW_BACKTRACES_CONST: &str = "Spicy::show_backtraces";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub module_path_override: Option<String>,
    pub library_path_override: Option<String>,
    pub plugin_module_directory: PathBuf,
    /// Where the plugin lives; located from the running executable if unset.
    pub plugin_directory: Option<PathBuf>,
    /// Host version the plugin was built against, checked at startup.
    pub compiled_host_version: Option<u32>,
    pub module_extension: String,
    /// Source-level extensions that need a JIT toolchain to load.
    pub source_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let plugin_module_directory = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("/usr/local/share"))
            .join("spicy")
            .join("modules");

        Self {
            module_path_override: None,
            library_path_override: None,
            plugin_module_directory,
            plugin_directory: None,
            compiled_host_version: None,
            module_extension: "hlto".to_string(),
            source_extensions: vec!["spicy".to_string(), "evt".to_string(), "hlt".to_string()],
        }
    }
}

impl Config {
    /// Defaults with the process environment applied.
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Reads a JSON configuration file, then applies the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BridgeError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|source| BridgeError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Applies environment overrides, looked up through `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(paths) = lookup(MODULE_PATH_ENV) {
            self.module_path_override = Some(paths);
        }
        if let Some(dirs) = lookup(LIBRARY_PATH_ENV) {
            self.library_path_override = Some(dirs);
        }
        self
    }

    /// The module search override, if set to something non-empty.
    pub fn module_path_override(&self) -> Option<&str> {
        self.module_path_override.as_deref().filter(|p| !p.is_empty())
    }

    /// The plugin's own directory: configured, or two levels above the
    /// running executable.
    pub fn plugin_directory(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.plugin_directory {
            return Ok(dir.clone());
        }

        let exe = std::env::current_exe().map_err(BridgeError::SelfLocate)?;
        exe.parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                BridgeError::SelfLocate(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} has no parent directory", exe.display()),
                ))
            })
    }

    pub fn is_module_file(&self, path: &Path) -> bool {
        path.extension().map_or(false, |ext| ext == self.module_extension.as_str())
    }

    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.source_extensions.iter().any(|s| s == ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        let config = Config::default().with_env(|key| match key {
            MODULE_PATH_ENV => Some("/x:/z".to_string()),
            LIBRARY_PATH_ENV => Some("/lib/a".to_string()),
            _ => None,
        });

        assert_eq!(config.module_path_override(), Some("/x:/z"));
        assert_eq!(config.library_path_override.as_deref(), Some("/lib/a"));
    }

    #[test]
    fn test_empty_module_override_is_ignored() {
        let config = Config::default().with_env(|key| (key == MODULE_PATH_ENV).then(String::new));
        assert_eq!(config.module_path_override(), None);
    }

    #[test]
    fn test_file_classification() {
        let config = Config::default();
        assert!(config.is_module_file(Path::new("/a/foo.hlto")));
        assert!(!config.is_module_file(Path::new("/a/foo.so")));
        assert!(config.is_source_file(Path::new("foo.evt")));
        assert!(config.is_source_file(Path::new("foo.spicy")));
        assert!(!config.is_source_file(Path::new("foo.zeek")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "plugin_module_directory": "/opt/modules", "compiled_host_version": 40100 }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.plugin_module_directory, PathBuf::from("/opt/modules"));
        assert_eq!(config.compiled_host_version, Some(40100));
        assert_eq!(config.module_extension, "hlto");
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load(&path), Err(BridgeError::ConfigParse { .. })));
        assert!(matches!(
            Config::load(&dir.path().join("missing.json")),
            Err(BridgeError::ConfigIo { .. })
        ));
    }

    #[test]
    fn test_configured_plugin_directory() {
        let config = Config {
            plugin_directory: Some(PathBuf::from("/opt/plugin")),
            ..Config::default()
        };
        assert_eq!(config.plugin_directory().unwrap(), PathBuf::from("/opt/plugin"));
    }
}
