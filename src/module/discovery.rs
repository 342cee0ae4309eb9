use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Config;

/// Entries of a colon-separated path list, trimmed, empty ones dropped.
pub fn split_search_path(paths: &str) -> impl Iterator<Item = &str> {
    paths.split(':').map(str::trim).filter(|dir| !dir.is_empty())
}

/// Recursively collects files with `extension` under every directory of
/// `paths`, in path-list order. Order within a directory is whatever the
/// file system hands back.
pub fn find_modules(paths: &str, extension: &str) -> Vec<PathBuf> {
    let mut modules = Vec::new();

    for dir in split_search_path(paths) {
        if !Path::new(dir).is_dir() {
            debug!("Module directory {} does not exist, skipping", dir);
            continue;
        }

        debug!("Searching {} for *.{}", dir, extension);

        for entry in WalkDir::new(dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Failed to read entry below {}: {}", dir, err);
                    continue;
                }
            };

            let path = entry.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == extension) {
                modules.push(path.to_path_buf());
            }
        }
    }

    modules
}

/// Path lists to search for modules.
///
/// A non-empty override replaces the defaults outright; otherwise the
/// configured module directory is searched, then the host's plugin path.
pub fn module_search_paths(config: &Config, host_plugin_path: &str) -> Vec<String> {
    match config.module_path_override() {
        Some(paths) => vec![paths.to_string()],
        None => vec![
            config.plugin_module_directory.display().to_string(),
            host_plugin_path.to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;

    #[test]
    fn test_split_search_path() {
        let dirs: Vec<_> = split_search_path(" /a : :/b/c::  ").collect();
        assert_eq!(dirs, vec!["/a", "/b/c"]);
    }

    #[test]
    fn test_find_modules_matches_extension_only() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("nested/deeper");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join("a.hlto"), b"").unwrap();
        fs::write(nested.join("b.hlto"), b"").unwrap();
        fs::write(root.path().join("c.so"), b"").unwrap();
        fs::write(nested.join("hlto"), b"").unwrap();
        fs::create_dir(root.path().join("dir.hlto")).unwrap();

        let found: BTreeSet<_> = find_modules(&root.path().display().to_string(), "hlto")
            .into_iter()
            .collect();

        let expected: BTreeSet<_> = [root.path().join("a.hlto"), nested.join("b.hlto")]
            .into_iter()
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_missing_directories_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("a.hlto"), b"").unwrap();
        let paths = format!("/does/not/exist:{}", root.path().display());

        assert_eq!(find_modules(&paths, "hlto").len(), 1);
    }

    #[test]
    fn test_override_replaces_defaults() {
        let config = Config {
            module_path_override: Some("/x".to_string()),
            plugin_module_directory: PathBuf::from("/y"),
            ..Config::default()
        };
        assert_eq!(module_search_paths(&config, "/host/plugins"), vec!["/x".to_string()]);

        let config = Config {
            module_path_override: Some(String::new()),
            plugin_module_directory: PathBuf::from("/y"),
            ..Config::default()
        };
        assert_eq!(
            module_search_paths(&config, "/host/plugins"),
            vec!["/y".to_string(), "/host/plugins".to_string()]
        );
    }
}
