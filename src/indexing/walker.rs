//! Workspace walker with exclusion rules.
//!
//! Walks a workspace root depth-first and yields the files worth
//! indexing. Hidden entries, well-known dependency/build directories,
//! lockfiles, binary artifacts, and user-configured exclusions are
//! all skipped. Unreadable entries are silently dropped rather than
//! failing the walk.

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;

/// Directory names never descended into.
const IGNORED_DIRS: [&str; 6] = [
    "node_modules",
    "vendor",
    "dist",
    "build",
    "__pycache__",
    "venv",
];

/// File names never indexed.
const STATIC_EXCLUDED_FILES: [&str; 4] = [
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "go.sum",
];

/// File suffixes never indexed.
const EXCLUDED_SUFFIXES: [&str; 8] = [".lock", ".csv", ".json", ".svg", ".png", ".a", ".o", ".so"];

/// Walks directories to find source files to index.
#[derive(Debug)]
pub struct WorkspaceWalker<'a> {
    config: &'a Config,
}

impl<'a> WorkspaceWalker<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Collects every indexable file under `root`.
    pub fn collect(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| {
                // The root itself is exempt from the hidden check so a
                // workspace like `.` or `.config` can still be walked.
                if entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                if name.starts_with('.') {
                    debug!(path = %entry.path().display(), "skipping hidden entry");
                    return false;
                }
                if entry.file_type().is_dir() && IGNORED_DIRS.contains(&name.as_ref()) {
                    debug!(path = %entry.path().display(), "skipping ignored directory");
                    return false;
                }
                true
            })
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy();
                if is_excluded_file(&name, self.config) {
                    debug!(path = %entry.path().display(), "skipping excluded file");
                    return false;
                }
                true
            })
            .map(|entry| entry.into_path())
            .collect()
    }
}

/// Whether a file name is excluded from indexing, factoring in the
/// static deny lists plus user-configured excludes (extensions are
/// matched case-insensitively).
pub fn is_excluded_file(name: &str, config: &Config) -> bool {
    if STATIC_EXCLUDED_FILES.contains(&name) {
        return true;
    }
    if EXCLUDED_SUFFIXES
        .iter()
        .any(|suffix| name.ends_with(suffix))
    {
        return true;
    }
    if config
        .excluded_files
        .iter()
        .any(|excluded| !excluded.is_empty() && excluded == name)
    {
        return true;
    }

    let lower = name.to_lowercase();
    config.excluded_extensions.iter().any(|extension| {
        !extension.is_empty() && lower.ends_with(&format!(".{}", extension.to_lowercase()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(paths: &[PathBuf]) -> Vec<String> {
        let mut names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_walk_skips_hidden_and_ignored_dirs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("main.rs"), "fn main() {}").unwrap();
        fs::write(root.join(".env"), "SECRET=1").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git").join("config"), "x").unwrap();
        fs::create_dir(root.join("node_modules")).unwrap();
        fs::write(root.join("node_modules").join("dep.js"), "x").unwrap();
        fs::create_dir(root.join("src")).unwrap();
        fs::write(root.join("src").join("lib.rs"), "pub fn lib() {}").unwrap();

        let config = Config::default();
        let files = WorkspaceWalker::new(&config).collect(root);

        assert_eq!(names(&files), vec!["lib.rs", "main.rs"]);
    }

    #[test]
    fn test_walk_skips_static_and_suffix_excludes() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("app.py"), "print(1)").unwrap();
        fs::write(root.join("package-lock.json"), "{}").unwrap();
        fs::write(root.join("data.csv"), "a,b").unwrap();
        fs::write(root.join("config.json"), "{}").unwrap();
        fs::write(root.join("logo.svg"), "<svg/>").unwrap();

        let config = Config::default();
        let files = WorkspaceWalker::new(&config).collect(root);

        assert_eq!(names(&files), vec!["app.py"]);
    }

    #[test]
    fn test_user_configured_excludes() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("keep.rs"), "x").unwrap();
        fs::write(root.join("skipme.rs"), "x").unwrap();
        fs::write(root.join("notes.TXT"), "x").unwrap();

        let mut config = Config::default();
        config.excluded_files = vec!["skipme.rs".to_string()];
        config.excluded_extensions = vec!["txt".to_string()];
        let files = WorkspaceWalker::new(&config).collect(root);

        assert_eq!(names(&files), vec!["keep.rs"]);
    }

    #[test]
    fn test_is_excluded_file_rules() {
        let config = Config::default();
        assert!(is_excluded_file("go.sum", &config));
        assert!(is_excluded_file("Cargo.lock", &config));
        assert!(is_excluded_file("image.png", &config));
        assert!(!is_excluded_file("main.go", &config));
        assert!(!is_excluded_file("lib.rs", &config));
    }
}
