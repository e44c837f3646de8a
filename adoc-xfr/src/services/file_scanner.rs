//! Input discovery
//!
//! Finds archive and loose JSON files below the input directory. Discovery is
//! lazy and file-name ordered so repeated runs see files in the same order.

use crate::config::XfrSettings;
use crate::error::{XfrError, XfrResult};
use crate::models::{SourceFile, SourceKind, IMPORT_READY_MARKER};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Names never treated as inputs (matched against each path component)
const IGNORE_PATTERNS: &[&str] = &[".DS_Store", "Thumbs.db", ".git", ".svn", "__MACOSX"];

/// Input file scanner
pub struct FileScanner {
    recursive: bool,
    archive_extensions: Vec<String>,
    /// Skipped when it lives inside the input directory
    output_root: Option<PathBuf>,
}

impl FileScanner {
    pub fn new(settings: &XfrSettings) -> Self {
        Self {
            recursive: settings.recursive,
            archive_extensions: settings.archive_extensions.clone(),
            output_root: Some(settings.output_root.clone()),
        }
    }

    /// Classify a path by extension (case-insensitive)
    pub fn kind_of(&self, path: &Path) -> Option<SourceKind> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        if ext == "json" {
            Some(SourceKind::Json)
        } else if self.archive_extensions.iter().any(|e| *e == ext) {
            Some(SourceKind::Archive)
        } else {
            None
        }
    }

    /// Start discovery below `root_path`
    ///
    /// Fails up front when the root is missing or not a directory; entries
    /// that cannot be read later surface as `Err` items of the iterator.
    pub fn discover(&self, root_path: &Path) -> XfrResult<Discovery<'_>> {
        Self::check_root(root_path)?;

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter();

        let output_root = self
            .output_root
            .as_ref()
            .filter(|out| crate::config::is_within(out, root_path))
            .map(|out| out.canonicalize().unwrap_or_else(|_| out.clone()));

        Ok(Discovery {
            scanner: self,
            root: root_path.to_path_buf(),
            walker,
            output_root,
            symlink_visited: HashSet::new(),
        })
    }

    /// Fail unless `root_path` is an existing directory
    pub fn check_root(root_path: &Path) -> XfrResult<()> {
        if !root_path.exists() {
            return Err(XfrError::Discovery {
                path: root_path.to_path_buf(),
                reason: "path not found".to_string(),
            });
        }
        if !root_path.is_dir() {
            return Err(XfrError::Discovery {
                path: root_path.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        Ok(())
    }

    fn is_ignored(entry: &DirEntry) -> bool {
        let file_name = entry.file_name().to_string_lossy();
        IGNORE_PATTERNS.iter().any(|pattern| file_name == *pattern)
    }
}

/// Lazy sequence of discovered inputs
pub struct Discovery<'a> {
    scanner: &'a FileScanner,
    root: PathBuf,
    walker: walkdir::IntoIter,
    output_root: Option<PathBuf>,
    symlink_visited: HashSet<PathBuf>,
}

impl Discovery<'_> {
    fn should_descend(&mut self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        if FileScanner::is_ignored(entry) {
            return false;
        }
        if let Some(out) = &self.output_root {
            let canonical = entry
                .path()
                .canonicalize()
                .unwrap_or_else(|_| entry.path().to_path_buf());
            if canonical.starts_with(out) {
                tracing::debug!("Skipping output directory: {}", entry.path().display());
                return false;
            }
        }
        // Detect symlink loops
        if entry.path_is_symlink() {
            if let Ok(canonical) = entry.path().canonicalize() {
                if !self.symlink_visited.insert(canonical) {
                    tracing::warn!("Symlink loop detected: {}", entry.path().display());
                    return false;
                }
            }
        }
        true
    }
}

impl Iterator for Discovery<'_> {
    type Item = XfrResult<SourceFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    return Some(Err(XfrError::Discovery {
                        path,
                        reason: e.to_string(),
                    }));
                }
            };

            if !self.should_descend(&entry) {
                if entry.file_type().is_dir() {
                    self.walker.skip_current_dir();
                }
                continue;
            }

            let path = entry.path();
            let Some(kind) = self.scanner.kind_of(path) else {
                continue;
            };

            if entry.path_is_symlink() {
                // Symlinked files are inputs; symlinked directories are not walked
                match std::fs::metadata(path) {
                    Ok(meta) if meta.is_file() => {}
                    Ok(_) => {
                        tracing::debug!("Not following symlink: {}", path.display());
                        continue;
                    }
                    Err(e) => {
                        tracing::debug!("Skipping dangling symlink {}: {}", path.display(), e);
                        continue;
                    }
                }
            } else if !entry.file_type().is_file() {
                continue;
            }

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            if stem.ends_with(IMPORT_READY_MARKER) {
                tracing::debug!("Skipping previous output: {}", path.display());
                continue;
            }

            let relative = path
                .strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(entry.file_name()));
            return Some(Ok(SourceFile::new(path.to_path_buf(), relative, kind)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn settings(root: &Path, recursive: bool) -> XfrSettings {
        let mut settings = XfrSettings::new(root, root.join("out"));
        settings.recursive = recursive;
        settings
    }

    fn collect(scanner: &FileScanner, root: &Path) -> XfrResult<Vec<SourceFile>> {
        scanner.discover(root)?.collect()
    }

    #[test]
    fn test_kind_of_is_case_insensitive() {
        let scanner = FileScanner::new(&XfrSettings::new("/in", "/out"));
        assert_eq!(scanner.kind_of(Path::new("a.ZIP")), Some(SourceKind::Archive));
        assert_eq!(scanner.kind_of(Path::new("dir/b.Json")), Some(SourceKind::Json));
        assert_eq!(scanner.kind_of(Path::new("notes.txt")), None);
        assert_eq!(scanner.kind_of(Path::new("zip")), None);
    }

    #[test]
    fn test_scan_nonexistent_path() {
        let scanner = FileScanner::new(&XfrSettings::new("/in", "/out"));
        match collect(&scanner, Path::new("/nonexistent/adoc/path")) {
            Err(XfrError::Discovery { .. }) => {}
            other => panic!("Expected Discovery error, got {:?}", other.map(|f| f.len())),
        }
    }

    #[test]
    fn test_scan_file_as_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("policy.json");
        fs::write(&file, "{}").unwrap();

        let scanner = FileScanner::new(&settings(temp_dir.path(), false));
        assert!(matches!(collect(&scanner, &file), Err(XfrError::Discovery { .. })));
    }

    #[test]
    fn test_scan_top_level_only_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("b.json"), "{}").unwrap();
        fs::write(root.join("a.ZIP"), b"PK").unwrap();
        fs::write(root.join("notes.txt"), "x").unwrap();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested/c.json"), "{}").unwrap();

        let scanner = FileScanner::new(&settings(root, false));
        let files = collect(&scanner, root).unwrap();
        let names: Vec<String> = files.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["a.ZIP", "b.json"]);
        assert_eq!(files[0].kind, SourceKind::Archive);
        assert_eq!(files[1].kind, SourceKind::Json);
    }

    #[test]
    fn test_scan_recursive_keeps_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested/c.json"), "{}").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/ignored.json"), "{}").unwrap();

        let scanner = FileScanner::new(&settings(root, true));
        let files = collect(&scanner, root).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, PathBuf::from("nested/c.json"));
    }

    #[test]
    fn test_scan_skips_outputs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("p.json"), "{}").unwrap();
        fs::write(root.join("p_import_ready.json"), "{}").unwrap();
        fs::create_dir_all(root.join("out/policy-import")).unwrap();
        fs::write(root.join("out/policy-import/q.json"), "{}").unwrap();

        let scanner = FileScanner::new(&settings(root, true));
        let files = collect(&scanner, root).unwrap();
        let names: Vec<String> = files.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["p.json"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_follows_symlinked_files() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(outside.path().join("real.json"), "{}").unwrap();
        fs::create_dir(outside.path().join("linked_dir")).unwrap();
        fs::write(outside.path().join("linked_dir/hidden.json"), "{}").unwrap();

        std::os::unix::fs::symlink(outside.path().join("real.json"), root.join("a_link.json"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path().join("gone.json"), root.join("b_dangling.json"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path().join("linked_dir"), root.join("c_dir.json"))
            .unwrap();

        let scanner = FileScanner::new(&settings(root, true));
        let files = collect(&scanner, root).unwrap();
        let names: Vec<String> = files.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["a_link.json"]);
        assert_eq!(files[0].kind, SourceKind::Json);
        assert_eq!(fs::read_to_string(&files[0].path).unwrap(), "{}");
    }
}
