use csvcompare_common::CompareError;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Recursive lister of regular files using jwalk
#[derive(Debug, Default)]
pub struct FileScanner {
    ignore: Option<Gitignore>,
    follow_symlinks: bool,
}

impl FileScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip paths matching gitignore-style patterns (e.g. "*.bak", "tmp/")
    pub fn with_ignore_patterns(mut self, patterns: &[String]) -> Self {
        self.ignore = Self::build_ignore(patterns);
        self
    }

    /// Descend into symlinked directories and list symlinked files
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.follow_symlinks = enabled;
        self
    }

    fn build_ignore(patterns: &[String]) -> Option<Gitignore> {
        if patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new("");
        for pattern in patterns {
            if let Err(err) = builder.add_line(None, pattern) {
                debug!("Failed to add ignore pattern '{}': {}", pattern, err);
            } else {
                debug!("Added ignore pattern: {}", pattern);
            }
        }

        match builder.build() {
            Ok(ignore) => Some(ignore),
            Err(e) => {
                debug!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// List regular files under `root`, relative to it and sorted.
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, CompareError> {
        if !root.is_dir() {
            return Err(CompareError::Path(format!(
                "Not a directory: {}",
                root.display()
            )));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .skip_hidden(false);

        for entry in walker {
            let entry = entry.map_err(|e| {
                let err = std::io::Error::new(std::io::ErrorKind::Other, e.to_string());
                CompareError::file_io(root, err)
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative_path = path
                .strip_prefix(root)
                .map_err(|e| CompareError::Path(e.to_string()))?
                .to_path_buf();

            if self.is_ignored(&relative_path) {
                continue;
            }

            files.push(relative_path);
        }

        files.sort();
        debug!("Scanned {} files from {:?}", files.len(), root);
        Ok(files)
    }

    /// Check a path and all of its parent directories against the patterns
    fn is_ignored(&self, path: &Path) -> bool {
        let Some(ref ignore) = self.ignore else {
            return false;
        };

        if ignore.matched(path, false).is_ignore() {
            return true;
        }

        let mut current = path;
        while let Some(parent) = current.parent() {
            if !parent.as_os_str().is_empty() && ignore.matched(parent, true).is_ignore() {
                return true;
            }
            current = parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scanner_lists_files_only() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.csv"), b"id\n").unwrap();
        fs::write(temp.path().join("a.csv"), b"id\n").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::create_dir(temp.path().join("empty")).unwrap();
        fs::write(temp.path().join("nested/c.csv"), b"id\n").unwrap();

        let files = FileScanner::new().scan(temp.path()).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("a.csv"),
                PathBuf::from("b.csv"),
                PathBuf::from("nested").join("c.csv"),
            ]
        );
    }

    #[test]
    fn test_scanner_ignore_patterns() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("keep.csv"), b"id\n").unwrap();
        fs::write(temp.path().join("notes.bak"), b"id\n").unwrap();
        fs::create_dir(temp.path().join("tmp")).unwrap();
        fs::write(temp.path().join("tmp/scratch.csv"), b"id\n").unwrap();

        let patterns = vec!["*.bak".to_string(), "tmp/".to_string()];
        let files = FileScanner::new()
            .with_ignore_patterns(&patterns)
            .scan(temp.path())
            .unwrap();
        assert_eq!(files, vec![PathBuf::from("keep.csv")]);
    }

    #[test]
    #[cfg(unix)]
    fn test_scanner_symlinks_are_opt_in() {
        let temp = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::write(temp.path().join("a.csv"), b"id\n").unwrap();
        fs::write(target.path().join("linked.csv"), b"id\n").unwrap();
        std::os::unix::fs::symlink(target.path(), temp.path().join("linked_dir")).unwrap();

        let files = FileScanner::new().scan(temp.path()).unwrap();
        assert_eq!(files, vec![PathBuf::from("a.csv")]);

        let files = FileScanner::new()
            .follow_symlinks(true)
            .scan(temp.path())
            .unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("a.csv"),
                PathBuf::from("linked_dir").join("linked.csv"),
            ]
        );
    }

    #[test]
    fn test_scanner_rejects_files_as_roots() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.csv");
        fs::write(&file, b"id\n").unwrap();

        let err = FileScanner::new().scan(&file).unwrap_err();
        assert!(matches!(err, CompareError::Path(_)));
    }
}
