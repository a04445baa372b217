//! Known handler files
//!
//! The api directory is scanned at startup. A lookup that misses rescans
//! once so files added while the server runs are picked up.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub struct HandlerIndex {
    dir: PathBuf,
    files: RwLock<Vec<String>>,
}

impl HandlerIndex {
    /// Scan `dir`; a missing directory yields an empty index
    pub fn scan(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            files: RwLock::new(list_handler_files(dir)),
        }
    }

    pub fn rescan(&self) {
        let files = list_handler_files(&self.dir);
        if let Ok(mut current) = self.files.write() {
            *current = files;
        }
    }

    pub fn files(&self) -> Vec<String> {
        self.files.read().map(|f| f.clone()).unwrap_or_default()
    }

    /// Handler file for a request path under `prefix`, if one exists on disk
    ///
    /// The first segment after the prefix matches a file name exactly, or a
    /// file stem (`/api/hello` → `hello.sh`).
    pub fn match_path(&self, path: &str, prefix: &str) -> Option<PathBuf> {
        let rest = path.strip_prefix(prefix)?;
        let segment = rest.split('/').next().filter(|s| !s.is_empty())?;

        let found = self.find(segment).or_else(|| {
            self.rescan();
            self.find(segment)
        })?;
        let file = self.dir.join(found);
        file.is_file().then_some(file)
    }

    fn find(&self, segment: &str) -> Option<String> {
        let files = self.files.read().ok()?;
        files
            .iter()
            .find(|f| f.as_str() == segment)
            .or_else(|| {
                files
                    .iter()
                    .find(|f| Path::new(f).file_stem().is_some_and(|stem| stem == segment))
            })
            .cloned()
    }
}

/// Regular, non-hidden files directly inside `dir`, sorted
fn list_handler_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect();
    files.sort();
    files
}
