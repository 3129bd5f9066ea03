//! Include resolution interface consumed by the preprocessor.

use std::fs;
use std::io;
use std::path::PathBuf;

/// Resolves `#include` requests to source text. `is_system` distinguishes
/// `<...>` from `"..."` includes; system includes skip the local directory
/// and go straight to the search paths.
pub trait IncludeHandler {
    fn include(&mut self, path: &str, is_system: bool) -> io::Result<String>;
}

/// Filesystem backed handler with an ordered list of search paths.
#[derive(Debug, Default)]
pub struct StdIncludeHandler {
    pub search_paths: Vec<PathBuf>,
}

impl StdIncludeHandler {
    pub fn new() -> Self {
        StdIncludeHandler::default()
    }

    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        StdIncludeHandler { search_paths }
    }
}

impl IncludeHandler for StdIncludeHandler {
    fn include(&mut self, path: &str, is_system: bool) -> io::Result<String> {
        if !is_system {
            if let Ok(text) = fs::read_to_string(path) {
                return Ok(text);
            }
        }
        for search_path in &self.search_paths {
            let candidate = search_path.join(path);
            if let Ok(text) = fs::read_to_string(&candidate) {
                return Ok(text);
            }
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("include file not found: '{}'", path),
        ))
    }
}

/// In-memory handler, used by tests and embedders that carry their own
/// virtual filesystem.
#[derive(Debug, Default)]
pub struct MemoryIncludeHandler {
    files: std::collections::HashMap<String, String>,
    /// Number of successful resolutions, observable by tests.
    pub resolved_count: usize,
}

impl MemoryIncludeHandler {
    pub fn new() -> Self {
        MemoryIncludeHandler::default()
    }

    pub fn add_file(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }
}

impl IncludeHandler for MemoryIncludeHandler {
    fn include(&mut self, path: &str, _is_system: bool) -> io::Result<String> {
        match self.files.get(path) {
            Some(text) => {
                self.resolved_count += 1;
                Ok(text.clone())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("include file not found: '{}'", path),
            )),
        }
    }
}
