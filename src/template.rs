//! Layout template storage
//!
//! Templates live in a single directory, one `<style_key>.html` file per
//! layout. They are read on first use and cached for the life of the store.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use log::debug;

use crate::{Error, Result};

const TEMPLATE_EXTENSION: &str = "html";

/// Read-only view of the templates directory.
#[derive(Debug)]
pub struct TemplateStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the markup for `style_key`.
    ///
    /// Returns `TemplateNotFound` when no template file exists for the key,
    /// or when the key is not a plain file stem.
    pub fn load(&self, style_key: &str) -> Result<Arc<str>> {
        if !is_valid_key(style_key) {
            return Err(Error::TemplateNotFound(style_key.to_string()));
        }

        if let Some(markup) = self.cached(style_key) {
            return Ok(markup);
        }

        let path = self.path_for(style_key);
        let markup: Arc<str> = match std::fs::read_to_string(&path) {
            Ok(text) => text.into(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::TemplateNotFound(style_key.to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        debug!("loaded template '{}' from {}", style_key, path.display());

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        let entry = cache.entry(style_key.to_string()).or_insert(markup);
        Ok(Arc::clone(entry))
    }

    /// Style keys of every template currently in the directory, sorted.
    pub fn list_available_styles(&self) -> Result<Vec<String>> {
        let mut styles = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_valid_key(stem) {
                    styles.push(stem.to_string());
                }
            }
        }
        styles.sort();
        Ok(styles)
    }

    fn cached(&self, style_key: &str) -> Option<Arc<str>> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.get(style_key).cloned()
    }

    fn path_for(&self, style_key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", style_key, TEMPLATE_EXTENSION))
    }
}

// Keys map straight onto file names, so anything that could walk out of the
// directory is rejected.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
