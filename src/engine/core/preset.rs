// Named preset catalog persisted as `name<TAB>query` lines

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::error::{CatalogError, ParseError};
use super::query;
use super::settings::EncodeConfig;

/// Preset selected at startup when the user has no saved defaults
pub const DEFAULT_PRESET_NAME: &str = "Normal";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub query: String,
}

/// In-memory preset list.
///
/// Names are unique. Order is the order presets were first added (or appear
/// in the file); replacing a preset keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetCatalog {
    presets: Vec<Preset>,
}

fn validate(name: &str, query: &str) -> Result<(), CatalogError> {
    if name.is_empty() || name.contains(['\t', '\n', '\r']) {
        return Err(CatalogError::InvalidName(name.to_string()));
    }
    if query.contains(['\n', '\r']) {
        return Err(CatalogError::InvalidQuery(name.to_string()));
    }
    Ok(())
}

impl PresetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse catalog text. Malformed lines are skipped, never fatal.
    pub fn parse(text: &str) -> Self {
        let mut catalog = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let Some((name, query)) = line.split_once('\t') else {
                warn!(line = lineno + 1, "skipping preset line without a tab separator");
                continue;
            };
            if let Err(e) = catalog.add(name, query) {
                warn!(line = lineno + 1, "skipping preset line: {}", e);
            }
        }
        catalog
    }

    /// Load from disk. A missing or unreadable file gives an empty catalog.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => {
                let catalog = Self::parse(&text);
                debug!(path = %path.display(), count = catalog.len(), "loaded presets");
                catalog
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no preset file, starting empty");
                Self::new()
            }
            Err(e) => {
                let err = CatalogError::Io {
                    path: path.display().to_string(),
                    source: e,
                };
                warn!("{}; continuing with no presets", err);
                Self::new()
            }
        }
    }

    /// Render the whole catalog in file form
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for preset in &self.presets {
            text.push_str(&preset.name);
            text.push('\t');
            text.push_str(&preset.query);
            text.push('\n');
        }
        text
    }

    /// Atomically replace the file at `path` with this catalog.
    ///
    /// The text goes to a temporary file in the same directory which is then
    /// renamed over the destination. On failure the old file is untouched.
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let io_err = |source: io::Error| CatalogError::Io {
            path: path.display().to_string(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(self.to_text().as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        debug!(path = %path.display(), count = self.len(), "saved presets");
        Ok(())
    }

    /// Insert or replace a preset
    pub fn add(&mut self, name: &str, query: &str) -> Result<(), CatalogError> {
        validate(name, query)?;
        match self.presets.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.query = query.to_string(),
            None => self.presets.push(Preset {
                name: name.to_string(),
                query: query.to_string(),
            }),
        }
        Ok(())
    }

    /// Remove a preset; returns whether it existed
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.presets.len();
        self.presets.retain(|p| p.name != name);
        self.presets.len() != before
    }

    /// The stored query for `name`
    pub fn apply(&self, name: &str) -> Option<&str> {
        self.get(name).map(|p| p.query.as_str())
    }

    /// Decode the stored query for `name` into settings
    pub fn decode(&self, name: &str) -> Option<Result<EncodeConfig, ParseError>> {
        self.apply(name).map(query::decode)
    }

    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// `"Normal"` when the catalog has it
    pub fn default_preset_name(&self) -> Option<&str> {
        self.get(DEFAULT_PRESET_NAME).map(|p| p.name.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn clear(&mut self) {
        self.presets.clear();
    }
}

/// File-backed catalog shared between threads.
///
/// Each mutation holds the lock across both the in-memory change and the
/// file rewrite, so racing `add` and `reset` calls leave the file matching
/// whichever ran last.
#[derive(Debug)]
pub struct PresetStore {
    path: PathBuf,
    catalog: Mutex<PresetCatalog>,
}

impl PresetStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let catalog = PresetCatalog::load(&path);
        Self {
            path,
            catalog: Mutex::new(catalog),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, PresetCatalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current catalog
    pub fn snapshot(&self) -> PresetCatalog {
        self.lock().clone()
    }

    pub fn apply(&self, name: &str) -> Option<String> {
        self.lock().apply(name).map(str::to_string)
    }

    pub fn add(&self, name: &str, query: &str) -> Result<(), CatalogError> {
        let mut catalog = self.lock();
        let mut updated = catalog.clone();
        updated.add(name, query)?;
        updated.save(&self.path)?;
        *catalog = updated;
        info!(preset = name, "preset saved");
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<bool, CatalogError> {
        let mut catalog = self.lock();
        let mut updated = catalog.clone();
        if !updated.remove(name) {
            return Ok(false);
        }
        updated.save(&self.path)?;
        *catalog = updated;
        info!(preset = name, "preset removed");
        Ok(true)
    }

    /// Drop every preset and truncate the file
    pub fn reset(&self) -> Result<(), CatalogError> {
        let mut catalog = self.lock();
        PresetCatalog::new().save(&self.path)?;
        catalog.clear();
        info!(path = %self.path.display(), "presets reset");
        Ok(())
    }
}
