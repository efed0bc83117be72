use super::{defaults_from_schema, SettingsEntry, StoreError};
use crate::engine::validate_value;
use crate::signal::Signal;
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

const SCHEMA_SUFFIX: &str = ".schema.json";

/// Settings stored as `<plugin>.schema.json` plus `<plugin>.json` holding the
/// user overrides. A missing overrides file means no overrides.
pub struct FileSettings {
    plugin: String,
    schema: JsonValue,
    user: RefCell<JsonValue>,
    user_path: PathBuf,
    changed: Signal<()>,
}

fn read_json(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}

impl FileSettings {
    pub fn load(
        plugin: impl Into<String>,
        schema_path: &Path,
        user_path: &Path,
    ) -> Result<Self, StoreError> {
        let plugin = plugin.into();
        let raw = read_json(schema_path)?.ok_or_else(|| StoreError::Read {
            path: schema_path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "schema file missing"),
        })?;
        let schema: JsonValue = serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
            plugin: plugin.clone(),
            source,
        })?;
        let entry = Self {
            plugin,
            schema,
            user: RefCell::new(JsonValue::Object(serde_json::Map::new())),
            user_path: user_path.to_path_buf(),
            changed: Signal::new(),
        };
        *entry.user.borrow_mut() = entry.read_user()?;
        Ok(entry)
    }

    fn read_user(&self) -> Result<JsonValue, StoreError> {
        let Some(raw) = read_json(&self.user_path)? else {
            return Ok(JsonValue::Object(serde_json::Map::new()));
        };
        if raw.trim().is_empty() {
            return Ok(JsonValue::Object(serde_json::Map::new()));
        }
        let v: JsonValue = serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
            plugin: self.plugin.clone(),
            source,
        })?;
        if !v.is_object() {
            return Err(StoreError::NotAnObject {
                plugin: self.plugin.clone(),
            });
        }
        Ok(v)
    }

    /// Re-read the overrides file, e.g. after another program changed it.
    pub fn reload(&self) -> Result<(), StoreError> {
        let v = self.read_user()?;
        *self.user.borrow_mut() = v;
        tracing::debug!(plugin = %self.plugin, "settings reloaded from disk");
        self.changed.emit(&());
        Ok(())
    }

    pub fn user_path(&self) -> &Path {
        &self.user_path
    }
}

impl SettingsEntry for FileSettings {
    fn plugin(&self) -> &str {
        &self.plugin
    }

    fn schema(&self) -> JsonValue {
        self.schema.clone()
    }

    fn user(&self) -> JsonValue {
        self.user.borrow().clone()
    }

    fn default_value(&self) -> JsonValue {
        defaults_from_schema(&self.schema)
    }

    fn save(&self, raw: &str) -> Result<(), StoreError> {
        let v: JsonValue = serde_json::from_str(raw).map_err(|source| StoreError::Parse {
            plugin: self.plugin.clone(),
            source,
        })?;
        if !v.is_object() {
            return Err(StoreError::NotAnObject {
                plugin: self.plugin.clone(),
            });
        }
        let errors = validate_value(&self.schema, &v);
        if !errors.is_empty() {
            return Err(StoreError::Invalid {
                plugin: self.plugin.clone(),
                messages: errors.into_iter().map(|e| e.stack).collect(),
            });
        }
        // write next to the target and rename so readers never see a partial file
        let tmp = self.user_path.with_extension("json.tmp");
        let write_err = |source| StoreError::Write {
            path: self.user_path.display().to_string(),
            source,
        };
        fs::write(&tmp, raw).map_err(write_err)?;
        if let Err(source) = fs::rename(&tmp, &self.user_path) {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(source));
        }
        *self.user.borrow_mut() = v;
        tracing::info!(plugin = %self.plugin, path = %self.user_path.display(), "settings saved");
        self.changed.emit(&());
        Ok(())
    }

    fn changed(&self) -> &Signal<()> {
        &self.changed
    }
}

/// A directory of plugin settings files.
#[derive(Clone, Debug)]
pub struct SettingsDir {
    root: PathBuf,
}

impl SettingsDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Plugin ids with a schema file, sorted.
    pub fn plugins(&self) -> Result<Vec<String>, StoreError> {
        let read_err = |source| StoreError::Read {
            path: self.root.display().to_string(),
            source,
        };
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(plugin) = name.strip_suffix(SCHEMA_SUFFIX) {
                if !plugin.is_empty() {
                    out.push(plugin.to_string());
                }
            }
        }
        out.sort();
        Ok(out)
    }

    pub fn open(&self, plugin: &str) -> Result<FileSettings, StoreError> {
        FileSettings::load(
            plugin,
            &self.root.join(format!("{plugin}{SCHEMA_SUFFIX}")),
            &self.root.join(format!("{plugin}.json")),
        )
    }
}
