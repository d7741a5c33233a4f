//! Generic JSON document store.
//!
//! One document per logical domain (`proxy`, `theme`, `settings`, `mirror`),
//! stored as `<domain>.json` under the configuration directory. The store
//! follows the core failure policy: read problems degrade to an absent
//! result, write problems log, emit a failure event, and return `false` —
//! nothing raises past the store boundary.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::events::{Event, EventSink};

/// Durable key-value JSON documents on disk.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_dir: PathBuf,
    sink: EventSink,
}

impl ConfigStore {
    /// Open a store rooted at `config_dir`, creating the directory if absent.
    pub fn new(config_dir: impl Into<PathBuf>, sink: EventSink) -> Result<Self> {
        let config_dir = config_dir.into();
        fs::create_dir_all(&config_dir)?;
        Ok(Self { config_dir, sink })
    }

    /// Path of the document file for a domain.
    pub fn document_path(&self, domain: &str) -> PathBuf {
        self.config_dir.join(format!("{}.json", domain))
    }

    /// Load a domain's document.
    ///
    /// A missing file or a file that fails to parse both yield `None`;
    /// the parse failure is logged but never surfaced as an error.
    pub fn load(&self, domain: &str) -> Option<Map<String, Value>> {
        let path = self.document_path(domain);
        if !path.exists() {
            return None;
        }

        match read_document(&path) {
            Ok(doc) => Some(doc),
            Err(message) => {
                tracing::error!("failed to load config '{}': {}", domain, message);
                None
            }
        }
    }

    /// Load a domain's document into a typed value.
    pub fn load_as<T: DeserializeOwned>(&self, domain: &str) -> Option<T> {
        let doc = self.load(domain)?;
        match serde_json::from_value(Value::Object(doc)) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("config '{}' has unexpected shape: {}", domain, e);
                None
            }
        }
    }

    /// Overwrite a domain's document, emitting [`Event::ConfigChanged`] on
    /// success. Returns `false` (and emits a failure event) on any error.
    pub fn save(&self, domain: &str, document: &Map<String, Value>) -> bool {
        match self.write_document(domain, document) {
            Ok(()) => {
                self.sink.emit(Event::ConfigChanged {
                    domain: domain.to_string(),
                });
                true
            }
            Err(message) => {
                tracing::error!("failed to save config '{}': {}", domain, message);
                self.sink
                    .fail(format!("Failed to save configuration '{}': {}", domain, message));
                false
            }
        }
    }

    /// Serialize a typed value and save it as a domain's document.
    pub fn save_as<T: Serialize>(&self, domain: &str, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(Value::Object(doc)) => self.save(domain, &doc),
            Ok(_) => {
                tracing::error!("config '{}' did not serialize to an object", domain);
                self.sink
                    .fail(format!("Configuration '{}' is not a JSON object", domain));
                false
            }
            Err(e) => {
                tracing::error!("failed to serialize config '{}': {}", domain, e);
                self.sink
                    .fail(format!("Failed to serialize configuration '{}': {}", domain, e));
                false
            }
        }
    }

    /// Shallow-merge `partial` into the current document and save.
    ///
    /// A document that exists but cannot be parsed fails the whole update;
    /// a missing document starts from empty. Load-mutate-save is one logical
    /// unit but is not atomic across a process crash.
    pub fn update(&self, domain: &str, partial: Map<String, Value>) -> bool {
        let path = self.document_path(domain);
        let mut doc = if path.exists() {
            match read_document(&path) {
                Ok(doc) => doc,
                Err(message) => {
                    tracing::error!("cannot update config '{}': {}", domain, message);
                    self.sink
                        .fail(format!("Cannot update configuration '{}': {}", domain, message));
                    return false;
                }
            }
        } else {
            Map::new()
        };

        for (key, value) in partial {
            doc.insert(key, value);
        }
        self.save(domain, &doc)
    }

    /// Whether a document exists for the domain.
    pub fn exists(&self, domain: &str) -> bool {
        self.document_path(domain).exists()
    }

    /// Delete a domain's document. Deleting an absent document succeeds.
    pub fn delete(&self, domain: &str) -> bool {
        let path = self.document_path(domain);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                tracing::error!("failed to delete config '{}': {}", domain, e);
                self.sink
                    .fail(format!("Failed to delete configuration '{}': {}", domain, e));
                return false;
            }
        }
        self.sink.emit(Event::ConfigChanged {
            domain: domain.to_string(),
        });
        true
    }

    /// Names of all stored domains (`.json` files in the config directory).
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = match fs::read_dir(&self.config_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter_map(|e| {
                    let name = e.file_name().to_string_lossy().to_string();
                    name.strip_suffix(".json").map(String::from)
                })
                .collect(),
            Err(e) => {
                tracing::error!("failed to list configs: {}", e);
                Vec::new()
            }
        };
        names.sort();
        names
    }

    fn write_document(
        &self,
        domain: &str,
        document: &Map<String, Value>,
    ) -> std::result::Result<(), String> {
        let path = self.document_path(domain);
        let content = serde_json::to_string_pretty(&Value::Object(document.clone()))
            .map_err(|e| e.to_string())?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content).map_err(|e| e.to_string())?;
        fs::rename(&temp_path, &path).map_err(|e| e.to_string())?;
        Ok(())
    }
}

fn read_document(path: &Path) -> std::result::Result<Map<String, Value>, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    match serde_json::from_str::<Value>(&content).map_err(|e| e.to_string())? {
        Value::Object(doc) => Ok(doc),
        _ => Err("document is not a JSON object".to_string()),
    }
}
