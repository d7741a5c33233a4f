//! The persisted mirror registry.
//!
//! The official index is a built-in constant: never stored, never
//! removable, always first in listings. User-added mirrors live in an
//! insertion-ordered table persisted as `{mirrors, current}` through the
//! configuration store. A missing or corrupt document falls back to the
//! built-in default set, so the registry is never empty.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

use super::probe::{probe_all, MirrorLatency};
use crate::config::ConfigStore;
use crate::events::{Event, EventSink};

/// The official package index: reserved name, fixed URL.
pub const OFFICIAL_MIRROR: (&str, &str) = ("PyPI", "https://pypi.org/simple");

/// Built-in default mirror set.
pub const DEFAULT_MIRRORS: &[(&str, &str)] = &[
    ("tsinghua", "https://pypi.tuna.tsinghua.edu.cn/simple"),
    ("aliyun", "https://mirrors.aliyun.com/pypi/simple"),
    ("huaweicloud", "https://repo.huaweicloud.com/repository/pypi/simple"),
    ("ustc", "https://pypi.mirrors.ustc.edu.cn/simple"),
    ("douban", "https://pypi.doubanio.com/simple"),
];

/// Default "current" selection after a reset or first run.
pub const DEFAULT_CURRENT: &str = "tsinghua";

/// Configuration domain of the persisted document.
const DOMAIN: &str = "mirror";

/// Insertion-ordered name → url table, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
struct MirrorTable(Vec<(String, String)>);

impl MirrorTable {
    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, url)| url.as_str())
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn insert(&mut self, name: String, url: String) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = url,
            None => self.0.push((name, url)),
        }
    }

    fn remove(&mut self, name: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|(n, _)| n != name);
        self.0.len() != before
    }

    fn defaults() -> Self {
        Self(
            DEFAULT_MIRRORS
                .iter()
                .map(|(n, u)| (n.to_string(), u.to_string()))
                .collect(),
        )
    }
}

impl Serialize for MirrorTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, url) in &self.0 {
            map.serialize_entry(name, url)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MirrorTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = MirrorTable;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of mirror name to url")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut table = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, url)) = access.next_entry::<String, String>()? {
                    table.push((name, url));
                }
                Ok(MirrorTable(table))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Wire shape of the persisted document.
#[derive(Debug, Serialize, Deserialize)]
struct MirrorDoc {
    #[serde(default)]
    mirrors: MirrorTable,
    #[serde(default)]
    current: Option<String>,
}

/// Registry of package index mirrors.
#[derive(Debug)]
pub struct MirrorRegistry {
    store: ConfigStore,
    mirrors: MirrorTable,
    current: (String, String),
    probe_timeout: Duration,
    sink: EventSink,
}

impl MirrorRegistry {
    /// Load the registry, restoring defaults if the persisted document is
    /// missing, corrupt, or empty.
    pub fn new(store: ConfigStore, sink: EventSink) -> Self {
        let doc = store.load_as::<MirrorDoc>(DOMAIN);

        let mut dirty = false;
        let (mut mirrors, persisted_current) = match doc {
            Some(doc) => (doc.mirrors, doc.current),
            None => {
                tracing::info!("no usable mirror configuration, using defaults");
                dirty = true;
                (MirrorTable::defaults(), None)
            }
        };

        if mirrors.0.is_empty() {
            mirrors = MirrorTable::defaults();
            dirty = true;
        }

        let current = resolve_current(&mirrors, persisted_current.as_deref());

        let registry = Self {
            store,
            mirrors,
            current,
            probe_timeout: Duration::from_secs(5),
            sink,
        };
        if dirty {
            registry.persist();
        }
        registry
    }

    /// Override the probe timeout (settings-driven).
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// All mirrors: the official index first, then user mirrors in
    /// registration order.
    pub fn list(&self) -> Vec<(String, String)> {
        let mut all = vec![(OFFICIAL_MIRROR.0.to_string(), OFFICIAL_MIRROR.1.to_string())];
        all.extend(self.mirrors.0.iter().cloned());
        all
    }

    /// Register a user mirror.
    pub fn add(&mut self, name: &str, url: &str) -> bool {
        if name == OFFICIAL_MIRROR.0 {
            self.sink
                .fail(format!("Mirror name '{}' is reserved", name));
            return false;
        }
        if self.mirrors.contains(name) {
            self.sink.fail(format!("Mirror '{}' already exists", name));
            return false;
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            self.sink
                .fail("Mirror URL must start with http:// or https://");
            return false;
        }

        self.mirrors.insert(name.to_string(), url.to_string());
        if !self.persist() {
            return false;
        }
        self.sink.emit(Event::MirrorAdded {
            name: name.to_string(),
        });
        true
    }

    /// Remove a user mirror.
    pub fn remove(&mut self, name: &str) -> bool {
        if !self.mirrors.remove(name) {
            self.sink.fail(format!("Mirror '{}' does not exist", name));
            return false;
        }
        if !self.persist() {
            return false;
        }
        self.sink.emit(Event::MirrorRemoved {
            name: name.to_string(),
        });
        true
    }

    /// The current mirror as `(name, url)`.
    pub fn get_current(&self) -> (String, String) {
        self.current.clone()
    }

    /// Switch the current mirror. The official index is always legal; a
    /// user mirror must be registered. Failure leaves the selection
    /// unchanged.
    pub fn set_current(&mut self, name: &str) -> bool {
        let url = if name == OFFICIAL_MIRROR.0 {
            OFFICIAL_MIRROR.1.to_string()
        } else {
            match self.mirrors.get(name) {
                Some(url) => url.to_string(),
                None => {
                    self.sink.fail(format!("Mirror '{}' does not exist", name));
                    return false;
                }
            }
        };

        self.current = (name.to_string(), url.clone());
        if !self.persist() {
            return false;
        }
        self.sink.emit(Event::MirrorChanged {
            name: name.to_string(),
            url,
        });
        true
    }

    /// Discard all user mirrors and restore the built-in set and default
    /// current selection. Idempotent.
    pub fn reset_to_default(&mut self) -> bool {
        self.mirrors = MirrorTable::defaults();
        self.current = resolve_current(&self.mirrors, Some(DEFAULT_CURRENT));
        self.persist()
    }

    /// Probe every user mirror and deliver the sorted results through a
    /// [`Event::SpeedTestFinished`] event. The official index is assumed
    /// reachable and is not ranked.
    pub fn test_all(&self) {
        let results = probe_all(&self.mirrors.0, self.probe_timeout);
        self.sink.emit(Event::SpeedTestFinished { results });
    }

    /// Probe every user mirror and return the fastest reachable one.
    pub fn fastest(&self) -> Option<(String, String)> {
        probe_all(&self.mirrors.0, self.probe_timeout)
            .into_iter()
            .find(|r| r.latency.is_some())
            .map(|r| (r.name, r.url))
    }

    /// The environment variable the shell exports so installer invocations
    /// resolve against the current mirror.
    pub fn index_env_var(&self) -> (String, String) {
        ("PIP_INDEX_URL".to_string(), self.current.1.clone())
    }

    fn persist(&self) -> bool {
        let doc = MirrorDoc {
            mirrors: self.mirrors.clone(),
            current: Some(self.current.0.clone()),
        };
        self.store.save_as(DOMAIN, &doc)
    }
}

/// Resolve the persisted current-mirror name against the loaded table,
/// falling back to the default choice, then to the official index.
fn resolve_current(mirrors: &MirrorTable, persisted: Option<&str>) -> (String, String) {
    if let Some(name) = persisted {
        if name == OFFICIAL_MIRROR.0 {
            return (OFFICIAL_MIRROR.0.to_string(), OFFICIAL_MIRROR.1.to_string());
        }
        if let Some(url) = mirrors.get(name) {
            return (name.to_string(), url.to_string());
        }
        tracing::warn!("persisted current mirror '{}' is not registered", name);
    }

    if let Some(url) = mirrors.get(DEFAULT_CURRENT) {
        return (DEFAULT_CURRENT.to_string(), url.to_string());
    }
    (OFFICIAL_MIRROR.0.to_string(), OFFICIAL_MIRROR.1.to_string())
}
