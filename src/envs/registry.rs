//! The persisted environment registry.
//!
//! Maps environment names to their filesystem roots and creation metadata,
//! persisted as a JSON object in `config/envs.json`. Registration order is
//! observable (listings iterate it), so entries live in an insertion-ordered
//! table rather than a hash map.
//!
//! All public operations follow the core failure policy: log, emit, return
//! `false`/`None`. The only hard failure is construction on a corrupt
//! registry document.

use chrono::Local;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};

use super::interpreter::PathConvention;
use crate::error::{CairnError, Result};
use crate::events::{Event, EventSink};
use crate::process::{run_tool, ToolOptions};

/// Stored metadata for one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvEntry {
    /// Environment root directory.
    pub path: PathBuf,

    /// Free-text description.
    #[serde(default)]
    pub description: String,

    /// Creation timestamp, `%Y-%m-%d %H:%M:%S`, fixed at creation.
    #[serde(default)]
    pub created_at: String,
}

/// Live view of one environment, combining stored metadata with the
/// resolved interpreter and its reported version.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvInfo {
    pub name: String,
    pub path: PathBuf,
    pub python_path: PathBuf,
    pub version: String,
    pub description: String,
    pub created_at: String,
}

/// Insertion-ordered name → entry table, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvTable(Vec<(String, EnvEntry)>);

impl EnvTable {
    pub fn get(&self, name: &str) -> Option<&EnvEntry> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn insert(&mut self, name: String, entry: EnvEntry) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = entry,
            None => self.0.push((name, entry)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<EnvEntry> {
        let index = self.0.iter().position(|(n, _)| n == name)?;
        Some(self.0.remove(index).1)
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for EnvTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, entry) in &self.0 {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EnvTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = EnvTable;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of environment name to entry")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut table = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, entry)) = access.next_entry::<String, EnvEntry>()? {
                    table.push((name, entry));
                }
                Ok(EnvTable(table))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Registry of named virtual environments.
#[derive(Debug)]
pub struct EnvRegistry {
    /// Directory holding imported/managed environment trees.
    envs_dir: PathBuf,

    /// Path of the registry document.
    registry_path: PathBuf,

    /// Base interpreter used to create new environments.
    python: String,

    envs: EnvTable,
    sink: EventSink,
}

impl EnvRegistry {
    /// Open the registry under `data_dir`, creating `envs/` and `config/`
    /// directories if absent.
    ///
    /// A missing registry document yields an empty registry; a document
    /// that exists but fails to parse is a hard construction failure (a
    /// corrupt registry must not be silently emptied and later
    /// overwritten).
    pub fn new(data_dir: &Path, python: impl Into<String>, sink: EventSink) -> Result<Self> {
        let envs_dir = data_dir.join("envs");
        let config_dir = data_dir.join("config");
        fs::create_dir_all(&envs_dir)?;
        fs::create_dir_all(&config_dir)?;

        let registry_path = config_dir.join("envs.json");
        let envs = if registry_path.exists() {
            let content = fs::read_to_string(&registry_path)?;
            serde_json::from_str(&content).map_err(|e| CairnError::ConfigParseError {
                path: registry_path.clone(),
                message: e.to_string(),
            })?
        } else {
            tracing::info!("no environment registry yet, starting empty");
            EnvTable::default()
        };

        tracing::info!("loaded environment registry: {} environments", envs.len());

        Ok(Self {
            envs_dir,
            registry_path,
            python: python.into(),
            envs,
            sink,
        })
    }

    /// Environment names in registration order.
    pub fn list(&self) -> Vec<String> {
        self.envs.names()
    }

    /// Stored metadata for an environment, without touching the filesystem.
    pub fn entry(&self, name: &str) -> Option<&EnvEntry> {
        self.envs.get(name)
    }

    /// Directory that imported environments are copied into.
    pub fn envs_dir(&self) -> &Path {
        &self.envs_dir
    }

    /// Live info for an environment: stored metadata plus the resolved
    /// interpreter and its reported version.
    ///
    /// Returns `None` if the environment is unregistered or no interpreter
    /// can be resolved. A version query that fails still returns a record,
    /// with version `"unknown"`.
    pub fn get_info(&self, name: &str) -> Option<EnvInfo> {
        let entry = self.envs.get(name)?;
        let python_path = self.resolve_interpreter(name)?;

        let version = match run_tool(python_path.as_os_str(), &["--version"], &ToolOptions::default())
        {
            Ok(out) if out.success => {
                // Python prints the version to stdout (stderr before 3.4)
                let text = if out.stdout.trim().is_empty() {
                    out.stderr
                } else {
                    out.stdout
                };
                text.trim().to_string()
            }
            Ok(_) | Err(_) => {
                tracing::warn!("version query failed for environment '{}'", name);
                "unknown".to_string()
            }
        };

        Some(EnvInfo {
            name: name.to_string(),
            path: entry.path.clone(),
            python_path,
            version,
            description: entry.description.clone(),
            created_at: entry.created_at.clone(),
        })
    }

    /// Resolve an environment's interpreter using the running platform's
    /// convention.
    pub fn resolve_interpreter(&self, name: &str) -> Option<PathBuf> {
        self.resolve_interpreter_with(name, PathConvention::current())
    }

    /// Resolve with an explicit convention (platform-sensitive behavior is
    /// testable on any host).
    pub fn resolve_interpreter_with(
        &self,
        name: &str,
        convention: PathConvention,
    ) -> Option<PathBuf> {
        let Some(entry) = self.envs.get(name) else {
            let err = CairnError::UnknownEnvironment {
                name: name.to_string(),
            };
            tracing::error!("{}", err);
            self.sink.fail(err.to_string());
            return None;
        };

        match convention.resolve(&entry.path) {
            Some(path) => Some(path),
            None => {
                let err = CairnError::InterpreterNotFound {
                    name: name.to_string(),
                    checked: convention.describe(&entry.path),
                };
                tracing::error!("{}", err);
                self.sink.fail(err.to_string());
                None
            }
        }
    }

    /// Create a new environment at `parent/name` via the platform venv tool.
    pub fn create(&mut self, name: &str, parent: &Path, description: &str) -> bool {
        if self.envs.contains(name) {
            self.sink
                .fail(format!("Environment '{}' already exists", name));
            return false;
        }

        let venv_path = parent.join(name);
        let venv_arg = venv_path.to_string_lossy().to_string();
        let args = ["-m", "venv", venv_arg.as_str()];
        let output = match run_tool(
            std::ffi::OsStr::new(&self.python),
            &args,
            &ToolOptions::default(),
        ) {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("venv tool failed to start: {}", e);
                self.sink
                    .fail(format!("Failed to create environment: {}", e));
                return false;
            }
        };

        if !output.success {
            tracing::error!(
                "venv creation failed (exit {:?}): {}",
                output.exit_code,
                output.stderr
            );
            self.sink
                .fail(format!("Failed to create environment: {}", output.stderr));
            return false;
        }

        self.envs.insert(
            name.to_string(),
            EnvEntry {
                path: venv_path,
                description: description.to_string(),
                created_at: timestamp(),
            },
        );

        if !self.persist() {
            return false;
        }
        self.sink.emit(Event::EnvCreated {
            name: name.to_string(),
        });
        true
    }

    /// Delete an environment: its directory tree first, then the registry
    /// entry. A directory that fails to delete aborts the whole operation
    /// and leaves the entry intact.
    pub fn delete(&mut self, name: &str) -> bool {
        let Some(entry) = self.envs.get(name) else {
            self.sink
                .fail(format!("Environment '{}' does not exist", name));
            return false;
        };

        let root = entry.path.clone();
        if root.exists() {
            // remove_dir_all deletes files before their directories, which
            // is required on platforms that lock non-empty directories
            if let Err(e) = fs::remove_dir_all(&root) {
                tracing::error!("failed to delete environment '{}': {}", name, e);
                self.sink
                    .fail(format!("Failed to delete environment '{}': {}", name, e));
                return false;
            }
        }

        self.envs.remove(name);
        if !self.persist() {
            return false;
        }
        self.sink.emit(Event::EnvDeleted {
            name: name.to_string(),
        });
        true
    }

    /// Import an existing environment tree by copying it into the managed
    /// environments directory. Merging into an existing destination is
    /// allowed.
    pub fn import_env(&mut self, source: &Path, name: &str) -> bool {
        if self.envs.contains(name) {
            self.sink
                .fail(format!("Environment '{}' already exists", name));
            return false;
        }

        let dest = self.envs_dir.join(name);
        if let Err(e) = copy_tree(source, &dest) {
            tracing::error!("failed to import environment '{}': {}", name, e);
            self.sink
                .fail(format!("Failed to import environment '{}': {}", name, e));
            return false;
        }

        self.envs.insert(
            name.to_string(),
            EnvEntry {
                path: dest,
                description: format!("Imported from {}", source.display()),
                created_at: timestamp(),
            },
        );

        if !self.persist() {
            return false;
        }
        self.sink.emit(Event::EnvImported {
            name: name.to_string(),
        });
        true
    }

    fn persist(&self) -> bool {
        match self.save_registry() {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("failed to save environment registry: {}", e);
                self.sink
                    .fail(format!("Failed to save environment registry: {}", e));
                false
            }
        }
    }

    fn save_registry(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.envs).map_err(|e| {
            CairnError::ConfigWriteError {
                path: self.registry_path.clone(),
                message: e.to_string(),
            }
        })?;

        // Atomic write: write to temp file, then rename
        let temp_path = self.registry_path.with_extension("json.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &self.registry_path)?;
        Ok(())
    }
}

/// Current local time in the registry's wire format.
fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Recursively copy `src` into `dst`, merging with existing content.
fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use tempfile::TempDir;

    fn registry(temp: &TempDir) -> EnvRegistry {
        EnvRegistry::new(temp.path(), "python3", EventSink::detached()).unwrap()
    }

    /// Fake venv tool: a script that lays down a minimal environment at
    /// the target directory passed as its third argument, mimicking
    /// `python -m venv <path>`.
    #[cfg(unix)]
    fn fake_venv_tool(temp: &TempDir) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = temp.path().join("fake-python");
        let script = "#!/bin/sh\n\
                      mkdir -p \"$3/bin\"\n\
                      printf '#!/bin/sh\\necho \"Python 3.12.1\"\\n' > \"$3/bin/python\"\n\
                      chmod +x \"$3/bin/python\"\n";
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    fn failing_venv_tool(temp: &TempDir) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = temp.path().join("broken-python");
        fs::write(&path, "#!/bin/sh\necho 'venv blew up' >&2\nexit 1\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn new_creates_directories() {
        let temp = TempDir::new().unwrap();
        registry(&temp);
        assert!(temp.path().join("envs").is_dir());
        assert!(temp.path().join("config").is_dir());
    }

    #[test]
    fn new_with_corrupt_registry_fails() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("config")).unwrap();
        fs::write(temp.path().join("config/envs.json"), "{oops").unwrap();

        let result = EnvRegistry::new(temp.path(), "python3", EventSink::detached());
        assert!(matches!(
            result,
            Err(CairnError::ConfigParseError { .. })
        ));
    }

    #[test]
    fn table_preserves_insertion_order() {
        let mut table = EnvTable::default();
        for name in ["zeta", "alpha", "mid"] {
            table.insert(
                name.to_string(),
                EnvEntry {
                    path: PathBuf::from("/x"),
                    description: String::new(),
                    created_at: String::new(),
                },
            );
        }

        assert_eq!(table.names(), vec!["zeta", "alpha", "mid"]);

        let json = serde_json::to_string(&table).unwrap();
        let round_tripped: EnvTable = serde_json::from_str(&json).unwrap();
        assert_eq!(round_tripped.names(), vec!["zeta", "alpha", "mid"]);
    }

    #[cfg(unix)]
    #[test]
    fn create_registers_and_persists() {
        let temp = TempDir::new().unwrap();
        let tool = fake_venv_tool(&temp);
        let parent = temp.path().join("workspace");
        fs::create_dir_all(&parent).unwrap();

        let mut reg =
            EnvRegistry::new(temp.path(), tool.clone(), EventSink::detached()).unwrap();
        assert!(reg.create("dev", &parent, "my env"));

        let info = reg.get_info("dev").unwrap();
        assert_eq!(info.path, parent.join("dev"));
        assert_eq!(info.description, "my env");
        assert_eq!(info.version, "Python 3.12.1");
        assert!(!info.created_at.is_empty());
        assert!(parent.join("dev").is_dir());

        // Survives reconstruction
        let reloaded = EnvRegistry::new(temp.path(), tool, EventSink::detached()).unwrap();
        assert_eq!(reloaded.list(), vec!["dev"]);
    }

    #[cfg(unix)]
    #[test]
    fn create_rejects_duplicate_name() {
        let temp = TempDir::new().unwrap();
        let tool = fake_venv_tool(&temp);
        let parent = temp.path().join("workspace");

        let (sink, rx) = EventBus::new();
        let mut reg = EnvRegistry::new(temp.path(), tool, sink).unwrap();
        assert!(reg.create("dev", &parent, ""));
        let _ = rx.recv().unwrap(); // EnvCreated

        assert!(!reg.create("dev", &parent, ""));
        match rx.recv().unwrap() {
            Event::OperationFailed { message } => assert!(message.contains("already exists")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn create_surfaces_tool_stderr_on_failure() {
        let temp = TempDir::new().unwrap();
        let tool = failing_venv_tool(&temp);
        let (sink, rx) = EventBus::new();
        let mut reg = EnvRegistry::new(temp.path(), tool, sink).unwrap();

        assert!(!reg.create("dev", temp.path(), ""));
        assert!(reg.list().is_empty());

        match rx.recv().unwrap() {
            Event::OperationFailed { message } => assert!(message.contains("venv blew up")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn delete_removes_directory_and_entry() {
        let temp = TempDir::new().unwrap();
        let tool = fake_venv_tool(&temp);
        let parent = temp.path().join("workspace");

        let mut reg = EnvRegistry::new(temp.path(), tool, EventSink::detached()).unwrap();
        assert!(reg.create("dev", &parent, ""));
        assert!(parent.join("dev").exists());

        assert!(reg.delete("dev"));
        assert!(!parent.join("dev").exists());
        assert!(reg.get_info("dev").is_none());
        assert!(reg.list().is_empty());
    }

    #[test]
    fn delete_unregistered_fails() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);
        assert!(!reg.delete("ghost"));
    }

    #[test]
    fn delete_tolerates_already_missing_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("config")).unwrap();
        fs::write(
            temp.path().join("config/envs.json"),
            r#"{"gone": {"path": "/nonexistent/cairn-env", "description": "", "created_at": ""}}"#,
        )
        .unwrap();

        let mut reg = registry(&temp);
        assert!(reg.delete("gone"));
        assert!(reg.list().is_empty());
    }

    #[test]
    fn import_copies_tree_and_registers() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source-env");
        fs::create_dir_all(source.join("bin")).unwrap();
        fs::write(source.join("bin/python"), "").unwrap();
        fs::write(source.join("pyvenv.cfg"), "home = /usr").unwrap();

        let mut reg = registry(&temp);
        assert!(reg.import_env(&source, "imported"));

        let entry = reg.entry("imported").unwrap();
        assert_eq!(entry.path, temp.path().join("envs/imported"));
        assert!(entry.description.contains("Imported from"));
        assert!(entry.path.join("bin/python").exists());
        assert!(entry.path.join("pyvenv.cfg").exists());
    }

    #[test]
    fn import_rejects_duplicate_name() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source-env");
        fs::create_dir_all(&source).unwrap();

        let mut reg = registry(&temp);
        assert!(reg.import_env(&source, "twice"));
        assert!(!reg.import_env(&source, "twice"));
    }

    #[test]
    fn resolve_interpreter_is_convention_sensitive() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("envs/conv");
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("bin/python"), "").unwrap();
        fs::create_dir_all(temp.path().join("config")).unwrap();
        fs::write(
            temp.path().join("config/envs.json"),
            format!(
                r#"{{"conv": {{"path": {}, "description": "", "created_at": ""}}}}"#,
                serde_json::to_string(&root).unwrap()
            ),
        )
        .unwrap();

        let reg = registry(&temp);
        assert_eq!(
            reg.resolve_interpreter_with("conv", PathConvention::Posix),
            Some(root.join("bin/python"))
        );
        assert!(reg
            .resolve_interpreter_with("conv", PathConvention::Windows)
            .is_none());
    }

    #[test]
    fn resolve_unregistered_emits_failure() {
        let temp = TempDir::new().unwrap();
        let (sink, rx) = EventBus::new();
        let reg = EnvRegistry::new(temp.path(), "python3", sink).unwrap();

        assert!(reg.resolve_interpreter("ghost").is_none());
        assert!(matches!(
            rx.recv().unwrap(),
            Event::OperationFailed { .. }
        ));
    }

    #[test]
    fn get_info_unregistered_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(registry(&temp).get_info("ghost").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn get_info_reports_interpreter_version() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let root = temp.path().join("envs/live");
        fs::create_dir_all(root.join("bin")).unwrap();
        let python = root.join("bin/python");
        fs::write(&python, "#!/bin/sh\necho 'Python 3.12.1'\n").unwrap();
        fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).unwrap();

        fs::create_dir_all(temp.path().join("config")).unwrap();
        fs::write(
            temp.path().join("config/envs.json"),
            format!(
                r#"{{"live": {{"path": {}, "description": "d", "created_at": "2026-01-01 00:00:00"}}}}"#,
                serde_json::to_string(&root).unwrap()
            ),
        )
        .unwrap();

        let reg = registry(&temp);
        let info = reg.get_info("live").unwrap();
        assert_eq!(info.version, "Python 3.12.1");
        assert_eq!(info.python_path, python);
        assert_eq!(info.description, "d");
        assert_eq!(info.created_at, "2026-01-01 00:00:00");
    }
}
