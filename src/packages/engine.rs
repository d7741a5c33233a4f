//! The package operations engine.
//!
//! An engine is bound at construction to one resolved interpreter and is
//! only ever valid for a live one: construction validates that the path
//! exists and answers a version query, and fails hard otherwise. Everything
//! after construction degrades to a reported failure on the event channel.
//!
//! Long enumerations (`load`, `check_updates`) are cooperatively
//! cancellable: a shared atomic flag is checked between packages. A
//! subprocess already handed to the OS cannot be interrupted — cancellation
//! only prevents starting the next call. Installer calls have no timeout; a
//! hung tool hangs the operation.

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::pip::PipClient;
use super::record::{link_parents, PackageRecord};
use crate::error::{CairnError, Result};
use crate::events::{Event, EventSink};
use crate::process::ToolOptions;

/// Shared cooperative-cancellation flag.
///
/// Cheap to clone; any clone can cancel. Checked at per-package loop
/// boundaries only.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Emits progress events, strictly increasing within one operation.
struct ProgressTracker<'a> {
    sink: &'a EventSink,
    last: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    fn new(sink: &'a EventSink) -> Self {
        Self { sink, last: None }
    }

    /// Emit `percent` if it advances past the last emitted value. Integer
    /// division can produce repeats on large package sets; those are
    /// swallowed here so observers see a strictly increasing sequence.
    fn emit(&mut self, percent: u8) {
        if self.last.is_none_or(|last| percent > last) {
            self.sink.emit(Event::Progress { percent });
            self.last = Some(percent);
        }
    }
}

/// Package operations against one environment's interpreter.
#[derive(Debug)]
pub struct PackageEngine {
    env_name: String,
    pip: PipClient,
    cancel: CancelFlag,
    sink: EventSink,
}

impl PackageEngine {
    /// Bind an engine to an interpreter.
    ///
    /// Hard failure (not an event) if the path does not exist on disk or
    /// does not answer a version query — an engine must never be
    /// constructed around a dead interpreter.
    pub fn new(
        python_path: PathBuf,
        env_name: impl Into<String>,
        options: ToolOptions,
        sink: EventSink,
    ) -> Result<Self> {
        if !python_path.exists() {
            return Err(CairnError::InterpreterInvalid {
                path: python_path,
                message: "path does not exist".to_string(),
            });
        }

        let pip = PipClient::new(python_path.clone(), options);
        match pip.version_query() {
            Ok(output) if output.success => {}
            Ok(output) => {
                return Err(CairnError::InterpreterInvalid {
                    path: python_path,
                    message: format!(
                        "version query exited with {:?}: {}",
                        output.exit_code,
                        output.stderr.trim()
                    ),
                });
            }
            Err(e) => {
                return Err(CairnError::InterpreterInvalid {
                    path: python_path,
                    message: e.to_string(),
                });
            }
        }

        Ok(Self {
            env_name: env_name.into(),
            pip,
            cancel: CancelFlag::new(),
            sink,
        })
    }

    /// The cancellation flag, cloneable across threads.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Request cooperative cancellation of an in-progress enumeration.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Enumerate installed packages with full metadata.
    ///
    /// The initial listing accounts for the first 25% of progress; the
    /// per-package detail lookups spread across the remaining 75%. The full
    /// record set is delivered as one [`Event::PackagesLoaded`] at the end,
    /// unless cancellation short-circuits first — then no result event is
    /// emitted at all.
    pub fn load(&self) {
        let mut progress = ProgressTracker::new(&self.sink);
        progress.emit(0);

        let listed = match self.pip.list_installed() {
            Ok(listed) => listed,
            Err(e) => {
                tracing::error!("package listing failed for '{}': {}", self.env_name, e);
                self.sink.fail(format!("Failed to list packages: {}", e));
                return;
            }
        };
        progress.emit(25);

        let total = listed.len();
        if total == 0 {
            progress.emit(100);
            self.sink.emit(Event::PackagesLoaded {
                packages: Vec::new(),
            });
            return;
        }

        let mut records = Vec::with_capacity(total);
        for (row, pkg) in listed.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!("package load cancelled for '{}'", self.env_name);
                return;
            }

            if pkg.name.is_empty() || pkg.version.is_empty() {
                tracing::warn!(
                    "skipping malformed listing entry (name: {:?}, version: {:?})",
                    pkg.name,
                    pkg.version
                );
            } else {
                let show = self.pip.show(&pkg.name);
                let installed_at = show
                    .location
                    .as_deref()
                    .and_then(|location| install_time(location, &pkg.name));

                records.push(PackageRecord {
                    name: pkg.name,
                    version: pkg.version,
                    latest_version: None,
                    location: show.location,
                    installed_at,
                    requires: show.requires,
                    row,
                    parent: None,
                });
            }

            progress.emit(25 + (((row + 1) * 75) / total) as u8);
        }

        link_parents(&mut records);
        self.sink.emit(Event::PackagesLoaded { packages: records });
    }

    /// Enumerate installed packages and query the newest available version
    /// of each.
    ///
    /// A separate, heavier path from [`load`](Self::load): it populates
    /// `latest_version` only, not location/timestamp/requirements. Same
    /// progress and cancellation contract.
    pub fn check_updates(&self) {
        let mut progress = ProgressTracker::new(&self.sink);
        progress.emit(0);

        let listed = match self.pip.list_installed() {
            Ok(listed) => listed,
            Err(e) => {
                tracing::error!("package listing failed for '{}': {}", self.env_name, e);
                self.sink.fail(format!("Failed to list packages: {}", e));
                return;
            }
        };
        progress.emit(25);

        let total = listed.len();
        if total == 0 {
            progress.emit(100);
            self.sink.emit(Event::PackagesLoaded {
                packages: Vec::new(),
            });
            return;
        }

        let mut records = Vec::with_capacity(total);
        for (row, pkg) in listed.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!("update check cancelled for '{}'", self.env_name);
                return;
            }

            if pkg.name.is_empty() || pkg.version.is_empty() {
                tracing::warn!(
                    "skipping malformed listing entry (name: {:?}, version: {:?})",
                    pkg.name,
                    pkg.version
                );
            } else {
                let latest_version = self.pip.latest_version(&pkg.name);
                records.push(PackageRecord {
                    name: pkg.name,
                    version: pkg.version,
                    latest_version,
                    row,
                    ..Default::default()
                });
            }

            progress.emit(25 + (((row + 1) * 75) / total) as u8);
        }

        self.sink.emit(Event::PackagesLoaded { packages: records });
    }

    /// Install a package.
    ///
    /// `spec` is a name, optionally pinned as `name==version`. Unpinned
    /// installs request the newest available version via `--upgrade`.
    /// Exactly one terminal event: [`Event::PackageInstalled`] carrying the
    /// original spec, or a failure with pip's diagnostic text.
    pub fn install(&self, spec: &str) -> bool {
        let mut progress = ProgressTracker::new(&self.sink);
        progress.emit(0);

        let upgrade = !spec.contains("==");
        let result = self.pip.install(spec, upgrade);
        progress.emit(100);

        match result {
            Ok(output) if output.success => {
                self.sink.emit(Event::PackageInstalled {
                    spec: spec.to_string(),
                });
                true
            }
            Ok(output) => {
                tracing::error!("install of '{}' failed: {}", spec, output.stderr.trim());
                self.sink
                    .fail(format!("Failed to install package: {}", output.stderr));
                false
            }
            Err(e) => {
                tracing::error!("install of '{}' failed to run: {}", spec, e);
                self.sink.fail(format!("Failed to install package: {}", e));
                false
            }
        }
    }

    /// Uninstall a package with auto-confirmation. One terminal event.
    pub fn uninstall(&self, name: &str) -> bool {
        let mut progress = ProgressTracker::new(&self.sink);
        progress.emit(0);

        let result = self.pip.uninstall(name);
        progress.emit(100);

        match result {
            Ok(output) if output.success => {
                self.sink.emit(Event::PackageUninstalled {
                    name: name.to_string(),
                });
                true
            }
            Ok(output) => {
                tracing::error!("uninstall of '{}' failed: {}", name, output.stderr.trim());
                self.sink
                    .fail(format!("Failed to uninstall package: {}", output.stderr));
                false
            }
            Err(e) => {
                tracing::error!("uninstall of '{}' failed to run: {}", name, e);
                self.sink
                    .fail(format!("Failed to uninstall package: {}", e));
                false
            }
        }
    }

    /// Upgrade a package to the newest available version. One terminal
    /// event.
    pub fn upgrade(&self, name: &str) -> bool {
        let mut progress = ProgressTracker::new(&self.sink);
        progress.emit(0);

        let result = self.pip.install(name, true);
        progress.emit(100);

        match result {
            Ok(output) if output.success => {
                self.sink.emit(Event::PackageUpgraded {
                    name: name.to_string(),
                });
                true
            }
            Ok(output) => {
                tracing::error!("upgrade of '{}' failed: {}", name, output.stderr.trim());
                self.sink
                    .fail(format!("Failed to upgrade package: {}", output.stderr));
                false
            }
            Err(e) => {
                tracing::error!("upgrade of '{}' failed to run: {}", name, e);
                self.sink.fail(format!("Failed to upgrade package: {}", e));
                false
            }
        }
    }
}

/// Best-effort install timestamp from the package directory's filesystem
/// metadata.
///
/// Tries the literal distribution name, then a hyphen→underscore normalized
/// form (directory naming may differ from the distribution name). Creation
/// time is unavailable on some filesystems; modification time is the
/// fallback. Absent when nothing works — consumers must not rely on it.
fn install_time(location: &Path, name: &str) -> Option<String> {
    let normalized = name.replace('-', "_");
    for candidate in [name, normalized.as_str()] {
        let dir = location.join(candidate);
        if !dir.exists() {
            continue;
        }
        let metadata = match fs::metadata(&dir) {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };
        if let Ok(time) = metadata.created().or_else(|_| metadata.modified()) {
            let stamp: DateTime<Local> = time.into();
            return Some(stamp.format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn construction_fails_for_missing_path() {
        let err = PackageEngine::new(
            PathBuf::from("/nonexistent/python"),
            "dev",
            ToolOptions::default(),
            EventSink::detached(),
        );
        assert!(matches!(
            err,
            Err(CairnError::InterpreterInvalid { .. })
        ));
    }

    #[test]
    fn install_time_normalizes_hyphens() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("typing_extensions")).unwrap();

        assert!(install_time(temp.path(), "typing-extensions").is_some());
        assert!(install_time(temp.path(), "missing-package").is_none());
    }
}
