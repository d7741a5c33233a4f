//! In-memory package records.
//!
//! The record set is rebuilt from scratch on every load or update check;
//! nothing here is persisted across runs.

use serde::Serialize;
use std::path::PathBuf;

/// One installed package and its metadata, scoped to one environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PackageRecord {
    /// Distribution name, unique within one load cycle.
    pub name: String,

    /// Installed version, from the installer's machine-readable listing.
    pub version: String,

    /// Newest available version; populated only by an update check.
    pub latest_version: Option<String>,

    /// Install location, best-effort from `pip show`.
    pub location: Option<PathBuf>,

    /// Best-effort install timestamp, `%Y-%m-%d %H:%M:%S`. Derived from
    /// filesystem metadata of the package directory, so it may reflect a
    /// copy time instead and is often absent.
    pub installed_at: Option<String>,

    /// Declared requirements, in the order pip reports them.
    pub requires: Vec<String>,

    /// Position in the load cycle's listing.
    pub row: usize,

    /// Name of a package that declares this one as a requirement.
    pub parent: Option<String>,
}

/// Recompute parent links over a record set.
///
/// A package B is a child of A iff A declares B as a requirement and B is
/// itself installed. One level only, recomputed fully — existing links are
/// cleared first, never patched incrementally.
pub fn link_parents(records: &mut [PackageRecord]) {
    for record in records.iter_mut() {
        record.parent = None;
    }

    let declared: Vec<(String, Vec<String>)> = records
        .iter()
        .map(|r| (r.name.clone(), r.requires.clone()))
        .collect();

    for (parent, requires) in declared {
        for requirement in requires {
            if let Some(child) = records.iter_mut().find(|r| r.name == requirement) {
                child.parent = Some(parent.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, requires: &[&str]) -> PackageRecord {
        PackageRecord {
            name: name.to_string(),
            version: "1.0".to_string(),
            requires: requires.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn requirement_gets_parent() {
        let mut records = vec![record("A", &["B"]), record("B", &[])];
        link_parents(&mut records);

        assert!(records[0].parent.is_none());
        assert_eq!(records[1].parent.as_deref(), Some("A"));
    }

    #[test]
    fn requirement_not_installed_is_ignored() {
        let mut records = vec![record("A", &["missing"])];
        link_parents(&mut records);
        assert!(records[0].parent.is_none());
    }

    #[test]
    fn linking_is_one_level_deep() {
        // A requires B, B requires C: C's parent is B, not A
        let mut records = vec![record("A", &["B"]), record("B", &["C"]), record("C", &[])];
        link_parents(&mut records);

        assert_eq!(records[1].parent.as_deref(), Some("A"));
        assert_eq!(records[2].parent.as_deref(), Some("B"));
    }

    #[test]
    fn relinking_clears_stale_parents() {
        let mut records = vec![record("A", &["B"]), record("B", &[])];
        link_parents(&mut records);
        assert_eq!(records[1].parent.as_deref(), Some("A"));

        records[0].requires.clear();
        link_parents(&mut records);
        assert!(records[1].parent.is_none());
    }
}
