//! Durable relation state.
//!
//! Each relation the unit has joined owns a directory named after the
//! relation id under the agent's relations directory. Inside it every
//! member unit has one small YAML file:
//!
//! ```text
//! <relations-dir>/7/mysql-0     change-version: 12
//! <relations-dir>/7/mysql-1     change-version: 4
//!                               changed-pending: true
//! ```
//!
//! Unit files are replaced atomically, so a crash leaves either the old or
//! the new record for a unit and never a partial one.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;
use uniter_core::{ChangeVersion, HookInfo, HookKind, RelationId};

use crate::error::{Error, Result};
use crate::state::State;

/// On-disk record of a single member unit.
#[derive(Debug, Default, Serialize, Deserialize)]
struct DiskInfo {
    #[serde(rename = "change-version", default)]
    change_version: Option<ChangeVersion>,
    #[serde(rename = "changed-pending", default, skip_serializing_if = "is_false")]
    changed_pending: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

/// Name of the file holding `unit`'s record (`mysql/0` becomes `mysql-0`).
pub fn unit_file_name(unit: &str) -> String {
    unit.replacen('/', "-", 1)
}

/// Unit name encoded by a state file name, if the name is one.
///
/// Only names ending in `-<integer>` are unit files.
pub fn unit_name_from_file(file_name: &str) -> Option<String> {
    let (application, number) = file_name.rsplit_once('-')?;
    if application.is_empty() || number.parse::<u64>().is_err() {
        return None;
    }
    Some(format!("{application}/{number}"))
}

/// Whether `unit` survives the trip to a state file name and back.
/// Records for other names would be skipped when the directory is read.
pub fn is_storable_unit_name(unit: &str) -> bool {
    unit_name_from_file(&unit_file_name(unit)).as_deref() == Some(unit)
}

/// Durable state for one relation.
#[derive(Debug, Clone)]
pub struct StateDir {
    path: PathBuf,
    state: State,
    removed: bool,
}

impl StateDir {
    /// Load the state for `relation_id` from `relations_dir`.
    ///
    /// A relation without a directory loads as an empty record; the
    /// directory is only created by [`StateDir::ensure`].
    pub fn read(relations_dir: &Path, relation_id: RelationId) -> Result<Self> {
        let path = relations_dir.join(relation_id.to_string());
        let mut state = State::new(relation_id);

        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    path,
                    state,
                    removed: false,
                });
            }
            Err(e) => return Err(Error::state_load(&path, e.to_string())),
        };

        // Sorted so that a double pending marker is reported deterministically.
        let mut units = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::state_load(&path, e.to_string()))?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(unit) = unit_name_from_file(&file_name) {
                units.insert(unit, file_name);
            }
        }

        for (unit, file_name) in units {
            let content = fs::read_to_string(path.join(&file_name))
                .map_err(|e| Error::state_load(&path, format!("invalid unit file {file_name:?}: {e}")))?;
            let info: DiskInfo = serde_yaml::from_str(&content)
                .map_err(|e| Error::state_load(&path, format!("invalid unit file {file_name:?}: {e}")))?;
            let Some(version) = info.change_version else {
                return Err(Error::state_load(
                    &path,
                    format!("invalid unit file {file_name:?}: \"change-version\" not set"),
                ));
            };
            if info.changed_pending {
                if state.has_changed_pending() {
                    return Err(Error::state_load(
                        &path,
                        format!(
                            "{:?} and {unit:?} both have pending changed hooks",
                            state.changed_pending
                        ),
                    ));
                }
                state.changed_pending.clone_from(&unit);
            }
            state.members.insert(unit, version);
        }

        Ok(Self {
            path,
            state,
            removed: false,
        })
    }

    /// Directory holding this relation's records.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state as last loaded or written.
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Whether [`StateDir::remove`] has completed.
    pub const fn is_removed(&self) -> bool {
        self.removed
    }

    /// Returns an error if `info` cannot be committed to this record. Once
    /// the record is removed every hook is rejected.
    pub fn validate(&self, info: &HookInfo) -> Result<()> {
        if self.removed {
            return Err(Error::inappropriate_hook(
                info.kind,
                &info.remote_unit,
                format!("relation state {} already removed", self.path.display()),
            ));
        }
        self.state.validate(info)
    }

    /// Create the directory if it does not exist yet.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.path).map_err(|e| Error::state_load(&self.path, e.to_string()))
    }

    /// Persist the effect of a committed hook, then update the in-memory
    /// state. When `mark_changed_pending` is set, a committed join also
    /// records that a `relation-changed` hook is owed for the unit.
    pub fn write(&mut self, info: &HookInfo, mark_changed_pending: bool) -> Result<()> {
        match info.kind {
            HookKind::RelationBroken => return self.remove(),
            HookKind::RelationDeparted => {
                let file = self.path.join(unit_file_name(&info.remote_unit));
                match fs::remove_file(&file) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(self.write_error(info, e)),
                }
            }
            HookKind::RelationJoined | HookKind::RelationChanged => {
                if !is_storable_unit_name(&info.remote_unit) {
                    return Err(Error::state_write(
                        info.kind,
                        &info.remote_unit,
                        &self.path,
                        "unit name has no state file form",
                    ));
                }
                let pending = mark_changed_pending && info.kind == HookKind::RelationJoined;
                let record = DiskInfo {
                    change_version: Some(info.change_version),
                    changed_pending: pending,
                };
                self.write_unit_file(&info.remote_unit, &record)
                    .map_err(|e| self.write_error(info, e))?;
                if pending {
                    self.state.apply(info);
                    self.state.changed_pending.clone_from(&info.remote_unit);
                    debug!(
                        relation_id = %self.state.relation_id,
                        unit = %info.remote_unit,
                        "recorded pending relation-changed after join"
                    );
                    return Ok(());
                }
            }
            kind => return Err(Error::NotRelationHook { kind }),
        }
        self.state.apply(info);
        Ok(())
    }

    /// Delete the relation's directory and everything in it. A directory
    /// that is already gone is not an error.
    pub fn remove(&mut self) -> Result<()> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::state_remove(&self.path, e.to_string())),
        }
        self.state.apply(&HookInfo::broken(self.state.relation_id));
        self.removed = true;
        debug!(path = %self.path.display(), "removed relation state");
        Ok(())
    }

    fn write_unit_file(&self, unit: &str, record: &DiskInfo) -> io::Result<()> {
        let yaml = serde_yaml::to_string(record).map_err(io::Error::other)?;
        let mut tmp = NamedTempFile::new_in(&self.path)?;
        tmp.write_all(yaml.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path.join(unit_file_name(unit)))
            .map_err(|e| e.error)?;
        Ok(())
    }

    fn write_error(&self, info: &HookInfo, err: io::Error) -> Error {
        Error::state_write(info.kind, &info.remote_unit, &self.path, err.to_string())
    }
}

/// Load every relation state directory under `relations_dir`.
///
/// Entries whose names are not relation ids are ignored. A missing
/// `relations_dir` yields an empty map.
pub fn read_all_state_dirs(relations_dir: &Path) -> Result<BTreeMap<RelationId, StateDir>> {
    let entries = match fs::read_dir(relations_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(Error::state_load(relations_dir, e.to_string())),
    };

    let mut dirs = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::state_load(relations_dir, e.to_string()))?;
        let Ok(relation_id) = entry.file_name().to_string_lossy().parse::<RelationId>() else {
            continue;
        };
        dirs.insert(relation_id, StateDir::read(relations_dir, relation_id)?);
    }
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn rel() -> RelationId {
        RelationId::new(7)
    }

    fn ensured(root: &TempDir) -> Result<StateDir> {
        let dir = StateDir::read(root.path(), rel())?;
        dir.ensure()?;
        Ok(dir)
    }

    #[test]
    fn test_unit_file_names() {
        assert_eq!(unit_file_name("mysql/0"), "mysql-0");
        assert_eq!(unit_file_name("wordpress-blue/12"), "wordpress-blue-12");
        assert_eq!(unit_name_from_file("wordpress-blue-12").as_deref(), Some("wordpress-blue/12"));
        assert_eq!(unit_name_from_file("mysql"), None);
        assert_eq!(unit_name_from_file("mysql-x"), None);
        assert_eq!(unit_name_from_file("-3"), None);
    }

    #[test]
    fn test_missing_dir_reads_empty() -> TestResult {
        let root = TempDir::new()?;
        let dir = StateDir::read(root.path(), rel())?;
        assert!(dir.state().members.is_empty());
        assert!(!dir.path().exists());
        Ok(())
    }

    #[test]
    fn test_write_then_reread() -> TestResult {
        let root = TempDir::new()?;
        let mut dir = ensured(&root)?;

        dir.write(&HookInfo::joined(rel(), "mysql/0", 1), false)?;
        dir.write(&HookInfo::joined(rel(), "mysql/1", 2), false)?;
        dir.write(&HookInfo::changed(rel(), "mysql/0", 9), false)?;
        dir.write(&HookInfo::departed(rel(), "mysql/1", 2), false)?;

        let reread = StateDir::read(root.path(), rel())?;
        assert_eq!(reread.state(), dir.state());
        assert_eq!(reread.state().members.get("mysql/0"), Some(&9));
        assert!(!reread.state().members.contains_key("mysql/1"));
        Ok(())
    }

    #[test]
    fn test_join_with_pending_marker_survives_restart() -> TestResult {
        let root = TempDir::new()?;
        let mut dir = ensured(&root)?;

        dir.write(&HookInfo::joined(rel(), "mysql/0", 4), true)?;
        assert_eq!(dir.state().changed_pending, "mysql/0");

        let reread = StateDir::read(root.path(), rel())?;
        assert_eq!(reread.state().changed_pending, "mysql/0");

        dir.write(&HookInfo::changed(rel(), "mysql/0", 4), true)?;
        let reread = StateDir::read(root.path(), rel())?;
        assert!(!reread.state().has_changed_pending());
        Ok(())
    }

    #[test]
    fn test_broken_removes_directory() -> TestResult {
        let root = TempDir::new()?;
        let mut dir = ensured(&root)?;
        dir.write(&HookInfo::broken(rel()), false)?;
        assert!(dir.is_removed());
        assert!(!dir.path().exists());
        // removing twice is fine
        dir.remove()?;
        Ok(())
    }

    #[test]
    fn test_unstorable_unit_name_never_written() -> TestResult {
        let root = TempDir::new()?;
        let mut dir = ensured(&root)?;

        let result = dir.write(&HookInfo::joined(rel(), "a", 1), false);

        assert!(matches!(result, Err(Error::StateWrite { .. })));
        assert!(dir.state().members.is_empty());
        assert!(fs::read_dir(dir.path())?.next().is_none());
        assert!(!is_storable_unit_name("a"));
        assert!(is_storable_unit_name("mysql/0"));
        Ok(())
    }

    #[test]
    fn test_failed_write_leaves_state_untouched() -> TestResult {
        let root = TempDir::new()?;
        // Never ensured, so the directory does not exist.
        let mut dir = StateDir::read(root.path(), rel())?;

        let result = dir.write(&HookInfo::joined(rel(), "mysql/0", 1), false);

        assert!(matches!(result, Err(Error::StateWrite { .. })));
        assert!(dir.state().members.is_empty());
        assert!(!dir.path().exists());
        Ok(())
    }

    #[test]
    fn test_removed_record_rejects_hooks() -> TestResult {
        let root = TempDir::new()?;
        let mut dir = ensured(&root)?;
        assert!(dir.validate(&HookInfo::joined(rel(), "mysql/0", 1)).is_ok());

        dir.remove()?;

        for info in [
            HookInfo::joined(rel(), "mysql/0", 1),
            HookInfo::broken(rel()),
        ] {
            assert!(matches!(
                dir.validate(&info),
                Err(Error::InappropriateHook { .. })
            ));
        }
        Ok(())
    }

    #[test]
    fn test_invalid_unit_file_rejected() -> TestResult {
        let root = TempDir::new()?;
        let dir = ensured(&root)?;
        fs::write(dir.path().join("mysql-0"), "changed-pending: true\n")
            ?;
        assert!(matches!(
            StateDir::read(root.path(), rel()),
            Err(Error::StateLoad { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_two_pending_markers_rejected() -> TestResult {
        let root = TempDir::new()?;
        let dir = ensured(&root)?;
        for name in ["mysql-0", "mysql-1"] {
            fs::write(dir.path().join(name), "change-version: 1\nchanged-pending: true\n")
                ?;
        }
        assert!(StateDir::read(root.path(), rel()).is_err());
        Ok(())
    }

    #[test]
    fn test_read_all_ignores_foreign_entries() -> TestResult {
        let root = TempDir::new()?;
        for name in ["1", "22", "not-a-relation"] {
            fs::create_dir_all(root.path().join(name))
                ?;
        }
        fs::write(root.path().join("22").join("README"), "ignored")
            ?;

        let dirs = read_all_state_dirs(root.path())?;
        let ids: Vec<u64> = dirs.keys().map(|id| id.get()).collect();
        assert_eq!(ids, vec![1, 22]);
        Ok(())
    }

    #[test]
    fn test_read_all_missing_root() -> TestResult {
        let root = TempDir::new()?;
        let dirs = read_all_state_dirs(&root.path().join("absent"))?;
        assert!(dirs.is_empty());
        Ok(())
    }
}
