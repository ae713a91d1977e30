//! Configuration for the relation engine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where the relation engine keeps its state and finds the charm.
///
/// ```yaml
/// relations-dir: /var/lib/agents/unit-wordpress-0/state/relations
/// charm-dir: /var/lib/agents/unit-wordpress-0/charm
/// changed-after-join: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelationsConfig {
    /// Root of the per-relation state directories.
    pub relations_dir: PathBuf,
    /// Deployed charm, consulted for implemented endpoints.
    pub charm_dir: PathBuf,
    /// Owe a `relation-changed` hook after each committed `relation-joined`.
    #[serde(default)]
    pub changed_after_join: bool,
}

impl RelationsConfig {
    pub fn new(relations_dir: impl Into<PathBuf>, charm_dir: impl Into<PathBuf>) -> Self {
        Self {
            relations_dir: relations_dir.into(),
            charm_dir: charm_dir.into(),
            changed_after_join: false,
        }
    }

    #[must_use]
    pub fn changed_after_join(mut self, enabled: bool) -> Self {
        self.changed_after_join = enabled;
        self
    }

    /// Load and validate configuration from a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| Error::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.relations_dir.as_os_str().is_empty() {
            return Err(Error::invalid_config("relations-dir must not be empty"));
        }
        if self.charm_dir.as_os_str().is_empty() {
            return Err(Error::invalid_config("charm-dir must not be empty"));
        }
        Ok(())
    }
}
