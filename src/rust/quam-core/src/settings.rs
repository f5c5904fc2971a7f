// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Operating settings of a QUAM tree.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const CONFIG_PATH_ENV_NAME: &str = "QUAM_CONFIG_PATH";
pub const SUPPORTED_VERSION: u32 = 3;
/// Section holding the QUAM settings in a shared config file.
const CONFIG_KEY: &str = "quam";

/// What to do when a reference cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingReferencePolicy {
    /// Fail with [`Error::ReferenceResolution`].
    Raise,
    /// Log a warning and return the raw reference string.
    #[default]
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuamSettings {
    pub version: u32,
    pub state_path: Option<PathBuf>,
    pub raise_error_missing_reference: bool,
    pub include_defaults_in_save: bool,
}

impl Default for QuamSettings {
    fn default() -> Self {
        QuamSettings {
            version: SUPPORTED_VERSION,
            state_path: None,
            raise_error_missing_reference: false,
            include_defaults_in_save: true,
        }
    }
}

impl QuamSettings {
    /// Read settings from a JSON file.
    ///
    /// The settings may either be the whole document or its `quam` section.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut document: serde_json::Value = serde_json::from_str(&contents)?;
        if let Some(section) = document.get_mut(CONFIG_KEY) {
            document = section.take();
        }
        if document.get("version").is_none() {
            return Err(Error::new(format!(
                "QUAM config {} is missing the 'version' field",
                path.display()
            )));
        }
        let settings: QuamSettings = serde_json::from_value(document)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings from the file named by `QUAM_CONFIG_PATH`, or the defaults when
    /// the variable is unset or the file does not exist.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_PATH_ENV_NAME) {
            Some(path) if Path::new(&path).is_file() => QuamSettings::from_file(Path::new(&path)),
            _ => Ok(QuamSettings::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version < SUPPORTED_VERSION {
            return Err(Error::new(format!(
                "Config version ({}) is older than the supported version ({SUPPORTED_VERSION})",
                self.version
            )));
        }
        if self.version > SUPPORTED_VERSION {
            return Err(Error::new(format!(
                "QUAM (v{SUPPORTED_VERSION}) is older than the config (v{})",
                self.version
            )));
        }
        Ok(())
    }

    pub fn missing_reference_policy(&self) -> MissingReferencePolicy {
        if self.raise_error_missing_reference {
            MissingReferencePolicy::Raise
        } else {
            MissingReferencePolicy::Warn
        }
    }
}
