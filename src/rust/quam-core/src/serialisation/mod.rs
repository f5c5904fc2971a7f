// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Persistence of trees as dictionary documents.

mod json;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::Result;
use crate::node::Node;
use crate::value::Value;

pub use json::{DEFAULT_FILENAME, DEFAULT_FOLDERNAME, JsonSerialiser, STATE_PATH_ENV_NAME};

/// Per-call overrides of a save.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Top-level key to file name mapping, replacing the serialiser's.
    pub content_mapping: Option<IndexMap<String, String>>,
    pub include_defaults: Option<bool>,
    /// Top-level keys left out of the saved document.
    pub ignore: Vec<String>,
}

/// What a load found out about the layout of the saved state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadMetadata {
    /// Top-level key to file name, for keys not stored in the default file.
    pub content_mapping: IndexMap<String, String>,
    pub default_filename: Option<String>,
    pub default_foldername: Option<PathBuf>,
}

pub trait Serialiser {
    fn save(&self, root: &Node, path: Option<&Path>, options: &SaveOptions) -> Result<()>;

    /// Load the dictionary representation of a tree.
    fn load(&self, path: Option<&Path>) -> Result<(Value, LoadMetadata)>;
}
