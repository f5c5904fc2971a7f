// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use super::{LoadMetadata, SaveOptions, Serialiser};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::serialize::{ToDictOptions, to_json};
use crate::settings::QuamSettings;
use crate::value::Value;

pub const DEFAULT_FILENAME: &str = "state.json";
pub const DEFAULT_FOLDERNAME: &str = "quam_state";
pub const STATE_PATH_ENV_NAME: &str = "QUAM_STATE_PATH";

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Saves trees to a single JSON file, or to a folder with the top-level
/// entries split across files.
#[derive(Debug, Clone, Default)]
pub struct JsonSerialiser {
    /// Top-level key to file name, relative to the state folder.
    pub content_mapping: IndexMap<String, String>,
    pub include_defaults: bool,
    /// Save/load location taking precedence over the environment and the
    /// settings.
    pub state_path: Option<PathBuf>,
    settings_state_path: Option<PathBuf>,
}

impl JsonSerialiser {
    pub fn new(
        content_mapping: IndexMap<String, String>,
        include_defaults: bool,
        state_path: Option<PathBuf>,
    ) -> Self {
        JsonSerialiser {
            content_mapping,
            include_defaults,
            state_path,
            settings_state_path: None,
        }
    }

    /// Serialiser configured by the settings of a tree.
    pub fn from_settings(settings: &QuamSettings) -> Self {
        JsonSerialiser {
            include_defaults: settings.include_defaults_in_save,
            settings_state_path: settings.state_path.clone(),
            ..JsonSerialiser::default()
        }
    }

    /// Default location: the serialiser's `state_path`, then
    /// `QUAM_STATE_PATH`, then the settings, then the working directory.
    pub fn default_state_path(&self) -> Result<PathBuf> {
        self.resolve_state_path(std::env::var_os(STATE_PATH_ENV_NAME))
    }

    fn resolve_state_path(&self, env_path: Option<OsString>) -> Result<PathBuf> {
        if let Some(path) = &self.state_path {
            return Ok(std::path::absolute(path)?);
        }
        if let Some(path) = env_path.filter(|p| !p.is_empty()) {
            return Ok(std::path::absolute(PathBuf::from(path))?);
        }
        if let Some(path) = &self.settings_state_path {
            return Ok(std::path::absolute(path)?);
        }
        let default = if self.content_mapping.is_empty() {
            quam_log::warn!(
                "No state path found via serialiser, environment, or config. \
                Defaulting to file '{}' in the current directory.",
                DEFAULT_FILENAME
            );
            PathBuf::from(DEFAULT_FILENAME)
        } else {
            quam_log::warn!(
                "No state path found via serialiser, environment, or config. \
                Defaulting to folder '{}' in the current directory because content_mapping is \
                defined.",
                DEFAULT_FOLDERNAME
            );
            PathBuf::from(DEFAULT_FOLDERNAME)
        };
        Ok(std::path::absolute(default)?)
    }

    fn save_split_content(
        &self,
        mut contents: JsonMap,
        folder: &Path,
        content_mapping: &IndexMap<String, String>,
    ) -> Result<()> {
        let mut files: IndexMap<PathBuf, JsonMap> = IndexMap::new();
        for (key, filename) in content_mapping {
            let Some(value) = contents.shift_remove(key) else {
                quam_log::warn!(
                    "Key '{}' specified in content_mapping was not found in the QUAM object's data",
                    key
                );
                continue;
            };
            let file = Path::new(filename);
            let path = if file.is_absolute() {
                quam_log::warn!(
                    "Absolute path '{}' in content_mapping is ignored. \
                    Using filename part only relative to '{}'.",
                    filename,
                    folder.display()
                );
                folder.join(file.file_name().unwrap_or(file.as_os_str()))
            } else {
                folder.join(file)
            };
            files.entry(path).or_default().insert(key.clone(), value);
        }
        for (path, file_contents) in files {
            save_json(&serde_json::Value::Object(file_contents), &path)?;
        }
        if !contents.is_empty() {
            save_json(&serde_json::Value::Object(contents), &folder.join(DEFAULT_FILENAME))?;
        }
        Ok(())
    }
}

impl Serialiser for JsonSerialiser {
    fn save(&self, root: &Node, path: Option<&Path>, options: &SaveOptions) -> Result<()> {
        let mut content_mapping = options
            .content_mapping
            .clone()
            .unwrap_or_else(|| self.content_mapping.clone());
        let include_defaults = options.include_defaults.unwrap_or(self.include_defaults);
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.default_state_path()?,
        };

        let contents = to_json(
            root,
            ToDictOptions {
                include_defaults,
                ..ToDictOptions::default()
            },
        )?;
        let serde_json::Value::Object(mut contents) = contents else {
            return Err(Error::new(format!("Cannot save {}: not a dictionary", root.describe())));
        };
        for key in &options.ignore {
            contents.shift_remove(key);
            content_mapping.shift_remove(key);
        }

        match path.extension() {
            Some(ext) if ext == "json" => save_json(&serde_json::Value::Object(contents), &path),
            None => self.save_split_content(contents, &path, &content_mapping),
            Some(ext) => Err(Error::new(format!(
                "Cannot save QUAM: Unsupported path suffix '.{}'",
                ext.to_string_lossy()
            ))),
        }
    }

    fn load(&self, path: Option<&Path>) -> Result<(Value, LoadMetadata)> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.default_state_path()?,
        };
        if path.is_file() {
            let contents = load_from_file(&path)?;
            let metadata = LoadMetadata {
                default_filename: path.file_name().map(|n| n.to_string_lossy().into_owned()),
                ..LoadMetadata::default()
            };
            Ok((Value::from_json(serde_json::Value::Object(contents)), metadata))
        } else if path.is_dir() {
            let (contents, metadata) = load_from_directory(&path)?;
            Ok((Value::from_json(serde_json::Value::Object(contents)), metadata))
        } else {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Path {} not found, cannot load JSON.", path.display()),
            )))
        }
    }
}

fn save_json(contents: &serde_json::Value, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    contents.serialize(&mut serializer)?;
    std::fs::write(path, buffer)?;
    quam_log::info!("Saved state to {}", path.display());
    Ok(())
}

fn load_from_file(path: &Path) -> Result<JsonMap> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(Error::new(format!("File {} is not a JSON file.", path.display())));
    }
    let text = std::fs::read_to_string(path)?;
    match serde_json::from_str(&text)? {
        serde_json::Value::Object(contents) => Ok(contents),
        _ => Err(Error::new(format!(
            "File {} does not contain a valid JSON dictionary.",
            path.display()
        ))),
    }
}

/// JSON files below `folder`, skipping hidden folders, in path order.
fn find_json_files(folder: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = std::fs::read_dir(folder)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            let hidden = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with('.'));
            if !hidden {
                find_json_files(&path, files)?;
            }
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    Ok(())
}

fn load_from_directory(folder: &Path) -> Result<(JsonMap, LoadMetadata)> {
    let mut contents = JsonMap::new();
    let mut metadata = LoadMetadata {
        default_foldername: Some(std::path::absolute(folder)?),
        ..LoadMetadata::default()
    };
    let mut files = Vec::new();
    find_json_files(folder, &mut files)?;
    if files.is_empty() {
        quam_log::warn!("No JSON files found in directory {}", folder.display());
        return Ok((contents, metadata));
    }

    let mut mapping: IndexMap<String, String> = IndexMap::new();
    let mut processed = 0;
    for file in &files {
        let file_contents = match load_from_file(file) {
            Ok(file_contents) if !file_contents.is_empty() => file_contents,
            Ok(_) => {
                quam_log::warn!("Skipping empty or invalid JSON file: {}", file.display());
                continue;
            }
            Err(err) => {
                quam_log::warn!("Skipping file {} due to error: {}", file.display(), err);
                continue;
            }
        };
        processed += 1;
        let relative = file
            .strip_prefix(folder)
            .unwrap_or(file)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let conflicts: Vec<&String> = file_contents
            .keys()
            .filter(|key| contents.contains_key(*key))
            .collect();
        if !conflicts.is_empty() {
            quam_log::warn!(
                "Key conflicts detected: Components {:?} found in '{}' overwrite existing \
                definitions. Using definition from '{}'.",
                conflicts,
                relative,
                relative
            );
        }
        for (key, value) in file_contents {
            mapping.insert(key.clone(), relative.clone());
            contents.insert(key, value);
        }
        if file.parent() == Some(folder)
            && file.file_name().is_some_and(|n| n == DEFAULT_FILENAME)
        {
            metadata.default_filename = Some(DEFAULT_FILENAME.to_string());
        }
    }
    if processed == 0 {
        quam_log::warn!(
            "Found {} JSON files in {}, but none contained valid data.",
            files.len(),
            folder.display()
        );
    }
    mapping.retain(|_, file| file != DEFAULT_FILENAME);
    metadata.content_mapping = mapping;
    Ok((contents, metadata))
}
