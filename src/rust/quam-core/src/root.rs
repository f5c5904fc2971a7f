// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Whole-tree operations anchored at a root node.

use std::ops::Deref;
use std::path::Path;
use std::rc::Rc;

use crate::config::{self, QuaConfig};
use crate::dataclass::ClassSchema;
use crate::error::{Error, Result};
use crate::instantiate::{InstantiateOptions, instantiate};
use crate::node::{Node, NodeKind};
use crate::registry::ClassRegistry;
use crate::serialisation::{JsonSerialiser, SaveOptions, Serialiser};
use crate::serialize::{ToDictOptions, to_dict, to_json};
use crate::settings::QuamSettings;
use crate::value::Value;

/// Where [`QuamRoot::load`] takes the saved state from.
#[derive(Debug, Clone, Copy)]
pub enum LoadSource<'a> {
    /// The default state path of the serialiser.
    DefaultPath,
    /// A JSON file, or a folder of JSON files.
    Path(&'a Path),
    /// An already parsed dictionary representation.
    Contents(&'a Value),
}

impl<'a> From<&'a Path> for LoadSource<'a> {
    fn from(path: &'a Path) -> Self {
        LoadSource::Path(path)
    }
}

impl<'a> From<&'a Value> for LoadSource<'a> {
    fn from(contents: &'a Value) -> Self {
        LoadSource::Contents(contents)
    }
}

/// Handle on the root of a tree.
#[derive(Debug, Clone)]
pub struct QuamRoot(Node);

impl QuamRoot {
    pub fn new(node: Node) -> Result<Self> {
        if !node.is_root() {
            return Err(Error::WrongNodeKind {
                expected: NodeKind::Root.to_string(),
                found: node.class_name(),
            });
        }
        Ok(QuamRoot(node))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn into_node(self) -> Node {
        self.0
    }

    pub fn settings(&self) -> QuamSettings {
        self.0.settings().unwrap_or_default()
    }

    pub fn set_settings(&self, settings: QuamSettings) -> Result<()> {
        self.0.set_settings(settings)
    }

    /// Serialiser configured by the settings of this tree.
    pub fn serialiser(&self) -> JsonSerialiser {
        JsonSerialiser::from_settings(&self.settings())
    }

    pub fn to_dict(&self, options: ToDictOptions) -> Result<Value> {
        to_dict(&self.0, options)
    }

    pub fn to_json(&self, options: ToDictOptions) -> Result<serde_json::Value> {
        to_json(&self.0, options)
    }

    pub fn iterate_components(&self) -> Vec<Node> {
        config::iterate_components(&self.0)
    }

    pub fn generate_config(&self) -> Result<QuaConfig> {
        config::generate_config(&self.0)
    }

    /// Save the whole tree to `path`, or to the default state path.
    ///
    /// A `.json` path receives a single file, a path without suffix is a
    /// folder in which the top-level entries are split by the content mapping.
    pub fn save(&self, path: Option<&Path>, options: &SaveOptions) -> Result<()> {
        self.serialiser().save(&self.0, path, options)
    }

    /// Load a tree of class `class`.
    ///
    /// The new root takes its settings from `QUAM_CONFIG_PATH`, which also
    /// provides the default state path.
    pub fn load(
        registry: &ClassRegistry,
        class: &Rc<ClassSchema>,
        source: LoadSource<'_>,
        options: InstantiateOptions,
    ) -> Result<Self> {
        let settings = QuamSettings::from_env()?;
        let serialiser = JsonSerialiser::from_settings(&settings);
        let loaded;
        let contents = match source {
            LoadSource::Contents(contents) => contents,
            LoadSource::Path(path) => {
                loaded = serialiser.load(Some(path))?.0;
                &loaded
            }
            LoadSource::DefaultPath => {
                loaded = serialiser.load(None)?.0;
                &loaded
            }
        };
        let root = QuamRoot::new(instantiate(registry, class, contents, options)?)?;
        root.set_settings(settings)?;
        quam_log::diagnostic!(
            "Loaded {} with {} components",
            class.tag(),
            root.iterate_components().len()
        );
        Ok(root)
    }
}

impl Deref for QuamRoot {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0
    }
}

impl TryFrom<Node> for QuamRoot {
    type Error = Error;

    fn try_from(node: Node) -> Result<Self> {
        QuamRoot::new(node)
    }
}

impl From<QuamRoot> for Value {
    fn from(root: QuamRoot) -> Value {
        Value::Node(root.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    use crate::dataclass::{ClassDef, FieldSpec, FieldType};

    fn registry() -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        registry
            .register(
                ClassDef::component("test.Qubit").field(FieldSpec::new("freq", FieldType::Float)),
            )
            .unwrap();
        registry
            .register(
                ClassDef::root("test.Machine")
                    .field(
                        FieldSpec::new(
                            "qubits",
                            FieldType::dict_of(FieldType::component("test.Qubit")),
                        )
                            .with_factory(|| Value::Map(IndexMap::new())),
                    )
                    .field(
                        FieldSpec::new("wiring", FieldType::dict())
                            .with_factory(|| Value::Map(IndexMap::new())),
                    )
                    .field(FieldSpec::new("active", FieldType::Any).with_default(Value::None)),
            )
            .unwrap();
        registry
    }

    fn state() -> Value {
        Value::from_json(json!({
            "qubits": {"q0": {"freq": 5.0}, "q1": {"freq": 6.0}},
            "wiring": {"q0": {"port": 1}},
            "active": "#/qubits/q1",
            "__class__": "test.Machine",
        }))
    }

    #[test]
    fn test_rejects_non_root() {
        let registry = registry();
        let qubit = registry
            .resolve("test.Qubit")
            .unwrap()
            .construct([("freq", Value::Float(1.0))])
            .unwrap();
        assert!(matches!(QuamRoot::new(qubit), Err(Error::WrongNodeKind { .. })));
    }

    #[test]
    fn test_load_from_contents() {
        let registry = registry();
        let class = registry.resolve("test.Machine").unwrap();
        let state = state();
        let root = QuamRoot::load(
            &registry,
            &class,
            (&state).into(),
            InstantiateOptions::default(),
        )
        .unwrap();
        let active = root.get("active").unwrap().into_node().unwrap();
        assert_eq!(active.get("freq").unwrap(), Value::Float(6.0));
        assert!(active.root().unwrap().ptr_eq(&root));
        assert_eq!(root.iterate_components().len(), 2);
    }

    #[test]
    fn test_save_and_load_single_file() {
        let registry = registry();
        let class = registry.resolve("test.Machine").unwrap();
        let state = state();
        let root = QuamRoot::load(
            &registry,
            &class,
            (&state).into(),
            InstantiateOptions::default(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");
        root.save(Some(&path), &SaveOptions::default()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n    \"qubits\""));

        let loaded = QuamRoot::load(
            &registry,
            &class,
            path.as_path().into(),
            InstantiateOptions::default(),
        )
        .unwrap();
        assert_eq!(
            loaded.to_json(ToDictOptions::default()).unwrap(),
            root.to_json(ToDictOptions::default()).unwrap()
        );
        assert_eq!(loaded.get_raw("active").unwrap(), Value::from("#/qubits/q1"));
    }

    #[test]
    fn test_save_split_folder() {
        quam_log::testing::install();
        let registry = registry();
        let class = registry.resolve("test.Machine").unwrap();
        let state = state();
        let root = QuamRoot::load(
            &registry,
            &class,
            (&state).into(),
            InstantiateOptions::default(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("quam_state");
        let options = SaveOptions {
            content_mapping: Some(IndexMap::from([
                ("wiring".to_string(), "wiring.json".to_string()),
                ("missing".to_string(), "missing.json".to_string()),
            ])),
            include_defaults: Some(false),
            ignore: vec!["active".to_string()],
        };
        root.save(Some(&folder), &options).unwrap();
        assert_eq!(quam_log::testing::take_warnings().len(), 1);

        let wiring = std::fs::read_to_string(folder.join("wiring.json")).unwrap();
        let wiring: serde_json::Value = serde_json::from_str(&wiring).unwrap();
        assert_eq!(wiring, json!({"wiring": {"q0": {"port": 1}}}));
        let rest = std::fs::read_to_string(folder.join("state.json")).unwrap();
        let rest: serde_json::Value = serde_json::from_str(&rest).unwrap();
        assert_eq!(
            rest,
            json!({
                "qubits": {"q0": {"freq": 5.0}, "q1": {"freq": 6.0}},
                "__class__": "test.Machine",
            })
        );

        let (_, metadata) = JsonSerialiser::default().load(Some(&folder)).unwrap();
        assert_eq!(
            metadata.content_mapping,
            IndexMap::from([("wiring".to_string(), "wiring.json".to_string())])
        );
        let loaded = QuamRoot::load(
            &registry,
            &class,
            folder.as_path().into(),
            InstantiateOptions::default(),
        )
        .unwrap();
        assert_eq!(loaded.get_raw("active").unwrap(), Value::None);
    }

    #[test]
    fn test_unsupported_suffix() {
        let registry = registry();
        let machine = registry.resolve("test.Machine").unwrap();
        let root = QuamRoot::new(machine.construct::<&str>([]).unwrap()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(root.save(Some(&dir.path().join("state.yaml")), &SaveOptions::default()).is_err());
    }
}
