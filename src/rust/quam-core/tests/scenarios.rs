// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::json;

use quam_core::{
    ClassDef, ClassRegistry, ComponentBehavior, Error, FieldSpec, FieldType, InstantiateOptions,
    LoadSource, Node, QuaConfig, QuamDict, QuamList, QuamRoot, QuamSettings, Result, ToDictOptions,
    Value, join_references,
};

/// Records the order in which components are applied to the config.
#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<String>>>);

impl ComponentBehavior for Recorder {
    fn apply_to_config(&self, component: &Node, config: &mut QuaConfig) -> Result<()> {
        let name = component.get("name")?.as_str().unwrap_or_default().to_string();
        config["elements"][name.as_str()] = json!({"operations": {}});
        self.0.borrow_mut().push(name);
        Ok(())
    }
}

fn registry(recorder: &Recorder) -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    registry
        .register(
            ClassDef::component("lab.Transmon")
                .field(FieldSpec::new("name", FieldType::Str))
                .field(FieldSpec::new("frequency", FieldType::Float).with_default(5e9))
                .field(FieldSpec::new("flux", FieldType::Any).with_default(Value::None))
                .behavior(recorder.clone()),
        )
        .unwrap();
    registry
        .register(
            ClassDef::root("lab.Machine")
                .field(
                    FieldSpec::new(
                        "qubits",
                        FieldType::dict_of(FieldType::component("lab.Transmon")),
                    )
                        .with_factory(|| Value::Map(IndexMap::new())),
                )
                .field(
                    FieldSpec::new(
                        "active",
                        FieldType::list_of(FieldType::component("lab.Transmon")),
                    )
                        .with_factory(|| Value::Seq(Vec::new())),
                )
                .field(
                    FieldSpec::new(
                        "readout",
                        FieldType::optional(FieldType::component("lab.Transmon")),
                    )
                        .with_default(Value::None),
                )
                .field(FieldSpec::new("other_ref", FieldType::Any).with_default(Value::None)),
        )
        .unwrap();
    registry
}

fn machine(registry: &ClassRegistry) -> QuamRoot {
    let contents = Value::from_json(json!({
        "qubits": {
            "q0": {"name": "q0", "frequency": 4.5e9},
            "q1": {"name": "q1", "flux": "#../q0/frequency"},
        },
        "active": ["#/qubits/q0", "#/qubits/q1"],
        "other_ref": "#/qubits/q0/frequency",
    }));
    let class = registry.resolve("lab.Machine").unwrap();
    QuamRoot::load(
        registry,
        &class,
        LoadSource::Contents(&contents),
        InstantiateOptions::default(),
    )
    .unwrap()
}

#[test]
fn test_dict_relative_reference() {
    let dict = QuamDict::from_entries([("a", Value::Int(1)), ("b", Value::from("#./a"))]).unwrap();
    assert_eq!(dict.get("b").unwrap(), Value::Int(1));
    assert_eq!(dict.get_raw("b").unwrap(), Value::from("#./a"));
}

#[test]
fn test_missing_reference_policy() {
    quam_log::testing::install();
    let registry = registry(&Recorder::default());
    let root = machine(&registry);
    let qubits = QuamDict::try_from(root.get("qubits").unwrap()).unwrap();
    qubits.insert("c", "#/nonexistent").unwrap();

    assert_eq!(qubits.get("c").unwrap(), Value::from("#/nonexistent"));
    assert_eq!(quam_log::testing::take_warnings().len(), 1);

    root.set_settings(QuamSettings {
        raise_error_missing_reference: true,
        ..QuamSettings::default()
    })
    .unwrap();
    assert!(matches!(
        qubits.get("c"),
        Err(Error::ReferenceResolution { .. })
    ));
    assert!(quam_log::testing::take_warnings().is_empty());
}

#[test]
fn test_required_field_missing() {
    let mut registry = registry(&Recorder::default());
    let class = registry
        .register(
            ClassDef::component("lab.Required")
                .field(FieldSpec::new("required_val", FieldType::Int)),
        )
        .unwrap();
    let err = class.construct::<&str>([]).unwrap_err();
    assert!(matches!(
        err,
        Error::MissingRequiredField { ref field, .. } if field == "required_val"
    ));
    assert_eq!(err.to_string(), "Please provide Required.required_val as it is a required arg");
}

#[test]
fn test_join_references() {
    assert_eq!(join_references("#/a/b/c", "#../d").unwrap(), "#/a/b/d");
    assert!(join_references("#/a", "#../../d").is_err());
}

#[test]
fn test_round_trip_keeps_references() {
    let registry = registry(&Recorder::default());
    let root = machine(&registry);
    let options = ToDictOptions {
        include_defaults: true,
        ..ToDictOptions::default()
    };
    let contents = root.to_dict(options).unwrap();
    let class = registry.resolve("lab.Machine").unwrap();
    let loaded = QuamRoot::load(
        &registry,
        &class,
        (&contents).into(),
        InstantiateOptions::default(),
    )
    .unwrap();

    assert_eq!(loaded.to_json(options).unwrap(), root.to_json(options).unwrap());
    assert_eq!(loaded.get_raw("other_ref").unwrap(), Value::from("#/qubits/q0/frequency"));
    assert_eq!(loaded.get("other_ref").unwrap(), Value::Float(4.5e9));

    let q1 = QuamDict::try_from(loaded.get("qubits").unwrap())
        .unwrap()
        .get("q1")
        .unwrap()
        .into_node()
        .unwrap();
    assert_eq!(q1.get_raw("flux").unwrap(), Value::from("#../q0/frequency"));
    assert_eq!(q1.get("flux").unwrap(), Value::Float(4.5e9));
}

#[test]
fn test_shared_references_resolve_to_same_node() {
    let registry = registry(&Recorder::default());
    let root = machine(&registry);
    root.set("active", Value::seq(["#/qubits/q0", "#/qubits/q0"])).unwrap();
    let active = QuamList::try_from(root.get("active").unwrap()).unwrap();
    let first = active.get(0).unwrap().into_node().unwrap();
    let second = active.get(1).unwrap().into_node().unwrap();
    assert!(first.ptr_eq(&second));

    let class = registry.resolve("lab.Machine").unwrap();
    let duplicated = Value::from_json(json!({
        "active": [{"name": "a"}, {"name": "a"}],
    }));
    let loaded = QuamRoot::load(
        &registry,
        &class,
        (&duplicated).into(),
        InstantiateOptions::default(),
    )
    .unwrap();
    let active = QuamList::try_from(loaded.get("active").unwrap()).unwrap();
    let first = active.get(0).unwrap().into_node().unwrap();
    let second = active.get(1).unwrap().into_node().unwrap();
    assert!(!first.ptr_eq(&second));
    assert_eq!(first.get("name").unwrap(), second.get("name").unwrap());
}

#[test]
fn test_default_omission() {
    let registry = registry(&Recorder::default());
    let root = machine(&registry);
    let compact = root.to_json(ToDictOptions::default()).unwrap();
    assert_eq!(compact["qubits"]["q1"], json!({"name": "q1", "flux": "#../q0/frequency"}));
    assert!(compact.get("readout").is_none());

    let full = root
        .to_json(ToDictOptions {
            include_defaults: true,
            ..ToDictOptions::default()
        })
        .unwrap();
    assert_eq!(
        full["qubits"]["q1"],
        json!({"name": "q1", "frequency": 5e9, "flux": "#../q0/frequency"})
    );
    assert_eq!(full["readout"], json!(null));
}

#[test]
fn test_config_applies_each_component_once() {
    let recorder = Recorder::default();
    let registry = registry(&recorder);
    let root = machine(&registry);
    let q0 = QuamDict::try_from(root.get("qubits").unwrap())
        .unwrap()
        .get("q0")
        .unwrap();
    root.set("readout", "#/qubits/q0").unwrap();
    assert!(root.get("readout").unwrap() == q0);

    let config = root.generate_config().unwrap();
    assert_eq!(*recorder.0.borrow(), ["q0", "q1"]);
    assert_eq!(config["elements"]["q0"], json!({"operations": {}}));
    assert_eq!(config["version"], json!(1));
}

#[test]
fn test_config_applies_directly_shared_component_once() {
    let recorder = Recorder::default();
    let registry = registry(&recorder);
    let root = machine(&registry);
    let q2 = registry
        .resolve("lab.Transmon")
        .unwrap()
        .construct([("name", Value::from("q2"))])
        .unwrap();
    root.set("readout", &q2).unwrap();
    root.set("other_ref", Value::None).unwrap();
    root.set("other_ref", &q2).unwrap();
    assert!(q2.parent().unwrap().ptr_eq(&root));

    let components = root.iterate_components();
    assert_eq!(components.len(), 3);
    assert_eq!(components.iter().filter(|c| c.ptr_eq(&q2)).count(), 1);

    root.generate_config().unwrap();
    assert_eq!(*recorder.0.borrow(), ["q0", "q1", "q2"]);
}
