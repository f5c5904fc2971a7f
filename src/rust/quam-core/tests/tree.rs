// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::rc::Rc;

use quam_core::{
    ClassDef, ClassRegistry, ClassSchema, Error, FieldSpec, FieldType, MissingReferencePolicy, Node,
    QuamList, Value, get_referenced_value,
};

fn schema(def: ClassDef) -> Rc<ClassSchema> {
    ClassRegistry::new().register(def).unwrap()
}

fn any_fields(def: ClassDef, names: &[&str]) -> ClassDef {
    names.iter().fold(def, |def, name| {
        def.field(FieldSpec::new(*name, FieldType::Any).with_default(Value::None))
    })
}

fn root() -> Node {
    schema(any_fields(ClassDef::root("tree.Root"), &["x", "y", "z", "child", "other", "alias"]))
        .construct::<&str>([])
        .unwrap()
}

fn component() -> Node {
    schema(any_fields(ClassDef::component("tree.Leaf"), &["value", "link", "inner"]))
        .construct::<&str>([])
        .unwrap()
}

#[test]
fn test_chain_resolution_and_assignment() {
    let a = root();
    a.set("x", "#./y").unwrap();
    a.set("y", "#./z").unwrap();
    a.set("z", 42).unwrap();
    assert_eq!(a.get("x").unwrap(), Value::Int(42));
    assert_eq!(a.get("x").unwrap(), a.get("x").unwrap());

    a.set_at_reference("x", 99, false).unwrap();
    assert_eq!(a.get_raw("z").unwrap(), Value::Int(99));
    assert_eq!(a.get_raw("x").unwrap(), Value::from("#./y"));
    assert_eq!(a.get_raw("y").unwrap(), Value::from("#./z"));
    assert!(a.set_at_reference("z", 1, false).is_err());
    a.set_at_reference("z", 1, true).unwrap();
    assert_eq!(a.get("x").unwrap(), Value::Int(1));
}

#[test]
fn test_reference_cycle_fails() {
    let a = root();
    a.set("x", "#./y").unwrap();
    a.set("y", "#./x").unwrap();
    assert!(matches!(
        a.get_with("x", MissingReferencePolicy::Raise),
        Err(Error::ReferenceResolution { .. })
    ));
}

#[test]
fn test_reference_overwrite_needs_clearing() {
    let a = root();
    a.set("z", 1).unwrap();
    a.set("x", "#./z").unwrap();
    assert!(matches!(a.set("x", 5), Err(Error::ReferenceOverwrite { .. })));
    a.set("x", "#./y").unwrap();
    a.set("x", Value::None).unwrap();
    a.set("x", 5).unwrap();
    assert_eq!(a.get("x").unwrap(), Value::Int(5));
}

#[test]
fn test_single_owner() {
    let a = root();
    let holder = component();
    let leaf = component();
    a.set("child", &holder).unwrap();
    a.set("other", &leaf).unwrap();
    assert!(leaf.parent().unwrap().ptr_eq(&a));

    assert!(matches!(holder.set("inner", &leaf), Err(Error::ParentOverwrite { .. })));

    a.set("other", Value::None).unwrap();
    assert!(leaf.parent().is_none());
    holder.set("inner", &leaf).unwrap();
    assert!(leaf.parent().unwrap().ptr_eq(&holder));
    assert!(leaf.root().unwrap().ptr_eq(&a));
    assert_eq!(leaf.get_reference(None).unwrap(), "#/child/inner");
}

#[test]
fn test_ownership_cycle() {
    let holder = component();
    let leaf = component();
    holder.set("inner", &leaf).unwrap();
    assert!(matches!(leaf.set("inner", &holder), Err(Error::OwnershipCycle { .. })));
    assert!(matches!(holder.set("link", &holder), Err(Error::OwnershipCycle { .. })));
}

#[test]
fn test_detached_absolute_reference_warns() {
    quam_log::testing::install();
    let leaf = component();
    leaf.set("link", "#/x").unwrap();
    for policy in [MissingReferencePolicy::Warn, MissingReferencePolicy::Raise] {
        assert_eq!(leaf.get_with("link", policy).unwrap(), Value::from("#/x"));
    }
    assert_eq!(quam_log::testing::take_warnings().len(), 2);

    let a = root();
    a.set("x", 3).unwrap();
    a.set("child", &leaf).unwrap();
    assert_eq!(leaf.get("link").unwrap(), Value::Int(3));
    assert!(quam_log::testing::take_warnings().is_empty());
}

#[test]
fn test_list_references_and_removal() {
    let a = root();
    a.set("x", Value::seq([Value::from(10), Value::from("#./0"), Value::from("#../z")]))
        .unwrap();
    a.set("z", "last").unwrap();
    let list = QuamList::try_from(a.get("x").unwrap()).unwrap();
    assert_eq!(
        list.to_vec().unwrap(),
        [Value::Int(10), Value::Int(10), Value::from("last")]
    );
    assert_eq!(list.get_reference(None).unwrap(), "#/x");

    let leaf = component();
    list.push(&leaf).unwrap();
    assert!(leaf.parent().unwrap().ptr_eq(&list));
    assert_eq!(leaf.get_reference(Some("value")).unwrap(), "#/x/3/value");
    list.remove(3).unwrap();
    assert!(leaf.parent().is_none());
}

#[test]
fn test_referenced_value_of_raw_object() {
    let a = root();
    a.set("child", Value::map([("n", 7)])).unwrap();
    assert_eq!(
        get_referenced_value(&Value::Node(a.clone()), "#/child/n", Some(&a)).unwrap(),
        Value::Int(7)
    );
    assert!(get_referenced_value(&Value::Node(a.clone()), "not a reference", Some(&a)).is_err());
}

#[test]
fn test_alias_reused_across_chains() {
    let a = root();
    let leaf = component();
    a.set("child", &leaf).unwrap();
    leaf.set("value", 5).unwrap();
    leaf.set("link", "#/alias/value").unwrap();
    a.set("alias", "#./child").unwrap();
    a.set("other", "#/alias/link").unwrap();
    assert_eq!(leaf.get("link").unwrap(), Value::Int(5));
    assert_eq!(
        a.get_with("other", MissingReferencePolicy::Raise).unwrap(),
        Value::Int(5)
    );
}
