// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::dataclass::FieldType;
use crate::error::{Error, Result};
use crate::node::{NodeData, NodeKind};
use crate::value::Value;

/// Whether `value` is acceptable for a slot declared as `ty`.
///
/// Reference strings are accepted for any type, as are integers for floats.
/// Dictionary values and list elements are checked against the declared
/// entry type.
pub fn check_type(value: &Value, ty: &FieldType) -> bool {
    if value.is_reference() {
        return true;
    }
    match ty {
        FieldType::Any => true,
        FieldType::Optional(inner) => value.is_none() || check_type(value, inner),
        FieldType::Bool => matches!(value, Value::Bool(_)),
        FieldType::Int => matches!(value, Value::Int(_)),
        FieldType::Float => matches!(value, Value::Float(_) | Value::Int(_)),
        FieldType::Str => matches!(value, Value::Str(_)),
        FieldType::Tuple => matches!(value, Value::Tuple(_)),
        FieldType::Union(members) => members.iter().any(|member| check_type(value, member)),
        FieldType::Component(tag) => value.as_node().is_some_and(|node| node.is_instance_of(tag)),
        FieldType::Dict(value_type) => match value {
            Value::Map(entries) => check_entries(entries.values(), value_type.as_deref()),
            Value::Node(node) if node.kind() == NodeKind::Dict => match &*node.data() {
                NodeData::Dict(entries) => check_entries(entries.values(), value_type.as_deref()),
                _ => false,
            },
            _ => false,
        },
        FieldType::List(element_type) => match value {
            Value::Seq(items) => check_entries(items.iter(), element_type.as_deref()),
            Value::Node(node) if node.kind() == NodeKind::List => match &*node.data() {
                NodeData::List(items) => check_entries(items.iter(), element_type.as_deref()),
                _ => false,
            },
            _ => false,
        },
    }
}

fn check_entries<'a>(mut values: impl Iterator<Item = &'a Value>, ty: Option<&FieldType>) -> bool {
    match ty {
        Some(ty) => values.all(|v| check_type(v, ty)),
        None => true,
    }
}

/// Validate the type of an instantiated attribute. `None` always passes.
pub fn validate_obj_type(value: &Value, ty: &FieldType, path: &str) -> Result<()> {
    if value.is_none() || check_type(value, ty) {
        return Ok(());
    }
    Err(Error::TypeMismatch {
        path: path.to_string(),
        expected: ty.to_string(),
        actual: value.type_name(),
    })
}
