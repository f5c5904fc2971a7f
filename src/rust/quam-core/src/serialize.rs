// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;

use crate::dataclass::FieldType;
use crate::error::Result;
use crate::instantiate::CLASS_KEY;
use crate::node::{Node, NodeData, NodeKind};
use crate::value::{Key, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToDictOptions {
    /// Serialize resolved values instead of the stored references.
    pub follow_references: bool,
    /// Keep fields whose value equals their default.
    pub include_defaults: bool,
}

/// Flatten a node into nested raw dictionaries and lists.
///
/// Components whose class differs from the declared type of the slot holding
/// them get a `__class__` entry. A root always gets one.
pub fn to_dict(node: &Node, options: ToDictOptions) -> Result<Value> {
    let mut value = Serializer { options }.node(node)?;
    if node.is_root() {
        if let (Value::Map(entries), Some(class)) = (&mut value, node.class()) {
            entries.insert(Key::from(CLASS_KEY), Value::from(class.tag()));
        }
    }
    Ok(value)
}

/// [`to_dict`] converted to JSON.
pub fn to_json(node: &Node, options: ToDictOptions) -> Result<serde_json::Value> {
    to_dict(node, options)?.to_json()
}

struct Serializer {
    options: ToDictOptions,
}

impl Serializer {
    fn node(&self, node: &Node) -> Result<Value> {
        match node.kind() {
            NodeKind::Root | NodeKind::Component => self.fields(node),
            NodeKind::Dict => {
                let value_type = node.value_type();
                let entries: Vec<(Key, Value)> = match &*node.data() {
                    NodeData::Dict(entries) => entries.clone().into_iter().collect(),
                    _ => Vec::new(),
                };
                let mut out = IndexMap::new();
                for (key, raw) in entries {
                    let value = self.resolve(node, raw)?;
                    out.insert(key, self.member(value, value_type.as_ref())?);
                }
                Ok(Value::Map(out))
            }
            NodeKind::List => {
                let value_type = node.value_type();
                let items: Vec<Value> = match &*node.data() {
                    NodeData::List(items) => items.clone(),
                    _ => Vec::new(),
                };
                let mut out = Vec::with_capacity(items.len());
                for raw in items {
                    let value = self.resolve(node, raw)?;
                    out.push(self.member(value, value_type.as_ref())?);
                }
                Ok(Value::Seq(out))
            }
        }
    }

    fn fields(&self, node: &Node) -> Result<Value> {
        let mut out = IndexMap::new();
        let Some(class) = node.class() else {
            return Ok(Value::Map(out));
        };
        for field in class.fields() {
            if field.skip_save {
                continue;
            }
            let raw = node.get_raw(&field.name)?;
            if !self.options.include_defaults
                && field
                    .requiredness
                    .default_value()
                    .is_some_and(|default| default == raw)
            {
                continue;
            }
            let value = self.resolve(node, raw)?;
            out.insert(Key::from(&field.name), self.member(value, Some(&field.ty))?);
        }
        let extras: Vec<(String, Value)> = match &*node.data() {
            NodeData::Fields { extras, .. } => extras.clone().into_iter().collect(),
            _ => Vec::new(),
        };
        for (name, raw) in extras {
            let value = self.resolve(node, raw)?;
            out.insert(Key::from(name), self.member(value, None)?);
        }
        Ok(Value::Map(out))
    }

    fn resolve(&self, holder: &Node, raw: Value) -> Result<Value> {
        if self.options.follow_references {
            holder.resolve_value(raw, holder.missing_reference_policy())
        } else {
            Ok(raw)
        }
    }

    fn member(&self, value: Value, declared: Option<&FieldType>) -> Result<Value> {
        match value {
            Value::Node(node) => {
                let mut nested = self.node(&node)?;
                let declared_tag = declared.and_then(FieldType::component_tag);
                if let (Some(class), Value::Map(entries)) = (node.class(), &mut nested) {
                    if declared_tag != Some(class.tag()) {
                        entries.insert(Key::from(CLASS_KEY), Value::from(class.tag()));
                    }
                }
                Ok(nested)
            }
            Value::Tuple(items) | Value::Seq(items) => Ok(Value::Seq(
                items
                    .into_iter()
                    .map(|item| self.member(item, None))
                    .collect::<Result<_>>()?,
            )),
            Value::Map(entries) => Ok(Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok((k, self.member(v, None)?)))
                    .collect::<Result<_>>()?,
            )),
            other => Ok(other),
        }
    }
}
