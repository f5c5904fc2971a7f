// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Reconstruction of typed trees from nested dictionaries.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::containers::{QuamDict, QuamList};
use crate::dataclass::{ClassSchema, FieldType};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::registry::ClassRegistry;
use crate::type_checking::validate_obj_type;
use crate::value::{Key, Value};

/// Reserved key holding the type tag of a serialized component.
pub const CLASS_KEY: &str = "__class__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstantiateOptions {
    /// Reject keys that are not fields of the class. Otherwise they are set
    /// as extra attributes after construction.
    pub fix_attrs: bool,
    /// Check the type of every instantiated attribute.
    pub validate_type: bool,
}

impl Default for InstantiateOptions {
    fn default() -> Self {
        InstantiateOptions {
            fix_attrs: true,
            validate_type: true,
        }
    }
}

/// Instantiate `class` from its dictionary representation.
///
/// A `__class__` entry selects the class to construct instead of `class`.
pub fn instantiate(
    registry: &ClassRegistry,
    class: &Rc<ClassSchema>,
    contents: &Value,
    options: InstantiateOptions,
) -> Result<Node> {
    Instantiator { registry, options }.class(class, contents, class.name())
}

/// Instantiate the class registered as `tag`.
pub fn instantiate_tagged(
    registry: &ClassRegistry,
    tag: &str,
    contents: &Value,
    options: InstantiateOptions,
) -> Result<Node> {
    instantiate(registry, &registry.resolve(tag)?, contents, options)
}

struct Instantiator<'a> {
    registry: &'a ClassRegistry,
    options: InstantiateOptions,
}

impl Instantiator<'_> {
    fn class(&self, class: &Rc<ClassSchema>, contents: &Value, path: &str) -> Result<Node> {
        let Value::Map(entries) = contents else {
            return Err(Error::TypeMismatch {
                path: path.to_string(),
                expected: class.tag().to_string(),
                actual: contents.type_name(),
            });
        };
        let class = match entries.get(&Key::from(CLASS_KEY)) {
            Some(Value::Str(tag)) => self.registry.resolve(tag)?,
            Some(other) => {
                return Err(Error::TypeMismatch {
                    path: format!("{path}.{CLASS_KEY}"),
                    expected: "str".to_string(),
                    actual: other.type_name(),
                });
            }
            None => Rc::clone(class),
        };
        quam_log::diagnostic!("Instantiating {} at {}", class.tag(), path);

        let mut kwargs = IndexMap::new();
        let mut extras = Vec::new();
        for (key, value) in entries {
            let name = key.to_string();
            if name == CLASS_KEY {
                continue;
            }
            let field = match key {
                Key::Str(field_name) => class.field(field_name),
                Key::Int(_) => None,
            };
            match field {
                Some(field) => {
                    let value = self.attr(value, &field.ty, &format!("{path}.{name}"))?;
                    kwargs.insert(name, value);
                }
                None if self.options.fix_attrs => {
                    return Err(Error::UnknownField {
                        path: path.to_string(),
                        attr: name,
                    });
                }
                None => extras.push((name, value.clone())),
            }
        }

        let missing: Vec<String> = class
            .required_fields()
            .filter(|field| !kwargs.contains_key(&field.name))
            .map(|field| field.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingRequiredFields {
                path: path.to_string(),
                fields: missing,
            });
        }

        let node = class.construct(kwargs)?;
        for (name, value) in extras {
            node.set(&name, value)?;
        }
        Ok(node)
    }

    fn attr(&self, value: &Value, ty: &FieldType, path: &str) -> Result<Value> {
        let value = self.convert(value, ty, path)?;
        if self.options.validate_type {
            validate_obj_type(&value, ty, path)?;
        }
        Ok(value)
    }

    fn convert(&self, value: &Value, ty: &FieldType, path: &str) -> Result<Value> {
        if value.is_reference() || value.is_none() {
            return Ok(value.clone());
        }
        match (ty, value) {
            (FieldType::Optional(inner), _) => self.convert(value, inner, path),
            (FieldType::Component(tag), Value::Map(_)) => {
                let class = self.registry.resolve(tag)?;
                Ok(Value::Node(self.class(&class, value, path)?))
            }
            (FieldType::Dict(value_type), Value::Map(entries)) => {
                let mut converted = IndexMap::new();
                for (key, entry) in entries {
                    let entry = match value_type {
                        Some(value_type) => {
                            self.attr(entry, value_type, &format!("{path}[{key}]"))?
                        }
                        None => entry.clone(),
                    };
                    converted.insert(key.clone(), entry);
                }
                let value_type = value_type.as_deref().cloned();
                Ok(QuamDict::with_value_type(converted, value_type)?.into())
            }
            (FieldType::List(element_type), Value::Seq(items)) => {
                let mut converted = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    converted.push(match element_type {
                        Some(element_type) => {
                            self.attr(item, element_type, &format!("{path}[{index}]"))?
                        }
                        None => item.clone(),
                    });
                }
                let element_type = element_type.as_deref().cloned();
                Ok(QuamList::with_value_type(converted, element_type)?.into())
            }
            (FieldType::Tuple, Value::Seq(items)) => Ok(Value::Tuple(items.clone())),
            _ => Ok(value.clone()),
        }
    }
}
