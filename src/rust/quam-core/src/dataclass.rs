// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Declarative class schemas for roots and components.
//!
//! A class is described by a [`ClassDef`] and registered in a
//! [`crate::ClassRegistry`], which merges the fields of its ancestors into a
//! [`ClassSchema`]. Whether a field is required is decided once, at
//! registration, so a subclass may declare required fields even when all
//! fields of its ancestors carry defaults.

use std::fmt::{self, Debug, Display};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::config::ComponentBehavior;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::value::Value;

/// Declared type of a field or of the entries of a container.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Any,
    Bool,
    Int,
    /// Integers are accepted as well.
    Float,
    Str,
    Optional(Box<FieldType>),
    /// Instance of the class registered under the tag, or of a subclass.
    Component(String),
    /// Dictionary with an optional declared value type.
    Dict(Option<Box<FieldType>>),
    /// List with an optional declared element type.
    List(Option<Box<FieldType>>),
    Tuple,
    Union(Vec<FieldType>),
}

impl FieldType {
    pub fn optional(inner: FieldType) -> Self {
        FieldType::Optional(Box::new(inner))
    }

    pub fn component(tag: impl Into<String>) -> Self {
        FieldType::Component(tag.into())
    }

    pub fn dict() -> Self {
        FieldType::Dict(None)
    }

    pub fn dict_of(value_type: FieldType) -> Self {
        FieldType::Dict(Some(Box::new(value_type)))
    }

    pub fn list() -> Self {
        FieldType::List(None)
    }

    pub fn list_of(element_type: FieldType) -> Self {
        FieldType::List(Some(Box::new(element_type)))
    }

    /// The type without an `Optional` wrapper.
    pub fn unwrap_optional(&self) -> &FieldType {
        match self {
            FieldType::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }

    /// Tag of the declared component class, if any.
    pub fn component_tag(&self) -> Option<&str> {
        match self.unwrap_optional() {
            FieldType::Component(tag) => Some(tag),
            _ => None,
        }
    }

    /// Declared value type of a dictionary or element type of a list.
    pub fn element_type(&self) -> Option<&FieldType> {
        match self.unwrap_optional() {
            FieldType::Dict(Some(inner)) | FieldType::List(Some(inner)) => Some(inner),
            _ => None,
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Any => f.write_str("Any"),
            FieldType::Bool => f.write_str("bool"),
            FieldType::Int => f.write_str("int"),
            FieldType::Float => f.write_str("float"),
            FieldType::Str => f.write_str("str"),
            FieldType::Optional(inner) => write!(f, "Optional[{inner}]"),
            FieldType::Component(tag) => f.write_str(tag),
            FieldType::Dict(None) => f.write_str("dict"),
            FieldType::Dict(Some(inner)) => write!(f, "Dict[str, {inner}]"),
            FieldType::List(None) => f.write_str("list"),
            FieldType::List(Some(inner)) => write!(f, "List[{inner}]"),
            FieldType::Tuple => f.write_str("tuple"),
            FieldType::Union(members) => {
                f.write_str("Union[")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// How a field obtains its value when none is given.
#[derive(Clone)]
pub enum Requiredness {
    Required,
    Default(Value),
    /// Called once per construction, for defaults that must not be shared.
    Factory(Rc<dyn Fn() -> Value>),
}

impl Requiredness {
    pub fn is_required(&self) -> bool {
        matches!(self, Requiredness::Required)
    }

    /// The value a field receives when it is omitted.
    pub fn default_value(&self) -> Option<Value> {
        match self {
            Requiredness::Required => None,
            Requiredness::Default(value) => Some(value.clone()),
            Requiredness::Factory(factory) => Some(factory()),
        }
    }
}

impl Debug for Requiredness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requiredness::Required => f.write_str("Required"),
            Requiredness::Default(value) => f.debug_tuple("Default").field(value).finish(),
            Requiredness::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub requiredness: Requiredness,
    /// Excluded from serialization.
    pub skip_save: bool,
}

impl FieldSpec {
    /// A required field.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        FieldSpec {
            name: name.into(),
            ty,
            requiredness: Requiredness::Required,
            skip_save: false,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.requiredness = Requiredness::Default(value.into());
        self
    }

    pub fn with_factory(mut self, factory: impl Fn() -> Value + 'static) -> Self {
        self.requiredness = Requiredness::Factory(Rc::new(factory));
        self
    }

    pub fn skip_save(mut self) -> Self {
        self.skip_save = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassRole {
    Root,
    Component,
}

/// Definition of a class before registration.
pub struct ClassDef {
    pub(crate) tag: String,
    pub(crate) role: ClassRole,
    pub(crate) extends: Option<String>,
    pub(crate) fields: Vec<FieldSpec>,
    pub(crate) behavior: Option<Rc<dyn ComponentBehavior>>,
}

impl ClassDef {
    /// A component class. The tag is the name written to the `__class__`
    /// entry of serialized components, e.g. `"quam.components.Channel"`.
    pub fn component(tag: impl Into<String>) -> Self {
        ClassDef::new(tag.into(), ClassRole::Component)
    }

    pub fn root(tag: impl Into<String>) -> Self {
        ClassDef::new(tag.into(), ClassRole::Root)
    }

    fn new(tag: String, role: ClassRole) -> Self {
        ClassDef {
            tag,
            role,
            extends: None,
            fields: Vec::new(),
            behavior: None,
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn behavior(mut self, behavior: impl ComponentBehavior + 'static) -> Self {
        self.behavior = Some(Rc::new(behavior));
        self
    }
}

/// A registered class with the fields of all its ancestors.
pub struct ClassSchema {
    tag: String,
    role: ClassRole,
    /// Tags of all ancestors, nearest first.
    ancestors: Vec<String>,
    fields: IndexMap<String, FieldSpec>,
    inherits_defaults: bool,
    behavior: Option<Rc<dyn ComponentBehavior>>,
}

const RESERVED_FIELDS: [&str; 2] = ["__class__", "parent"];

impl ClassSchema {
    pub(crate) fn from_def(def: ClassDef, parent: Option<&ClassSchema>) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidSchema {
            class: def.tag.clone(),
            reason,
        };
        if def.tag.is_empty() {
            return Err(invalid("the type tag is empty".to_string()));
        }
        let mut fields = IndexMap::new();
        let mut ancestors = Vec::new();
        let mut inherits_defaults = false;
        let mut behavior = None;
        if let Some(parent) = parent {
            if parent.role != def.role {
                return Err(invalid(format!(
                    "cannot extend {} with a different role",
                    parent.tag
                )));
            }
            fields = parent.fields.clone();
            ancestors.push(parent.tag.clone());
            ancestors.extend(parent.ancestors.iter().cloned());
            inherits_defaults = parent
                .fields
                .values()
                .any(|f| !f.requiredness.is_required());
            behavior = parent.behavior.clone();
        }
        let mut declared = Vec::new();
        for field in def.fields {
            if RESERVED_FIELDS.contains(&field.name.as_str()) {
                return Err(invalid(format!("field name '{}' is reserved", field.name)));
            }
            if declared.contains(&field.name) {
                return Err(invalid(format!("field '{}' declared twice", field.name)));
            }
            if let Requiredness::Default(Value::Map(_) | Value::Seq(_) | Value::Node(_)) =
                &field.requiredness
            {
                return Err(invalid(format!(
                    "mutable default for field '{}', use a default factory",
                    field.name
                )));
            }
            declared.push(field.name.clone());
            // Re-declared fields keep the position of the ancestor's field.
            fields.insert(field.name.clone(), field);
        }
        Ok(ClassSchema {
            tag: def.tag,
            role: def.role,
            ancestors,
            fields,
            inherits_defaults,
            behavior: def.behavior.or(behavior),
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Class name without the module path of the tag.
    pub fn name(&self) -> &str {
        self.tag.rsplit('.').next().unwrap_or(&self.tag)
    }

    pub fn role(&self) -> ClassRole {
        self.role
    }

    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    pub fn is_subclass_of(&self, tag: &str) -> bool {
        self.tag == tag || self.ancestors.iter().any(|a| a == tag)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields().filter(|f| f.requiredness.is_required())
    }

    pub fn optional_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields().filter(|f| !f.requiredness.is_required())
    }

    /// Whether an ancestor already declared fields with defaults.
    ///
    /// Required fields of such a class are still enforced at construction.
    pub fn inherits_defaults(&self) -> bool {
        self.inherits_defaults
    }

    pub fn behavior(&self) -> Option<&Rc<dyn ComponentBehavior>> {
        self.behavior.as_ref()
    }

    /// Construct a node from keyword values.
    ///
    /// Omitted fields take their default; an omitted required field is an
    /// error naming the class and the field.
    pub fn construct<K>(
        self: &Rc<Self>,
        kwargs: impl IntoIterator<Item = (K, Value)>,
    ) -> Result<Node>
    where
        K: Into<String>,
    {
        let mut provided: IndexMap<String, Value> =
            kwargs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        if let Some(unknown) = provided.keys().find(|k| !self.fields.contains_key(*k)) {
            return Err(Error::UnknownField {
                path: self.name().to_string(),
                attr: unknown.clone(),
            });
        }
        if let Some(missing) = self
            .required_fields()
            .find(|f| !provided.contains_key(&f.name))
        {
            return Err(Error::MissingRequiredField {
                class: self.name().to_string(),
                field: missing.name.clone(),
            });
        }
        let node = Node::new_fields(Rc::clone(self));
        for field in self.fields() {
            let value = match provided.shift_remove(&field.name) {
                Some(value) => value,
                None => field.requiredness.default_value().unwrap_or_default(),
            };
            node.init_field(&field.name, value, &field.ty)?;
        }
        Ok(node)
    }
}

impl Debug for ClassSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassSchema")
            .field("tag", &self.tag)
            .field("role", &self.role)
            .field("ancestors", &self.ancestors)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
