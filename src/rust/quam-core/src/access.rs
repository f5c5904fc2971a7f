// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Reference-aware reading and writing of node attributes.
//!
//! Reading an attribute that holds a reference string returns the value the
//! reference points to; the stored string itself is never replaced. Writing a
//! concrete value over a reference is refused until the attribute has been
//! cleared with `None`.

use quam_reference::{join_references, split_reference};

use crate::dataclass::FieldType;
use crate::error::{Error, Result};
use crate::node::{Node, NodeData, NodeKind, parse_index};
use crate::reference;
use crate::settings::MissingReferencePolicy;
use crate::value::{Key, Value};

/// Upper bound on the number of references walked by `set_at_reference`.
const MAX_ASSIGNMENT_HOPS: usize = 256;

impl Node {
    /// Read an attribute, resolving references.
    ///
    /// Missing references are handled according to the policy of the tree's
    /// root, read anew on every call.
    pub fn get(&self, attr: &str) -> Result<Value> {
        self.get_with(attr, self.missing_reference_policy())
    }

    /// Read an attribute, resolving references with an explicit policy.
    pub fn get_with(&self, attr: &str, policy: MissingReferencePolicy) -> Result<Value> {
        let raw = self.get_raw(attr)?;
        self.resolve_value(raw, policy)
    }

    /// Read an attribute without resolving references.
    pub fn get_raw(&self, attr: &str) -> Result<Value> {
        self.lookup_raw(attr).ok_or_else(|| self.missing_attr(attr))
    }

    pub fn has_attr(&self, attr: &str) -> bool {
        self.data().lookup(attr).is_some()
    }

    pub fn missing_reference_policy(&self) -> MissingReferencePolicy {
        self.root()
            .and_then(|root| root.settings())
            .map(|settings| settings.missing_reference_policy())
            .unwrap_or_default()
    }

    pub(crate) fn resolve_value(
        &self,
        raw: Value,
        policy: MissingReferencePolicy,
    ) -> Result<Value> {
        let Some(reference) = raw.as_reference() else {
            return Ok(raw);
        };
        match reference::resolve(self, reference) {
            Ok(value) => Ok(value),
            Err(err @ Error::DetachedRoot { .. }) => {
                quam_log::warn!("{}", err);
                Ok(raw)
            }
            Err(err) if err.is_resolution_failure() => match policy {
                MissingReferencePolicy::Raise => Err(err),
                MissingReferencePolicy::Warn => {
                    quam_log::warn!("{}", err);
                    Ok(raw)
                }
            },
            Err(err) => Err(err),
        }
    }

    /// Assign an attribute.
    ///
    /// Raw dictionaries and lists are coerced into container nodes and nodes
    /// are attached to this node. On components, an attribute currently
    /// holding a reference only accepts another reference or `None`.
    pub fn set(&self, attr: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match self.kind() {
            NodeKind::Root | NodeKind::Component => self.set_field(attr, value),
            NodeKind::Dict => self.insert_entry(self.entry_key(attr), value),
            NodeKind::List => {
                let index = parse_index::<usize>(attr).ok_or_else(|| self.missing_attr(attr))?;
                self.set_item(index, value)
            }
        }
    }

    fn set_field(&self, attr: &str, value: Value) -> Result<()> {
        if let Some(current) = self.lookup_raw(attr) {
            if let Some(reference) = current.as_reference() {
                if !value.is_none() && !value.is_reference() {
                    return Err(Error::ReferenceOverwrite {
                        node: self.describe(),
                        attr: attr.to_string(),
                        value: value.to_string(),
                        reference: reference.to_string(),
                    });
                }
            }
        }
        let declared = self
            .class()
            .and_then(|class| class.field(attr))
            .map(|field| field.ty.clone());
        let value = self.adopt(value, declared.as_ref())?;
        let old = match &mut *self.data_mut() {
            NodeData::Fields { fields, extras } => match fields.get_mut(attr) {
                Some(slot) => Some(std::mem::replace(slot, value)),
                None => extras.insert(attr.to_string(), value),
            },
            _ => None,
        };
        self.release(old);
        Ok(())
    }

    /// Store a field value during construction.
    pub(crate) fn init_field(&self, name: &str, value: Value, ty: &FieldType) -> Result<()> {
        let value = self.adopt(value, Some(ty))?;
        if let NodeData::Fields { fields, .. } = &mut *self.data_mut() {
            fields.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Key addressed by an attribute name of a dictionary: an existing string
    /// key, else an existing integer key, else a new string key.
    pub(crate) fn entry_key(&self, attr: &str) -> Key {
        if let NodeData::Dict(entries) = &*self.data() {
            let key = Key::from(attr);
            if !entries.contains_key(&key) {
                if let Some(index) = parse_index::<i64>(attr) {
                    if entries.contains_key(&Key::Int(index)) {
                        return Key::Int(index);
                    }
                }
            }
            return key;
        }
        Key::from(attr)
    }

    pub(crate) fn insert_entry(&self, key: Key, value: Value) -> Result<()> {
        let declared = self.value_type();
        let value = self.adopt(value, declared.as_ref())?;
        let old = match &mut *self.data_mut() {
            NodeData::Dict(entries) => entries.insert(key, value),
            _ => None,
        };
        self.release(old);
        Ok(())
    }

    pub(crate) fn set_item(&self, index: usize, value: Value) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(Error::IndexOutOfRange {
                container: self.describe(),
                index,
                len,
            });
        }
        let declared = self.value_type();
        let value = self.adopt(value, declared.as_ref())?;
        let old = match &mut *self.data_mut() {
            NodeData::List(items) => Some(std::mem::replace(&mut items[index], value)),
            _ => None,
        };
        self.release(old);
        Ok(())
    }

    /// Number of entries of a dictionary or list, or of attributes of a
    /// component.
    pub fn len(&self) -> usize {
        match &*self.data() {
            NodeData::Fields { fields, extras } => fields.len() + extras.len(),
            NodeData::Dict(entries) => entries.len(),
            NodeData::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assign the value an attribute's reference points to.
    ///
    /// The chain of references is followed to the first attribute holding a
    /// concrete value, which is then overwritten. The references themselves are
    /// left untouched. If the attribute is not a reference, it is assigned
    /// directly when `allow_non_reference` is set and an error otherwise.
    pub fn set_at_reference(
        &self,
        attr: &str,
        value: impl Into<Value>,
        allow_non_reference: bool,
    ) -> Result<()> {
        let value = value.into();
        let raw = self.get_raw(attr)?;
        let Some(reference) = raw.as_reference() else {
            if allow_non_reference {
                return self.set(attr, value);
            }
            return Err(Error::new(format!(
                "Cannot set at reference because attr '{attr}' is not a reference. '{attr}' = {raw}"
            )));
        };
        let mut holder = self.clone();
        let mut reference = reference.to_string();
        for _ in 0..MAX_ASSIGNMENT_HOPS {
            let (parent_reference, segment) = split_reference(&reference)?;
            let target = match reference::resolve(&holder, &parent_reference)? {
                Value::Node(node) => node,
                other => {
                    return Err(Error::ReferenceResolution {
                        reference: reference.clone(),
                        origin: holder.describe(),
                        reason: format!(
                            "{parent_reference} points to {}, not a node",
                            other.type_name()
                        ),
                    });
                }
            };
            let current = target.lookup_raw(&segment).ok_or_else(|| Error::ReferenceResolution {
                reference: reference.clone(),
                origin: holder.describe(),
                reason: format!("{} has no attribute {segment}", target.describe()),
            })?;
            match current.as_reference() {
                Some(next) => {
                    reference = next.to_string();
                    holder = target;
                }
                None => return target.set(&segment, value),
            }
        }
        Err(Error::ReferenceResolution {
            reference,
            origin: self.describe(),
            reason: "too many chained references".to_string(),
        })
    }

    /// Absolute reference of this node, or of one of its attributes.
    ///
    /// A root is `#/`. Any other node needs a parent chain up to a root; the
    /// path is rebuilt from the names under which each node is held.
    pub fn get_reference(&self, attr: Option<&str>) -> Result<String> {
        let base = if self.is_root() {
            "#".to_string()
        } else {
            let parent = self.parent().ok_or_else(|| {
                Error::new(format!(
                    "Unable to extract reference path for {}: no parent defined",
                    self.class_name()
                ))
            })?;
            let base = parent.get_reference(None)?;
            let name = parent.attr_name_of(self)?;
            format!("{}/{name}", base.trim_end_matches('/'))
        };
        Ok(match attr {
            Some(attr) => format!("{base}/{attr}"),
            None if base == "#" => "#/".to_string(),
            None => base,
        })
    }

    /// Absolute form of a reference relative to this node.
    pub fn get_reference_relative(&self, relative: &str) -> Result<String> {
        Ok(join_references(&self.get_reference(None)?, relative)?)
    }

    /// Name under which this node holds `child`, by identity.
    pub fn attr_name_of(&self, child: &Node) -> Result<String> {
        let is_child = |value: &Value| value.as_node().is_some_and(|n| n.ptr_eq(child));
        let name = match &*self.data() {
            NodeData::Fields { fields, extras } => fields
                .iter()
                .chain(extras.iter())
                .find(|(_, v)| is_child(v))
                .map(|(k, _)| k.clone()),
            NodeData::Dict(entries) => entries
                .iter()
                .find(|(_, v)| is_child(v))
                .map(|(k, _)| k.to_string()),
            NodeData::List(items) => items.iter().position(is_child).map(|i| i.to_string()),
        };
        name.ok_or_else(|| {
            Error::new(format!(
                "{} is not an attribute of {}",
                child.class_name(),
                self.class_name()
            ))
        })
    }

    fn missing_attr(&self, attr: &str) -> Error {
        match self.kind() {
            NodeKind::Dict => Error::MissingKey {
                container: self.describe(),
                key: attr.to_string(),
            },
            NodeKind::List => Error::IndexOutOfRange {
                container: self.describe(),
                index: parse_index(attr).unwrap_or(usize::MAX),
                len: self.len(),
            },
            NodeKind::Root | NodeKind::Component => Error::UnknownField {
                path: self.describe(),
                attr: attr.to_string(),
            },
        }
    }
}
