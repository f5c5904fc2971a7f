// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Dictionary and list handles over container nodes.
//!
//! Entries are read with reference resolution, like component attributes.
//! Raw dictionaries and lists stored into a container are coerced into
//! container nodes owned by it.

use std::ops::{Bound, Deref, RangeBounds};

use indexmap::IndexMap;

use crate::dataclass::FieldType;
use crate::error::{Error, Result};
use crate::node::{Node, NodeData, NodeKind};
use crate::value::{Key, Value};

#[derive(Debug, Clone)]
pub struct QuamDict(Node);

impl QuamDict {
    pub fn new() -> Self {
        QuamDict(Node::new_dict(None))
    }

    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        QuamDict::with_value_type(entries, None)
    }

    /// Dictionary whose values are declared as `value_type`.
    pub fn with_value_type<K, V>(
        entries: impl IntoIterator<Item = (K, V)>,
        value_type: Option<FieldType>,
    ) -> Result<Self>
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        let node = Node::new_dict(value_type);
        node.extend_entries(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )?;
        Ok(QuamDict(node))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn into_node(self) -> Node {
        self.0
    }

    /// Resolved value of an entry.
    pub fn get(&self, key: impl Into<Key>) -> Result<Value> {
        let raw = self.get_raw(key)?;
        self.0.resolve_value(raw, self.0.missing_reference_policy())
    }

    /// Resolved value of an entry addressed like an attribute.
    ///
    /// Identical to [`QuamDict::get`] for string keys; digit-only names fall
    /// back to integer keys.
    pub fn get_item(&self, name: &str) -> Result<Value> {
        self.0.get(name)
    }

    pub fn get_raw(&self, key: impl Into<Key>) -> Result<Value> {
        let key = key.into();
        self.entries()
            .and_then(|entries| entries.get(&key).cloned())
            .ok_or_else(|| Error::MissingKey {
                container: self.0.describe(),
                key: key.to_string(),
            })
    }

    pub fn insert(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        self.0.insert_entry(key.into(), value.into())
    }

    /// Remove an entry, detaching it from the dictionary.
    pub fn remove(&self, key: impl Into<Key>) -> Option<Value> {
        let key = key.into();
        let old = match &mut *self.0.data_mut() {
            NodeData::Dict(entries) => entries.shift_remove(&key),
            _ => None,
        };
        self.0.release(old.clone());
        old
    }

    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        self.entries().is_some_and(|entries| entries.contains_key(&key))
    }

    pub fn keys(&self) -> Vec<Key> {
        self.entries()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolved values in insertion order.
    pub fn values(&self) -> Result<Vec<Value>> {
        self.keys().into_iter().map(|k| self.get(k)).collect()
    }

    /// Resolved entries in insertion order.
    pub fn items(&self) -> Result<Vec<(Key, Value)>> {
        self.keys()
            .into_iter()
            .map(|k| Ok((k.clone(), self.get(k)?)))
            .collect()
    }

    pub fn raw_entries(&self) -> IndexMap<Key, Value> {
        self.entries()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn entries(&self) -> Option<std::cell::Ref<'_, IndexMap<Key, Value>>> {
        std::cell::Ref::filter_map(self.0.data(), |data| match data {
            NodeData::Dict(entries) => Some(entries),
            _ => None,
        })
        .ok()
    }
}

impl Default for QuamDict {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for QuamDict {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0
    }
}

impl TryFrom<Node> for QuamDict {
    type Error = Error;

    fn try_from(node: Node) -> Result<Self> {
        match node.kind() {
            NodeKind::Dict => Ok(QuamDict(node)),
            _ => Err(Error::WrongNodeKind {
                expected: NodeKind::Dict.to_string(),
                found: node.class_name(),
            }),
        }
    }
}

impl TryFrom<Value> for QuamDict {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Node(node) => node.try_into(),
            other => Err(Error::WrongNodeKind {
                expected: NodeKind::Dict.to_string(),
                found: other.type_name(),
            }),
        }
    }
}

impl From<QuamDict> for Value {
    fn from(dict: QuamDict) -> Self {
        Value::Node(dict.0)
    }
}

#[derive(Debug, Clone)]
pub struct QuamList(Node);

impl QuamList {
    pub fn new() -> Self {
        QuamList(Node::new_list(None))
    }

    pub fn from_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Result<Self> {
        QuamList::with_value_type(values, None)
    }

    /// List whose elements are declared as `value_type`.
    pub fn with_value_type<V: Into<Value>>(
        values: impl IntoIterator<Item = V>,
        value_type: Option<FieldType>,
    ) -> Result<Self> {
        let node = Node::new_list(value_type);
        node.extend_items(values.into_iter().map(Into::into).collect())?;
        Ok(QuamList(node))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn into_node(self) -> Node {
        self.0
    }

    /// Resolved element at `index`.
    pub fn get(&self, index: usize) -> Result<Value> {
        let raw = self.get_raw(index)?;
        self.0.resolve_value(raw, self.0.missing_reference_policy())
    }

    pub fn get_raw(&self, index: usize) -> Result<Value> {
        let items = self.items();
        let len = items.as_ref().map_or(0, |items| items.len());
        items
            .and_then(|items| items.get(index).cloned())
            .ok_or_else(|| Error::IndexOutOfRange {
                container: self.0.class_name(),
                index,
                len,
            })
    }

    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.0.set_item(index, value.into())
    }

    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        self.0.extend_items(vec![value.into()])
    }

    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let len = self.0.len();
        if index > len {
            return Err(Error::IndexOutOfRange {
                container: self.0.describe(),
                index,
                len,
            });
        }
        let declared = self.0.value_type();
        let value = self.0.adopt(value.into(), declared.as_ref())?;
        if let NodeData::List(items) = &mut *self.0.data_mut() {
            items.insert(index, value);
        }
        Ok(())
    }

    pub fn extend<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Result<()> {
        self.0
            .extend_items(values.into_iter().map(Into::into).collect())
    }

    /// Remove and return the raw element at `index`, detaching it.
    pub fn remove(&self, index: usize) -> Result<Value> {
        let len = self.0.len();
        if index >= len {
            return Err(Error::IndexOutOfRange {
                container: self.0.describe(),
                index,
                len,
            });
        }
        let old = match &mut *self.0.data_mut() {
            NodeData::List(items) => items.remove(index),
            _ => Value::None,
        };
        self.0.release(Some(old.clone()));
        Ok(old)
    }

    /// Resolved elements of a range.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Result<Vec<Value>> {
        let len = self.0.len();
        let start = match range.start_bound() {
            Bound::Included(&i) => i,
            Bound::Excluded(&i) => i.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&i) => i.saturating_add(1),
            Bound::Excluded(&i) => i,
            Bound::Unbounded => len,
        };
        (start.min(len)..end.min(len)).map(|i| self.get(i)).collect()
    }

    /// All elements, resolved.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        self.slice(..)
    }

    pub fn raw_values(&self) -> Vec<Value> {
        self.items()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    fn items(&self) -> Option<std::cell::Ref<'_, Vec<Value>>> {
        std::cell::Ref::filter_map(self.0.data(), |data| match data {
            NodeData::List(items) => Some(items),
            _ => None,
        })
        .ok()
    }
}

impl Default for QuamList {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for QuamList {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0
    }
}

impl TryFrom<Node> for QuamList {
    type Error = Error;

    fn try_from(node: Node) -> Result<Self> {
        match node.kind() {
            NodeKind::List => Ok(QuamList(node)),
            _ => Err(Error::WrongNodeKind {
                expected: NodeKind::List.to_string(),
                found: node.class_name(),
            }),
        }
    }
}

impl TryFrom<Value> for QuamList {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Node(node) => node.try_into(),
            other => Err(Error::WrongNodeKind {
                expected: NodeKind::List.to_string(),
                found: other.type_name(),
            }),
        }
    }
}

impl From<QuamList> for Value {
    fn from(list: QuamList) -> Self {
        Value::Node(list.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_entries() {
        let dict =
            QuamDict::from_entries([("a", Value::Int(1)), ("b", Value::from("#./a"))]).unwrap();
        assert_eq!(dict.get("b").unwrap(), Value::Int(1));
        assert_eq!(dict.get_item("b").unwrap(), Value::Int(1));
        assert_eq!(dict.get_raw("b").unwrap(), Value::from("#./a"));
        assert_eq!(dict.values().unwrap(), vec![Value::Int(1), Value::Int(1)]);
        assert!(dict.contains_key("a"));
        assert!(matches!(dict.get("c"), Err(Error::MissingKey { .. })));
    }

    #[test]
    fn test_dict_coerces_nested_containers() {
        let dict = QuamDict::new();
        dict.insert("nested", Value::map([("l", Value::seq([1, 2, 3]))]))
            .unwrap();
        let nested = QuamDict::try_from(dict.get("nested").unwrap()).unwrap();
        assert!(nested.parent().unwrap().ptr_eq(&dict));
        let list = QuamList::try_from(nested.get("l").unwrap()).unwrap();
        assert_eq!(list.to_vec().unwrap(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_dict_remove_detaches() {
        let dict = QuamDict::new();
        let child = QuamList::new();
        dict.insert(1, &*child).unwrap();
        assert!(child.parent().is_some());
        assert!(dict.remove(1).is_some());
        assert!(child.parent().is_none());
        assert!(dict.remove(1).is_none());
    }

    #[test]
    fn test_list_operations() {
        let list = QuamList::from_values([Value::Int(1), Value::Int(3)]).unwrap();
        list.insert(1, 2).unwrap();
        list.push("#./0").unwrap();
        list.extend([5, 6]).unwrap();
        assert_eq!(list.len(), 6);
        assert_eq!(list.get(3).unwrap(), Value::Int(1));
        assert_eq!(list.get_raw(3).unwrap(), Value::from("#./0"));
        assert_eq!(list.slice(1..3).unwrap(), vec![Value::Int(2), Value::Int(3)]);
        assert_eq!(list.slice(4..).unwrap(), vec![Value::Int(5), Value::Int(6)]);
        assert_eq!(list.slice(5..=usize::MAX).unwrap(), vec![Value::Int(6)]);
        assert!(
            list.slice((Bound::Excluded(usize::MAX), Bound::Unbounded))
                .unwrap()
                .is_empty()
        );
        assert_eq!(list.remove(0).unwrap(), Value::Int(1));
        // Now points at the new first element
        assert_eq!(list.get(2).unwrap(), Value::Int(2));
        assert!(list.get(10).is_err());
        assert!(list.insert(10, 0).is_err());
    }

    #[test]
    fn test_list_element_references_parent() {
        let dict = QuamDict::from_entries([
            ("value", Value::Int(7)),
            ("list", Value::seq(["#../value"])),
        ])
        .unwrap();
        let list = QuamList::try_from(dict.get("list").unwrap()).unwrap();
        assert_eq!(list.get(0).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_wrong_kind() {
        assert!(QuamList::try_from(QuamDict::new().into_node()).is_err());
        assert!(QuamDict::try_from(Value::Int(1)).is_err());
    }
}
