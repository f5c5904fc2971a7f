// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::cell::{Ref, RefCell, RefMut};
use std::fmt::{self, Debug, Display};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::dataclass::{ClassRole, ClassSchema, FieldType};
use crate::error::{Error, Result};
use crate::ownership::ParentSlot;
use crate::settings::QuamSettings;
use crate::value::{Key, Value};

/// Role of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Anchor of absolute references and entry point of config generation.
    Root,
    Component,
    Dict,
    List,
}

impl NodeKind {
    /// Roots and components carry declared fields.
    pub fn has_fields(self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Component)
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Root => "QuamRoot",
            NodeKind::Component => "QuamComponent",
            NodeKind::Dict => "QuamDict",
            NodeKind::List => "QuamList",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub(crate) enum NodeData {
    Fields {
        fields: IndexMap<String, Value>,
        /// Attributes not declared by the class, in insertion order.
        extras: IndexMap<String, Value>,
    },
    Dict(IndexMap<Key, Value>),
    List(Vec<Value>),
}

impl NodeData {
    /// Raw value addressed by a single path segment.
    ///
    /// Dictionary lookups try the string key first and fall back to an
    /// integer key for digit-only segments.
    pub(crate) fn lookup(&self, segment: &str) -> Option<&Value> {
        match self {
            NodeData::Fields { fields, extras } => {
                fields.get(segment).or_else(|| extras.get(segment))
            }
            NodeData::Dict(entries) => entries.get(&Key::from(segment)).or_else(|| {
                parse_index::<i64>(segment).and_then(|i| entries.get(&Key::Int(i)))
            }),
            NodeData::List(items) => parse_index::<usize>(segment).and_then(|i| items.get(i)),
        }
    }

    pub(crate) fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            NodeData::Fields { fields, extras } => Box::new(fields.values().chain(extras.values())),
            NodeData::Dict(entries) => Box::new(entries.values()),
            NodeData::List(items) => Box::new(items.iter()),
        }
    }
}

pub(crate) fn parse_index<T: std::str::FromStr>(segment: &str) -> Option<T> {
    if quam_reference::is_index(segment) {
        segment.parse().ok()
    } else {
        None
    }
}

pub(crate) struct NodeCell {
    kind: NodeKind,
    class: Option<Rc<ClassSchema>>,
    value_type: RefCell<Option<FieldType>>,
    parent: ParentSlot,
    root: RefCell<Weak<NodeCell>>,
    settings: Option<RefCell<QuamSettings>>,
    data: RefCell<NodeData>,
}

/// Shared handle to a tree node.
///
/// Cloning the handle does not clone the node; two handles are the same node
/// when [`Node::ptr_eq`] holds.
#[derive(Clone)]
pub struct Node(Rc<NodeCell>);

impl Node {
    fn from_cell(cell: NodeCell) -> Node {
        Node(Rc::new(cell))
    }

    /// New component or root without any field values.
    pub(crate) fn new_fields(class: Rc<ClassSchema>) -> Node {
        let kind = match class.role() {
            ClassRole::Root => NodeKind::Root,
            ClassRole::Component => NodeKind::Component,
        };
        let settings = (kind == NodeKind::Root).then(|| RefCell::new(QuamSettings::default()));
        Node::from_cell(NodeCell {
            kind,
            class: Some(class),
            value_type: RefCell::new(None),
            parent: ParentSlot::default(),
            root: RefCell::new(Weak::new()),
            settings,
            data: RefCell::new(NodeData::Fields {
                fields: IndexMap::new(),
                extras: IndexMap::new(),
            }),
        })
    }

    pub(crate) fn new_dict(value_type: Option<FieldType>) -> Node {
        Node::new_container(NodeData::Dict(IndexMap::new()), NodeKind::Dict, value_type)
    }

    pub(crate) fn new_list(value_type: Option<FieldType>) -> Node {
        Node::new_container(NodeData::List(Vec::new()), NodeKind::List, value_type)
    }

    fn new_container(data: NodeData, kind: NodeKind, value_type: Option<FieldType>) -> Node {
        Node::from_cell(NodeCell {
            kind,
            class: None,
            value_type: RefCell::new(value_type),
            parent: ParentSlot::default(),
            root: RefCell::new(Weak::new()),
            settings: None,
            data: RefCell::new(data),
        })
    }

    pub(crate) fn upgrade(weak: &Weak<NodeCell>) -> Option<Node> {
        weak.upgrade().map(Node)
    }

    pub(crate) fn downgrade(&self) -> Weak<NodeCell> {
        Rc::downgrade(&self.0)
    }

    pub fn kind(&self) -> NodeKind {
        self.0.kind
    }

    pub fn is_root(&self) -> bool {
        self.0.kind == NodeKind::Root
    }

    /// Class schema of a root or component.
    pub fn class(&self) -> Option<&Rc<ClassSchema>> {
        self.0.class.as_ref()
    }

    pub fn class_name(&self) -> String {
        match &self.0.class {
            Some(class) => class.name().to_string(),
            None => self.0.kind.to_string(),
        }
    }

    /// Whether the node is an instance of the class registered as `tag`, or
    /// of one of its subclasses.
    pub fn is_instance_of(&self, tag: &str) -> bool {
        self.0
            .class
            .as_ref()
            .is_some_and(|class| class.is_subclass_of(tag))
    }

    /// Identity of the node, stable for its lifetime.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Declared type of the entries of a dictionary or list node.
    pub fn value_type(&self) -> Option<FieldType> {
        self.0.value_type.borrow().clone()
    }

    pub fn set_value_type(&self, value_type: Option<FieldType>) {
        *self.0.value_type.borrow_mut() = value_type;
    }

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.get()
    }

    /// Attach the node to an owner, or detach it with `None`.
    ///
    /// A node whose parent is already set can only be attached to a different
    /// owner after it has been detached.
    pub fn set_parent(&self, parent: Option<&Node>) -> Result<()> {
        if let Some(parent) = parent {
            let mut ancestor = Some(parent.clone());
            while let Some(node) = ancestor {
                if node.ptr_eq(self) {
                    return Err(Error::OwnershipCycle {
                        node: self.describe(),
                        parent: parent.describe(),
                    });
                }
                ancestor = node.parent();
            }
        }
        if !self.0.parent.set(self, parent)? {
            return Ok(());
        }
        let root = parent.and_then(Node::root);
        self.propagate_root(root.as_ref());
        Ok(())
    }

    /// Root of the tree the node belongs to. A root is its own root.
    pub fn root(&self) -> Option<Node> {
        if self.is_root() {
            return Some(self.clone());
        }
        let parent = self.parent()?;
        if let Some(root) = Node::upgrade(&self.0.root.borrow()) {
            return Some(root);
        }
        let root = parent.root()?;
        *self.0.root.borrow_mut() = root.downgrade();
        Some(root)
    }

    fn propagate_root(&self, root: Option<&Node>) {
        if self.is_root() {
            return;
        }
        *self.0.root.borrow_mut() = root.map(Node::downgrade).unwrap_or_default();
        for child in self.child_nodes() {
            if child.parent().is_some_and(|p| p.ptr_eq(self)) {
                child.propagate_root(root);
            }
        }
    }

    /// Settings of a root node.
    pub fn settings(&self) -> Option<QuamSettings> {
        self.0.settings.as_ref().map(|s| s.borrow().clone())
    }

    pub fn set_settings(&self, settings: QuamSettings) -> Result<()> {
        let cell = self.0.settings.as_ref().ok_or_else(|| Error::WrongNodeKind {
            expected: NodeKind::Root.to_string(),
            found: self.class_name(),
        })?;
        *cell.borrow_mut() = settings;
        Ok(())
    }

    pub(crate) fn data(&self) -> Ref<'_, NodeData> {
        self.0.data.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, NodeData> {
        self.0.data.borrow_mut()
    }

    /// Raw value addressed by a single path segment.
    pub(crate) fn lookup_raw(&self, segment: &str) -> Option<Value> {
        self.data().lookup(segment).cloned()
    }

    /// Nodes held directly by this node, in declaration order.
    ///
    /// A node held in several slots appears once per slot.
    pub fn child_nodes(&self) -> Vec<Node> {
        self.data()
            .values()
            .filter_map(Value::as_node)
            .cloned()
            .collect()
    }

    /// Whether any slot of this node holds `node`.
    pub(crate) fn holds(&self, node: &Node) -> bool {
        self.data()
            .values()
            .any(|v| v.as_node().is_some_and(|n| n.ptr_eq(node)))
    }

    /// Prepare a value for storage in this node.
    ///
    /// Raw containers become dictionary and list nodes, and nodes are attached
    /// to this node. `declared` is the declared type of the receiving slot.
    pub(crate) fn adopt(&self, value: Value, declared: Option<&FieldType>) -> Result<Value> {
        let value = match value {
            Value::Map(entries) => {
                let dict = Node::new_dict(element_type(declared));
                dict.extend_entries(entries)?;
                Value::Node(dict)
            }
            Value::Seq(items) => {
                let list = Node::new_list(element_type(declared));
                list.extend_items(items)?;
                Value::Node(list)
            }
            other => other,
        };
        if let Value::Node(node) = &value {
            node.set_parent(Some(self))?;
        }
        Ok(value)
    }

    pub(crate) fn extend_entries(&self, entries: IndexMap<Key, Value>) -> Result<()> {
        let declared = self.value_type();
        for (key, value) in entries {
            let value = self.adopt(value, declared.as_ref())?;
            let old = match &mut *self.data_mut() {
                NodeData::Dict(current) => current.insert(key, value),
                _ => None,
            };
            self.release(old);
        }
        Ok(())
    }

    pub(crate) fn extend_items(&self, items: Vec<Value>) -> Result<()> {
        let declared = self.value_type();
        for item in items {
            let item = self.adopt(item, declared.as_ref())?;
            if let NodeData::List(current) = &mut *self.data_mut() {
                current.push(item);
            }
        }
        Ok(())
    }

    /// Detach a value that was removed from this node, unless it is still
    /// held by another slot.
    pub(crate) fn release(&self, old: Option<Value>) {
        let Some(Value::Node(node)) = old else {
            return;
        };
        if node.parent().is_some_and(|p| p.ptr_eq(self)) && !self.holds(&node) {
            // Clearing the parent cannot fail.
            let _ = node.set_parent(None);
        }
    }

    /// Equality as used for values: components compare by identity,
    /// dictionaries and lists by their raw entries.
    pub(crate) fn structural_eq(&self, other: &Node) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (&*self.data(), &*other.data()) {
            (NodeData::Dict(a), NodeData::Dict(b)) => a == b,
            (NodeData::List(a), NodeData::List(b)) => a == b,
            _ => false,
        }
    }

    pub(crate) fn eq_entries(&self, entries: &IndexMap<Key, Value>) -> bool {
        matches!(&*self.data(), NodeData::Dict(own) if own == entries)
    }

    pub(crate) fn eq_items(&self, items: &[Value]) -> bool {
        matches!(&*self.data(), NodeData::List(own) if own.as_slice() == items)
    }

    /// Short description for messages: class name and, when available, the
    /// node's absolute reference.
    pub fn describe(&self) -> String {
        match self.get_reference(None) {
            Ok(reference) if quam_reference::is_absolute(&reference) => {
                format!("{}({reference})", self.class_name())
            }
            _ => self.class_name(),
        }
    }
}

/// Value type of the entries of a container declared as `declared`.
fn element_type(declared: Option<&FieldType>) -> Option<FieldType> {
    declared.and_then(FieldType::element_type).cloned()
}

impl Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Node");
        s.field("kind", &self.0.kind);
        if let Some(class) = &self.0.class {
            s.field("class", &class.tag());
        }
        match self.0.data.try_borrow() {
            Ok(data) => s.field("data", &*data),
            Err(_) => s.field("data", &"<borrowed>"),
        };
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_slot() {
        let parent = Node::new_dict(None);
        let other = Node::new_dict(None);
        let child = Node::new_list(None);

        child.set_parent(Some(&parent)).unwrap();
        assert!(child.parent().unwrap().ptr_eq(&parent));
        // Same parent again is a no-op
        child.set_parent(Some(&parent)).unwrap();
        assert!(matches!(
            child.set_parent(Some(&other)),
            Err(Error::ParentOverwrite { .. })
        ));
        child.set_parent(None).unwrap();
        assert!(child.parent().is_none());
        child.set_parent(Some(&other)).unwrap();
        assert!(child.parent().unwrap().ptr_eq(&other));
    }

    #[test]
    fn test_ownership_cycle() {
        let a = Node::new_dict(None);
        let b = Node::new_dict(None);
        b.set_parent(Some(&a)).unwrap();
        assert!(matches!(
            a.set_parent(Some(&b)),
            Err(Error::OwnershipCycle { .. })
        ));
        assert!(matches!(
            a.set_parent(Some(&a)),
            Err(Error::OwnershipCycle { .. })
        ));
    }

    #[test]
    fn test_dropped_parent_detaches() {
        let child = Node::new_list(None);
        {
            let parent = Node::new_dict(None);
            child.set_parent(Some(&parent)).unwrap();
        }
        assert!(child.parent().is_none());
        child.set_parent(Some(&Node::new_dict(None))).unwrap();
    }

    #[test]
    fn test_adopt_coerces_raw_containers() {
        let owner = Node::new_dict(None);
        let value = owner
            .adopt(Value::map([("a", Value::seq([1, 2]))]), None)
            .unwrap();
        let dict = value.as_node().unwrap();
        assert_eq!(dict.kind(), NodeKind::Dict);
        assert!(dict.parent().unwrap().ptr_eq(&owner));
        let inner = dict.lookup_raw("a").unwrap();
        let list = inner.as_node().unwrap();
        assert_eq!(list.kind(), NodeKind::List);
        assert!(list.parent().unwrap().ptr_eq(dict));
        assert_eq!(inner, Value::seq([1, 2]));
    }

    #[test]
    fn test_adopt_carries_value_type() {
        let owner = Node::new_dict(None);
        let declared = FieldType::optional(FieldType::dict_of(FieldType::Int));
        let value = owner
            .adopt(Value::map([("a", 1)]), Some(&declared))
            .unwrap();
        assert_eq!(value.as_node().unwrap().value_type(), Some(FieldType::Int));
    }

    #[test]
    fn test_nested_entries_inherit_value_type() {
        let owner = Node::new_dict(None);
        let declared = FieldType::dict_of(FieldType::list_of(FieldType::Int));
        let value = owner
            .adopt(Value::map([("a", Value::seq([1]))]), Some(&declared))
            .unwrap();
        let dict = value.as_node().unwrap();
        let inner = dict.lookup_raw("a").unwrap();
        assert_eq!(inner.as_node().unwrap().value_type(), Some(FieldType::Int));

        dict.insert_entry(Key::from("b"), Value::seq([2])).unwrap();
        let added = dict.lookup_raw("b").unwrap();
        assert_eq!(added.as_node().unwrap().value_type(), Some(FieldType::Int));
    }

    #[test]
    fn test_dict_lookup_int_fallback() {
        let dict = Node::new_dict(None);
        dict.extend_entries(IndexMap::from([
            (Key::Int(1), Value::from("int")),
            (Key::from("x"), Value::from("str")),
        ]))
        .unwrap();
        assert_eq!(dict.lookup_raw("1"), Some(Value::from("int")));
        assert_eq!(dict.lookup_raw("x"), Some(Value::from("str")));
        assert_eq!(dict.lookup_raw("2"), None);
    }

    #[test]
    fn test_structural_equality() {
        let a = Node::new_list(None);
        a.extend_items(vec![Value::Int(1), Value::from("#/x")]).unwrap();
        let b = Node::new_list(None);
        b.extend_items(vec![Value::Int(1), Value::from("#/x")]).unwrap();
        assert_eq!(Value::Node(a.clone()), Value::Node(b));
        assert_eq!(Value::Node(a.clone()), Value::seq([Value::Int(1), Value::from("#/x")]));
        assert_ne!(Value::Node(a), Value::Map(IndexMap::new()));
    }
}
