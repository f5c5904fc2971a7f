// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Human readable overview of a tree.

use std::fmt::{self, Display};

use crate::node::{Node, NodeData, NodeKind};
use crate::value::Value;

/// Lists rendering shorter than this are printed on a single line.
const INLINE_WIDTH: usize = 80;

/// Indented rendering of a node and its descendants, see [`Node::summary`].
pub struct Summary<'a>(&'a Node);

impl Node {
    /// Indented overview of this node and everything it holds.
    ///
    /// Nested nodes are rendered as `name: Class` followed by their own
    /// attributes, leaves as `name: value` with raw references left as is.
    pub fn summary(&self) -> Summary<'_> {
        Summary(self)
    }
}

impl Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, self.0, 0)
    }
}

fn header(node: &Node) -> String {
    if node.is_root() {
        return "QUAM:".to_string();
    }
    match node.parent() {
        None => format!("{} (parent unknown):", node.class_name()),
        Some(parent) => match parent.attr_name_of(node) {
            Ok(name) => format!("{name}: {}", node.class_name()),
            Err(_) => format!("{}:", node.class_name()),
        },
    }
}

fn entries(node: &Node) -> Vec<(String, Value)> {
    let skipped = |name: &str| {
        node.class()
            .and_then(|class| class.field(name))
            .is_some_and(|field| field.skip_save)
    };
    match &*node.data() {
        NodeData::Fields { fields, extras } => fields
            .iter()
            .chain(extras.iter())
            .filter(|(name, _)| !skipped(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        NodeData::Dict(entries) => entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect(),
        NodeData::List(items) => items
            .iter()
            .enumerate()
            .map(|(index, value)| (index.to_string(), value.clone()))
            .collect(),
    }
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &Node, indent: usize) -> fmt::Result {
    let header = header(node);
    let entries = entries(node);
    let inner = indent + 2;
    if entries.is_empty() {
        let empty = match node.kind() {
            NodeKind::List => "= []",
            _ => "Empty",
        };
        return writeln!(f, "{:indent$}{header} {empty}", "");
    }
    writeln!(f, "{:indent$}{header}", "")?;
    if node.kind() == NodeKind::List {
        let inline =
            Value::Seq(entries.iter().map(|(_, value)| value.clone()).collect()).to_string();
        if inline.len() + 2 * indent < INLINE_WIDTH {
            return writeln!(f, "{:inner$}{inline}", "");
        }
    }
    for (name, value) in entries {
        match value {
            Value::Node(child) => write_node(f, &child, inner)?,
            value => writeln!(f, "{:inner$}{name}: {value}", "")?,
        }
    }
    Ok(())
}
