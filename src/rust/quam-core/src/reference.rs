// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Navigation of references against the node tree.

use std::collections::HashSet;

use quam_reference::{is_absolute, is_reference, split_next_segment};

use crate::error::{Error, Result};
use crate::node::Node;
use crate::value::Value;

/// Upper bound on the number of references followed in one resolution.
const MAX_HOPS: usize = 256;

/// Resolve `reference` starting at `obj`.
///
/// Absolute references are resolved from `root`. Segments are attribute
/// names of components, keys of dictionaries and indices of lists. Every
/// intermediate or final value that is itself a reference is resolved in turn,
/// relative to the node holding it.
pub fn get_referenced_value(obj: &Value, reference: &str, root: Option<&Node>) -> Result<Value> {
    if !is_reference(reference) {
        return Err(quam_reference::Error::NotAReference(reference.to_string()).into());
    }
    Resolver::default().follow(obj, reference, root)
}

/// Resolve a reference held by `holder`.
pub(crate) fn resolve(holder: &Node, reference: &str) -> Result<Value> {
    Resolver::default().resolve_held(holder, reference)
}

#[derive(Default)]
struct Resolver {
    visited: HashSet<(usize, String)>,
    hops: usize,
}

impl Resolver {
    /// Follow a reference held by `holder`.
    ///
    /// `visited` only holds the references of the chain currently being
    /// followed, so separate chains may pass through the same alias.
    fn resolve_held(&mut self, holder: &Node, reference: &str) -> Result<Value> {
        let key = (holder.id(), reference.to_string());
        if self.visited.contains(&key) {
            return Err(failure(
                reference,
                &Value::Node(holder.clone()),
                "the reference chain is cyclic",
            ));
        }
        self.hops += 1;
        if self.hops > MAX_HOPS {
            return Err(failure(
                reference,
                &Value::Node(holder.clone()),
                "too many chained references",
            ));
        }
        self.visited.insert(key.clone());
        let root = holder.root();
        let resolved = self.follow(&Value::Node(holder.clone()), reference, root.as_ref());
        self.visited.remove(&key);
        resolved
    }

    fn follow(&mut self, obj: &Value, reference: &str, root: Option<&Node>) -> Result<Value> {
        let mut current = if is_absolute(reference) {
            match root {
                Some(root) => Value::Node(root.clone()),
                None => {
                    return Err(Error::DetachedRoot {
                        reference: reference.to_string(),
                        origin: origin(obj),
                    });
                }
            }
        } else {
            obj.clone()
        };
        let mut rest = reference;
        loop {
            rest = rest.trim_start_matches(['#', '/']);
            if rest.is_empty() {
                return Ok(current);
            }
            if rest == ".." || rest.starts_with("../") {
                current = match current.as_node().and_then(Node::parent) {
                    Some(parent) => Value::Node(parent),
                    None => {
                        return Err(failure(
                            reference,
                            obj,
                            &format!("{} has no parent", origin(&current)),
                        ));
                    }
                };
                rest = &rest[2..];
                continue;
            }
            if rest == "." || rest.starts_with("./") {
                rest = &rest[1..];
                continue;
            }
            let (segment, tail) = split_next_segment(rest);
            current = self.step(&current, segment, reference, obj)?;
            rest = tail;
        }
    }

    fn step(
        &mut self,
        current: &Value,
        segment: &str,
        reference: &str,
        obj: &Value,
    ) -> Result<Value> {
        let Some(node) = current.as_node() else {
            return Err(failure(
                reference,
                obj,
                &format!("{} has no attribute {segment}", current.type_name()),
            ));
        };
        let raw = node.lookup_raw(segment).ok_or_else(|| {
            failure(
                reference,
                obj,
                &format!("{} has no attribute {segment}", node.describe()),
            )
        })?;
        match raw.as_reference() {
            Some(next) => self.resolve_held(node, next),
            None => Ok(raw),
        }
    }
}

fn origin(obj: &Value) -> String {
    match obj {
        Value::Node(node) => node.describe(),
        other => other.type_name(),
    }
}

fn failure(reference: &str, obj: &Value, reason: &str) -> Error {
    Error::ReferenceResolution {
        reference: reference.to_string(),
        origin: origin(obj),
        reason: reason.to_string(),
    }
}
