// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::cell::RefCell;
use std::rc::Weak;

use crate::error::{Error, Result};
use crate::node::{Node, NodeCell};

/// Write-once-unless-cleared owner link of a node.
///
/// The slot holds a weak link: an owner that is dropped leaves its former
/// children detached.
#[derive(Default)]
pub(crate) struct ParentSlot(RefCell<Weak<NodeCell>>);

impl ParentSlot {
    pub(crate) fn get(&self) -> Option<Node> {
        Node::upgrade(&self.0.borrow())
    }

    /// Store a new owner for `owner`, returning whether the slot changed.
    ///
    /// Clearing always succeeds and setting the current owner again is a
    /// no-op. Replacing one owner with another fails.
    pub(crate) fn set(&self, owner: &Node, parent: Option<&Node>) -> Result<bool> {
        match (self.get(), parent) {
            (None, None) => Ok(false),
            (Some(_), None) => {
                *self.0.borrow_mut() = Weak::new();
                Ok(true)
            }
            (Some(current), Some(new)) if current.ptr_eq(new) => Ok(false),
            (Some(_), Some(_)) => Err(Error::ParentOverwrite {
                node: owner.describe(),
            }),
            (None, Some(new)) => {
                *self.0.borrow_mut() = new.downgrade();
                Ok(true)
            }
        }
    }
}
