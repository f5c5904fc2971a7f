// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A string used as a reference does not follow the reference grammar.
    #[error(transparent)]
    InvalidReference(#[from] quam_reference::Error),
    /// A well-formed reference points to a location that does not exist.
    #[error("Could not get reference \"{reference}\" from {origin}: {reason}")]
    ReferenceResolution {
        reference: String,
        origin: String,
        reason: String,
    },
    /// An absolute reference was resolved from a node without a root.
    #[error("No QuamRoot associated, cannot retrieve absolute reference {reference} from {origin}")]
    DetachedRoot { reference: String, origin: String },
    #[error(
        "Cannot overwrite parent attribute of {node}. \
        To modify {node}.parent, first set the parent to None"
    )]
    ParentOverwrite { node: String },
    #[error(
        "Cannot set attribute {attr} of {node} to {value} because it is a reference \
        ({reference}). To overwrite the reference, set the attribute to None first"
    )]
    ReferenceOverwrite {
        node: String,
        attr: String,
        value: String,
        reference: String,
    },
    #[error("Please provide {class}.{field} as it is a required arg")]
    MissingRequiredField { class: String, field: String },
    #[error("Missing required attrs {fields:?} for {path}")]
    MissingRequiredFields { path: String, fields: Vec<String> },
    #[error("Attribute {attr} is not a valid attr of {path}")]
    UnknownField { path: String, attr: String },
    #[error("Wrong type type({path})={actual} != {expected}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("No class registered under type tag '{0}'")]
    UnknownClass(String),
    #[error("Invalid class definition {class}: {reason}")]
    InvalidSchema { class: String, reason: String },
    #[error("{container} has no key {key}")]
    MissingKey { container: String, key: String },
    #[error("Index {index} out of range for {container} of length {len}")]
    IndexOutOfRange {
        container: String,
        index: usize,
        len: usize,
    },
    #[error("Cannot attach {node} to {parent}: the node would become its own ancestor")]
    OwnershipCycle { node: String, parent: String },
    #[error("Cannot order components for config generation: {0}")]
    Ordering(String),
    #[error("Expected a {expected} node, found {found}")]
    WrongNodeKind { expected: String, found: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }

    /// Whether the error stems from a reference that could not be resolved.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Error::ReferenceResolution { .. } | Error::DetachedRoot { .. }
        )
    }
}
