// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! String algebra for QUAM references.
//!
//! A reference is a string starting with `#/` (absolute, resolved from the
//! tree root), `#./` (relative to the node holding the reference) or `#../`
//! (relative to its parent, may be repeated). The remainder is a
//! `/`-delimited path of attribute names, dictionary keys and list indices.
//!
//! Nothing in this crate knows about the object tree; see `quam-core` for the
//! navigation of a reference against actual nodes.

mod error;
mod path;

pub use error::{Error, Result};
pub use path::{Anchor, ReferencePath};

pub const ABSOLUTE_PREFIX: &str = "#/";
pub const SELF_PREFIX: &str = "#./";
pub const PARENT_PREFIX: &str = "#../";
pub const DELIMITER: char = '/';

/// Check whether a string is a reference.
pub fn is_reference(string: &str) -> bool {
    string.starts_with(ABSOLUTE_PREFIX)
        || string.starts_with(SELF_PREFIX)
        || string.starts_with(PARENT_PREFIX)
}

/// Check whether a string is an absolute reference, i.e. starts with `#/`.
pub fn is_absolute(string: &str) -> bool {
    string.starts_with(ABSOLUTE_PREFIX)
}

/// Whether a path segment addresses a list index.
pub fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Split off the next path segment.
///
/// Leading `#` and `/` characters are stripped first. Returns the segment up to
/// the first delimiter and the remainder after it; both are empty when nothing
/// is left.
pub fn split_next_segment(string: &str) -> (&str, &str) {
    let string = string.trim_start_matches(['#', DELIMITER]);
    match string.split_once(DELIMITER) {
        Some((head, rest)) => (head, rest),
        None => (string, ""),
    }
}

/// Split a reference into the reference of its parent and the last segment.
///
/// `"#/a/b"` becomes `("#/a", "b")` and `"#./a"` becomes `("#./", "a")`.
/// A reference without segments (e.g. `"#/"`) has nothing to split off.
pub fn split_reference(reference: &str) -> Result<(String, String)> {
    let mut path = ReferencePath::parse(reference)?;
    let last = path
        .pop()
        .ok_or_else(|| Error::NoParent(reference.to_string()))?;
    Ok((path.to_string(), last))
}

/// Resolve a relative reference against a base reference.
///
/// The base denotes an object; `#./x` descends into it and `#../x` ascends to
/// its parent first. An absolute base cannot be left upwards, whereas `..`
/// segments beyond a relative base accumulate.
pub fn join_references(base: &str, relative: &str) -> Result<String> {
    if !is_reference(relative) {
        return Err(Error::NotAReference(relative.to_string()));
    }
    let mut path = ReferencePath::parse(base)?;
    if is_absolute(relative) {
        if path.anchor() == Anchor::Root {
            return Err(Error::JoinAbsolute {
                base: base.to_string(),
                relative: relative.to_string(),
            });
        }
        return Ok(relative.to_string());
    }
    path.apply(&relative[1..], relative)?;
    Ok(path.to_string())
}
