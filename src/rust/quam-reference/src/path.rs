// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::{DELIMITER, Error, Result, is_absolute, is_reference};

/// Where a reference path starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `#/`, the root of the tree.
    Root,
    /// `#./` for `up == 0`, `#../` for `up == 1`, `#../../` for `up == 2` etc.
    Relative { up: usize },
}

/// A normalized reference: an anchor plus plain segments without `.` or `..`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePath {
    anchor: Anchor,
    segments: Vec<String>,
}

impl ReferencePath {
    pub fn parse(reference: &str) -> Result<Self> {
        if !is_reference(reference) {
            return Err(Error::NotAReference(reference.to_string()));
        }
        let (anchor, rest) = if is_absolute(reference) {
            (Anchor::Root, &reference[2..])
        } else {
            (Anchor::Relative { up: 0 }, &reference[1..])
        };
        let mut path = ReferencePath {
            anchor,
            segments: Vec::new(),
        };
        path.apply(rest, reference)?;
        Ok(path)
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.segments.pop()
    }

    /// Walk the `/`-delimited `steps`, honoring `.` and `..`.
    ///
    /// `origin` is only used for error messages.
    pub(crate) fn apply(&mut self, steps: &str, origin: &str) -> Result<()> {
        for step in steps.split(DELIMITER) {
            match step {
                "" | "." => {}
                ".." => {
                    if self.segments.pop().is_some() {
                        continue;
                    }
                    match &mut self.anchor {
                        Anchor::Root => return Err(Error::AboveRoot(origin.to_string())),
                        Anchor::Relative { up } => *up += 1,
                    }
                }
                segment => self.segments.push(segment.to_string()),
            }
        }
        Ok(())
    }
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.anchor {
            Anchor::Root => f.write_str("#/")?,
            Anchor::Relative { up: 0 } => f.write_str("#./")?,
            Anchor::Relative { up } => {
                f.write_str("#")?;
                for _ in 0..up {
                    f.write_str("../")?;
                }
            }
        }
        f.write_str(&self.segments.join("/"))
    }
}
