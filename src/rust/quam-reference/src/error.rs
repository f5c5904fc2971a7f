// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Error definitions for reference string handling.
use thiserror::Error;

#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum Error {
    #[error("'{0}' is not a reference")]
    NotAReference(String),
    #[error("cannot join two absolute references '{base}' and '{relative}'")]
    JoinAbsolute { base: String, relative: String },
    #[error("reference '{0}' ascends above the root")]
    AboveRoot(String),
    #[error("reference '{0}' has no attribute to split off")]
    NoParent(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
