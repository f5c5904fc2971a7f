// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Reference-aware component trees for describing quantum machines.
//!
//! A tree consists of a root, components with declared fields, and
//! dictionary and list containers. Attributes may hold reference strings
//! (`#/...`, `#./...`, `#../...`) that are resolved against the tree on
//! every read. Trees are rebuilt from nested dictionaries through a
//! [`ClassRegistry`], flattened back with [`to_dict`], and compiled into a
//! hardware configuration by [`generate_config`].

mod access;
pub mod config;
pub mod containers;
pub mod dataclass;
mod error;
pub mod instantiate;
mod node;
mod ownership;
pub mod reference;
pub mod registry;
pub mod root;
pub mod serialisation;
pub mod serialize;
pub mod settings;
mod summary;
pub mod type_checking;
mod value;

pub use config::{ComponentBehavior, ConfigSettings, QuaConfig, generate_config};
pub use containers::{QuamDict, QuamList};
pub use dataclass::{ClassDef, ClassRole, ClassSchema, FieldSpec, FieldType, Requiredness};
pub use error::{Error, Result};
pub use instantiate::{CLASS_KEY, InstantiateOptions, instantiate, instantiate_tagged};
pub use node::{Node, NodeKind};
pub use reference::get_referenced_value;
pub use registry::ClassRegistry;
pub use root::{LoadSource, QuamRoot};
pub use serialisation::{JsonSerialiser, LoadMetadata, SaveOptions, Serialiser};
pub use serialize::{ToDictOptions, to_dict, to_json};
pub use settings::{MissingReferencePolicy, QuamSettings};
pub use summary::Summary;
pub use value::{Key, Value};

pub use quam_reference::{join_references, split_reference};
