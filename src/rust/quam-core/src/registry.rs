// Copyright 2026 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::rc::Rc;

use indexmap::IndexMap;

use crate::dataclass::{ClassDef, ClassSchema};
use crate::error::{Error, Result};

/// Classes known to instantiation, keyed by their type tag.
///
/// A class must be registered after the class it extends.
#[derive(Default)]
pub struct ClassRegistry {
    classes: IndexMap<String, Rc<ClassSchema>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: ClassDef) -> Result<Rc<ClassSchema>> {
        if self.classes.contains_key(&def.tag) {
            return Err(Error::InvalidSchema {
                class: def.tag,
                reason: "a class with this tag is already registered".to_string(),
            });
        }
        let parent = match &def.extends {
            Some(tag) => Some(self.resolve(tag)?),
            None => None,
        };
        let schema = Rc::new(ClassSchema::from_def(def, parent.as_deref())?);
        quam_log::diagnostic!(
            "Registered class {} with fields {:?}",
            schema.tag(),
            schema.fields().map(|f| f.name.as_str()).collect::<Vec<_>>()
        );
        self.classes
            .insert(schema.tag().to_string(), Rc::clone(&schema));
        Ok(schema)
    }

    pub fn get(&self, tag: &str) -> Option<&Rc<ClassSchema>> {
        self.classes.get(tag)
    }

    pub fn resolve(&self, tag: &str) -> Result<Rc<ClassSchema>> {
        self.classes
            .get(tag)
            .cloned()
            .ok_or_else(|| Error::UnknownClass(tag.to_string()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.classes.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<ClassSchema>> {
        self.classes.values()
    }
}
