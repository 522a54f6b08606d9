// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::{ArxivClass, PrefKey, PrefsStorage, PromptEntry, RecordStore, StoredRecord};

/// A record that can be picked on the recognition page.
pub trait ChoiceRecord: StoredRecord {
    /// Name of the second payload field next to `name`.
    const DETAIL_KEY: &'static str;

    fn name(&self) -> &str;
    fn detail(&self) -> &str;
    fn build(name: &str, detail: &str) -> Option<Self>;
}

impl ChoiceRecord for ArxivClass {
    const DETAIL_KEY: &'static str = "description";

    fn name(&self) -> &str {
        &self.name
    }

    fn detail(&self) -> &str {
        &self.description
    }

    fn build(name: &str, detail: &str) -> Option<Self> {
        let name = name.trim();
        (!name.is_empty()).then(|| Self {
            name: name.to_owned(),
            description: detail.trim().to_owned(),
        })
    }
}

impl ChoiceRecord for PromptEntry {
    const DETAIL_KEY: &'static str = "content";

    fn name(&self) -> &str {
        &self.name
    }

    fn detail(&self) -> &str {
        &self.content
    }

    fn build(name: &str, detail: &str) -> Option<Self> {
        let name = name.trim();
        (!name.is_empty()).then(|| Self {
            name: name.to_owned(),
            content: detail.trim().to_owned(),
        })
    }
}

/// A persisted list where at most one row is checked at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceList<R> {
    store: RecordStore<R>,
    checked: Option<usize>,
}

impl<R: ChoiceRecord> ChoiceList<R> {
    pub fn load(key: PrefKey, storage: &dyn PrefsStorage) -> Self {
        Self {
            store: RecordStore::load(key, storage),
            checked: None,
        }
    }

    pub fn entries(&self) -> &[R] {
        self.store.records()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn checked(&self) -> Option<usize> {
        self.checked
    }

    /// Checking a row unchecks every other row; toggling the checked row
    /// leaves none checked.
    pub fn toggle(&mut self, index: usize) {
        if index >= self.store.len() {
            return;
        }
        self.checked = if self.checked == Some(index) {
            None
        } else {
            Some(index)
        };
    }

    /// Appends a new entry and persists the list. Returns false when the
    /// name is blank.
    pub fn add(&mut self, name: &str, detail: &str, storage: &dyn PrefsStorage) -> Result<bool> {
        let Some(record) = R::build(name, detail) else {
            return Ok(false);
        };
        self.store.append(record);
        self.store.save(storage)?;
        Ok(true)
    }

    pub fn delete(&mut self, index: usize, storage: &dyn PrefsStorage) -> Result<bool> {
        if index >= self.store.len() {
            return Ok(false);
        }
        self.store.remove_indices(&BTreeSet::from([index]));
        self.checked = match self.checked {
            Some(checked) if checked == index => None,
            Some(checked) if checked > index => Some(checked - 1),
            other => other,
        };
        self.store.save(storage)?;
        Ok(true)
    }

    /// `{name, <detail>}` of the checked row, or an empty object.
    pub fn payload(&self) -> Value {
        let mut object = Map::new();
        if let Some(record) = self.checked.and_then(|index| self.store.get(index)) {
            object.insert("name".to_owned(), Value::from(record.name()));
            object.insert(R::DETAIL_KEY.to_owned(), Value::from(record.detail()));
        }
        Value::Object(object)
    }
}
