// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use crate::{PrefKey, StoredRecord};

/// String-valued preference storage supplied by the host.
pub trait PrefsStorage {
    fn get_pref(&self, key: PrefKey) -> Result<Option<String>>;
    fn set_pref(&self, key: PrefKey, value: &str) -> Result<()>;
}

/// In-process storage used by demo sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryPrefs {
    values: RefCell<BTreeMap<&'static str, String>>,
    writes: RefCell<usize>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: PrefKey, value: &str) -> Self {
        let prefs = Self::default();
        prefs.values.borrow_mut().insert(key.as_str(), value.to_owned());
        prefs
    }

    pub fn raw(&self, key: PrefKey) -> Option<String> {
        self.values.borrow().get(key.as_str()).cloned()
    }

    pub fn write_count(&self) -> usize {
        *self.writes.borrow()
    }
}

impl PrefsStorage for MemoryPrefs {
    fn get_pref(&self, key: PrefKey) -> Result<Option<String>> {
        Ok(self.raw(key))
    }

    fn set_pref(&self, key: PrefKey, value: &str) -> Result<()> {
        self.values
            .borrow_mut()
            .insert(key.as_str(), value.to_owned());
        *self.writes.borrow_mut() += 1;
        Ok(())
    }
}

/// An ordered list of records bound to one preference key.
///
/// Mutation and persistence are separate steps: `append` and
/// `remove_indices` only touch memory, `save` writes the whole list.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordStore<R> {
    key: PrefKey,
    records: Vec<R>,
}

impl<R: StoredRecord> RecordStore<R> {
    pub fn empty(key: PrefKey) -> Self {
        Self {
            key,
            records: Vec::new(),
        }
    }

    pub fn load(key: PrefKey, storage: &dyn PrefsStorage) -> Self {
        let raw = match storage.get_pref(key) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(key = key.as_str(), "read preference failed: {error:#}");
                None
            }
        };
        Self {
            key,
            records: raw.as_deref().map(parse_records).unwrap_or_default(),
        }
    }

    pub fn key(&self) -> PrefKey {
        self.key
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&R> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn save(&self, storage: &dyn PrefsStorage) -> Result<()> {
        let encoded = serde_json::to_string(&self.records)
            .with_context(|| format!("encode {}", self.key.as_str()))?;
        storage
            .set_pref(self.key, &encoded)
            .with_context(|| format!("persist {}", self.key.as_str()))?;
        tracing::debug!(
            key = self.key.as_str(),
            count = self.records.len(),
            "records persisted"
        );
        Ok(())
    }

    pub fn append(&mut self, record: R) {
        self.records.push(record);
    }

    /// Drops every record whose original position is in `targets` and
    /// returns how many were removed.
    pub fn remove_indices(&mut self, targets: &BTreeSet<usize>) -> usize {
        let before = self.records.len();
        self.records = crate::retain_survivors(&self.records, targets);
        before - self.records.len()
    }
}

impl<R: StoredRecord + PartialEq> RecordStore<R> {
    pub fn contains(&self, record: &R) -> bool {
        self.records.iter().any(|existing| existing == record)
    }
}

fn parse_records<R: StoredRecord>(raw: &str) -> Vec<R> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(parsed) => parsed,
        Err(error) => {
            tracing::debug!("ignoring malformed stored list: {error}");
            return Vec::new();
        }
    };
    match parsed {
        Value::Array(items) => items.iter().filter_map(R::normalize).collect(),
        _ => Vec::new(),
    }
}
