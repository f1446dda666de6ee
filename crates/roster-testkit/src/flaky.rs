// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use roster_app::{Collection, Fields, Page, PageLocator, QuerySpec, RecordStore};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Query,
    FetchPage,
    GetById,
    Add,
    Update,
    Delete,
    ListChoices,
}

#[derive(Debug, Default)]
struct Faults {
    failing_ids: HashSet<(Collection, i64)>,
    remaining: HashMap<Operation, usize>,
    calls: HashMap<Operation, usize>,
    delays: HashMap<Operation, Duration>,
}

/// Wraps a store and injects failures or latency on demand.
#[derive(Debug)]
pub struct FlakyStore<S> {
    inner: S,
    faults: Mutex<Faults>,
}

impl<S: RecordStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Every later lookup of this record fails.
    pub fn fail_lookup(&self, collection: Collection, id: i64) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing_ids.insert((collection, id));
        }
    }

    /// The next `times` calls of `operation` fail.
    pub fn fail_next(&self, operation: Operation, times: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.remaining.insert(operation, times);
        }
    }

    pub fn delay(&self, operation: Operation, delay: Duration) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.delays.insert(operation, delay);
        }
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.faults
            .lock()
            .map(|faults| faults.calls.get(&operation).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    fn enter(&self, operation: Operation, record: Option<(Collection, i64)>) -> Result<()> {
        let delay = {
            let mut faults = self
                .faults
                .lock()
                .map_err(|_| anyhow!("fault table lock poisoned"))?;
            *faults.calls.entry(operation).or_default() += 1;
            if let Some(key) = record
                && faults.failing_ids.contains(&key)
            {
                bail!("injected failure: {} item {} unavailable", key.0.as_str(), key.1);
            }
            if let Some(remaining) = faults.remaining.get_mut(&operation)
                && *remaining > 0
            {
                *remaining -= 1;
                bail!("injected failure: {operation:?}");
            }
            faults.delays.get(&operation).copied()
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        Ok(())
    }
}

impl<S: RecordStore> RecordStore for FlakyStore<S> {
    fn query(&self, spec: &QuerySpec) -> Result<PageLocator> {
        self.enter(Operation::Query, None)?;
        self.inner.query(spec)
    }

    fn fetch_page<R: DeserializeOwned>(&self, locator: &PageLocator) -> Result<Page<R>> {
        self.enter(Operation::FetchPage, None)?;
        self.inner.fetch_page(locator)
    }

    fn get_by_id<R: DeserializeOwned>(&self, collection: Collection, id: i64) -> Result<R> {
        self.enter(Operation::GetById, Some((collection, id)))?;
        self.inner.get_by_id(collection, id)
    }

    fn add(&self, collection: Collection, fields: &Fields) -> Result<i64> {
        self.enter(Operation::Add, None)?;
        self.inner.add(collection, fields)
    }

    fn update(&self, collection: Collection, id: i64, fields: &Fields) -> Result<()> {
        self.enter(Operation::Update, Some((collection, id)))?;
        self.inner.update(collection, id, fields)
    }

    fn delete(&self, collection: Collection, id: i64) -> Result<()> {
        self.enter(Operation::Delete, Some((collection, id)))?;
        self.inner.delete(collection, id)
    }

    fn list_choices(&self, collection: Collection, field: &str) -> Result<Vec<String>> {
        self.enter(Operation::ListChoices, None)?;
        self.inner.list_choices(collection, field)
    }
}
