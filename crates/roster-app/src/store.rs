// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde::de::DeserializeOwned;

use crate::{Collection, Fields, Page, PageLocator, QuerySpec};

/// The list store the browsers page through. Implementations report failures
/// as `anyhow` errors; callers convert them to `DirectoryError` at the
/// operation boundary.
pub trait RecordStore {
    /// Mint the locator of the first page without executing it.
    fn query(&self, spec: &QuerySpec) -> Result<PageLocator>;

    fn fetch_page<R: DeserializeOwned>(&self, locator: &PageLocator) -> Result<Page<R>>;

    fn get_by_id<R: DeserializeOwned>(&self, collection: Collection, id: i64) -> Result<R>;

    /// Returns the identifier the store assigned.
    fn add(&self, collection: Collection, fields: &Fields) -> Result<i64>;

    fn update(&self, collection: Collection, id: i64, fields: &Fields) -> Result<()>;

    fn delete(&self, collection: Collection, id: i64) -> Result<()>;

    fn list_choices(&self, collection: Collection, field: &str) -> Result<Vec<String>>;

    /// Every record of a small collection, following next links to the end.
    fn fetch_all<R: DeserializeOwned>(&self, spec: &QuerySpec) -> Result<Vec<R>> {
        let mut locator = Some(self.query(spec)?);
        let mut records = Vec::new();
        while let Some(current) = locator.take() {
            let page = self.fetch_page::<R>(&current)?;
            records.extend(page.records);
            locator = page.next.filter(|next| next != &current);
        }
        Ok(records)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn query(&self, spec: &QuerySpec) -> Result<PageLocator> {
        (**self).query(spec)
    }

    fn fetch_page<R: DeserializeOwned>(&self, locator: &PageLocator) -> Result<Page<R>> {
        (**self).fetch_page(locator)
    }

    fn get_by_id<R: DeserializeOwned>(&self, collection: Collection, id: i64) -> Result<R> {
        (**self).get_by_id(collection, id)
    }

    fn add(&self, collection: Collection, fields: &Fields) -> Result<i64> {
        (**self).add(collection, fields)
    }

    fn update(&self, collection: Collection, id: i64, fields: &Fields) -> Result<()> {
        (**self).update(collection, id, fields)
    }

    fn delete(&self, collection: Collection, id: i64) -> Result<()> {
        (**self).delete(collection, id)
    }

    fn list_choices(&self, collection: Collection, field: &str) -> Result<Vec<String>> {
        (**self).list_choices(collection, field)
    }
}
