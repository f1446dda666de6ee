// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use url::form_urlencoded;

use roster_app::{Collection, Fields, Page, PageLocator, QuerySpec, RecordStore};

use crate::Predicate;

const SCHEME: &str = "memory://";
const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Default)]
struct MemoryList {
    items: BTreeMap<i64, Fields>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct MemoryLists {
    lists: HashMap<Collection, MemoryList>,
    choices: HashMap<(Collection, String), Vec<String>>,
}

/// In-process lists with the same paging and filtering behavior as the
/// remote store. Locators look like `memory://<collection>/<query>/<offset>`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryLists>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemoryQuery {
    select: Vec<String>,
    filter: String,
    top: usize,
}

impl MemoryQuery {
    fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("$select", &self.select.join(","))
            .append_pair("$filter", &self.filter)
            .append_pair("$top", &self.top.to_string())
            .finish()
    }

    fn decode(raw: &str) -> Result<Self> {
        let mut query = Self {
            select: Vec::new(),
            filter: String::new(),
            top: DEFAULT_PAGE_SIZE,
        };
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "$select" => {
                    query.select = value
                        .split(',')
                        .filter(|field| !field.is_empty())
                        .map(str::to_owned)
                        .collect();
                }
                "$filter" => query.filter = value.into_owned(),
                "$top" => {
                    query.top = value
                        .parse()
                        .with_context(|| format!("invalid page size {value:?} in locator"))?;
                }
                _ => {}
            }
        }
        Ok(query)
    }
}

fn locator(collection: Collection, query: &MemoryQuery, offset: usize) -> PageLocator {
    PageLocator::new(format!(
        "{SCHEME}{}/{}/{offset}",
        collection.as_str(),
        query.encode()
    ))
}

fn parse_locator(locator: &PageLocator) -> Result<(Collection, MemoryQuery, usize)> {
    let raw = locator.as_str();
    let rest = raw
        .strip_prefix(SCHEME)
        .ok_or_else(|| anyhow!("locator {raw:?} was not issued by the memory store"))?;
    let (name, rest) = rest
        .split_once('/')
        .ok_or_else(|| anyhow!("locator {raw:?} has no query"))?;
    let (query, offset) = rest
        .rsplit_once('/')
        .ok_or_else(|| anyhow!("locator {raw:?} has no offset"))?;
    let collection =
        Collection::parse(name).ok_or_else(|| anyhow!("unknown collection {name:?} in locator"))?;
    let offset = offset
        .parse()
        .with_context(|| format!("invalid offset in locator {raw:?}"))?;
    Ok((collection, MemoryQuery::decode(query)?, offset))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a serializable record as-is. A positive `Id` is kept, anything
    /// else gets the next identifier.
    pub fn insert<T: Serialize>(&self, collection: Collection, record: &T) -> Result<i64> {
        let value = serde_json::to_value(record).context("encode record")?;
        let Value::Object(fields) = value else {
            bail!("{} records must serialize to objects", collection.as_str());
        };
        let mut state = self.lock()?;
        let list = state.lists.entry(collection).or_default();
        let id = match fields.get("Id").and_then(Value::as_i64) {
            Some(id) if id > 0 => id,
            _ => list.next_id + 1,
        };
        list.next_id = list.next_id.max(id);
        let mut fields = fields;
        fields.insert("Id".to_owned(), Value::from(id));
        list.items.insert(id, fields);
        Ok(id)
    }

    pub fn set_choices(&self, collection: Collection, field: &str, choices: Vec<String>) -> Result<()> {
        self.lock()?
            .choices
            .insert((collection, field.to_owned()), choices);
        Ok(())
    }

    pub fn len(&self, collection: Collection) -> Result<usize> {
        Ok(self
            .lock()?
            .lists
            .get(&collection)
            .map_or(0, |list| list.items.len()))
    }

    pub fn is_empty(&self, collection: Collection) -> Result<bool> {
        Ok(self.len(collection)? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryLists>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

fn project(fields: &Fields, select: &[String]) -> Fields {
    if select.is_empty() {
        return fields.clone();
    }
    select
        .iter()
        .filter_map(|name| fields.get(name).map(|value| (name.clone(), value.clone())))
        .collect()
}

fn decode<R: DeserializeOwned>(collection: Collection, fields: Fields) -> Result<R> {
    serde_json::from_value(Value::Object(fields))
        .with_context(|| format!("decode {} record", collection.as_str()))
}

impl RecordStore for MemoryStore {
    fn query(&self, spec: &QuerySpec) -> Result<PageLocator> {
        Predicate::parse(&spec.predicate)
            .with_context(|| format!("invalid filter {:?}", spec.predicate))?;
        let query = MemoryQuery {
            select: spec.fields.clone(),
            filter: spec.predicate.clone(),
            top: spec.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
        };
        Ok(locator(spec.collection, &query, 0))
    }

    fn fetch_page<R: DeserializeOwned>(&self, page: &PageLocator) -> Result<Page<R>> {
        let (collection, query, offset) = parse_locator(page)?;
        let predicate = Predicate::parse(&query.filter)
            .with_context(|| format!("invalid filter {:?}", query.filter))?;
        debug!(%page, "memory page fetch");

        let state = self.lock()?;
        let matching: Vec<Fields> = state
            .lists
            .get(&collection)
            .map(|list| {
                list.items
                    .values()
                    .filter(|fields| predicate.matches(fields))
                    .skip(offset)
                    .take(query.top + 1)
                    .map(|fields| project(fields, &query.select))
                    .collect()
            })
            .unwrap_or_default();
        drop(state);

        let has_more = matching.len() > query.top;
        let records = matching
            .into_iter()
            .take(query.top)
            .map(|fields| decode(collection, fields))
            .collect::<Result<Vec<R>>>()?;
        let next = has_more.then(|| locator(collection, &query, offset + query.top));
        Ok(Page { records, next })
    }

    fn get_by_id<R: DeserializeOwned>(&self, collection: Collection, id: i64) -> Result<R> {
        let fields = self
            .lock()?
            .lists
            .get(&collection)
            .and_then(|list| list.items.get(&id))
            .cloned()
            .ok_or_else(|| anyhow!("{} item {id} not found", collection.as_str()))?;
        decode(collection, fields)
    }

    fn add(&self, collection: Collection, fields: &Fields) -> Result<i64> {
        let mut state = self.lock()?;
        let list = state.lists.entry(collection).or_default();
        list.next_id += 1;
        let id = list.next_id;
        let mut stored = fields.clone();
        stored.insert("Id".to_owned(), Value::from(id));
        list.items.insert(id, stored);
        debug!(collection = collection.as_str(), id, "memory add");
        Ok(id)
    }

    fn update(&self, collection: Collection, id: i64, fields: &Fields) -> Result<()> {
        let mut state = self.lock()?;
        let existing = state
            .lists
            .get_mut(&collection)
            .and_then(|list| list.items.get_mut(&id))
            .ok_or_else(|| anyhow!("{} item {id} not found", collection.as_str()))?;
        for (name, value) in fields {
            if name != "Id" {
                existing.insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn delete(&self, collection: Collection, id: i64) -> Result<()> {
        let mut state = self.lock()?;
        state
            .lists
            .get_mut(&collection)
            .and_then(|list| list.items.remove(&id))
            .map(|_| ())
            .ok_or_else(|| anyhow!("{} item {id} not found", collection.as_str()))
    }

    fn list_choices(&self, collection: Collection, field: &str) -> Result<Vec<String>> {
        let state = self.lock()?;
        if let Some(choices) = state.choices.get(&(collection, field.to_owned())) {
            return Ok(choices.clone());
        }
        let mut seen = Vec::new();
        if let Some(list) = state.lists.get(&collection) {
            for value in list.items.values().filter_map(|fields| fields.get(field)) {
                if let Some(text) = value.as_str()
                    && !seen.iter().any(|known| known == text)
                {
                    seen.push(text.to_owned());
                }
            }
        }
        Ok(seen)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use anyhow::Result;
    use roster_app::{Collection, Contact, ContactId, QuerySpec, RecordStore, Tag, TagId};
    use serde_json::json;

    fn tag(id: i64, name: &str) -> Tag {
        Tag {
            id: TagId::new(id),
            title: name.to_owned(),
            name: name.to_owned(),
            comment: String::new(),
            color: "#cccccc".to_owned(),
        }
    }

    fn seeded(count: i64) -> Result<MemoryStore> {
        let store = MemoryStore::new();
        for id in 1..=count {
            store.insert(Collection::Tags, &tag(id, &format!("Tag {id}")))?;
        }
        Ok(store)
    }

    #[test]
    fn pages_follow_next_locators_to_the_end() -> Result<()> {
        let store = seeded(5)?;
        let spec = QuerySpec::new(Collection::Tags, &Tag::FIELDS).with_page_size(2);
        let first = store.query(&spec)?;
        assert!(first.as_str().starts_with("memory://tags/"));
        assert!(first.as_str().ends_with("/0"));

        let page = store.fetch_page::<Tag>(&first)?;
        assert_eq!(page.records.len(), 2);
        let second = page.next.expect("second page");
        let page = store.fetch_page::<Tag>(&second)?;
        assert_eq!(page.records[0].id, TagId::new(3));
        let third = page.next.expect("third page");
        let page = store.fetch_page::<Tag>(&third)?;
        assert_eq!(page.records.len(), 1);
        assert!(page.next.is_none());
        Ok(())
    }

    #[test]
    fn exact_multiple_has_no_dangling_next() -> Result<()> {
        let store = seeded(4)?;
        let spec = QuerySpec::new(Collection::Tags, &Tag::FIELDS).with_page_size(2);
        let first = store.fetch_page::<Tag>(&store.query(&spec)?)?;
        let second = store.fetch_page::<Tag>(&first.next.expect("second page"))?;
        assert_eq!(second.records.len(), 2);
        assert!(second.next.is_none());
        assert_eq!(store.fetch_all::<Tag>(&spec)?.len(), 4);
        Ok(())
    }

    #[test]
    fn filter_is_carried_by_the_locator() -> Result<()> {
        let store = seeded(3)?;
        store.insert(Collection::Tags, &tag(10, "Mentor's pick"))?;
        let spec = QuerySpec::new(Collection::Tags, &Tag::FIELDS)
            .with_predicate("(substringof('Mentor''s', TagName))");
        let locator = store.query(&spec)?;
        let page = store.fetch_page::<Tag>(&locator)?;
        assert_eq!(page.records, vec![tag(10, "Mentor's pick")]);
        Ok(())
    }

    #[test]
    fn invalid_filter_fails_at_query_time() {
        let store = MemoryStore::new();
        let spec = QuerySpec::new(Collection::Tags, &Tag::FIELDS).with_predicate("TagName eq");
        assert!(store.query(&spec).is_err());
    }

    #[test]
    fn foreign_locator_is_rejected() {
        let store = MemoryStore::new();
        let error = store
            .fetch_page::<Tag>(&roster_app::PageLocator::new("https://elsewhere/items"))
            .expect_err("foreign locator");
        assert!(error.to_string().contains("not issued by the memory store"));
    }

    #[test]
    fn writes_assign_ids_and_merge_updates() -> Result<()> {
        let store = seeded(2)?;
        let fields = tag(0, "Remote").fields();
        let id = store.add(Collection::Tags, &fields)?;
        assert_eq!(id, 3);

        let mut patch = roster_app::Fields::new();
        patch.insert("Comment".to_owned(), json!("Works from home"));
        store.update(Collection::Tags, id, &patch)?;
        let updated: Tag = store.get_by_id(Collection::Tags, id)?;
        assert_eq!(updated.name, "Remote");
        assert_eq!(updated.comment, "Works from home");

        store.delete(Collection::Tags, id)?;
        assert!(store.get_by_id::<Tag>(Collection::Tags, id).is_err());
        assert!(store.delete(Collection::Tags, id).is_err());
        Ok(())
    }

    #[test]
    fn contact_tag_ids_round_trip_through_update() -> Result<()> {
        let store = MemoryStore::new();
        let contact = Contact {
            id: ContactId::new(7),
            title: None,
            first_name: Some("Ada".to_owned()),
            last_name: None,
            department: Some("IT".to_owned()),
            phone_number: None,
            email: None,
            image: None,
            tag_ids: vec![TagId::new(1)],
        };
        store.insert(Collection::Contacts, &contact)?;
        store.update(
            Collection::Contacts,
            7,
            &contact.update_fields(&[TagId::new(1), TagId::new(4)]),
        )?;
        let stored: Contact = store.get_by_id(Collection::Contacts, 7)?;
        assert_eq!(stored.tag_ids, vec![TagId::new(1), TagId::new(4)]);
        Ok(())
    }

    #[test]
    fn choices_fall_back_to_distinct_values() -> Result<()> {
        let store = MemoryStore::new();
        for (id, department) in [(1, "Sales"), (2, "IT"), (3, "Sales")] {
            store.insert(
                Collection::Contacts,
                &json!({ "Id": id, "Department": department }),
            )?;
        }
        assert_eq!(
            store.list_choices(Collection::Contacts, "Department")?,
            vec!["Sales".to_owned(), "IT".to_owned()]
        );

        store.set_choices(
            Collection::Contacts,
            "Department",
            vec!["HR".to_owned(), "IT".to_owned(), "Sales".to_owned()],
        )?;
        assert_eq!(store.list_choices(Collection::Contacts, "Department")?.len(), 3);
        Ok(())
    }
}
