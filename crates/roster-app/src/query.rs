// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::de::DeserializeOwned;

use crate::{Collection, Contact, Tag};

/// Selector label meaning "no department filter".
pub const ALL_DEPARTMENTS: &str = "All Departments";

const NAME_FIELDS: [&str; 3] = ["FirstName", "LastName", "Title"];
const PHONE_FIELDS: [&str; 1] = ["PhoneNumber"];
const EMAIL_FIELDS: [&str; 1] = ["Email"];
const TAG_NAME_FIELDS: [&str; 1] = ["TagName"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFilter {
    pub name: String,
    pub department: Option<String>,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    pub name: String,
}

/// Raw field edits plus the filter that was last applied. Only `commit`
/// moves input into the committed slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState<F> {
    input: F,
    committed: F,
}

impl<F: Clone + Default + PartialEq> FilterState<F> {
    pub fn input(&self) -> &F {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut F {
        &mut self.input
    }

    pub fn committed(&self) -> &F {
        &self.committed
    }

    pub fn is_dirty(&self) -> bool {
        self.input != self.committed
    }

    pub fn commit(&mut self) -> &F {
        self.committed = self.input.clone();
        &self.committed
    }

    pub fn clear(&mut self) -> &F {
        self.input = F::default();
        self.commit()
    }
}

/// One browsable collection: which list, which columns, how its filter
/// turns into a predicate.
pub trait Listing {
    type Record: Clone + DeserializeOwned;
    type Filter: Clone + Default + PartialEq;

    const COLLECTION: Collection;
    const LABEL: &'static str;

    fn fields() -> &'static [&'static str];
    fn predicate(filter: &Self::Filter) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactListing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagListing;

impl Listing for ContactListing {
    type Record = Contact;
    type Filter = ContactFilter;

    const COLLECTION: Collection = Collection::Contacts;
    const LABEL: &'static str = "contacts";

    fn fields() -> &'static [&'static str] {
        &Contact::FIELDS
    }

    fn predicate(filter: &ContactFilter) -> String {
        contact_predicate(filter)
    }
}

impl Listing for TagListing {
    type Record = Tag;
    type Filter = TagFilter;

    const COLLECTION: Collection = Collection::Tags;
    const LABEL: &'static str = "tags";

    fn fields() -> &'static [&'static str] {
        &Tag::FIELDS
    }

    fn predicate(filter: &TagFilter) -> String {
        tag_predicate(filter)
    }
}

pub fn contact_predicate(filter: &ContactFilter) -> String {
    let mut parts = Vec::new();
    parts.extend(substring_clause(&filter.name, &NAME_FIELDS));
    if let Some(department) = filter.department.as_deref()
        && !department.trim().is_empty()
        && department != ALL_DEPARTMENTS
    {
        parts.push(format!("(Department eq '{}')", escape_literal(department)));
    }
    parts.extend(substring_clause(&filter.phone, &PHONE_FIELDS));
    parts.extend(substring_clause(&filter.email, &EMAIL_FIELDS));
    parts.join(" and ")
}

pub fn tag_predicate(filter: &TagFilter) -> String {
    substring_clause(&filter.name, &TAG_NAME_FIELDS).unwrap_or_default()
}

pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn substring_clause(value: &str, fields: &[&str]) -> Option<String> {
    if value.trim().is_empty() {
        return None;
    }
    let escaped = escape_literal(value);
    let terms = fields
        .iter()
        .map(|field| format!("substringof('{escaped}', {field})"))
        .collect::<Vec<_>>();
    Some(format!("({})", terms.join(" or ")))
}
