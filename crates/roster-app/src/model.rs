// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::fmt;

use crate::ids::*;

/// Column values sent to the store on add/update, keyed by internal field name.
pub type Fields = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Contacts,
    Tags,
    DefaultColors,
}

impl Collection {
    pub const ALL: [Self; 3] = [Self::Contacts, Self::Tags, Self::DefaultColors];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Tags => "tags",
            Self::DefaultColors => "colors",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "contacts" => Some(Self::Contacts),
            "tags" => Some(Self::Tags),
            "colors" => Some(Self::DefaultColors),
            _ => None,
        }
    }
}

/// Maps each logical collection to the list title it lives under in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTitles {
    pub contacts: String,
    pub tags: String,
    pub colors: String,
}

impl ListTitles {
    pub fn title(&self, collection: Collection) -> &str {
        match collection {
            Collection::Contacts => &self.contacts,
            Collection::Tags => &self.tags,
            Collection::DefaultColors => &self.colors,
        }
    }
}

impl Default for ListTitles {
    fn default() -> Self {
        Self {
            contacts: "ContactFilteringTest".to_owned(),
            tags: "Tags".to_owned(),
            colors: "DefaultColor".to_owned(),
        }
    }
}

/// Opaque handle addressing one page of a query. Only the store mints these;
/// callers may store, compare, and hand them back, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageLocator(String);

impl PageLocator {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<R> {
    pub records: Vec<R>,
    pub next: Option<PageLocator>,
}

impl<R> Page<R> {
    pub fn last(records: Vec<R>) -> Self {
        Self {
            records,
            next: None,
        }
    }

    pub fn map<T>(self, f: impl FnMut(R) -> T) -> Page<T> {
        Page {
            records: self.records.into_iter().map(f).collect(),
            next: self.next,
        }
    }
}

/// Everything the store needs to mint the locator of a query's first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub collection: Collection,
    pub fields: Vec<String>,
    pub predicate: String,
    pub page_size: Option<usize>,
}

impl QuerySpec {
    pub fn new(collection: Collection, fields: &[&str]) -> Self {
        Self {
            collection,
            fields: fields.iter().map(|field| (*field).to_owned()).collect(),
            predicate: String::new(),
            page_size: None,
        }
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = predicate.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn has_predicate(&self) -> bool {
        !self.predicate.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "Id")]
    pub id: ContactId,
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "FirstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "LastName", default)]
    pub last_name: Option<String>,
    #[serde(rename = "Department", default)]
    pub department: Option<String>,
    #[serde(rename = "PhoneNumber", default)]
    pub phone_number: Option<String>,
    #[serde(rename = "Email", default)]
    pub email: Option<String>,
    #[serde(rename = "Image", default)]
    pub image: Option<String>,
    #[serde(rename = "TagsId", default, deserialize_with = "deserialize_id_list")]
    pub tag_ids: Vec<TagId>,
}

#[derive(Debug, Deserialize)]
struct ImageBlob {
    #[serde(rename = "fileName")]
    file_name: String,
}

impl Contact {
    pub const FIELDS: [&'static str; 9] = [
        "Id",
        "Title",
        "FirstName",
        "LastName",
        "Department",
        "PhoneNumber",
        "Email",
        "Image",
        "TagsId",
    ];

    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        let joined = format!("{first} {last}");
        let joined = joined.trim();
        if !joined.is_empty() {
            return joined.to_owned();
        }
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_owned(),
            _ => format!("contact #{}", self.id),
        }
    }

    /// File name stored in the `Image` blob, if the blob parses.
    pub fn image_file_name(&self) -> Option<String> {
        let raw = self.image.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let blob: ImageBlob = serde_json::from_str(raw).ok()?;
        let name = blob.file_name.trim();
        (!name.is_empty()).then(|| name.to_owned())
    }

    /// Attachment URL of the contact picture. `None` means render a placeholder.
    pub fn image_url(&self, site_base: &str, list_title: &str) -> Option<String> {
        let file_name = self.image_file_name()?;
        Some(format!(
            "{}/Lists/{}/Attachments/{}/{}",
            site_base.trim_end_matches('/'),
            list_title,
            self.id,
            file_name
        ))
    }

    /// Scalar columns plus the given tag association, ready for one update call.
    /// `Image` is attachment-managed and never written back.
    pub fn update_fields(&self, tag_ids: &[TagId]) -> Fields {
        let mut fields = Fields::new();
        let scalars = [
            ("Title", &self.title),
            ("FirstName", &self.first_name),
            ("LastName", &self.last_name),
            ("Department", &self.department),
            ("PhoneNumber", &self.phone_number),
            ("Email", &self.email),
        ];
        for (name, value) in scalars {
            let value = value.as_ref().map_or(Value::Null, |text| json!(text));
            fields.insert(name.to_owned(), value);
        }
        fields.insert(
            "TagsId".to_owned(),
            Value::Array(tag_ids.iter().map(|id| json!(id.get())).collect()),
        );
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "Id")]
    pub id: TagId,
    #[serde(rename = "Title", default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(rename = "TagName", default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(rename = "Comment", default, deserialize_with = "null_as_empty")]
    pub comment: String,
    #[serde(rename = "tagColor", default, deserialize_with = "null_as_empty")]
    pub color: String,
}

impl Tag {
    pub const FIELDS: [&'static str; 5] = ["Id", "Title", "TagName", "Comment", "tagColor"];

    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("Title".to_owned(), json!(self.title));
        fields.insert("TagName".to_owned(), json!(self.name));
        fields.insert("Comment".to_owned(), json!(self.comment));
        fields.insert("tagColor".to_owned(), json!(self.color));
        fields
    }

    pub fn text_color(&self) -> &'static str {
        crate::color::contrast_color(Some(&self.color))
    }
}

/// One swatch of the default color palette; `Title` carries the hex value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultColor {
    #[serde(rename = "Id")]
    pub id: ColorId,
    #[serde(rename = "Title", default, deserialize_with = "null_as_empty")]
    pub hex: String,
}

impl DefaultColor {
    pub const FIELDS: [&'static str; 2] = ["Id", "Title"];
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdList {
    Plain(Vec<TagId>),
    Verbose { results: Vec<TagId> },
}

fn deserialize_id_list<'de, D>(deserializer: D) -> Result<Vec<TagId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<IdList>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(IdList::Plain(ids) | IdList::Verbose { results: ids }) => ids,
    })
}
