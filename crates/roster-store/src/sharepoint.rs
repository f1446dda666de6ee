// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use roster_app::{Collection, Fields, ListTitles, Page, PageLocator, QuerySpec, RecordStore};

const VERBOSE: &str = "application/json;odata=verbose";
const NO_METADATA: &str = "application/json;odata=nometadata";

/// REST client for SharePoint lists. Page locators are the absolute item
/// URLs the server hands out, so `__next` links are followed untouched.
#[derive(Debug, Clone)]
pub struct SharePointStore {
    site_url: String,
    lists: ListTitles,
    token: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl SharePointStore {
    pub fn new(site_url: &str, lists: ListTitles, timeout: Duration) -> Result<Self> {
        let site_url = site_url.trim_end_matches('/').to_owned();
        if site_url.is_empty() {
            bail!("site.url must not be empty");
        }
        Url::parse(&site_url)
            .with_context(|| format!("site.url {site_url:?} is not a valid URL"))?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            site_url,
            lists,
            token: None,
            timeout,
            http,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|token| !token.trim().is_empty());
        self
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    pub fn lists(&self) -> &ListTitles {
        &self.lists
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Confirms the site answers and the contact list exists.
    pub fn ping(&self) -> Result<()> {
        let url = format!("{}?$select=Title", self.list_url(Collection::Contacts));
        self.send(self.http.get(&url).header(ACCEPT, VERBOSE))?;
        Ok(())
    }

    fn list_url(&self, collection: Collection) -> String {
        format!(
            "{}/_api/web/lists/getbytitle('{}')",
            self.site_url,
            self.lists.title(collection).replace('\'', "''")
        )
    }

    fn items_url(&self, collection: Collection) -> String {
        format!("{}/items", self.list_url(collection))
    }

    fn item_url(&self, collection: Collection, id: i64) -> String {
        format!("{}/items({id})", self.list_url(collection))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .map_err(|error| connection_error(&self.site_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }

    fn write(&self, url: &str, method: Option<&str>, fields: Option<&Fields>) -> Result<Response> {
        let mut request = self
            .http
            .post(url)
            .header(ACCEPT, NO_METADATA)
            .header(CONTENT_TYPE, NO_METADATA);
        if let Some(method) = method {
            request = request
                .header("X-HTTP-Method", method)
                .header("IF-MATCH", "*");
        }
        if let Some(fields) = fields {
            request = request.body(serde_json::to_vec(fields).context("encode item fields")?);
        }
        self.send(request)
    }
}

impl RecordStore for SharePointStore {
    fn query(&self, spec: &QuerySpec) -> Result<PageLocator> {
        let mut url = Url::parse(&self.items_url(spec.collection))
            .with_context(|| format!("build {} query URL", spec.collection.as_str()))?;
        let mut pairs = Vec::new();
        if !spec.fields.is_empty() {
            pairs.push(("$select", spec.fields.join(",")));
        }
        if spec.has_predicate() {
            pairs.push(("$filter", spec.predicate.clone()));
        }
        if let Some(top) = spec.page_size {
            pairs.push(("$top", top.to_string()));
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(PageLocator::new(String::from(url)))
    }

    fn fetch_page<R: DeserializeOwned>(&self, locator: &PageLocator) -> Result<Page<R>> {
        if !within_site(&self.site_url, locator.as_str()) {
            bail!("locator {locator} does not belong to {}", self.site_url);
        }
        debug!(%locator, "fetching page");
        let response = self.send(self.http.get(locator.as_str()).header(ACCEPT, VERBOSE))?;
        let envelope: Verbose<Collected<R>> = response.json().context("decode list page")?;
        Ok(Page {
            records: envelope.d.results,
            next: envelope
                .d
                .next
                .filter(|next| !next.is_empty())
                .map(PageLocator::new),
        })
    }

    fn get_by_id<R: DeserializeOwned>(&self, collection: Collection, id: i64) -> Result<R> {
        let url = self.item_url(collection, id);
        debug!(%url, "fetching item");
        let response = self.send(self.http.get(&url).header(ACCEPT, VERBOSE))?;
        let envelope: Verbose<R> = response
            .json()
            .with_context(|| format!("decode {} item {id}", collection.as_str()))?;
        Ok(envelope.d)
    }

    fn add(&self, collection: Collection, fields: &Fields) -> Result<i64> {
        let response = self.write(&self.items_url(collection), None, Some(fields))?;
        let created: Created = response
            .json()
            .with_context(|| format!("decode new {} item", collection.as_str()))?;
        Ok(created.id)
    }

    fn update(&self, collection: Collection, id: i64, fields: &Fields) -> Result<()> {
        self.write(&self.item_url(collection, id), Some("MERGE"), Some(fields))?;
        Ok(())
    }

    fn delete(&self, collection: Collection, id: i64) -> Result<()> {
        self.write(&self.item_url(collection, id), Some("DELETE"), None)?;
        Ok(())
    }

    fn list_choices(&self, collection: Collection, field: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/fields/getbyinternalnameortitle('{}')",
            self.list_url(collection),
            field.replace('\'', "''")
        );
        let response = self.send(self.http.get(&url).header(ACCEPT, VERBOSE))?;
        let envelope: Verbose<ChoiceField> = response
            .json()
            .with_context(|| format!("decode {field} choices"))?;
        Ok(envelope.d.choices.map(|choices| choices.results).unwrap_or_default())
    }
}

/// True when `locator` has the site's origin and its path continues the
/// site's path segment by segment, so `/sites/hr` never admits `/sites/hr-archive`.
fn within_site(site_url: &str, locator: &str) -> bool {
    let (Ok(site), Ok(target)) = (Url::parse(site_url), Url::parse(locator)) else {
        return false;
    };
    if site.scheme() != target.scheme()
        || site.host_str() != target.host_str()
        || site.port_or_known_default() != target.port_or_known_default()
    {
        return false;
    }
    let segments = |url: &Url| -> Vec<String> {
        url.path_segments()
            .map(|parts| parts.filter(|part| !part.is_empty()).map(str::to_owned).collect())
            .unwrap_or_default()
    };
    let site_path = segments(&site);
    let target_path = segments(&target);
    target_path.starts_with(&site_path)
}

fn connection_error(site_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check site.url and your network ({})",
        site_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(error) = parsed.error.or(parsed.odata_error)
        && let Some(message) = error.message
        && !message.value.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message.value);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "server returned {} -- set http.token or ROSTER_TOKEN and retry",
            status.as_u16()
        );
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Deserialize)]
struct Verbose<T> {
    d: T,
}

#[derive(Debug, Deserialize)]
struct Collected<R> {
    results: Vec<R>,
    #[serde(rename = "__next", default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Created {
    #[serde(rename = "Id")]
    id: i64,
}

#[derive(Debug, Deserialize)]
struct ChoiceField {
    #[serde(rename = "Choices", default)]
    choices: Option<ChoiceResults>,
}

#[derive(Debug, Deserialize)]
struct ChoiceResults {
    results: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ServerError>,
    #[serde(rename = "odata.error")]
    odata_error: Option<ServerError>,
}

#[derive(Debug, Deserialize)]
struct ServerError {
    message: Option<ServerMessage>,
}

#[derive(Debug, Deserialize)]
struct ServerMessage {
    value: String,
}
