// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use roster_app::{DEFAULT_PAGE_SIZE, ListTitles};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const APP_NAME: &str = "roster";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "warn";
/// Largest `$top` the list service honours.
const MAX_PAGE_SIZE: i64 = 5000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub site: Site,
    #[serde(default)]
    pub paging: Paging,
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            site: Site::default(),
            paging: Paging::default(),
            http: Http::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Site {
    pub url: Option<String>,
    pub contacts_list: Option<String>,
    pub tags_list: Option<String>,
    pub colors_list: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    pub page_size: Option<i64>,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page_size: Some(DEFAULT_PAGE_SIZE as i64),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    pub timeout: Option<String>,
    pub token: Option<String>,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("ROSTER_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set ROSTER_CONFIG_PATH to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [site], [paging], [http], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(url) = &self.site.url
            && !(url.starts_with("https://") || url.starts_with("http://"))
        {
            bail!(
                "site.url in {} must be an http(s) URL, got {:?}",
                path.display(),
                url
            );
        }

        let lists = [
            ("site.contacts_list", &self.site.contacts_list),
            ("site.tags_list", &self.site.tags_list),
            ("site.colors_list", &self.site.colors_list),
        ];
        for (name, value) in lists {
            if let Some(title) = value
                && title.trim().is_empty()
            {
                bail!("{name} in {} must not be empty", path.display());
            }
        }

        if let Some(size) = self.paging.page_size
            && !(1..=MAX_PAGE_SIZE).contains(&size)
        {
            bail!(
                "paging.page_size in {} must be between 1 and {}, got {}",
                path.display(),
                MAX_PAGE_SIZE,
                size
            );
        }

        if let Some(timeout) = &self.http.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "http.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(level) = &self.log.level {
            EnvFilter::try_new(level).map_err(|error| {
                anyhow!(
                    "log.level in {} is not a valid filter ({}): {:?}",
                    path.display(),
                    error,
                    level
                )
            })?;
        }

        Ok(())
    }

    pub fn site_url(&self) -> Option<&str> {
        self.site
            .url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    pub fn list_titles(&self) -> ListTitles {
        let defaults = ListTitles::default();
        ListTitles {
            contacts: self.site.contacts_list.clone().unwrap_or(defaults.contacts),
            tags: self.site.tags_list.clone().unwrap_or(defaults.tags),
            colors: self.site.colors_list.clone().unwrap_or(defaults.colors),
        }
    }

    pub fn page_size(&self) -> usize {
        self.paging
            .page_size
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn http_timeout(&self) -> Result<Duration> {
        parse_duration(self.http.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    /// `ROSTER_TOKEN` wins over the file so secrets can stay out of it.
    pub fn token(&self) -> Option<String> {
        env::var("ROSTER_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| self.http.token.clone())
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn example_config(path: &Path) -> String {
        let lists = ListTitles::default();
        format!(
            "# roster config\n# Place this file at: {}\n\nversion = 1\n\n[site]\n# Required unless running with --demo\n# url = \"https://example.sharepoint.com/sites/team\"\ncontacts_list = \"{}\"\ntags_list = \"{}\"\ncolors_list = \"{}\"\n\n[paging]\npage_size = {}\n\n[http]\ntimeout = \"{}\"\n# Bearer token; ROSTER_TOKEN overrides this value\n# token = \"\"\n\n[log]\n# Any tracing filter; ROSTER_LOG overrides this value\nlevel = \"{}\"\n",
            path.display(),
            lists.contacts,
            lists.tags,
            lists.colors,
            DEFAULT_PAGE_SIZE,
            DEFAULT_TIMEOUT,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.page_size(), 10);
        assert_eq!(config.site_url(), None);
        assert_eq!(config.list_titles().contacts, "ContactFilteringTest");
        assert_eq!(config.http_timeout()?, Duration::from_secs(10));
        assert_eq!(config.log_level(), "warn");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[site]\nurl = \"https://corp.example\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[site], [paging], [http], and [log]"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[site]\nurl = \"https://corp.example/sites/hr/\"\ntags_list = \"Labels\"\n[paging]\npage_size = 25\n[http]\ntimeout = \"500ms\"\n[log]\nlevel = \"roster=debug\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.site_url(), Some("https://corp.example/sites/hr"));
        assert_eq!(config.list_titles().tags, "Labels");
        assert_eq!(config.list_titles().colors, "DefaultColor");
        assert_eq!(config.page_size(), 25);
        assert_eq!(config.http_timeout()?, Duration::from_millis(500));
        assert_eq!(config.log_level(), "roster=debug");
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn page_size_must_be_in_range() -> Result<()> {
        for bad in ["0", "-3", "5001"] {
            let (_temp, path) = write_config(&format!("version = 1\n[paging]\npage_size = {bad}\n"))?;
            let error = Config::load(&path).expect_err("page size out of range");
            assert!(error.to_string().contains("paging.page_size"), "size {bad}");
        }
        Ok(())
    }

    #[test]
    fn site_url_must_be_http() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[site]\nurl = \"corp.example\"\n")?;
        let error = Config::load(&path).expect_err("schemeless URL should fail");
        assert!(error.to_string().contains("must be an http(s) URL"));
        Ok(())
    }

    #[test]
    fn blank_list_title_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[site]\ncontacts_list = \"  \"\n")?;
        let error = Config::load(&path).expect_err("blank list title should fail");
        assert!(error.to_string().contains("site.contacts_list"));
        Ok(())
    }

    #[test]
    fn timeout_rejects_non_positive_values() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[http]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn invalid_log_filter_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"roster=loud\"\n")?;
        let error = Config::load(&path).expect_err("bad filter should fail");
        assert!(error.to_string().contains("log.level"));
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        assert!(parse_duration("oops").is_err());
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ROSTER_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ROSTER_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn token_env_override_wins() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) = write_config("version = 1\n[http]\ntoken = \"from-file\"\n")?;
        let config = Config::load(&path)?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("ROSTER_TOKEN");
        }
        assert_eq!(config.token().as_deref(), Some("from-file"));
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ROSTER_TOKEN", "from-env");
        }
        let resolved = config.token();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ROSTER_TOKEN");
        }
        assert_eq!(resolved.as_deref(), Some("from-env"));
        Ok(())
    }

    #[test]
    fn example_config_round_trips() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[site]"));
        assert!(example.contains("[paging]"));
        std::fs::write(&path, example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.page_size(), 10);
        Ok(())
    }
}
