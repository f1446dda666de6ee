// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{debug, error, warn};

use crate::{DirectoryError, DirectoryResult, Page, PageLocator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Error,
}

/// A page fetch the caller must perform and report back with the same `seq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub seq: u64,
    pub page: usize,
    pub locator: PageLocator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Applied,
    Failed(DirectoryError),
    Stale,
}

/// Page cursor cache plus the currently visible page of records.
///
/// `cursors[n]` is the locator of page `n`. Index 0 is set when a query
/// starts, `n + 1` only when page `n` comes back with a next link, and no
/// entry is removed until the next query. Every request takes a fresh value
/// from a monotonic counter; only a response carrying the latest value is
/// applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager<R> {
    records: Vec<R>,
    cursors: Vec<PageLocator>,
    page: usize,
    shown_page: Option<usize>,
    has_next: bool,
    state: LoadState,
    seq: u64,
    pending_page: Option<usize>,
    error: Option<DirectoryError>,
}

impl<R> Default for Pager<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            cursors: Vec::new(),
            page: 0,
            shown_page: None,
            has_next: false,
            state: LoadState::Idle,
            seq: 0,
            pending_page: None,
            error: None,
        }
    }
}

impl<R> Pager<R> {
    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn error(&self) -> Option<&DirectoryError> {
        self.error.as_ref()
    }

    pub fn cursor(&self, page: usize) -> Option<&PageLocator> {
        self.cursors.get(page)
    }

    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    pub fn latest_seq(&self) -> u64 {
        self.seq
    }

    /// First half of a reset: drop the old query and everything in flight.
    /// The caller mints the initial locator and hands it to `reset`.
    pub fn begin_query(&mut self) -> u64 {
        self.records.clear();
        self.cursors.clear();
        self.page = 0;
        self.shown_page = None;
        self.has_next = false;
        self.error = None;
        self.pending_page = None;
        self.state = LoadState::Loading;
        self.next_seq()
    }

    pub fn reset(&mut self, seq: u64, initial: PageLocator) -> Option<PageRequest> {
        if seq != self.seq {
            debug!(seq, latest = self.seq, "discarding superseded query locator");
            return None;
        }
        self.cursors = vec![initial];
        self.page = 0;
        self.load_page(0)
    }

    pub fn query_failed(&mut self, seq: u64, error: DirectoryError) -> PageOutcome {
        if seq != self.seq {
            debug!(seq, latest = self.seq, "discarding superseded query failure");
            return PageOutcome::Stale;
        }
        warn!(%error, "query could not be started");
        self.pending_page = None;
        self.state = LoadState::Error;
        self.error = Some(error.clone());
        PageOutcome::Failed(error)
    }

    pub fn load_page(&mut self, page: usize) -> Option<PageRequest> {
        let Some(locator) = self.cursors.get(page).cloned() else {
            error!(
                page,
                cached = self.cursors.len(),
                "page requested before its locator was known"
            );
            return None;
        };
        self.page = page;
        self.state = LoadState::Loading;
        self.error = None;
        self.pending_page = Some(page);
        Some(PageRequest {
            seq: self.next_seq(),
            page,
            locator,
        })
    }

    pub fn next(&mut self) -> Option<PageRequest> {
        if !self.has_next || self.cursors.len() <= self.page + 1 {
            return None;
        }
        self.load_page(self.page + 1)
    }

    pub fn previous(&mut self) -> Option<PageRequest> {
        if self.page == 0 {
            return None;
        }
        self.load_page(self.page - 1)
    }

    pub fn reload(&mut self) -> Option<PageRequest> {
        if self.cursors.is_empty() {
            return None;
        }
        self.load_page(self.page)
    }

    pub fn apply(&mut self, seq: u64, result: DirectoryResult<Page<R>>) -> PageOutcome {
        if seq != self.seq {
            debug!(seq, latest = self.seq, "discarding stale page response");
            return PageOutcome::Stale;
        }
        let Some(page) = self.pending_page.take() else {
            debug!(seq, "page response arrived with nothing pending");
            return PageOutcome::Stale;
        };

        match result {
            Ok(loaded) => {
                self.records = loaded.records;
                self.has_next = loaded.next.is_some();
                if let Some(next) = loaded.next {
                    self.remember_next(page, next);
                }
                self.page = page;
                self.shown_page = Some(page);
                self.state = LoadState::Loaded;
                self.error = None;
                PageOutcome::Applied
            }
            Err(error) => {
                warn!(page, %error, "page load failed");
                self.page = self.shown_page.unwrap_or(0);
                self.state = LoadState::Error;
                self.error = Some(error.clone());
                PageOutcome::Failed(error)
            }
        }
    }

    /// Collapse a surfaced error back into a resting state.
    pub fn dismiss_error(&mut self) {
        if self.state != LoadState::Error {
            return;
        }
        self.error = None;
        self.state = if self.shown_page.is_some() {
            LoadState::Loaded
        } else {
            LoadState::Idle
        };
    }

    fn remember_next(&mut self, page: usize, next: PageLocator) {
        let slot = page + 1;
        match self.cursors.get(slot) {
            Some(existing) if existing == &next => {}
            Some(_) => self.cursors[slot] = next,
            None => self.cursors.push(next),
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }
}
