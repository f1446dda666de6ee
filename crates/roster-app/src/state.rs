// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{
    DirectoryResult, FilterState, LoadState, Listing, Page, PageLocator, PageOutcome, PageRequest,
    Pager, QuerySpec,
};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCommand<F, R> {
    Mount,
    EditFilter(F),
    ApplyFilter,
    ClearFilter,
    NextPage,
    PreviousPage,
    Reload,
    DismissError,
    QueryReady {
        seq: u64,
        result: DirectoryResult<PageLocator>,
    },
    PageLoaded {
        seq: u64,
        result: DirectoryResult<Page<R>>,
    },
}

/// Remote work a browser needs done; the answer comes back as
/// `QueryReady` or `PageLoaded` carrying the same `seq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEffect {
    Query { seq: u64, spec: QuerySpec },
    Fetch(PageRequest),
}

impl BrowserEffect {
    pub const fn seq(&self) -> u64 {
        match self {
            Self::Query { seq, .. } => *seq,
            Self::Fetch(request) => request.seq,
        }
    }
}

/// One filtered, paginated view over a collection.
pub struct Browser<L: Listing> {
    filter: FilterState<L::Filter>,
    pager: Pager<L::Record>,
    page_size: usize,
    last_outcome: Option<PageOutcome>,
}

impl<L: Listing> Default for Browser<L> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl<L: Listing> Browser<L> {
    pub fn new(page_size: usize) -> Self {
        Self {
            filter: FilterState::default(),
            pager: Pager::default(),
            page_size: page_size.max(1),
            last_outcome: None,
        }
    }

    pub fn filter(&self) -> &FilterState<L::Filter> {
        &self.filter
    }

    pub fn pager(&self) -> &Pager<L::Record> {
        &self.pager
    }

    pub fn records(&self) -> &[L::Record] {
        self.pager.records()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn state(&self) -> LoadState {
        self.pager.state()
    }

    pub fn last_outcome(&self) -> Option<&PageOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn dispatch(
        &mut self,
        command: BrowserCommand<L::Filter, L::Record>,
    ) -> Option<BrowserEffect> {
        match command {
            BrowserCommand::Mount => {
                self.filter = FilterState::default();
                self.restart()
            }
            BrowserCommand::EditFilter(input) => {
                *self.filter.input_mut() = input;
                None
            }
            BrowserCommand::ApplyFilter => {
                self.filter.commit();
                self.restart()
            }
            BrowserCommand::ClearFilter => {
                self.filter.clear();
                self.restart()
            }
            BrowserCommand::NextPage => self.pager.next().map(BrowserEffect::Fetch),
            BrowserCommand::PreviousPage => self.pager.previous().map(BrowserEffect::Fetch),
            BrowserCommand::Reload => self.pager.reload().map(BrowserEffect::Fetch),
            BrowserCommand::DismissError => {
                self.pager.dismiss_error();
                None
            }
            BrowserCommand::QueryReady { seq, result } => match result {
                Ok(locator) => self.pager.reset(seq, locator).map(BrowserEffect::Fetch),
                Err(error) => {
                    self.last_outcome = Some(self.pager.query_failed(seq, error));
                    None
                }
            },
            BrowserCommand::PageLoaded { seq, result } => {
                self.last_outcome = Some(self.pager.apply(seq, result));
                None
            }
        }
    }

    /// Query for the committed filter; the initial locator is minted by the store.
    pub fn query_spec(&self) -> QuerySpec {
        QuerySpec::new(L::COLLECTION, L::fields())
            .with_predicate(L::predicate(self.filter.committed()))
            .with_page_size(self.page_size)
    }

    fn restart(&mut self) -> Option<BrowserEffect> {
        let seq = self.pager.begin_query();
        self.last_outcome = None;
        Some(BrowserEffect::Query {
            seq,
            spec: self.query_spec(),
        })
    }
}
