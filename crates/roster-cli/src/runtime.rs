// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use roster_app::{
    Browser, BrowserCommand, BrowserEffect, Collection, ContactDirectory, ContactListing,
    DefaultColor, DirectoryCommand, DirectoryEffect, DirectoryError, EditorCommand, EditorEffect,
    Listing, PanelCommand, PanelEffect, QuerySpec, RecordStore, Tag, TagId, TagListing, TagPanel,
};
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Carries out the effects the state machines emit and turns each store
/// answer into the command that reports it. Store failures become
/// `DirectoryError`s here and nowhere else.
pub struct StoreRuntime<S> {
    store: S,
}

impl<S: RecordStore> StoreRuntime<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn run_browser<L: Listing>(
        &self,
        effect: BrowserEffect,
    ) -> BrowserCommand<L::Filter, L::Record> {
        match effect {
            BrowserEffect::Query { seq, spec } => BrowserCommand::QueryReady {
                seq,
                result: self.store.query(&spec).map_err(DirectoryError::fetch),
            },
            BrowserEffect::Fetch(request) => BrowserCommand::PageLoaded {
                seq: request.seq,
                result: self
                    .store
                    .fetch_page(&request.locator)
                    .map_err(DirectoryError::fetch),
            },
        }
    }

    pub fn run_editor(&self, effect: EditorEffect) -> Option<EditorCommand> {
        match effect {
            EditorEffect::ResolveTags { seq, ids } => Some(EditorCommand::TagsResolved {
                seq,
                result: ids
                    .into_iter()
                    .map(|id| {
                        self.store
                            .get_by_id::<Tag>(Collection::Tags, id.get())
                            .map_err(|error| DirectoryError::partial_lookup(id, error))
                    })
                    .collect(),
            }),
            EditorEffect::FetchTag { seq, id } => Some(EditorCommand::TagFetched {
                seq,
                result: self
                    .store
                    .get_by_id(Collection::Tags, id.get())
                    .map_err(DirectoryError::fetch),
            }),
            EditorEffect::SaveContact {
                seq,
                contact_id,
                fields,
            } => Some(EditorCommand::SaveFinished {
                seq,
                result: self
                    .store
                    .update(Collection::Contacts, contact_id.get(), &fields)
                    .map_err(DirectoryError::save),
            }),
            EditorEffect::Completed { contact_id } => {
                debug!(contact = %contact_id, "tag edit completed");
                None
            }
        }
    }

    pub fn run_panel(&self, effect: PanelEffect) -> Option<PanelCommand> {
        let command = match effect {
            PanelEffect::Browser(effect) => {
                PanelCommand::Browse(self.run_browser::<TagListing>(effect))
            }
            PanelEffect::SaveTag { seq, id, fields } => {
                let result = match id {
                    Some(id) => self
                        .store
                        .update(Collection::Tags, id.get(), &fields)
                        .map(|()| id),
                    None => self.store.add(Collection::Tags, &fields).map(TagId::new),
                };
                PanelCommand::TagSaved {
                    seq,
                    result: result.map_err(DirectoryError::save),
                }
            }
            PanelEffect::DeleteTag { seq, id } => PanelCommand::TagDeleted {
                seq,
                result: self
                    .store
                    .delete(Collection::Tags, id.get())
                    .map_err(DirectoryError::save),
            },
            PanelEffect::LoadPalette { seq } => PanelCommand::PaletteLoaded {
                seq,
                result: self
                    .store
                    .fetch_all::<DefaultColor>(&QuerySpec::new(
                        Collection::DefaultColors,
                        &DefaultColor::FIELDS,
                    ))
                    .map_err(DirectoryError::fetch),
            },
        };
        Some(command)
    }

    pub fn run_directory(&self, effect: DirectoryEffect) -> Option<DirectoryCommand> {
        match effect {
            DirectoryEffect::Browser(effect) => Some(DirectoryCommand::Browse(
                self.run_browser::<ContactListing>(effect),
            )),
            DirectoryEffect::LoadDepartments { seq } => Some(DirectoryCommand::DepartmentsLoaded {
                seq,
                result: self
                    .store
                    .list_choices(Collection::Contacts, "Department")
                    .map_err(DirectoryError::fetch),
            }),
            DirectoryEffect::Editor(effect) => {
                self.run_editor(effect).map(DirectoryCommand::Edit)
            }
        }
    }

    /// Dispatches `command` and keeps executing effects until the browser
    /// settles.
    pub fn drive_browser<L: Listing>(
        &self,
        browser: &mut Browser<L>,
        command: BrowserCommand<L::Filter, L::Record>,
    ) {
        let mut next = browser.dispatch(command);
        while let Some(effect) = next.take() {
            let reply = self.run_browser::<L>(effect);
            next = browser.dispatch(reply);
        }
    }

    pub fn drive_panel(&self, panel: &mut TagPanel, command: PanelCommand) {
        let mut queue: VecDeque<PanelEffect> = panel.dispatch(command).into();
        while let Some(effect) = queue.pop_front() {
            if let Some(reply) = self.run_panel(effect) {
                queue.extend(panel.dispatch(reply));
            }
        }
    }

    pub fn drive_directory(&self, directory: &mut ContactDirectory, command: DirectoryCommand) {
        let mut queue: VecDeque<DirectoryEffect> = directory.dispatch(command).into();
        while let Some(effect) = queue.pop_front() {
            if let Some(reply) = self.run_directory(effect) {
                queue.extend(directory.dispatch(reply));
            }
        }
    }
}

/// Runs effects on worker threads and reports each reply over a channel.
/// Replies may arrive in any order; the state machines sort that out by
/// sequence number.
pub struct ThreadedExecutor<S> {
    runtime: Arc<StoreRuntime<S>>,
}

impl<S: RecordStore + Send + Sync + 'static> ThreadedExecutor<S> {
    pub fn new(store: S) -> Self {
        Self {
            runtime: Arc::new(StoreRuntime::new(store)),
        }
    }

    pub fn spawn_browser<L>(
        &self,
        effect: BrowserEffect,
        replies: Sender<BrowserCommand<L::Filter, L::Record>>,
    ) -> JoinHandle<()>
    where
        L: Listing + 'static,
        L::Filter: Send + 'static,
        L::Record: Send + 'static,
    {
        let runtime = Arc::clone(&self.runtime);
        thread::spawn(move || {
            let seq = effect.seq();
            let reply = runtime.run_browser::<L>(effect);
            if replies.send(reply).is_err() {
                debug!(seq, "receiver dropped before reply arrived");
            }
        })
    }

    /// Like `StoreRuntime::drive_browser`, but each round trip runs on a worker
    /// and must answer within `timeout`.
    pub fn settle_browser<L>(
        &self,
        browser: &mut Browser<L>,
        command: BrowserCommand<L::Filter, L::Record>,
        timeout: Duration,
    ) -> Result<()>
    where
        L: Listing + 'static,
        L::Filter: Send + 'static,
        L::Record: Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let mut next = browser.dispatch(command);
        while let Some(effect) = next.take() {
            let seq = effect.seq();
            drop(self.spawn_browser::<L>(effect, sender.clone()));
            let reply = receiver.recv_timeout(timeout).with_context(|| {
                format!("{} request {seq} did not answer within {timeout:?}", L::LABEL)
            })?;
            next = browser.dispatch(reply);
        }
        Ok(())
    }
}
