// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::warn;

use crate::{
    ALL_DEPARTMENTS, Browser, BrowserCommand, BrowserEffect, Contact, ContactFilter,
    ContactListing, DirectoryError, DirectoryResult, EditorCommand, EditorEffect, EditorPhase,
    TagEditSession,
};

pub type ContactBrowserCommand = BrowserCommand<ContactFilter, Contact>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCommand {
    Mount,
    Browse(ContactBrowserCommand),
    DepartmentsLoaded {
        seq: u64,
        result: DirectoryResult<Vec<String>>,
    },
    OpenDetail(Contact),
    CloseDetail,
    Edit(EditorCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEffect {
    Browser(BrowserEffect),
    LoadDepartments { seq: u64 },
    Editor(EditorEffect),
}

/// The contact browser, its department selector, and at most one open
/// contact whose tags are being edited.
pub struct ContactDirectory {
    browser: Browser<ContactListing>,
    departments: Vec<String>,
    departments_seq: Option<u64>,
    seq: u64,
    editor_seq: u64,
    detail: Option<TagEditSession>,
    error: Option<DirectoryError>,
}

impl ContactDirectory {
    pub fn new(page_size: usize) -> Self {
        Self {
            browser: Browser::new(page_size),
            departments: vec![ALL_DEPARTMENTS.to_owned()],
            departments_seq: None,
            seq: 0,
            editor_seq: 0,
            detail: None,
            error: None,
        }
    }

    pub fn browser(&self) -> &Browser<ContactListing> {
        &self.browser
    }

    /// Selector entries; the first always means "no department filter".
    pub fn departments(&self) -> &[String] {
        &self.departments
    }

    pub fn detail(&self) -> Option<&TagEditSession> {
        self.detail.as_ref()
    }

    pub fn error(&self) -> Option<&DirectoryError> {
        self.error.as_ref()
    }

    pub fn dispatch(&mut self, command: DirectoryCommand) -> Vec<DirectoryEffect> {
        match command {
            DirectoryCommand::Mount => {
                self.seq = self.seq.wrapping_add(1);
                self.departments_seq = Some(self.seq);
                let mut effects = vec![DirectoryEffect::LoadDepartments { seq: self.seq }];
                effects.extend(self.browse(BrowserCommand::Mount));
                effects
            }
            DirectoryCommand::Browse(command) => self.browse(command),
            DirectoryCommand::DepartmentsLoaded { seq, result } => {
                if self.departments_seq != Some(seq) {
                    return Vec::new();
                }
                self.departments_seq = None;
                match result {
                    Ok(choices) => {
                        self.departments = std::iter::once(ALL_DEPARTMENTS.to_owned())
                            .chain(choices.into_iter().filter(|choice| choice != ALL_DEPARTMENTS))
                            .collect();
                    }
                    Err(error) => {
                        warn!(%error, "department choices unavailable");
                        self.error = Some(error);
                    }
                }
                Vec::new()
            }
            DirectoryCommand::OpenDetail(contact) => {
                if self.detail_is_saving() {
                    return Vec::new();
                }
                self.retire_detail();
                let (session, effect) = TagEditSession::open_after(contact, self.editor_seq);
                self.detail = Some(session);
                effect.map(DirectoryEffect::Editor).into_iter().collect()
            }
            DirectoryCommand::CloseDetail => {
                if !self.detail_is_saving() {
                    self.retire_detail();
                }
                Vec::new()
            }
            DirectoryCommand::Edit(command) => {
                let Some(session) = self.detail.as_mut() else {
                    return Vec::new();
                };
                match session.dispatch(command) {
                    Some(EditorEffect::Completed { contact_id }) => {
                        let mut effects =
                            vec![DirectoryEffect::Editor(EditorEffect::Completed { contact_id })];
                        effects.extend(self.browse(BrowserCommand::Reload));
                        effects
                    }
                    Some(effect) => vec![DirectoryEffect::Editor(effect)],
                    None => Vec::new(),
                }
            }
        }
    }

    fn browse(&mut self, command: ContactBrowserCommand) -> Vec<DirectoryEffect> {
        self.browser
            .dispatch(command)
            .map(DirectoryEffect::Browser)
            .into_iter()
            .collect()
    }

    /// Drops the open session, remembering its request numbers so the next
    /// session never reuses them.
    fn retire_detail(&mut self) {
        if let Some(session) = self.detail.take() {
            self.editor_seq = self.editor_seq.max(session.last_seq());
        }
    }

    fn detail_is_saving(&self) -> bool {
        self.detail
            .as_ref()
            .is_some_and(|session| session.phase() == EditorPhase::Saving)
    }
}
