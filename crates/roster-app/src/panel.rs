// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{debug, info, warn};

use crate::{
    Browser, BrowserCommand, BrowserEffect, DefaultColor, DirectoryError, DirectoryResult,
    Fields, Tag, TagFilter, TagForm, TagId, TagListing,
};

pub type TagBrowserCommand = BrowserCommand<TagFilter, Tag>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    Mount,
    Browse(TagBrowserCommand),
    OpenNew,
    OpenEdit(Tag),
    CloseForm,
    SetName(String),
    SetComment(String),
    SetHex(String),
    PickColor(DefaultColor),
    SubmitForm,
    TagSaved {
        seq: u64,
        result: DirectoryResult<TagId>,
    },
    RequestDelete(TagId),
    ConfirmDelete,
    CancelDelete,
    TagDeleted {
        seq: u64,
        result: DirectoryResult<()>,
    },
    LoadPalette,
    PaletteLoaded {
        seq: u64,
        result: DirectoryResult<Vec<DefaultColor>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEffect {
    Browser(BrowserEffect),
    /// `id` is `None` for a tag that does not exist yet.
    SaveTag {
        seq: u64,
        id: Option<TagId>,
        fields: Fields,
    },
    DeleteTag { seq: u64, id: TagId },
    LoadPalette { seq: u64 },
}

/// Tag list plus the add/edit form and delete confirmation around it.
pub struct TagPanel {
    browser: Browser<TagListing>,
    form: Option<TagForm>,
    pending_delete: Option<TagId>,
    palette: Vec<DefaultColor>,
    seq: u64,
    save_seq: Option<u64>,
    delete_seq: Option<u64>,
    palette_seq: Option<u64>,
    last_saved: Option<TagId>,
    error: Option<DirectoryError>,
}

impl TagPanel {
    pub fn new(page_size: usize) -> Self {
        Self {
            browser: Browser::new(page_size),
            form: None,
            pending_delete: None,
            palette: Vec::new(),
            seq: 0,
            save_seq: None,
            delete_seq: None,
            palette_seq: None,
            last_saved: None,
            error: None,
        }
    }

    pub fn browser(&self) -> &Browser<TagListing> {
        &self.browser
    }

    pub fn form(&self) -> Option<&TagForm> {
        self.form.as_ref()
    }

    pub fn pending_delete(&self) -> Option<TagId> {
        self.pending_delete
    }

    pub fn palette(&self) -> &[DefaultColor] {
        &self.palette
    }

    pub fn error(&self) -> Option<&DirectoryError> {
        self.error.as_ref()
    }

    /// Identifier of the most recent successful save.
    pub fn last_saved(&self) -> Option<TagId> {
        self.last_saved
    }

    pub fn is_saving(&self) -> bool {
        self.save_seq.is_some()
    }

    pub fn dispatch(&mut self, command: PanelCommand) -> Vec<PanelEffect> {
        match command {
            PanelCommand::Mount => {
                let mut effects = self.browse(BrowserCommand::Mount);
                effects.extend(self.load_palette());
                effects
            }
            PanelCommand::Browse(command) => self.browse(command),
            PanelCommand::OpenNew => {
                self.open_form(TagForm::new_tag());
                Vec::new()
            }
            PanelCommand::OpenEdit(tag) => {
                self.open_form(TagForm::edit(tag));
                Vec::new()
            }
            PanelCommand::CloseForm => {
                if self.save_seq.is_none() {
                    self.form = None;
                }
                Vec::new()
            }
            PanelCommand::SetName(name) => {
                self.edit_form(|form| form.set_name(name));
                Vec::new()
            }
            PanelCommand::SetComment(comment) => {
                self.edit_form(|form| form.set_comment(comment));
                Vec::new()
            }
            PanelCommand::SetHex(raw) => {
                self.edit_form(|form| {
                    form.set_hex(raw);
                });
                Vec::new()
            }
            PanelCommand::PickColor(swatch) => {
                self.edit_form(|form| form.pick_color(&swatch));
                Vec::new()
            }
            PanelCommand::SubmitForm => self.submit(),
            PanelCommand::TagSaved { seq, result } => {
                if self.save_seq != Some(seq) {
                    debug!(seq, "discarding superseded tag save");
                    return Vec::new();
                }
                self.save_seq = None;
                match result {
                    Ok(id) => {
                        info!(tag = %id, "tag saved");
                        self.last_saved = Some(id);
                        self.form = None;
                        self.error = None;
                        self.browse(BrowserCommand::Reload)
                    }
                    Err(error) => {
                        warn!(%error, "tag save failed");
                        if let Some(form) = self.form.as_mut() {
                            form.fail(error.clone());
                        }
                        self.error = Some(error);
                        Vec::new()
                    }
                }
            }
            PanelCommand::RequestDelete(id) => {
                if self.delete_seq.is_none() {
                    self.pending_delete = Some(id);
                }
                Vec::new()
            }
            PanelCommand::CancelDelete => {
                if self.delete_seq.is_none() {
                    self.pending_delete = None;
                }
                Vec::new()
            }
            PanelCommand::ConfirmDelete => {
                let Some(id) = self.pending_delete else {
                    return Vec::new();
                };
                if self.delete_seq.is_some() {
                    return Vec::new();
                }
                let seq = self.next_seq();
                self.delete_seq = Some(seq);
                vec![PanelEffect::DeleteTag { seq, id }]
            }
            PanelCommand::TagDeleted { seq, result } => {
                if self.delete_seq != Some(seq) {
                    debug!(seq, "discarding superseded tag delete");
                    return Vec::new();
                }
                self.delete_seq = None;
                let id = self.pending_delete.take();
                match result {
                    Ok(()) => {
                        if let Some(id) = id {
                            info!(tag = %id, "tag deleted");
                        }
                        self.error = None;
                        self.browse(BrowserCommand::Reload)
                    }
                    Err(error) => {
                        warn!(%error, "tag delete failed");
                        self.error = Some(error);
                        Vec::new()
                    }
                }
            }
            PanelCommand::LoadPalette => self.load_palette(),
            PanelCommand::PaletteLoaded { seq, result } => {
                if self.palette_seq != Some(seq) {
                    return Vec::new();
                }
                self.palette_seq = None;
                match result {
                    Ok(palette) => self.palette = palette,
                    Err(error) => {
                        warn!(%error, "default colors unavailable");
                        self.error = Some(error);
                    }
                }
                Vec::new()
            }
        }
    }

    fn browse(&mut self, command: TagBrowserCommand) -> Vec<PanelEffect> {
        self.browser
            .dispatch(command)
            .map(PanelEffect::Browser)
            .into_iter()
            .collect()
    }

    fn load_palette(&mut self) -> Vec<PanelEffect> {
        let seq = self.next_seq();
        self.palette_seq = Some(seq);
        vec![PanelEffect::LoadPalette { seq }]
    }

    fn open_form(&mut self, form: TagForm) {
        if self.save_seq.is_none() {
            self.form = Some(form);
        }
    }

    fn edit_form(&mut self, edit: impl FnOnce(&mut TagForm)) {
        if self.save_seq.is_some() {
            return;
        }
        if let Some(form) = self.form.as_mut() {
            edit(form);
        }
    }

    fn submit(&mut self) -> Vec<PanelEffect> {
        if self.save_seq.is_some() {
            return Vec::new();
        }
        let Some(form) = self.form.as_mut() else {
            return Vec::new();
        };
        let fields = match form.submit() {
            Ok(fields) => fields,
            Err(error) => {
                debug!(%error, "tag form rejected");
                return Vec::new();
            }
        };
        let id = (!form.is_new()).then(|| form.tag().id);
        let seq = self.next_seq();
        self.save_seq = Some(seq);
        vec![PanelEffect::SaveTag { seq, id, fields }]
    }

    fn next_seq(&mut self) -> u64 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }
}
