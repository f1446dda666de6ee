// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::color::{contrast_color, is_valid_color};
use crate::{DefaultColor, DirectoryError, DirectoryResult, Fields, Tag, TagId};

pub const NEW_TAG_TITLE: &str = "NewTag";
pub const NEW_TAG_COLOR: &str = "#cccccc";
/// Shown by the color picker before anything is chosen.
pub const PICKER_DEFAULT_COLOR: &str = "#0366d6";

/// Editable copy of one tag. `hex_input` is whatever was typed; it only
/// reaches the tag once it parses as a color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagForm {
    tag: Tag,
    hex_input: String,
    error: Option<DirectoryError>,
}

impl TagForm {
    pub fn new_tag() -> Self {
        Self::edit(Tag {
            id: TagId::new(0),
            title: NEW_TAG_TITLE.to_owned(),
            name: String::new(),
            comment: String::new(),
            color: NEW_TAG_COLOR.to_owned(),
        })
    }

    pub fn edit(tag: Tag) -> Self {
        let hex_input = tag.color.clone();
        Self {
            tag,
            hex_input,
            error: None,
        }
    }

    pub fn is_new(&self) -> bool {
        self.tag.id.get() == 0
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn hex_input(&self) -> &str {
        &self.hex_input
    }

    pub fn error(&self) -> Option<&DirectoryError> {
        self.error.as_ref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.tag.name = name.into();
        self.error = None;
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.tag.comment = comment.into();
    }

    /// Returns whether the text was accepted as the tag color.
    pub fn set_hex(&mut self, raw: impl Into<String>) -> bool {
        self.hex_input = raw.into();
        let valid = is_valid_color(&self.hex_input);
        if valid {
            self.tag.color = self.hex_input.clone();
            self.error = None;
        }
        valid
    }

    pub fn pick_color(&mut self, swatch: &DefaultColor) {
        self.set_hex(swatch.hex.clone());
    }

    pub fn preview_text_color(&self) -> &'static str {
        contrast_color(Some(&self.tag.color))
    }

    pub fn validate(&self) -> DirectoryResult<()> {
        if self.tag.name.trim().is_empty() {
            return Err(DirectoryError::validation(
                "tag name is required -- enter a name and retry",
            ));
        }
        if !is_valid_color(&self.tag.color) {
            return Err(DirectoryError::validation(format!(
                "tag color {:?} is not a hex color -- use #RGB or #RRGGBB",
                self.tag.color
            )));
        }
        Ok(())
    }

    /// Validates, records the outcome on the form, and hands back the
    /// columns to write.
    pub fn submit(&mut self) -> DirectoryResult<Fields> {
        match self.validate() {
            Ok(()) => {
                self.error = None;
                Ok(self.tag.fields())
            }
            Err(error) => {
                self.error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Keeps a store-side rejection on the form so the user can retry.
    pub fn fail(&mut self, error: DirectoryError) {
        self.error = Some(error);
    }

    pub fn fields(&self) -> Fields {
        self.tag.fields()
    }
}
