// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

use crate::TagId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// Rejected locally; never reaches the store.
    #[error("{0}")]
    Validation(String),
    #[error("load failed: {0}")]
    Fetch(String),
    #[error("save failed: {0}")]
    Save(String),
    #[error("tag {id} could not be loaded: {message}")]
    PartialLookup { id: TagId, message: String },
}

impl DirectoryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn fetch(error: anyhow::Error) -> Self {
        Self::Fetch(format!("{error:#}"))
    }

    pub fn save(error: anyhow::Error) -> Self {
        Self::Save(format!("{error:#}"))
    }

    pub fn partial_lookup(id: TagId, error: anyhow::Error) -> Self {
        Self::PartialLookup {
            id,
            message: format!("{error:#}"),
        }
    }

    /// Re-issuing the same intent may succeed.
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;
