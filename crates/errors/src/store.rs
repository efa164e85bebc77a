//! Tree store error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("database not found: {database}")]
    DatabaseNotFound { database: String },

    #[error("item not found: {id} (db: {database})")]
    ItemNotFound { database: String, id: String },

    #[error("version not found: {uri}")]
    VersionNotFound { uri: String },

    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("item already exists: {id} (db: {database})")]
    AlreadyExists { database: String, id: String },

    #[error("cannot move {id} below its own descendant {target}")]
    InvalidMove { id: String, target: String },

    #[error("cannot delete the root item of {database}")]
    RootDeletion { database: String },

    #[error("store backend error: {message}")]
    Backend { message: String },
}

impl UserFacingError for StoreError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DatabaseNotFound { .. } => Some("Check the database names used by the package."),
            Self::Backend { .. } => Some("Inspect the content store logs and retry."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::DatabaseNotFound { .. } => "store.database_not_found",
            Self::ItemNotFound { .. } => "store.item_not_found",
            Self::VersionNotFound { .. } => "store.version_not_found",
            Self::InvalidPath { .. } => "store.invalid_path",
            Self::AlreadyExists { .. } => "store.already_exists",
            Self::InvalidMove { .. } => "store.invalid_move",
            Self::RootDeletion { .. } => "store.root_deletion",
            Self::Backend { .. } => "store.backend",
        };
        Some(code)
    }
}
