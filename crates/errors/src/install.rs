//! Installation engine error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum InstallError {
    #[error(
        "cannot install template structure after {passes} passes ({pending} entries pending): \
         there is a structural cycle or a template nested under an item it defines"
    )]
    StructuralCycle { pending: usize, passes: usize },

    #[error("failed to add an item. Key: '{key}'. Reason: there is no template with id '{template_id}'")]
    MissingTemplate { key: String, template_id: String },

    #[error("conflict resolution was declined for entry: {key}")]
    ResolverAborted { key: String },

    #[error("error installing {key}: {message}")]
    EntryFailed { key: String, message: String },

    #[error("invalid entry key: {key}: {reason}")]
    InvalidEntryKey { key: String, reason: String },

    #[error("invalid version document for {key}: {message}")]
    InvalidDocument { key: String, message: String },

    #[error("could not find parent item for: {path} (db: {database})")]
    ParentNotFound { path: String, database: String },

    #[error(
        "could not create item. Name: '{name}', ID: '{id}', TemplateID: '{template_id}', parentId: '{parent_id}'"
    )]
    CreateFailed {
        name: String,
        id: String,
        template_id: String,
        parent_id: String,
    },

    #[error("item install mode is undefined for entry: {key}")]
    UndefinedInstallMode { key: String },

    #[error("item merge mode is undefined for entry: {key}")]
    UndefinedMergeMode { key: String },

    #[error("unsupported version install mode {mode} for entry: {key}")]
    UnsupportedVersionMode { key: String, mode: String },

    #[error("target item not found for version write: {key}")]
    TargetNotFound { key: String },
}

impl InstallError {
    /// Whether this error ends the run as a user cancellation rather than a failure
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::ResolverAborted { .. })
    }
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::StructuralCycle { .. } => Some(
                "Check that no template is stored below an item created from it and that templates do not inherit from each other in a loop.",
            ),
            Self::MissingTemplate { .. } => Some(
                "Install the package that provides the template first, or add the template to this package.",
            ),
            Self::ResolverAborted { .. } => Some("Rerun the installation and pick an install mode."),
            Self::ParentNotFound { .. } => Some("Make sure the parent path exists in the target database."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::StructuralCycle { .. } => "install.structural_cycle",
            Self::MissingTemplate { .. } => "install.missing_template",
            Self::ResolverAborted { .. } => "install.resolver_aborted",
            Self::EntryFailed { .. } => "install.entry_failed",
            Self::InvalidEntryKey { .. } => "install.invalid_entry_key",
            Self::InvalidDocument { .. } => "install.invalid_document",
            Self::ParentNotFound { .. } => "install.parent_not_found",
            Self::CreateFailed { .. } => "install.create_failed",
            Self::UndefinedInstallMode { .. } => "install.undefined_install_mode",
            Self::UndefinedMergeMode { .. } => "install.undefined_merge_mode",
            Self::UnsupportedVersionMode { .. } => "install.unsupported_version_mode",
            Self::TargetNotFound { .. } => "install.target_not_found",
        };
        Some(code)
    }
}
