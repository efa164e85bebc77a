//! Version writer
//!
//! Turns the field data of a parsed entry into one stored version of a node.

use chrono::Utc;
use cpkg_errors::{Error, InstallError};
use cpkg_store::{Definition, Node, TreeStore, VersionData, VersionKey};
use cpkg_types::{iso, known, ItemDescriptor, ItemReference, Language, VersionInstallMode};
use tracing::{debug, trace};

/// Reconciles incoming field data with an existing version in `Merge` mode
pub trait FieldMergePolicy: Send + Sync {
    fn merge(&self, existing: &VersionData, incoming: VersionData) -> VersionData;
}

/// Incoming values replace existing ones; fields the entry lacks are kept
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayFields;

impl FieldMergePolicy for OverlayFields {
    fn merge(&self, existing: &VersionData, incoming: VersionData) -> VersionData {
        let mut merged = existing.clone();
        merged.language = incoming.language;
        merged.number = incoming.number;
        merged.fields.extend(incoming.fields);
        merged.blob_fields.extend(incoming.blob_fields);
        merged
    }
}

/// Stores binary payloads referenced by blob fields
pub trait BlobService: Send + Sync {
    /// Attach the payloads of a version about to be committed
    ///
    /// # Errors
    ///
    /// Returns an error if a payload cannot be stored.
    fn attach(&self, database: &str, version: &mut VersionData) -> Result<(), Error>;

    /// Write out anything buffered; runs once at the end of every run
    ///
    /// # Errors
    ///
    /// Returns an error if buffered payloads cannot be written.
    fn flush(&self) -> Result<(), Error>;
}

/// Blob service for stores without binary payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBlobs;

impl BlobService for NoBlobs {
    fn attach(&self, _database: &str, _version: &mut VersionData) -> Result<(), Error> {
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// One version write
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'a> {
    pub key: &'a str,
    /// Full reference, including language and version
    pub reference: &'a ItemReference,
    pub descriptor: &'a ItemDescriptor,
    pub mode: VersionInstallMode,
    /// Drop every other version of the node after the write
    pub remove_other_versions: bool,
}

/// Applies version writes to a store
pub struct VersionWriter {
    merge_policy: Box<dyn FieldMergePolicy>,
    blobs: Box<dyn BlobService>,
}

impl Default for VersionWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VersionWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionWriter").finish_non_exhaustive()
    }
}

impl VersionWriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            merge_policy: Box::new(OverlayFields),
            blobs: Box::new(NoBlobs),
        }
    }

    #[must_use]
    pub fn with_merge_policy(mut self, policy: impl FieldMergePolicy + 'static) -> Self {
        self.merge_policy = Box::new(policy);
        self
    }

    #[must_use]
    pub fn with_blob_service(mut self, blobs: impl BlobService + 'static) -> Self {
        self.blobs = Box::new(blobs);
        self
    }

    /// # Errors
    ///
    /// Propagates the blob service's flush error.
    pub fn flush(&self) -> Result<(), Error> {
        self.blobs.flush()
    }

    /// Write one version of `target`
    ///
    /// # Errors
    ///
    /// `UnsupportedVersionMode` unless the mode is `Append` or `Merge`; store
    /// and blob errors are propagated.
    pub fn write<S: TreeStore + ?Sized>(
        &self,
        store: &S,
        target: &Node,
        request: &WriteRequest<'_>,
    ) -> Result<Node, Error> {
        if !matches!(
            request.mode,
            VersionInstallMode::Append | VersionInstallMode::Merge
        ) {
            return Err(InstallError::UnsupportedVersionMode {
                key: request.key.to_string(),
                mode: request.mode.to_string(),
            }
            .into());
        }

        let database = target.database.as_str();
        let descriptor = request.descriptor;
        let language = descriptor
            .language
            .clone()
            .or_else(|| request.reference.language.clone())
            .unwrap_or(Language::Invariant);
        let number = version_number(store, target, request, &language)?;

        let mut version = VersionData::new(language, number);
        for field in &descriptor.fields {
            version.set_field(field.id, field.value.clone());
            if field.blob {
                version.blob_fields.insert(field.id);
            }
        }
        if let Some(created) = descriptor.created_at {
            version
                .fields
                .entry(known::CREATED_FIELD)
                .or_insert_with(|| iso::format(created));
        }

        self.blobs.attach(database, &mut version)?;
        update_field_sharing(store, target, descriptor, &version.language)?;

        if request.mode == VersionInstallMode::Merge {
            if let Some(existing) = store.get_version(database, target.id, &version.key())? {
                version = self.merge_policy.merge(&existing, version);
            }
        }

        let key = version.key();
        store.commit_version(database, target.id, &version)?;
        let node = store.update_definition(
            database,
            target.id,
            &Definition {
                name: descriptor.name.clone(),
                template_id: descriptor.template_id,
                branch_id: descriptor.branch_id,
            },
        )?;
        clamp_statistics(store, &node, &key)?;

        if request.remove_other_versions {
            for other in store.versions(database, node.id)? {
                let other_key = other.key();
                if other_key != key {
                    store.remove_version(database, node.id, &other_key)?;
                    trace!(id = %node.id, version = %other_key, "removed version");
                }
            }
        }

        debug!(key = %request.key, version = %key, mode = %request.mode, "version written");
        Ok(node)
    }
}

/// Number of the version to write
fn version_number<S: TreeStore + ?Sized>(
    store: &S,
    target: &Node,
    request: &WriteRequest<'_>,
    language: &Language,
) -> Result<u32, Error> {
    if request.remove_other_versions {
        return Ok(1);
    }
    let requested = match request.mode {
        VersionInstallMode::Merge => request.descriptor.version.or(request.reference.version),
        _ => request.reference.version,
    }
    .filter(|number| *number > 0);
    if let Some(number) = requested {
        return Ok(number);
    }
    if request.mode == VersionInstallMode::Append {
        let latest = store
            .versions(&target.database, target.id)?
            .into_iter()
            .filter(|version| version.language == *language)
            .map(|version| version.number)
            .max();
        if let Some(latest) = latest {
            return Ok(latest);
        }
    }
    Ok(1)
}

/// Mirror the shared/unversioned flags of a field definition onto the
/// target's existing version in that language
fn update_field_sharing<S: TreeStore + ?Sized>(
    store: &S,
    target: &Node,
    descriptor: &ItemDescriptor,
    language: &Language,
) -> Result<(), Error> {
    if descriptor.template_id != known::TEMPLATE_FIELD_TEMPLATE {
        return Ok(());
    }
    let flags: Vec<(cpkg_types::ItemId, String)> = [known::SHARED_FIELD, known::UNVERSIONED_FIELD]
        .into_iter()
        .filter_map(|id| descriptor.field(id).map(|field| (id, field.value.clone())))
        .collect();
    if flags.is_empty() {
        return Ok(());
    }
    let latest = store
        .versions(&target.database, target.id)?
        .into_iter()
        .filter(|version| version.language == *language)
        .max_by_key(|version| version.number);
    if let Some(latest) = latest {
        store.set_fields(&target.database, target.id, &latest.key(), &flags)?;
    }
    Ok(())
}

/// Statistics timestamps never exceed the time of the write
fn clamp_statistics<S: TreeStore + ?Sized>(
    store: &S,
    node: &Node,
    key: &VersionKey,
) -> Result<(), Error> {
    let Some(stored) = store.get_version(&node.database, node.id, key)? else {
        return Ok(());
    };
    let now = Utc::now();
    let corrections: Vec<_> = [known::CREATED_FIELD, known::UPDATED_FIELD]
        .into_iter()
        .filter(|field| {
            stored
                .field(*field)
                .and_then(iso::parse)
                .is_some_and(|timestamp| timestamp > now)
        })
        .map(|field| (field, iso::format(now)))
        .collect();
    if !corrections.is_empty() {
        debug!(id = %node.id, version = %key, "statistics timestamps in the future, clamped");
        store.set_fields(&node.database, node.id, key, &corrections)?;
    }
    Ok(())
}
