#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Tree store contract for cpkg
//!
//! The installer mutates content through [`TreeStore`], a synchronous,
//! blocking interface over a hierarchical item store. Every method that
//! changes a record is one edit transaction on that record; there is no
//! transaction spanning several items.
//!
//! [`MemoryStore`] is an in-process implementation used by tests and by
//! callers that stage content before handing it to a real backend.

mod memory;
mod node;

pub use memory::{MemoryStore, FOLDER_TEMPLATE, ROOT_ID, ROOT_NAME};
pub use node::{CreateRequest, Definition, Node, StoreEdit, VersionData, VersionKey};

use cpkg_errors::Error;
use cpkg_types::ItemId;

/// Hierarchical content store consumed by the installation engine
pub trait TreeStore: Send + Sync {
    /// Whether a database with this name exists
    fn has_database(&self, database: &str) -> bool;

    /// Look up a node by id
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails. A missing node is `Ok(None)`.
    fn get_by_id(&self, database: &str, id: ItemId) -> Result<Option<Node>, Error>;

    /// Look up a node by full path; names compare case-insensitively
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails. A missing node is `Ok(None)`.
    fn get_by_path(&self, database: &str, path: &str) -> Result<Option<Node>, Error>;

    /// Direct children of a node in store order
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist or the backend fails.
    fn children(&self, database: &str, id: ItemId) -> Result<Vec<Node>, Error>;

    /// Create a node without versions
    ///
    /// Returns `Ok(None)` when the template cannot be resolved and the
    /// request does not mark it as pending; callers decide whether that is a
    /// missing template or a fault.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent does not exist, the id is taken or the
    /// backend fails.
    fn create(&self, request: &CreateRequest) -> Result<Option<Node>, Error>;

    /// Resolve a path, creating missing ancestors as folders
    ///
    /// Returns `Ok(None)` if the database does not exist or the path does
    /// not start at the database root.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn ensure_path(&self, database: &str, path: &str) -> Result<Option<Node>, Error>;

    /// Move a node below another parent
    ///
    /// # Errors
    ///
    /// Returns an error if either node is missing or the move would create a
    /// cycle.
    fn move_to(&self, database: &str, id: ItemId, parent_id: ItemId) -> Result<Node, Error>;

    /// Delete a node and its subtree; returns `false` if it did not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the node is a database root or the backend fails.
    fn delete(&self, database: &str, id: ItemId) -> Result<bool, Error>;

    /// All versions of a node, ordered by language then number
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    fn versions(&self, database: &str, id: ItemId) -> Result<Vec<VersionData>, Error>;

    /// One version of a node
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    fn get_version(
        &self,
        database: &str,
        id: ItemId,
        key: &VersionKey,
    ) -> Result<Option<VersionData>, Error>;

    /// Store a version, replacing all field data of that language/version
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    fn commit_version(&self, database: &str, id: ItemId, version: &VersionData)
        -> Result<(), Error>;

    /// Update name, template and branch of a node
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    fn update_definition(
        &self,
        database: &str,
        id: ItemId,
        definition: &Definition,
    ) -> Result<Node, Error>;

    /// Set individual fields of an existing version
    ///
    /// Returns `false` when the version does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    fn set_fields(
        &self,
        database: &str,
        id: ItemId,
        key: &VersionKey,
        fields: &[(ItemId, String)],
    ) -> Result<bool, Error>;

    /// Remove one version; returns `false` if it did not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    fn remove_version(&self, database: &str, id: ItemId, key: &VersionKey) -> Result<bool, Error>;
}

/// Look up a node the way entry references address it: by id, then by path
///
/// # Errors
///
/// Propagates store errors.
pub fn locate<S: TreeStore + ?Sized>(
    store: &S,
    database: &str,
    id: ItemId,
    path: &str,
) -> Result<Option<Node>, Error> {
    if let Some(node) = store.get_by_id(database, id)? {
        return Ok(Some(node));
    }
    store.get_by_path(database, path)
}
