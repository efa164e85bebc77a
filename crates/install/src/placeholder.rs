//! Minimal node creation
//!
//! New nodes are first created with identity, name and template only. Field
//! data arrives later through the version writer.

use cpkg_errors::{Error, InstallError};
use cpkg_store::{CreateRequest, Node, TreeStore};
use cpkg_types::{ItemDescriptor, ItemReference};
use tracing::debug;

/// Create a node without versions at the reference's path
///
/// The parent is the document's parent id when it exists, otherwise the
/// parent path, created on demand. `template_pending` tells the store that
/// the template arrives later in the same run.
///
/// # Errors
///
/// `ParentNotFound` if no parent can be resolved, `MissingTemplate` if the
/// store rejects the node and the template does not exist, `CreateFailed`
/// if it rejects the node for another reason.
pub fn create<S: TreeStore + ?Sized>(
    store: &S,
    reference: &ItemReference,
    descriptor: &ItemDescriptor,
    template_pending: bool,
) -> Result<Node, Error> {
    let database = &reference.database;
    let parent_not_found = || InstallError::ParentNotFound {
        path: reference.path.clone(),
        database: database.clone(),
    };

    let by_id = match descriptor.parent_id {
        Some(parent_id) => store.get_by_id(database, parent_id)?,
        None => None,
    };
    let parent = match by_id {
        Some(parent) => parent,
        None => {
            let parent_path = reference.parent_path().ok_or_else(parent_not_found)?;
            store
                .ensure_path(database, parent_path)?
                .ok_or_else(parent_not_found)?
        }
    };

    let name = if descriptor.name.is_empty() {
        reference.name().to_string()
    } else {
        descriptor.name.clone()
    };
    let request = CreateRequest {
        database: database.clone(),
        parent_id: parent.id,
        name,
        template_id: descriptor.template_id,
        id: reference.id,
        created_at: descriptor.created_at,
        template_pending,
    };

    let Some(node) = store.create(&request)? else {
        if store.get_by_id(database, descriptor.template_id)?.is_none() {
            return Err(InstallError::MissingTemplate {
                key: reference.path.clone(),
                template_id: descriptor.template_id.to_string(),
            }
            .into());
        }
        return Err(InstallError::CreateFailed {
            name: request.name,
            id: request.id.to_string(),
            template_id: request.template_id.to_string(),
            parent_id: request.parent_id.to_string(),
        }
        .into());
    };

    for version in store.versions(database, node.id)? {
        store.remove_version(database, node.id, &version.key())?;
    }
    debug!(path = %node.path, id = %node.id, "created placeholder node");
    Ok(node)
}
