//! Collision-aware target lookup

use crate::state::RunState;
use cpkg_errors::Error;
use cpkg_store::{locate, Node, TreeStore};
use cpkg_types::ItemReference;
use tracing::debug;

/// Node an entry should be installed over
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lookup {
    pub target: Option<Node>,
    /// The target is an external sibling found behind a node of this package.
    /// Diagnostic only: decisions do not depend on it.
    pub side_by_side: bool,
}

/// Find the node at a reference's identity or path
///
/// A node found by path that belongs to this package but has another id only
/// shares the path with the entry for the moment. In that case the real
/// target is a sibling of the same name that is not part of the package, or
/// nothing at all.
///
/// # Errors
///
/// Propagates store errors.
pub fn find_target<S: TreeStore + ?Sized>(
    store: &S,
    state: &RunState,
    reference: &ItemReference,
) -> Result<Lookup, Error> {
    let found = locate(store, &reference.database, reference.id, &reference.path)?;
    let node = match found {
        Some(node)
            if node.id != reference.id
                && node.parent_id.is_some()
                && state.belongs_to_package(&node.database, node.id) =>
        {
            node
        }
        other => {
            return Ok(Lookup {
                target: other,
                side_by_side: false,
            })
        }
    };

    let Some(parent_id) = node.parent_id else {
        return Ok(Lookup::default());
    };
    let sibling = store
        .children(&node.database, parent_id)?
        .into_iter()
        .find(|child| {
            child.name == node.name
                && child.id != node.id
                && !state.belongs_to_package(&child.database, child.id)
        });

    if let Some(sibling) = &sibling {
        debug!(
            path = %reference.path,
            sibling = %sibling.id,
            "path shared with package node, using external sibling"
        );
    }
    Ok(Lookup {
        side_by_side: sibling.is_some(),
        target: sibling,
    })
}
