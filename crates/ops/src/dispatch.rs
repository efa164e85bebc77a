//! Routing of package entries by area

use cpkg_types::{PackageEntry, PackageMetadata, ITEMS_PREFIX, METADATA_PREFIX};
use tracing::{debug, warn};

/// Entries of one package split by area
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchedPackage {
    pub metadata: PackageMetadata,
    /// Item entries with the `items/` prefix removed, in package order
    pub items: Vec<PackageEntry>,
    /// Keys of entries nobody handles here (files, security, blobs)
    pub ignored: Vec<String>,
}

/// Split entries into metadata and item entries
///
/// Metadata values are applied in order, so a later entry with the same
/// name wins. Unknown metadata names and other areas are logged and
/// dropped.
#[must_use]
pub fn dispatch<I>(entries: I) -> DispatchedPackage
where
    I: IntoIterator<Item = PackageEntry>,
{
    let mut package = DispatchedPackage::default();
    for mut entry in entries {
        let key = entry.key.trim_start_matches('/');
        if let Some(name) = key.strip_prefix(METADATA_PREFIX) {
            if !package.metadata.apply(name, &entry.document) {
                debug!(key = %entry.key, "unknown metadata entry");
            }
        } else if let Some(item_key) = key.strip_prefix(ITEMS_PREFIX) {
            entry.key = item_key.to_string();
            package.items.push(entry);
        } else {
            warn!(key = %entry.key, "entry area not handled, skipped");
            package.ignored.push(entry.key);
        }
    }
    debug!(
        items = package.items.len(),
        ignored = package.ignored.len(),
        "dispatched package entries"
    );
    package
}
