//! Package metadata collected from `metadata/` entries

use serde::{Deserialize, Serialize};

/// Descriptive package metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub package_name: String,
    pub package_id: String,
    pub version: String,
    pub author: String,
    pub publisher: String,
    pub readme: String,
    pub revision: String,
    /// Identifier of the post step to run after installation
    pub post_step: String,
}

impl PackageMetadata {
    /// Record one metadata entry
    ///
    /// `name` is the entry key with the `metadata/` prefix removed, for
    /// example `sc_name.txt`. Returns `false` for unknown names.
    pub fn apply(&mut self, name: &str, value: &str) -> bool {
        let name = name.trim_matches('/');
        let name = name.strip_suffix(".txt").unwrap_or(name);
        let slot = match name.to_ascii_lowercase().as_str() {
            "sc_name" => &mut self.package_name,
            "sc_packageid" => &mut self.package_id,
            "sc_version" => &mut self.version,
            "sc_author" => &mut self.author,
            "sc_publisher" => &mut self.publisher,
            "sc_readme" => &mut self.readme,
            "sc_revision" => &mut self.revision,
            "sc_poststep" => &mut self.post_step,
            _ => return false,
        };
        *slot = value.trim().to_string();
        true
    }

    /// Post step id, if the package declares one
    #[must_use]
    pub fn post_step(&self) -> Option<&str> {
        let step = self.post_step.trim();
        (!step.is_empty()).then_some(step)
    }
}
