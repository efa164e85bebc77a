//! Item references and entry key parsing

use crate::ItemId;
use cpkg_errors::InstallError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content language of one item version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Language-neutral data, written as `invariant` in keys
    Invariant,
    Named(String),
}

impl Language {
    /// Parse a language segment; `invariant` is matched case-insensitively
    #[must_use]
    pub fn parse(segment: &str) -> Self {
        if segment.eq_ignore_ascii_case("invariant") {
            Self::Invariant
        } else {
            Self::Named(segment.to_string())
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Invariant => "invariant",
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Target identity of a package entry
///
/// `path` is the full item path, including the item's own name as the last
/// segment (`/sitecore/content/Home`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemReference {
    pub database: String,
    pub path: String,
    pub id: ItemId,
    pub language: Option<Language>,
    pub version: Option<u32>,
}

impl ItemReference {
    /// Reference to a node, without language or version
    pub fn node(database: impl Into<String>, path: impl Into<String>, id: ItemId) -> Self {
        Self {
            database: database.into(),
            path: path.into(),
            id,
            language: None,
            version: None,
        }
    }

    /// Parse `/{database}/{path...}/{id}/{language}/{version}[/xml]`
    ///
    /// The leading slash is optional.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::InvalidEntryKey` when a segment is missing, the
    /// id is not a GUID or the version is not a number.
    pub fn parse(key: &str) -> Result<Self, InstallError> {
        let invalid = |reason: &str| InstallError::InvalidEntryKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let mut segments: Vec<&str> = key.trim_matches('/').split('/').collect();
        if segments.last().is_some_and(|last| last.eq_ignore_ascii_case("xml")) {
            segments.pop();
        }
        if segments.len() < 5 {
            return Err(invalid("expected database, path, id, language and version"));
        }

        let version_segment = segments[segments.len() - 1];
        let language_segment = segments[segments.len() - 2];
        let id_segment = segments[segments.len() - 3];
        let database = segments[0];
        let path_segments = &segments[1..segments.len() - 3];

        if database.is_empty() {
            return Err(invalid("empty database segment"));
        }
        if id_segment.is_empty() {
            return Err(invalid("empty id segment"));
        }
        if path_segments.iter().any(|segment| segment.is_empty()) {
            return Err(invalid("empty path segment"));
        }

        let id = id_segment
            .parse::<ItemId>()
            .map_err(|e| invalid(&e.to_string()))?;
        let version = version_segment
            .parse::<u32>()
            .map_err(|_| invalid("version is not a number"))?;
        let language = if language_segment.is_empty() {
            None
        } else {
            Some(Language::parse(language_segment))
        };

        Ok(Self {
            database: database.to_string(),
            path: format!("/{}", path_segments.join("/")),
            id,
            language,
            version: Some(version),
        })
    }

    /// Node identity of this reference with language and version dropped
    #[must_use]
    pub fn reduce(&self) -> Self {
        Self::node(self.database.clone(), self.path.clone(), self.id)
    }

    /// Last path segment
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Path of the parent node, `None` for a root path
    #[must_use]
    pub fn parent_path(&self) -> Option<&str> {
        let (parent, _) = self.path.rsplit_once('/')?;
        if parent.is_empty() {
            None
        } else {
            Some(parent)
        }
    }

    /// Same reference pointing at a different path
    #[must_use]
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ItemReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.database, self.path, self.id)?;
        if let Some(language) = &self.language {
            write!(f, "/{language}")?;
        }
        if let Some(version) = self.version {
            write!(f, "/{version}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::known;

    #[test]
    fn parses_full_key() {
        let reference = ItemReference::parse(
            "/master/sitecore/templates/Sample/{25BED78C-4957-4165-998A-CA1B52F67497}/en/3/xml",
        )
        .unwrap();
        assert_eq!(reference.database, "master");
        assert_eq!(reference.path, "/sitecore/templates/Sample");
        assert_eq!(reference.id, known::CREATED_FIELD);
        assert_eq!(reference.language, Some(Language::Named("en".into())));
        assert_eq!(reference.version, Some(3));
        assert_eq!(reference.name(), "Sample");
        assert_eq!(reference.parent_path(), Some("/sitecore/templates"));
    }

    #[test]
    fn invariant_language_is_case_insensitive() {
        let reference = ItemReference::parse(
            "core/sitecore/{25BED78C-4957-4165-998A-CA1B52F67497}/Invariant/0",
        )
        .unwrap();
        assert_eq!(reference.language, Some(Language::Invariant));
        assert_eq!(reference.parent_path(), None);
    }

    #[test]
    fn reduce_drops_language_and_version() {
        let reference =
            ItemReference::parse("master/a/b/{25BED78C-4957-4165-998A-CA1B52F67497}/en/1")
                .unwrap();
        let reduced = reference.reduce();
        assert_eq!(reduced.language, None);
        assert_eq!(reduced.version, None);
        assert_eq!(reduced.path, reference.path);
        assert_eq!(reduced.id, reference.id);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(ItemReference::parse("master/{25BED78C-4957-4165-998A-CA1B52F67497}/en/1").is_err());
        assert!(ItemReference::parse("master/a//en/1").is_err());
        assert!(ItemReference::parse("master/a/not-an-id/en/1").is_err());
        assert!(
            ItemReference::parse("master/a/{25BED78C-4957-4165-998A-CA1B52F67497}/en/x").is_err()
        );
    }
}
