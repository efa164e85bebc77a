//! In-process tree store

use crate::node::{CreateRequest, Definition, Node, StoreEdit, VersionData, VersionKey};
use crate::TreeStore;
use chrono::{DateTime, Utc};
use cpkg_errors::{Error, StoreError};
use cpkg_types::ItemId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Id of the root node of every database
pub const ROOT_ID: ItemId = ItemId::from_u128(0x1111_1111_1111_1111_1111_1111_1111_1111);
/// Name of the root node of every database
pub const ROOT_NAME: &str = "sitecore";
/// Template given to ancestors created by `ensure_path`
pub const FOLDER_TEMPLATE: ItemId = ItemId::from_u128(0xA87A_00B1_E6DB_45AB_8B54_636F_EC3B_5523);

#[derive(Debug, Clone)]
struct StoredNode {
    name: String,
    template_id: ItemId,
    branch_id: Option<ItemId>,
    parent_id: Option<ItemId>,
    created_at: Option<DateTime<Utc>>,
    children: Vec<ItemId>,
    versions: BTreeMap<VersionKey, VersionData>,
}

#[derive(Debug, Default)]
struct Database {
    nodes: HashMap<ItemId, StoredNode>,
}

impl Database {
    fn with_root() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_ID,
            StoredNode {
                name: ROOT_NAME.to_string(),
                template_id: ItemId::NULL,
                branch_id: None,
                parent_id: None,
                created_at: None,
                children: Vec::new(),
                versions: BTreeMap::new(),
            },
        );
        Self { nodes }
    }

    fn path_of(&self, id: ItemId) -> Option<String> {
        let mut segments = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.nodes.get(&current)?;
            segments.push(node.name.as_str());
            cursor = node.parent_id;
        }
        segments.reverse();
        Some(format!("/{}", segments.join("/")))
    }

    fn snapshot(&self, database: &str, id: ItemId) -> Option<Node> {
        let node = self.nodes.get(&id)?;
        Some(Node {
            database: database.to_string(),
            id,
            name: node.name.clone(),
            template_id: node.template_id,
            branch_id: node.branch_id,
            parent_id: node.parent_id,
            path: self.path_of(id)?,
        })
    }

    fn child_named(&self, parent: ItemId, name: &str) -> Option<ItemId> {
        self.nodes.get(&parent)?.children.iter().copied().find(|child| {
            self.nodes
                .get(child)
                .is_some_and(|node| node.name.eq_ignore_ascii_case(name))
        })
    }

    fn resolve_path(&self, path: &str) -> Option<ItemId> {
        let mut segments = path.trim_matches('/').split('/');
        let root = segments.next()?;
        if !self
            .nodes
            .get(&ROOT_ID)
            .is_some_and(|node| node.name.eq_ignore_ascii_case(root))
        {
            return None;
        }
        let mut current = ROOT_ID;
        for segment in segments {
            current = self.child_named(current, segment)?;
        }
        Some(current)
    }

    fn is_descendant_or_self(&self, candidate: ItemId, ancestor: ItemId) -> bool {
        let mut cursor = Some(candidate);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|node| node.parent_id);
        }
        false
    }

    fn insert(&mut self, id: ItemId, parent_id: ItemId, stored: StoredNode) {
        self.nodes.insert(id, stored);
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children.push(id);
        }
    }

    fn remove_subtree(&mut self, id: ItemId, removed: &mut Vec<ItemId>) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.remove_subtree(child, removed);
            }
            removed.push(id);
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    databases: BTreeMap<String, Database>,
    builtin_templates: BTreeSet<ItemId>,
    edits: Vec<StoreEdit>,
}

impl Inner {
    fn database(&self, name: &str) -> Result<&Database, Error> {
        self.databases.get(name).ok_or_else(|| {
            StoreError::DatabaseNotFound {
                database: name.to_string(),
            }
            .into()
        })
    }

    fn database_mut(&mut self, name: &str) -> Result<&mut Database, Error> {
        self.databases.get_mut(name).ok_or_else(|| {
            StoreError::DatabaseNotFound {
                database: name.to_string(),
            }
            .into()
        })
    }

    fn template_resolves(&self, database: &Database, template_id: ItemId) -> bool {
        self.builtin_templates.contains(&template_id) || database.nodes.contains_key(&template_id)
    }
}

fn not_found(database: &str, id: ItemId) -> Error {
    StoreError::ItemNotFound {
        database: database.to_string(),
        id: id.to_string(),
    }
    .into()
}

/// Tree store kept entirely in memory
///
/// Every database has a root node named `sitecore` with id [`ROOT_ID`].
/// Templates resolve when a node with the template id exists in the same
/// database or the id was registered as built in. All mutations are
/// journaled and can be inspected with [`MemoryStore::edits`].
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store that knows the folder template
    #[must_use]
    pub fn new() -> Self {
        let mut inner = Inner::default();
        inner.builtin_templates.insert(FOLDER_TEMPLATE);
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Add an empty database
    #[must_use]
    pub fn with_database(self, name: impl Into<String>) -> Self {
        if let Ok(mut inner) = self.inner.write() {
            inner
                .databases
                .entry(name.into())
                .or_insert_with(Database::with_root);
        }
        self
    }

    /// Treat a template id as resolvable in every database
    #[must_use]
    pub fn with_builtin_template(self, template_id: ItemId) -> Self {
        if let Ok(mut inner) = self.inner.write() {
            inner.builtin_templates.insert(template_id);
        }
        self
    }

    /// Create an item below `parent_path`, creating missing folders on the way
    ///
    /// The template does not need to resolve.
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not exist, the parent path
    /// is outside the root or the id is taken.
    pub fn add_item(
        &self,
        database: &str,
        parent_path: &str,
        id: ItemId,
        name: &str,
        template_id: ItemId,
    ) -> Result<Node, Error> {
        let parent = self
            .ensure_path(database, parent_path)?
            .ok_or_else(|| StoreError::InvalidPath {
                path: parent_path.to_string(),
            })?;
        let request = CreateRequest {
            database: database.to_string(),
            parent_id: parent.id,
            name: name.to_string(),
            template_id,
            id,
            created_at: None,
            template_pending: true,
        };
        self.create(&request)?
            .ok_or_else(|| Error::internal("pending template creation returned no node"))
    }

    /// Mutations performed so far, oldest first
    #[must_use]
    pub fn edits(&self) -> Vec<StoreEdit> {
        self.inner
            .read()
            .map(|inner| inner.edits.clone())
            .unwrap_or_default()
    }

    /// Forget the journal
    pub fn clear_edits(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.edits.clear();
        }
    }

    /// Creation time recorded for a node
    #[must_use]
    pub fn created_at(&self, database: &str, id: ItemId) -> Option<DateTime<Utc>> {
        let inner = self.inner.read().ok()?;
        inner
            .databases
            .get(database)?
            .nodes
            .get(&id)?
            .created_at
    }

    /// Number of nodes in a database, root included
    #[must_use]
    pub fn node_count(&self, database: &str) -> usize {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.databases.get(database).map(|db| db.nodes.len()))
            .unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, Error> {
        self.inner.read().map_err(|e| {
            StoreError::Backend {
                message: e.to_string(),
            }
            .into()
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, Error> {
        self.inner.write().map_err(|e| {
            StoreError::Backend {
                message: e.to_string(),
            }
            .into()
        })
    }
}

impl TreeStore for MemoryStore {
    fn has_database(&self, database: &str) -> bool {
        self.inner
            .read()
            .is_ok_and(|inner| inner.databases.contains_key(database))
    }

    fn get_by_id(&self, database: &str, id: ItemId) -> Result<Option<Node>, Error> {
        let inner = self.read()?;
        Ok(inner
            .databases
            .get(database)
            .and_then(|db| db.snapshot(database, id)))
    }

    fn get_by_path(&self, database: &str, path: &str) -> Result<Option<Node>, Error> {
        let inner = self.read()?;
        Ok(inner.databases.get(database).and_then(|db| {
            db.resolve_path(path)
                .and_then(|id| db.snapshot(database, id))
        }))
    }

    fn children(&self, database: &str, id: ItemId) -> Result<Vec<Node>, Error> {
        let inner = self.read()?;
        let db = inner.database(database)?;
        let node = db.nodes.get(&id).ok_or_else(|| not_found(database, id))?;
        Ok(node
            .children
            .iter()
            .filter_map(|child| db.snapshot(database, *child))
            .collect())
    }

    fn create(&self, request: &CreateRequest) -> Result<Option<Node>, Error> {
        let mut inner = self.write()?;
        let db = inner.database(&request.database)?;
        if !db.nodes.contains_key(&request.parent_id) {
            return Err(not_found(&request.database, request.parent_id));
        }
        if db.nodes.contains_key(&request.id) {
            return Err(StoreError::AlreadyExists {
                database: request.database.clone(),
                id: request.id.to_string(),
            }
            .into());
        }
        if !request.template_pending && !inner.template_resolves(db, request.template_id) {
            debug!(
                database = %request.database,
                template = %request.template_id,
                "template does not resolve, item not created"
            );
            return Ok(None);
        }

        let db = inner.database_mut(&request.database)?;
        db.insert(
            request.id,
            request.parent_id,
            StoredNode {
                name: request.name.clone(),
                template_id: request.template_id,
                branch_id: None,
                parent_id: Some(request.parent_id),
                created_at: request.created_at,
                children: Vec::new(),
                versions: BTreeMap::new(),
            },
        );
        let node = db.snapshot(&request.database, request.id);
        if let Some(node) = &node {
            inner.edits.push(StoreEdit::Created {
                id: node.id,
                path: node.path.clone(),
            });
        }
        Ok(node)
    }

    fn ensure_path(&self, database: &str, path: &str) -> Result<Option<Node>, Error> {
        let mut inner = self.write()?;
        let Some(db) = inner.databases.get_mut(database) else {
            return Ok(None);
        };
        let mut segments = path.trim_matches('/').split('/');
        let root_matches = segments.next().is_some_and(|root| {
            db.nodes
                .get(&ROOT_ID)
                .is_some_and(|node| node.name.eq_ignore_ascii_case(root))
        });
        if !root_matches {
            return Ok(None);
        }

        let mut current = ROOT_ID;
        let mut created = Vec::new();
        for segment in segments.filter(|segment| !segment.is_empty()) {
            current = if let Some(existing) = db.child_named(current, segment) {
                existing
            } else {
                let id = ItemId::new_v4();
                db.insert(
                    id,
                    current,
                    StoredNode {
                        name: segment.to_string(),
                        template_id: FOLDER_TEMPLATE,
                        branch_id: None,
                        parent_id: Some(current),
                        created_at: Some(Utc::now()),
                        children: Vec::new(),
                        versions: BTreeMap::new(),
                    },
                );
                created.push(id);
                id
            };
        }

        let journal: Vec<StoreEdit> = created
            .iter()
            .filter_map(|id| {
                db.path_of(*id)
                    .map(|path| StoreEdit::Created { id: *id, path })
            })
            .collect();
        let node = db.snapshot(database, current);
        inner.edits.extend(journal);
        Ok(node)
    }

    fn move_to(&self, database: &str, id: ItemId, parent_id: ItemId) -> Result<Node, Error> {
        let mut inner = self.write()?;
        let db = inner.database_mut(database)?;
        if !db.nodes.contains_key(&parent_id) {
            return Err(not_found(database, parent_id));
        }
        let old_parent = db
            .nodes
            .get(&id)
            .ok_or_else(|| not_found(database, id))?
            .parent_id;
        if db.is_descendant_or_self(parent_id, id) {
            return Err(StoreError::InvalidMove {
                id: id.to_string(),
                target: parent_id.to_string(),
            }
            .into());
        }

        if let Some(old) = old_parent.and_then(|old| db.nodes.get_mut(&old)) {
            old.children.retain(|child| *child != id);
        }
        if let Some(parent) = db.nodes.get_mut(&parent_id) {
            parent.children.push(id);
        }
        if let Some(node) = db.nodes.get_mut(&id) {
            node.parent_id = Some(parent_id);
        }
        let node = db
            .snapshot(database, id)
            .ok_or_else(|| not_found(database, id))?;
        inner.edits.push(StoreEdit::Moved { id, parent_id });
        Ok(node)
    }

    fn delete(&self, database: &str, id: ItemId) -> Result<bool, Error> {
        let mut inner = self.write()?;
        let db = inner.database_mut(database)?;
        let Some(node) = db.nodes.get(&id) else {
            return Ok(false);
        };
        let Some(parent_id) = node.parent_id else {
            return Err(StoreError::RootDeletion {
                database: database.to_string(),
            }
            .into());
        };

        if let Some(parent) = db.nodes.get_mut(&parent_id) {
            parent.children.retain(|child| *child != id);
        }
        let mut removed = Vec::new();
        db.remove_subtree(id, &mut removed);
        inner
            .edits
            .extend(removed.into_iter().map(|id| StoreEdit::Deleted { id }));
        Ok(true)
    }

    fn versions(&self, database: &str, id: ItemId) -> Result<Vec<VersionData>, Error> {
        let inner = self.read()?;
        let node = inner
            .database(database)?
            .nodes
            .get(&id)
            .ok_or_else(|| not_found(database, id))?;
        Ok(node.versions.values().cloned().collect())
    }

    fn get_version(
        &self,
        database: &str,
        id: ItemId,
        key: &VersionKey,
    ) -> Result<Option<VersionData>, Error> {
        let inner = self.read()?;
        let node = inner
            .database(database)?
            .nodes
            .get(&id)
            .ok_or_else(|| not_found(database, id))?;
        Ok(node.versions.get(key).cloned())
    }

    fn commit_version(
        &self,
        database: &str,
        id: ItemId,
        version: &VersionData,
    ) -> Result<(), Error> {
        let mut inner = self.write()?;
        let node = inner
            .database_mut(database)?
            .nodes
            .get_mut(&id)
            .ok_or_else(|| not_found(database, id))?;
        let key = version.key();
        node.versions.insert(key.clone(), version.clone());
        inner.edits.push(StoreEdit::VersionCommitted { id, key });
        Ok(())
    }

    fn update_definition(
        &self,
        database: &str,
        id: ItemId,
        definition: &Definition,
    ) -> Result<Node, Error> {
        let mut inner = self.write()?;
        let db = inner.database_mut(database)?;
        let node = db.nodes.get_mut(&id).ok_or_else(|| not_found(database, id))?;
        node.name.clone_from(&definition.name);
        node.template_id = definition.template_id;
        node.branch_id = definition.branch_id;
        let snapshot = db
            .snapshot(database, id)
            .ok_or_else(|| not_found(database, id))?;
        inner.edits.push(StoreEdit::DefinitionUpdated { id });
        Ok(snapshot)
    }

    fn set_fields(
        &self,
        database: &str,
        id: ItemId,
        key: &VersionKey,
        fields: &[(ItemId, String)],
    ) -> Result<bool, Error> {
        let mut inner = self.write()?;
        let node = inner
            .database_mut(database)?
            .nodes
            .get_mut(&id)
            .ok_or_else(|| not_found(database, id))?;
        let Some(version) = node.versions.get_mut(key) else {
            return Ok(false);
        };
        for (field, value) in fields {
            version.fields.insert(*field, value.clone());
        }
        inner.edits.push(StoreEdit::FieldsSet {
            id,
            key: key.clone(),
        });
        Ok(true)
    }

    fn remove_version(&self, database: &str, id: ItemId, key: &VersionKey) -> Result<bool, Error> {
        let mut inner = self.write()?;
        let node = inner
            .database_mut(database)?
            .nodes
            .get_mut(&id)
            .ok_or_else(|| not_found(database, id))?;
        let removed = node.versions.remove(key).is_some();
        if removed {
            inner.edits.push(StoreEdit::VersionRemoved {
                id,
                key: key.clone(),
            });
        }
        Ok(removed)
    }
}
