//! Installation engine
//!
//! Drains the entry queue in passes. An entry whose template (or a base
//! template) is still queued gets a placeholder node and moves to the next
//! pass; every other entry is resolved against existing content and written.
//! A repeated pass that postpones every entry it was given ends the run.

use crate::api::config::EngineConfig;
use crate::api::context::InstallContext;
use crate::api::result::InstallReport;
use crate::finisher::{Finisher, LedgerFinisher};
use crate::ledger::NodeKey;
use crate::lookup::find_target;
use crate::placeholder;
use crate::policy::{Conflict, ConflictResolver, FixedResolver};
use crate::state::RunState;
use crate::writer::{VersionWriter, WriteRequest};
use cpkg_errors::{Error, InstallError};
use cpkg_events::{EventEmitter, InstallEvent, RunOutcome};
use cpkg_store::{locate, Definition, Node, TreeStore};
use cpkg_types::{
    known, BehaviourOptions, CollisionClass, InstallMode, ItemDescriptor, ItemReference,
    MergeMode, PackageEntry, VersionInstallMode,
};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

enum Step {
    Installed(VersionInstallMode),
    Postponed,
}

/// Multi-pass installer for item entries
pub struct Engine {
    store: Arc<dyn TreeStore>,
    context: InstallContext,
    config: EngineConfig,
    resolver: Option<Arc<dyn ConflictResolver>>,
    writer: VersionWriter,
    finisher: Box<dyn Finisher>,
    state: RunState,
    cursor: u64,
    current_key: Option<String>,
}

impl Engine {
    #[must_use]
    pub fn new(store: Arc<dyn TreeStore>, context: InstallContext) -> Self {
        Self {
            store,
            context,
            config: EngineConfig::default(),
            resolver: None,
            writer: VersionWriter::new(),
            finisher: Box::new(LedgerFinisher),
            state: RunState::new(),
            cursor: 0,
            current_key: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Ask this resolver instead of applying the configured default decision
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_writer(mut self, writer: VersionWriter) -> Self {
        self.writer = writer;
        self
    }

    #[must_use]
    pub fn with_finisher(mut self, finisher: impl Finisher + 'static) -> Self {
        self.finisher = Box::new(finisher);
        self
    }

    /// Cursor of the last attempted entry
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Install item entries in package order
    ///
    /// Entries with malformed keys are logged and skipped. Whatever the
    /// outcome, buffered blobs are flushed, the deletion ledger goes to the
    /// finisher and all per-run state is dropped before this returns.
    ///
    /// # Errors
    ///
    /// `StructuralCycle` when a pass makes no progress, `Cancelled` or
    /// `ResolverAborted` when the run was stopped, and the first entry
    /// failure otherwise. Mutations made before the failure are kept.
    pub fn install<I>(&mut self, entries: I) -> Result<InstallReport, Error>
    where
        I: IntoIterator<Item = PackageEntry>,
    {
        self.state.clear();
        self.cursor = 0;
        self.current_key = None;

        let mut report = InstallReport::default();
        let mut queue = Vec::new();
        for entry in entries {
            match entry.reference() {
                Ok(reference) => {
                    self.state.mark_pending(&reference.database, reference.id);
                    queue.push(entry);
                }
                Err(e) => {
                    warn!(key = %entry.key, error = %e, "skipping entry with invalid key");
                    report.rejected += 1;
                }
            }
        }
        report.queued = queue.len();
        info!(package = %self.context.package, entries = report.queued, "installing items");

        let mut result = self.run_passes(queue, &mut report);
        if let Err(e) = self.writer.flush() {
            error!(error = %e, "failed to flush blob data");
            if result.is_ok() {
                result = Err(e);
            }
        }

        self.context.emit_install(InstallEvent::ItemsEnded {
            installed: report.installed(),
        });
        let outcome = match &result {
            Ok(()) => RunOutcome::Completed,
            Err(e) if e.is_abort() => RunOutcome::Aborted,
            Err(_) => RunOutcome::Failed,
        };
        if outcome == RunOutcome::Aborted {
            info!(cursor = self.cursor, key = ?self.current_key, "installation was aborted");
            self.context.emit_install(InstallEvent::Aborted {
                cursor: self.cursor,
                key: self.current_key.clone(),
            });
        }

        report.placeholders = self.state.placeholder_count();
        report.cursor = self.cursor;
        let ledger = std::mem::take(&mut self.state.ledger);
        self.state.clear();
        report.finish = self.finisher.finish(self.store.as_ref(), ledger, outcome);

        result.map(|()| report)
    }

    fn run_passes(
        &mut self,
        mut queue: Vec<PackageEntry>,
        report: &mut InstallReport,
    ) -> Result<(), Error> {
        let mut pass = 0;
        while !queue.is_empty() {
            pass += 1;
            report.passes = pass;
            let queued = queue.len();
            if self.config.max_passes.is_some_and(|max| pass > max) {
                return Err(InstallError::StructuralCycle {
                    pending: queued,
                    passes: pass - 1,
                }
                .into());
            }

            debug!(pass, queued, "starting pass");
            self.context
                .emit_install(InstallEvent::ItemsStarting { pass, queued });

            let mut postponed = Vec::new();
            for entry in queue {
                self.context.cancel.check()?;
                match self.install_entry(&entry)? {
                    Step::Installed(mode) => report.record(mode),
                    Step::Postponed => {
                        report.postponed += 1;
                        postponed.push(entry);
                    }
                }
            }

            // only a pass over entries postponed before can prove a cycle
            if pass > 1 && postponed.len() == queued {
                error!(pass, pending = queued, "pass made no progress");
                return Err(InstallError::StructuralCycle {
                    pending: queued,
                    passes: pass,
                }
                .into());
            }
            queue = postponed;
        }
        Ok(())
    }

    fn install_entry(&mut self, entry: &PackageEntry) -> Result<Step, Error> {
        self.cursor += 1;
        self.current_key = Some(entry.key.clone());
        self.context.report_progress(self.cursor, &entry.key);

        self.attempt(entry).map_err(|e| escalate(&entry.key, e))
    }

    fn attempt(&mut self, entry: &PackageEntry) -> Result<Step, Error> {
        let reference = entry.reference()?;
        let node = reference.reduce();
        let descriptor = match self.state.take_descriptor(&entry.key) {
            Some(descriptor) => descriptor,
            None => ItemDescriptor::parse(&entry.key, node.id, &entry.document)?,
        };

        if !descriptor.is_self_templated()
            && self.state.waits_for_template(&node.database, &descriptor)
        {
            self.postpone(entry, &node, descriptor)?;
            return Ok(Step::Postponed);
        }

        let mode = self.install_ready(entry, &reference, &node, &descriptor)?;
        self.state.remove_pending(&node.database, node.id);
        Ok(Step::Installed(mode))
    }

    fn postpone(
        &mut self,
        entry: &PackageEntry,
        node: &ItemReference,
        descriptor: ItemDescriptor,
    ) -> Result<(), Error> {
        let store = Arc::clone(&self.store);
        if find_target(store.as_ref(), &self.state, node)?.target.is_none() {
            // a pending base alone does not excuse a template missing everywhere
            let template_pending = descriptor.is_self_templated()
                || self
                    .state
                    .belongs_to_package(&node.database, descriptor.template_id);
            placeholder::create(store.as_ref(), node, &descriptor, template_pending)?;
            self.state
                .mark_placeholder(NodeKey::new(node.database.clone(), node.id));
        }

        debug!(
            key = %entry.key,
            template_id = %descriptor.template_id,
            "template not installed yet, entry postponed"
        );
        self.context.emit_install(InstallEvent::ItemPostponed {
            key: entry.key.clone(),
            template_id: descriptor.template_id.to_string(),
        });
        self.state.cache_descriptor(&entry.key, descriptor);
        Ok(())
    }

    fn install_ready(
        &mut self,
        entry: &PackageEntry,
        reference: &ItemReference,
        node: &ItemReference,
        descriptor: &ItemDescriptor,
    ) -> Result<VersionInstallMode, Error> {
        let (mode, remove_versions) = self.version_install_mode(entry, node, descriptor)?;
        self.context.emit_install(InstallEvent::ItemInstalling {
            cursor: self.cursor,
            key: entry.key.clone(),
            mode: Some(mode.to_string()),
        });

        match mode {
            VersionInstallMode::Skip => {
                debug!(key = %entry.key, "entry skipped");
            }
            VersionInstallMode::Undefined => {
                return Err(InstallError::UndefinedInstallMode {
                    key: entry.key.clone(),
                }
                .into());
            }
            VersionInstallMode::Append | VersionInstallMode::Merge => {
                info!(key = %entry.key, mode = %mode, "installing item");
                let store = self.store.as_ref();
                let target = locate(store, &reference.database, reference.id, &reference.path)?
                    .ok_or_else(|| InstallError::TargetNotFound {
                        key: entry.key.clone(),
                    })?;
                self.writer.write(
                    store,
                    &target,
                    &WriteRequest {
                        key: &entry.key,
                        reference,
                        descriptor,
                        mode,
                        remove_other_versions: remove_versions,
                    },
                )?;
            }
        }
        Ok(mode)
    }

    /// Decide how the entry's version is written; the flag asks for every
    /// other version of the node to be removed
    fn version_install_mode(
        &mut self,
        entry: &PackageEntry,
        node: &ItemReference,
        descriptor: &ItemDescriptor,
    ) -> Result<(VersionInstallMode, bool), Error> {
        let store = Arc::clone(&self.store);
        let node_key = NodeKey::new(node.database.clone(), node.id);

        if self.state.is_placeholder(&node_key) {
            if let Some(target) = find_target(store.as_ref(), &self.state, node)?.target {
                self.state.ledger.rescind(NodeKey::of(&target));
                self.state.mark_installed(&node.database, node.id);
                debug!(key = %entry.key, "filling placeholder");
                return Ok((VersionInstallMode::Append, false));
            }
        }

        if let Some(current) = self.state.current_item() {
            if current.key == node_key {
                return Ok((current.mode, false));
            }
        }

        let lookup = find_target(store.as_ref(), &self.state, node)?;
        let (mode, remove_versions) = if let Some(target) = lookup.target {
            let class = CollisionClass::classify(target.id, node.id);
            let options = self.decide(entry, class, &target, descriptor)?;
            debug!(
                key = %entry.key,
                class = %class,
                options = %options,
                side_by_side = lookup.side_by_side,
                "resolved collision"
            );
            let remove = self.apply_decision(&entry.key, options, &target, node, descriptor)?;
            self.state.mark_installed(&target.database, target.id);
            (options.version_install_mode(), remove)
        } else {
            let created = placeholder::create(
                store.as_ref(),
                node,
                descriptor,
                descriptor.is_self_templated(),
            )?;
            self.state.ledger.rescind(NodeKey::of(&created));
            (VersionInstallMode::Append, false)
        };

        self.state.set_current_item(node_key, mode);
        self.state.mark_installed(&node.database, node.id);
        Ok((mode, remove_versions))
    }

    /// Entry hints first, then a remembered decision, then the resolver
    fn decide(
        &mut self,
        entry: &PackageEntry,
        class: CollisionClass,
        target: &Node,
        incoming: &ItemDescriptor,
    ) -> Result<BehaviourOptions, Error> {
        if let Some(options) = entry.hints.behaviour_for(class) {
            return Ok(options);
        }
        if let Some(options) = self.state.decisions.get(class) {
            return Ok(options);
        }

        self.context.cancel.check()?;
        let existing = ItemDescriptor {
            parent_id: target.parent_id,
            branch_id: target.branch_id,
            ..ItemDescriptor::stub(target.id, target.name.clone(), target.template_id)
        };
        let conflict = Conflict {
            key: &entry.key,
            class,
            existing: &existing,
            incoming,
        };
        let answer = match &self.resolver {
            Some(resolver) => resolver.ask(&conflict),
            None => FixedResolver::new(self.config.default_behaviour).ask(&conflict),
        };
        let resolution = answer.ok_or_else(|| InstallError::ResolverAborted {
            key: entry.key.clone(),
        })?;

        let options = resolution.options;
        if options.item_mode == InstallMode::Undefined {
            return Err(InstallError::UndefinedInstallMode {
                key: entry.key.clone(),
            }
            .into());
        }
        if !options.is_defined() {
            return Err(InstallError::UndefinedMergeMode {
                key: entry.key.clone(),
            }
            .into());
        }
        if resolution.apply_to_all {
            self.state.decisions.remember(class, options);
        }
        Ok(options)
    }

    /// Structural side of a decision; returns whether the versions of the
    /// target are replaced wholesale
    fn apply_decision(
        &mut self,
        key: &str,
        options: BehaviourOptions,
        target: &Node,
        node: &ItemReference,
        descriptor: &ItemDescriptor,
    ) -> Result<bool, Error> {
        let store = Arc::clone(&self.store);
        let store = store.as_ref();
        let database = target.database.as_str();
        self.state.ledger.rescind(NodeKey::of(target));

        match options.item_mode {
            InstallMode::Skip => Ok(false),
            InstallMode::Overwrite
                if target.id == node.id || target.template_id == known::LANGUAGE_TEMPLATE =>
            {
                if target.path != node.path {
                    let parent_not_found = || InstallError::ParentNotFound {
                        path: node.path.clone(),
                        database: database.to_string(),
                    };
                    let parent_path = node.parent_path().ok_or_else(parent_not_found)?;
                    let parent = store
                        .ensure_path(database, parent_path)?
                        .ok_or_else(parent_not_found)?;
                    store.move_to(database, target.id, parent.id)?;
                    debug!(key, from = %target.path, to = %node.path, "moved node");
                }
                for child in store.children(database, target.id)? {
                    if self.state.ledger.enqueue(NodeKey::of(&child)) {
                        trace!(path = %child.path, "child scheduled for deletion");
                    }
                }
                store.update_definition(
                    database,
                    target.id,
                    &Definition {
                        name: descriptor.name.clone(),
                        template_id: descriptor.template_id,
                        branch_id: descriptor.branch_id,
                    },
                )?;
                Ok(true)
            }
            InstallMode::Overwrite => {
                store.delete(database, target.id)?;
                placeholder::create(store, node, descriptor, descriptor.is_self_templated())?;
                Ok(false)
            }
            InstallMode::SideBySide => {
                placeholder::create(store, node, descriptor, descriptor.is_self_templated())?;
                Ok(false)
            }
            InstallMode::Merge => match options.merge_mode {
                MergeMode::Clear => Ok(true),
                MergeMode::Append | MergeMode::Merge => Ok(false),
                MergeMode::Undefined => Err(InstallError::UndefinedMergeMode {
                    key: key.to_string(),
                }
                .into()),
            },
            InstallMode::Undefined => Err(InstallError::UndefinedInstallMode {
                key: key.to_string(),
            }
            .into()),
        }
    }
}

/// Log an entry failure and turn untyped faults into `EntryFailed`
fn escalate(key: &str, error: Error) -> Error {
    match error {
        Error::Cancelled => {
            info!(key, "installation was aborted at entry");
            Error::Cancelled
        }
        Error::Install(install) => {
            if install.is_abort() {
                info!(key, "installation was aborted at entry");
            } else {
                error!(key, error = %install, "error installing entry");
            }
            Error::Install(install)
        }
        other => {
            error!(key, error = %other, "error installing entry");
            InstallError::EntryFailed {
                key: key.to_string(),
                message: other.to_string(),
            }
            .into()
        }
    }
}
