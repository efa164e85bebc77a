//! Package installation sessions
//!
//! A session owns the store, configuration and collaborators shared by
//! every installation against that store. Installations are serialized: a
//! job waits for the session's install lock before it starts and holds it
//! until its worker returns.

use crate::dispatch::dispatch;
use crate::job::InstallJob;
use crate::poststep::PostStepRegistry;
use crate::registration::register_installation;
use chrono::Utc;
use cpkg_config::Config;
use cpkg_errors::Error;
use cpkg_events::{EventEmitter, EventSender, FailureContext, InstallEvent, RunOutcome};
use cpkg_install::{
    CancellationToken, ConflictResolver, Engine, EngineConfig, InstallContext, InstallReport,
};
use cpkg_store::{Node, TreeStore};
use cpkg_types::{PackageEntry, PackageMetadata};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Result of installing one package
#[derive(Debug, Clone)]
pub struct PackageReport {
    /// Label the installation was started with
    pub package: String,
    pub metadata: PackageMetadata,
    pub items: InstallReport,
    /// Keys of entries outside the handled areas
    pub ignored: Vec<String>,
    /// History record, when registration ran
    pub registration: Option<Node>,
    /// Post step that ran, if any
    pub post_step: Option<String>,
}

/// Shared installation context for one store
#[derive(Clone)]
pub struct InstallSession {
    store: Arc<dyn TreeStore>,
    config: Arc<Config>,
    resolver: Option<Arc<dyn ConflictResolver>>,
    post_steps: Arc<PostStepRegistry>,
    event_sender: Option<EventSender>,
    install_lock: Arc<Mutex<()>>,
}

impl InstallSession {
    #[must_use]
    pub fn new(store: Arc<dyn TreeStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
            resolver: None,
            post_steps: Arc::new(PostStepRegistry::new()),
            event_sender: None,
            install_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create a session from the config file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// an environment override is invalid.
    pub async fn load(
        store: Arc<dyn TreeStore>,
        config_path: Option<&Path>,
    ) -> Result<Self, Error> {
        let mut config = Config::load_or_default(config_path).await?;
        config.merge_env()?;
        config.validate()?;
        Ok(Self::new(store, config))
    }

    /// Ask this resolver about collisions instead of applying the
    /// configured default decision
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_post_steps(mut self, registry: PostStepRegistry) -> Self {
        self.post_steps = Arc::new(registry);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start installing a package in the background
    ///
    /// Waits until earlier installations of this session have finished.
    /// `package` labels events and logs; the registered name comes from the
    /// package metadata.
    pub async fn start(
        &self,
        package: impl Into<String>,
        entries: Vec<PackageEntry>,
        cancel: CancellationToken,
    ) -> InstallJob<PackageReport> {
        let package = package.into();
        debug!(package = %package, "waiting for install lock");
        let guard = Arc::clone(&self.install_lock).lock_owned().await;

        let mut context = InstallContext::new()
            .with_package(package)
            .with_cancel(cancel);
        if let Some(sender) = &self.event_sender {
            context = context.with_event_sender(sender.clone());
        }

        let pipeline = Pipeline {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            resolver: self.resolver.clone(),
            post_steps: Arc::clone(&self.post_steps),
        };
        InstallJob::spawn(context, move |context| {
            let _guard = guard;
            pipeline.run(&context, entries)
        })
    }

    /// Install a package and wait for the result
    ///
    /// # Errors
    ///
    /// `Error::Cancelled` when the installation was aborted, otherwise the
    /// error that failed it.
    pub async fn install(
        &self,
        package: impl Into<String>,
        entries: Vec<PackageEntry>,
        cancel: CancellationToken,
    ) -> Result<PackageReport, Error> {
        let job = self.start(package, entries, cancel).await;
        job.monitor(self.config.monitor.poll_interval()).await
    }
}

/// Everything one installation needs on the worker thread
struct Pipeline {
    store: Arc<dyn TreeStore>,
    config: Arc<Config>,
    resolver: Option<Arc<dyn ConflictResolver>>,
    post_steps: Arc<PostStepRegistry>,
}

impl Pipeline {
    fn run(
        &self,
        context: &InstallContext,
        entries: Vec<PackageEntry>,
    ) -> Result<PackageReport, Error> {
        info!(package = %context.package, "installing package");
        context.emit_install(InstallEvent::starting(context.package.as_str()));

        let result = self.install(context, entries);
        let outcome = match &result {
            Ok(_) => RunOutcome::Completed,
            Err(e) if e.is_abort() => RunOutcome::Aborted,
            Err(e) => {
                context.emit_install(InstallEvent::Failed {
                    failure: FailureContext::from_error(e),
                });
                RunOutcome::Failed
            }
        };
        context.emit_install(InstallEvent::ended(context.package.as_str(), outcome));
        info!(package = %context.package, outcome = %outcome, "package installation ended");
        result
    }

    fn install(
        &self,
        context: &InstallContext,
        entries: Vec<PackageEntry>,
    ) -> Result<PackageReport, Error> {
        let package = dispatch(entries);
        for key in &package.ignored {
            context.emit_warning_with_context("entry outside the handled areas ignored", key);
        }

        let engine_config =
            EngineConfig::default().with_default_behaviour(self.config.install.default_behaviour());
        let mut engine =
            Engine::new(Arc::clone(&self.store), context.clone()).with_config(engine_config);
        if let Some(resolver) = &self.resolver {
            engine = engine.with_resolver(Arc::clone(resolver));
        }
        let items = engine.install(package.items)?;

        let registration = if self.config.install.register_installation {
            let record = register_installation(
                self.store.as_ref(),
                &self.config.registration,
                &package.metadata,
                Utc::now(),
            )?;
            if record.is_none() {
                context.emit_warning("installation could not be registered");
            }
            record
        } else {
            debug!("installation registration disabled");
            None
        };

        let post_step = match package.metadata.post_step() {
            Some(action) => self
                .post_steps
                .execute_post_step(context, action, &package.metadata)?
                .then(|| action.to_string()),
            None => None,
        };

        Ok(PackageReport {
            package: context.package.clone(),
            metadata: package.metadata,
            items,
            ignored: package.ignored,
            registration,
            post_step,
        })
    }
}
