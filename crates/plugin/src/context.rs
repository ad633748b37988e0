//! The activation context.
//!
//! Everything the plugin needs lives in one [`Plugin`] value built at
//! activation and handed to the host. Components receive their
//! collaborators explicitly; nothing is reachable through globals.

use std::{path::Path, sync::Arc};

use {
    ocean_cloud::{ClientFactory, Connector, DigitalOceanConnector},
    ocean_commands::{CommandInvocation, CommandResponse, CommandRouter, HandlerRegistry},
    ocean_common::ChannelOutbound,
    ocean_config::{ConfigManager, Diagnostic, PluginConfig, validate_config},
    ocean_cron::{Scheduler, SchedulerStatus, parse_schedule},
    ocean_store::{CredentialStore, KvStore, SubscriptionStore},
    tracing::{info, warn},
};

use crate::{
    error::{Context, Error, Result},
    storage,
    watch::{ResourceKind, ResourceWatcher},
};

/// Collaborators a host may substitute. Anything left `None` is built from
/// the configuration.
#[derive(Default)]
pub struct Overrides {
    /// Used as-is, without the configured timeout wrapper.
    pub kv: Option<Arc<dyn KvStore>>,
    pub connector: Option<Arc<dyn Connector>>,
}

/// A running plugin instance.
pub struct Plugin {
    config: Arc<ConfigManager>,
    credentials: CredentialStore,
    subscriptions: Arc<SubscriptionStore>,
    factory: ClientFactory,
    router: CommandRouter,
    scheduler: Arc<Scheduler>,
}

impl Plugin {
    /// Activate with the configured storage backend and the DigitalOcean
    /// REST client.
    pub async fn activate(
        config: PluginConfig,
        outbound: Arc<dyn ChannelOutbound>,
    ) -> Result<Self> {
        Self::activate_with(config, outbound, Overrides::default()).await
    }

    /// Validate the config, open storage, build the router, register the
    /// watcher jobs and start the scheduler.
    pub async fn activate_with(
        config: PluginConfig,
        outbound: Arc<dyn ChannelOutbound>,
        overrides: Overrides,
    ) -> Result<Self> {
        let validation = validate_config(&config);
        if validation.has_errors() {
            return Err(Error::InvalidConfig {
                summary: validation.error_summary(),
            });
        }
        for diagnostic in &validation.diagnostics {
            warn!(path = %diagnostic.path, "{}", diagnostic.message);
        }

        let kv = match overrides.kv {
            Some(kv) => kv,
            None => storage::open_kv(&config.storage).await?,
        };
        let connector: Arc<dyn Connector> = match overrides.connector {
            Some(connector) => connector,
            None => Arc::new(DigitalOceanConnector::new()?),
        };

        let credentials = CredentialStore::new(Arc::clone(&kv));
        let subscriptions = Arc::new(SubscriptionStore::new(kv));
        if subscriptions
            .ensure_initialized()
            .await
            .context("initializing subscriptions")?
        {
            info!("created empty subscription record");
        }

        let scheduler_config = config.scheduler.clone();
        let config = Arc::new(ConfigManager::new(config));
        let factory = ClientFactory::new(credentials.clone(), Arc::clone(&config), connector);
        let router = CommandRouter::new(
            Arc::clone(&config),
            credentials.clone(),
            Arc::clone(&subscriptions),
            factory.clone(),
            Arc::new(HandlerRegistry::with_defaults()),
        );

        let scheduler = Scheduler::new(Arc::clone(&config), Arc::clone(&subscriptions), outbound);
        if scheduler_config.enabled {
            let schedule =
                parse_schedule(&scheduler_config.poll, scheduler_config.tz.as_deref())?;
            for kind in ResourceKind::ALL {
                let watcher = Arc::new(ResourceWatcher::new(kind, factory.clone()));
                scheduler.register(kind.job_name(), schedule.clone(), watcher.action())?;
            }
            scheduler.start();
        } else {
            info!("scheduler disabled, resource watchers not registered");
        }

        let snapshot = config.get();
        info!(
            team_id = snapshot.team_id.as_deref().unwrap_or("-"),
            admins = snapshot.admins.len(),
            storage = ?snapshot.storage.backend,
            "plugin activated"
        );
        Ok(Self {
            config,
            credentials,
            subscriptions,
            factory,
            router,
            scheduler,
        })
    }

    /// Stop scheduling new ticks and wait for in-flight runs.
    pub async fn deactivate(&self) {
        self.scheduler.stop().await;
        info!("plugin deactivated");
    }

    /// Answer one command invocation. Always yields exactly one response.
    pub async fn handle_command(&self, invocation: &CommandInvocation) -> CommandResponse {
        self.router.handle(invocation).await
    }

    /// Re-read the config file and swap it in if valid. Storage and the
    /// watcher schedule keep the values they were activated with.
    pub fn reload_config(&self, path: &Path) -> Result<Vec<Diagnostic>> {
        Ok(self.config.reload_from(path)?)
    }

    pub fn config(&self) -> &Arc<ConfigManager> {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionStore> {
        &self.subscriptions
    }

    pub fn client_factory(&self) -> &ClientFactory {
        &self.factory
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn scheduler_status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }
}
