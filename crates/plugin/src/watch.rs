//! Resource watchers: scheduler jobs that poll the cloud account of the
//! service identity and report what changed since the previous poll.
//!
//! A watcher keeps the last seen `id -> (name, status)` map. The first
//! successful poll only records that baseline; later polls diff against it
//! and produce one notification per created, destroyed or status-changed
//! resource. A failed poll leaves the baseline untouched, so the next tick
//! diffs against the last good snapshot.

use std::{collections::BTreeMap, sync::Arc};

use {
    anyhow::Context,
    futures::FutureExt,
    ocean_cloud::{ClientFactory, CloudClient},
    ocean_config::PluginConfig,
    ocean_cron::{JobActionFn, Notification},
    tokio::sync::Mutex,
    tracing::{debug, info},
};

/// What a watcher polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Droplets,
    DatabaseClusters,
}

impl ResourceKind {
    pub const ALL: [Self; 2] = [Self::Droplets, Self::DatabaseClusters];

    /// Scheduler job name.
    pub fn job_name(self) -> &'static str {
        match self {
            Self::Droplets => "watch-droplets",
            Self::DatabaseClusters => "watch-databases",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Self::Droplets => "Droplet",
            Self::DatabaseClusters => "Database cluster",
        }
    }

    async fn snapshot(self, client: &dyn CloudClient) -> ocean_cloud::Result<Snapshot> {
        let entries = match self {
            Self::Droplets => client
                .list_droplets()
                .await?
                .into_iter()
                .map(|d| (d.id.to_string(), Fingerprint::new(d.name, d.status)))
                .collect(),
            Self::DatabaseClusters => client
                .list_database_clusters()
                .await?
                .into_iter()
                .map(|c| (c.id, Fingerprint::new(c.name, c.status)))
                .collect(),
        };
        Ok(Snapshot(entries))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    name: String,
    status: String,
}

impl Fingerprint {
    fn new(name: String, status: String) -> Self {
        Self { name, status }
    }
}

/// Resources keyed by provider id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Snapshot(BTreeMap<String, Fingerprint>);

/// Notifications describing how `after` differs from `before`.
fn diff(kind: ResourceKind, before: &Snapshot, after: &Snapshot) -> Vec<Notification> {
    let noun = kind.noun();
    let mut out = Vec::new();
    for (id, now) in &after.0 {
        match before.0.get(id) {
            None => out.push(Notification::new(format!(
                "{noun} `{}` ({id}) was created with status `{}`.",
                now.name, now.status
            ))),
            Some(prev) if prev.status != now.status => out.push(Notification::new(format!(
                "{noun} `{}` ({id}) changed status from `{}` to `{}`.",
                now.name, prev.status, now.status
            ))),
            Some(_) => {},
        }
    }
    for (id, prev) in &before.0 {
        if !after.0.contains_key(id) {
            out.push(Notification::new(format!(
                "{noun} `{}` ({id}) was destroyed.",
                prev.name
            )));
        }
    }
    out
}

pub struct ResourceWatcher {
    kind: ResourceKind,
    factory: ClientFactory,
    baseline: Mutex<Option<Snapshot>>,
}

impl ResourceWatcher {
    pub fn new(kind: ResourceKind, factory: ClientFactory) -> Self {
        Self {
            kind,
            factory,
            baseline: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// One poll. Returns nothing when no service identity is configured.
    pub async fn poll(&self, config: &PluginConfig) -> anyhow::Result<Vec<Notification>> {
        let Some(identity) = config.service_identity() else {
            debug!(job = self.kind.job_name(), "no service identity configured, skipping poll");
            return Ok(Vec::new());
        };
        let client = self
            .factory
            .resolve(identity)
            .await
            .with_context(|| format!("resolving client for service identity {identity}"))?;
        let current = self
            .kind
            .snapshot(client.as_ref())
            .await
            .with_context(|| format!("listing {}", self.kind.job_name()))?;

        let mut baseline = self.baseline.lock().await;
        let notifications = match baseline.as_ref() {
            None => {
                info!(
                    job = self.kind.job_name(),
                    resources = current.0.len(),
                    "recorded watcher baseline"
                );
                Vec::new()
            },
            Some(previous) => diff(self.kind, previous, &current),
        };
        *baseline = Some(current);
        Ok(notifications)
    }

    /// Scheduler action that polls this watcher.
    pub fn action(self: Arc<Self>) -> JobActionFn {
        Arc::new(move |config: Arc<PluginConfig>| {
            let watcher = Arc::clone(&self);
            async move { watcher.poll(&config).await }.boxed()
        })
    }
}
