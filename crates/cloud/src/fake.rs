//! In-memory [`CloudClient`] for tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    ocean_config::CloudConfig,
    secrecy::{ExposeSecret, SecretString},
};

use crate::{
    CloudError, Result,
    client::CloudClient,
    factory::Connector,
    types::{
        Account, Database, DatabaseBackup, DatabaseCluster, DatabaseUser, Domain, Droplet,
        DropletCreateRequest, SshKey,
    },
};

/// Failure injected into every call while set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Auth,
    Transient,
    NotFound,
}

impl FakeFailure {
    fn to_error(self) -> CloudError {
        match self {
            Self::Auth => CloudError::Auth {
                message: "Unable to authenticate you".into(),
            },
            Self::Transient => CloudError::Api {
                status: 503,
                message: "service unavailable".into(),
            },
            Self::NotFound => CloudError::NotFound {
                message: "The resource you were accessing could not be found.".into(),
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub account: Account,
    pub droplets: Vec<Droplet>,
    pub clusters: Vec<DatabaseCluster>,
    pub backups: HashMap<String, Vec<DatabaseBackup>>,
    pub users: HashMap<String, Vec<DatabaseUser>>,
    pub databases: HashMap<String, Vec<Database>>,
    pub domains: Vec<Domain>,
    pub ssh_keys: Vec<SshKey>,
    pub failure: Option<FakeFailure>,
    pub panic: bool,
    pub delay: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct FakeCloud {
    state: Mutex<FakeState>,
    calls: AtomicUsize,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of API calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (failure, panic, delay) = {
            let s = self.state();
            (s.failure, s.panic, s.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if panic {
            panic!("fake cloud client panicked");
        }
        match failure {
            Some(f) => Err(f.to_error()),
            None => Ok(()),
        }
    }

    fn not_found(what: &str) -> CloudError {
        CloudError::NotFound {
            message: format!("{what} not found"),
        }
    }
}

#[async_trait]
impl CloudClient for FakeCloud {
    async fn account(&self) -> Result<Account> {
        self.enter().await?;
        Ok(self.state().account.clone())
    }

    async fn list_droplets(&self) -> Result<Vec<Droplet>> {
        self.enter().await?;
        Ok(self.state().droplets.clone())
    }

    async fn create_droplet(&self, request: &DropletCreateRequest) -> Result<Droplet> {
        self.enter().await?;
        let mut s = self.state();
        let droplet = Droplet {
            id: s.droplets.iter().map(|d| d.id).max().unwrap_or(0) + 1,
            name: request.name.clone(),
            status: "new".into(),
            size_slug: request.size.clone(),
            ..Default::default()
        };
        s.droplets.push(droplet.clone());
        Ok(droplet)
    }

    async fn delete_droplet(&self, id: u64) -> Result<()> {
        self.enter().await?;
        let mut s = self.state();
        let before = s.droplets.len();
        s.droplets.retain(|d| d.id != id);
        if s.droplets.len() == before {
            return Err(Self::not_found("droplet"));
        }
        Ok(())
    }

    async fn list_database_clusters(&self) -> Result<Vec<DatabaseCluster>> {
        self.enter().await?;
        Ok(self.state().clusters.clone())
    }

    async fn list_database_backups(&self, cluster_id: &str) -> Result<Vec<DatabaseBackup>> {
        self.enter().await?;
        Ok(self
            .state()
            .backups
            .get(cluster_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_database_users(&self, cluster_id: &str) -> Result<Vec<DatabaseUser>> {
        self.enter().await?;
        Ok(self
            .state()
            .users
            .get(cluster_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_database_user(&self, cluster_id: &str, name: &str) -> Result<DatabaseUser> {
        self.enter().await?;
        let user = DatabaseUser {
            name: name.into(),
            role: "normal".into(),
            password: Some("generated".into()),
        };
        self.state()
            .users
            .entry(cluster_id.into())
            .or_default()
            .push(user.clone());
        Ok(user)
    }

    async fn delete_database_user(&self, cluster_id: &str, name: &str) -> Result<()> {
        self.enter().await?;
        let mut s = self.state();
        let users = s
            .users
            .get_mut(cluster_id)
            .ok_or_else(|| Self::not_found("database cluster"))?;
        let before = users.len();
        users.retain(|u| u.name != name);
        if users.len() == before {
            return Err(Self::not_found("database user"));
        }
        Ok(())
    }

    async fn list_databases(&self, cluster_id: &str) -> Result<Vec<Database>> {
        self.enter().await?;
        Ok(self
            .state()
            .databases
            .get(cluster_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_domains(&self) -> Result<Vec<Domain>> {
        self.enter().await?;
        Ok(self.state().domains.clone())
    }

    async fn create_domain(&self, name: &str, _ip_address: Option<&str>) -> Result<Domain> {
        self.enter().await?;
        let domain = Domain {
            name: name.into(),
            ttl: 1800,
        };
        self.state().domains.push(domain.clone());
        Ok(domain)
    }

    async fn delete_domain(&self, name: &str) -> Result<()> {
        self.enter().await?;
        let mut s = self.state();
        let before = s.domains.len();
        s.domains.retain(|d| d.name != name);
        if s.domains.len() == before {
            return Err(Self::not_found("domain"));
        }
        Ok(())
    }

    async fn list_ssh_keys(&self) -> Result<Vec<SshKey>> {
        self.enter().await?;
        Ok(self.state().ssh_keys.clone())
    }

    async fn get_ssh_key(&self, id: u64) -> Result<SshKey> {
        self.enter().await?;
        self.state()
            .ssh_keys
            .iter()
            .find(|k| k.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found("ssh key"))
    }

    async fn create_ssh_key(&self, name: &str, public_key: &str) -> Result<SshKey> {
        self.enter().await?;
        let mut s = self.state();
        let key = SshKey {
            id: s.ssh_keys.iter().map(|k| k.id).max().unwrap_or(0) + 1,
            name: name.into(),
            fingerprint: "00:11:22".into(),
            public_key: public_key.into(),
        };
        s.ssh_keys.push(key.clone());
        Ok(key)
    }

    async fn delete_ssh_key(&self, id: u64) -> Result<()> {
        self.enter().await?;
        let mut s = self.state();
        let before = s.ssh_keys.len();
        s.ssh_keys.retain(|k| k.id != id);
        if s.ssh_keys.len() == before {
            return Err(Self::not_found("ssh key"));
        }
        Ok(())
    }
}

/// Hands out the same [`FakeCloud`] for every token and records the tokens.
#[derive(Default)]
pub struct FakeConnector {
    pub client: Arc<FakeCloud>,
    tokens: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(client: Arc<FakeCloud>) -> Self {
        Self {
            client,
            tokens: Mutex::default(),
        }
    }

    /// Tokens passed to `connect`, in order.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Connector for FakeConnector {
    fn connect(&self, token: SecretString, _config: &CloudConfig) -> Arc<dyn CloudClient> {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(token.expose_secret().clone());
        Arc::clone(&self.client) as Arc<dyn CloudClient>
    }
}
