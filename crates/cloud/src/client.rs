use async_trait::async_trait;

use crate::{
    Result,
    types::{
        Account, Database, DatabaseBackup, DatabaseCluster, DatabaseUser, Domain, Droplet,
        DropletCreateRequest, SshKey,
    },
};

/// Authenticated access to the cloud provider on behalf of one token.
///
/// Implementations hold no state beyond the token and transport and are
/// safe to share across tasks.
#[async_trait]
pub trait CloudClient: Send + Sync {
    async fn account(&self) -> Result<Account>;

    async fn list_droplets(&self) -> Result<Vec<Droplet>>;
    async fn create_droplet(&self, request: &DropletCreateRequest) -> Result<Droplet>;
    async fn delete_droplet(&self, id: u64) -> Result<()>;

    async fn list_database_clusters(&self) -> Result<Vec<DatabaseCluster>>;
    async fn list_database_backups(&self, cluster_id: &str) -> Result<Vec<DatabaseBackup>>;
    async fn list_database_users(&self, cluster_id: &str) -> Result<Vec<DatabaseUser>>;
    async fn create_database_user(&self, cluster_id: &str, name: &str) -> Result<DatabaseUser>;
    async fn delete_database_user(&self, cluster_id: &str, name: &str) -> Result<()>;
    async fn list_databases(&self, cluster_id: &str) -> Result<Vec<Database>>;

    async fn list_domains(&self) -> Result<Vec<Domain>>;
    async fn create_domain(&self, name: &str, ip_address: Option<&str>) -> Result<Domain>;
    async fn delete_domain(&self, name: &str) -> Result<()>;

    async fn list_ssh_keys(&self) -> Result<Vec<SshKey>>;
    async fn get_ssh_key(&self, id: u64) -> Result<SshKey>;
    async fn create_ssh_key(&self, name: &str, public_key: &str) -> Result<SshKey>;
    async fn delete_ssh_key(&self, id: u64) -> Result<()>;
}
