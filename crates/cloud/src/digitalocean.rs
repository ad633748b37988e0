//! DigitalOcean REST API v2 client.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    ocean_config::CloudConfig,
    reqwest::{RequestBuilder, Response, StatusCode, header::RETRY_AFTER},
    secrecy::{ExposeSecret, SecretString},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    serde_json::Value,
    tracing::debug,
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

/// Hard stop for pagination in case the API keeps returning `next` links.
const MAX_PAGES: u32 = 100;

const USER_AGENT: &str = concat!("ocean/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// A client bound to one API token.
pub struct DigitalOceanClient {
    http: reqwest::Client,
    token: SecretString,
    api_base: String,
    timeout: Duration,
    page_size: u32,
}

impl DigitalOceanClient {
    pub fn new(http: reqwest::Client, token: SecretString, config: &CloudConfig) -> Self {
        Self {
            http,
            token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            page_size: config.page_size.clamp(1, 200),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{}", self.api_base, path.trim_start_matches('/'))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .bearer_auth(self.token.expose_secret())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        check_status(response).await
    }

    fn transport_error(&self, e: reqwest::Error) -> CloudError {
        if e.is_timeout() {
            CloudError::Timeout {
                after: self.timeout,
            }
        } else {
            CloudError::Transport(e)
        }
    }

    async fn read_json(&self, response: Response) -> Result<Value> {
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET every page of a collection and decode the `field` array.
    async fn list_all<T: DeserializeOwned>(&self, path: &str, field: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let request = self.http.get(self.url(path)).query(&[
                ("page", page.to_string()),
                ("per_page", self.page_size.to_string()),
            ]);
            let mut body = self.read_json(self.send(request).await?).await?;
            let batch: Vec<T> = match body.get_mut(field).map(Value::take) {
                Some(v) if !v.is_null() => serde_json::from_value(v)?,
                _ => Vec::new(),
            };
            let has_next = body
                .pointer("/links/pages/next")
                .and_then(Value::as_str)
                .is_some();
            let fetched = batch.len();
            items.extend(batch);
            if !has_next || fetched == 0 {
                break;
            }
        }
        debug!(path, count = items.len(), "listed collection");
        Ok(items)
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str, field: &str) -> Result<T> {
        let body = self
            .read_json(self.send(self.http.get(self.url(path))).await?)
            .await?;
        take_field(body, field)
    }

    async fn post_one<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
        field: &str,
    ) -> Result<T> {
        let body = self
            .read_json(self.send(self.http.post(self.url(path)).json(payload)).await?)
            .await?;
        take_field(body, field)
    }

    async fn delete_path(&self, path: &str) -> Result<()> {
        self.send(self.http.delete(self.url(path))).await?;
        Ok(())
    }
}

fn take_field<T: DeserializeOwned>(mut body: Value, field: &str) -> Result<T> {
    let value = body
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| CloudError::message(format!("response is missing '{field}'")))?;
    Ok(serde_json::from_value(value)?)
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .map(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CloudError::Auth { message },
        StatusCode::NOT_FOUND => CloudError::NotFound { message },
        StatusCode::TOO_MANY_REQUESTS => CloudError::RateLimited { retry_after },
        other => CloudError::Api {
            status: other.as_u16(),
            message,
        },
    })
}

#[async_trait]
impl CloudClient for DigitalOceanClient {
    async fn account(&self) -> Result<Account> {
        self.get_one("account", "account").await
    }

    async fn list_droplets(&self) -> Result<Vec<Droplet>> {
        self.list_all("droplets", "droplets").await
    }

    async fn create_droplet(&self, request: &DropletCreateRequest) -> Result<Droplet> {
        self.post_one("droplets", request, "droplet").await
    }

    async fn delete_droplet(&self, id: u64) -> Result<()> {
        self.delete_path(&format!("droplets/{id}")).await
    }

    async fn list_database_clusters(&self) -> Result<Vec<DatabaseCluster>> {
        self.list_all("databases", "databases").await
    }

    async fn list_database_backups(&self, cluster_id: &str) -> Result<Vec<DatabaseBackup>> {
        self.list_all(&format!("databases/{cluster_id}/backups"), "backups")
            .await
    }

    async fn list_database_users(&self, cluster_id: &str) -> Result<Vec<DatabaseUser>> {
        self.list_all(&format!("databases/{cluster_id}/users"), "users")
            .await
    }

    async fn create_database_user(&self, cluster_id: &str, name: &str) -> Result<DatabaseUser> {
        self.post_one(
            &format!("databases/{cluster_id}/users"),
            &serde_json::json!({ "name": name }),
            "user",
        )
        .await
    }

    async fn delete_database_user(&self, cluster_id: &str, name: &str) -> Result<()> {
        self.delete_path(&format!("databases/{cluster_id}/users/{name}"))
            .await
    }

    async fn list_databases(&self, cluster_id: &str) -> Result<Vec<Database>> {
        self.list_all(&format!("databases/{cluster_id}/dbs"), "dbs")
            .await
    }

    async fn list_domains(&self) -> Result<Vec<Domain>> {
        self.list_all("domains", "domains").await
    }

    async fn create_domain(&self, name: &str, ip_address: Option<&str>) -> Result<Domain> {
        let mut payload = serde_json::json!({ "name": name });
        if let Some(ip) = ip_address {
            payload["ip_address"] = Value::String(ip.to_string());
        }
        self.post_one("domains", &payload, "domain").await
    }

    async fn delete_domain(&self, name: &str) -> Result<()> {
        self.delete_path(&format!("domains/{name}")).await
    }

    async fn list_ssh_keys(&self) -> Result<Vec<SshKey>> {
        self.list_all("account/keys", "ssh_keys").await
    }

    async fn get_ssh_key(&self, id: u64) -> Result<SshKey> {
        self.get_one(&format!("account/keys/{id}"), "ssh_key").await
    }

    async fn create_ssh_key(&self, name: &str, public_key: &str) -> Result<SshKey> {
        self.post_one(
            "account/keys",
            &serde_json::json!({ "name": name, "public_key": public_key }),
            "ssh_key",
        )
        .await
    }

    async fn delete_ssh_key(&self, id: u64) -> Result<()> {
        self.delete_path(&format!("account/keys/{id}")).await
    }
}

/// Production [`Connector`]: one pooled HTTP client shared by every handle.
#[derive(Clone)]
pub struct DigitalOceanConnector {
    http: reqwest::Client,
}

impl DigitalOceanConnector {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(CloudError::Transport)?;
        Ok(Self { http })
    }
}

impl Connector for DigitalOceanConnector {
    fn connect(&self, token: SecretString, config: &CloudConfig) -> Arc<dyn CloudClient> {
        Arc::new(DigitalOceanClient::new(self.http.clone(), token, config))
    }
}
