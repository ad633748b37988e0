use std::sync::Arc;

use {anyhow::Result, ocean_cloud::CloudClient};

use crate::invocation::Args;

pub(super) async fn show(client: Arc<dyn CloudClient>, _args: Args) -> Result<String> {
    let account = client.account().await?;
    Ok(format!(
        "Email: `{}`\t Status: `{}`\t Droplet limit: `{}`\t Email verified: `{}`",
        account.email, account.status, account.droplet_limit, account.email_verified
    ))
}
