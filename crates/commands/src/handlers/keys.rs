use std::sync::Arc;

use {
    anyhow::Result,
    ocean_cloud::{CloudClient, types::SshKey},
};

use crate::{error::ArgError, invocation::Args, table::Table};

fn keys_table(keys: &[SshKey]) -> String {
    let mut table = Table::new(["ID", "Name", "Fingerprint", "Public Key"]);
    for key in keys {
        table.row([
            key.id.to_string(),
            key.name.clone(),
            key.fingerprint.clone(),
            key.public_key.clone(),
        ]);
    }
    table.render()
}

pub(super) async fn list(client: Arc<dyn CloudClient>, _args: Args) -> Result<String> {
    let keys = client.list_ssh_keys().await?;
    if keys.is_empty() {
        return Ok("You don't have any ssh keys defined. Use `/do create-key <name> <publicKey>` to create one".into());
    }
    Ok(keys_table(&keys))
}

pub(super) async fn get(client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
    let id: u64 = args.require_parsed(0, "id")?;
    let key = client.get_ssh_key(id).await?;
    Ok(keys_table(std::slice::from_ref(&key)))
}

pub(super) async fn create(client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
    let name = args.require(0, "name")?;
    // Public keys contain spaces ("ssh-ed25519 AAAA... comment").
    let public_key = args
        .rest_from(1)
        .ok_or(ArgError::Missing { name: "public key" })?;
    let key = client.create_ssh_key(name, &public_key).await?;
    Ok(format!("Successfully created SSH key {}", key.name))
}

pub(super) async fn delete(client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
    let id: u64 = args.require_parsed(0, "id")?;
    client.delete_ssh_key(id).await?;
    Ok(format!("Successfully deleted SSH key with ID `{id}`"))
}
