use std::sync::Arc;

use {
    anyhow::Result,
    ocean_cloud::{CloudClient, types::DropletCreateRequest},
};

use crate::{invocation::Args, table::Table};

pub(super) async fn list(client: Arc<dyn CloudClient>, _args: Args) -> Result<String> {
    let droplets = client.list_droplets().await?;
    if droplets.is_empty() {
        return Ok("You don't have any droplets configured. Use `/do create-droplet <name> <region> <size> <image>` to provision one".into());
    }

    let mut table = Table::new([
        "ID", "Name", "Status", "Memory", "vCPUs", "Disk", "Region", "Public IP",
    ]);
    for d in &droplets {
        table.row([
            d.id.to_string(),
            d.name.clone(),
            d.status.clone(),
            format!("{} MB", d.memory),
            d.vcpus.to_string(),
            format!("{} GB", d.disk),
            d.region.slug.clone(),
            d.public_ipv4().unwrap_or("-").to_string(),
        ]);
    }
    Ok(table.render())
}

pub(super) async fn create(client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
    let request = DropletCreateRequest {
        name: args.require(0, "name")?.to_string(),
        region: args.require(1, "region")?.to_string(),
        size: args.require(2, "size")?.to_string(),
        image: args.require(3, "image")?.to_string(),
    };
    let droplet = client.create_droplet(&request).await?;
    Ok(format!(
        "Droplet `{}` (ID `{}`) is being created in {}",
        droplet.name, droplet.id, request.region
    ))
}

pub(super) async fn delete(client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
    let id: u64 = args.require_parsed(0, "id")?;
    client.delete_droplet(id).await?;
    Ok(format!("Successfully deleted droplet with ID `{id}`"))
}
