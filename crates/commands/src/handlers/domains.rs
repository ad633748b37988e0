use std::sync::Arc;

use {anyhow::Result, ocean_cloud::CloudClient};

use crate::{invocation::Args, table::Table};

pub(super) async fn list(client: Arc<dyn CloudClient>, _args: Args) -> Result<String> {
    let domains = client.list_domains().await?;
    if domains.is_empty() {
        return Ok("You don't have any domains configured. Use `/do create-domain <domainName> <ipAddress[optional]>` to provision one".into());
    }

    let mut table = Table::new(["Name", "TTL"]);
    for domain in &domains {
        table.row([domain.name.clone(), domain.ttl.to_string()]);
    }
    Ok(table.render())
}

pub(super) async fn create(client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
    let name = args.require(0, "name")?;
    let domain = client.create_domain(name, args.get(1)).await?;
    Ok(format!("Successfully created domain `{}`", domain.name))
}

pub(super) async fn delete(client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
    let name = args.require(0, "name")?;
    client.delete_domain(name).await?;
    Ok(format!("Successfully deleted domain `{name}`"))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, ocean_cloud::fake::FakeCloud};

    #[tokio::test]
    async fn create_then_list() {
        let fake = Arc::new(FakeCloud::new());
        let out = create(fake.clone(), Args::parse(&["example.com", "1.2.3.4"]))
            .await
            .unwrap();
        assert_eq!(out, "Successfully created domain `example.com`");

        let out = list(fake, Args::default()).await.unwrap();
        assert!(out.contains("example.com"));
        assert!(out.contains("1800"));
    }

    #[tokio::test]
    async fn empty_list_explains_how_to_create() {
        let out = list(Arc::new(FakeCloud::new()), Args::default())
            .await
            .unwrap();
        assert!(out.contains("/do create-domain"));
    }
}
