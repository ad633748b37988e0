use std::{fmt::Write, sync::Arc};

use {anyhow::Result, ocean_cloud::CloudClient};

use crate::{invocation::Args, table::Table};

pub(super) async fn list_clusters(client: Arc<dyn CloudClient>, _args: Args) -> Result<String> {
    let clusters = client.list_database_clusters().await?;
    if clusters.is_empty() {
        return Ok("You don't have any databases configured".into());
    }

    let mut table = Table::new(["ID", "Name", "Engine", "Status", "Size", "Region"]);
    for db in &clusters {
        table.row([
            db.id.as_str(),
            db.name.as_str(),
            db.engine.as_str(),
            db.status.as_str(),
            db.size.as_str(),
            db.region.as_str(),
        ]);
    }
    Ok(table.render())
}

pub(super) async fn list_backups(client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
    let id = args.require(0, "cluster id")?;
    let backups = client.list_database_backups(id).await?;
    if backups.is_empty() {
        return Ok(format!("Database cluster `{id}` has no backups"));
    }

    let mut table = Table::new(["Created At", "Size (GB)"]);
    for backup in &backups {
        let created = backup
            .created_at
            .map(|t| t.format("%d %b %y %H:%M UTC").to_string())
            .unwrap_or_else(|| "-".into());
        table.row([created, format!("{:.2}", backup.size_gigabytes)]);
    }
    Ok(table.render())
}

pub(super) async fn list_users(client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
    let id = args.require(0, "cluster id")?;
    let users = client.list_database_users(id).await?;
    if users.is_empty() {
        return Ok(format!("Database cluster `{id}` has no users"));
    }

    let mut out = String::new();
    for user in &users {
        let _ = writeln!(out, "- Name: `{}`\t Role: `{}`", user.name, user.role);
    }
    Ok(out.trim_end().to_string())
}

pub(super) async fn add_user(client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
    let id = args.require(0, "cluster id")?;
    let name = args.require(1, "name")?;
    let user = client.create_database_user(id, name).await?;
    Ok(format!(
        "Name: `{}`\t Password: `{}`\t Role: `{}`",
        user.name,
        user.password.as_deref().unwrap_or(""),
        user.role
    ))
}

pub(super) async fn delete_user(client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
    let id = args.require(0, "cluster id")?;
    let name = args.require(1, "name")?;
    client.delete_database_user(id, name).await?;
    Ok(format!("Successfully deleted user {name} from database {id}"))
}

pub(super) async fn list_databases(client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
    let id = args.require(0, "cluster id")?;
    let dbs = client.list_databases(id).await?;
    if dbs.is_empty() {
        return Ok(format!("Database cluster `{id}` has no databases"));
    }

    let mut out = String::new();
    for (i, db) in dbs.iter().enumerate() {
        let _ = writeln!(out, "{}. Name: `{}`", i + 1, db.name);
    }
    Ok(out.trim_end().to_string())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        ocean_cloud::{
            fake::FakeCloud,
            types::{Database, DatabaseBackup, DatabaseCluster},
        },
    };

    #[tokio::test]
    async fn clusters_table_has_header_separator() {
        let fake = Arc::new(FakeCloud::new());
        fake.state().clusters.push(DatabaseCluster {
            id: "9cc10173".into(),
            name: "pg-main".into(),
            engine: "pg".into(),
            status: "online".into(),
            size: "db-s-1vcpu-1gb".into(),
            region: "nyc1".into(),
            ..Default::default()
        });
        let out = list_clusters(fake, Args::default()).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("Engine"));
        assert!(lines[1].chars().all(|c| matches!(c, '|' | '-' | ' ')));
        assert!(lines[2].contains("pg-main"));
    }

    #[tokio::test]
    async fn backups_format_size_and_date() {
        let fake = Arc::new(FakeCloud::new());
        fake.state().backups.insert(
            "c1".into(),
            vec![DatabaseBackup {
                created_at: Some("2019-01-11T18:42:27Z".parse().unwrap()),
                size_gigabytes: 0.03357696,
            }],
        );
        let out = list_backups(fake, Args::parse(&["c1"])).await.unwrap();
        assert!(out.contains("11 Jan 19 18:42 UTC"));
        assert!(out.contains("0.03"));
    }

    #[tokio::test]
    async fn add_then_delete_user() {
        let fake = Arc::new(FakeCloud::new());
        let out = add_user(fake.clone(), Args::parse(&["c1", "app"]))
            .await
            .unwrap();
        assert!(out.starts_with("Name: `app`"));

        let out = list_users(fake.clone(), Args::parse(&["c1"])).await.unwrap();
        assert_eq!(out, "- Name: `app`\t Role: `normal`");

        let out = delete_user(fake.clone(), Args::parse(&["c1", "app"]))
            .await
            .unwrap();
        assert_eq!(out, "Successfully deleted user app from database c1");
        assert!(fake.state().users["c1"].is_empty());
    }

    #[tokio::test]
    async fn databases_are_numbered() {
        let fake = Arc::new(FakeCloud::new());
        fake.state().databases.insert(
            "c1".into(),
            vec![
                Database {
                    name: "defaultdb".into(),
                },
                Database {
                    name: "orders".into(),
                },
            ],
        );
        let out = list_databases(fake, Args::parse(&["c1"])).await.unwrap();
        assert_eq!(out, "1. Name: `defaultdb`\n2. Name: `orders`");
    }

    #[tokio::test]
    async fn missing_cluster_id_is_an_argument_error() {
        let err = list_users(Arc::new(FakeCloud::new()), Args::default())
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<crate::ArgError>().is_some());
    }
}
