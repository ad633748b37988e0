#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use {
    ocean_cloud::{
        CloudClient,
        fake::{FakeCloud, FakeConnector, FakeFailure},
        types::Droplet,
    },
    ocean_commands::{
        Args, AUTH_FAILED_MESSAGE, CommandInvocation, HandlerRegistry, MISSING_TOKEN_MESSAGE,
    },
    ocean_common::{RecordingOutbound, ResponseKind},
    ocean_config::{PluginConfig, StorageBackend, StorageConfig},
    ocean_cron::RunStatus,
    ocean_plugin::{Overrides, Plugin, ResourceKind},
    ocean_store::InMemoryKv,
    secrecy::SecretString,
};

struct Harness {
    plugin: Arc<Plugin>,
    cloud: Arc<FakeCloud>,
    connector: Arc<FakeConnector>,
    outbound: Arc<RecordingOutbound>,
}

async fn harness(config: PluginConfig) -> Harness {
    let cloud = Arc::new(FakeCloud::new());
    let connector = Arc::new(FakeConnector::new(Arc::clone(&cloud)));
    let outbound = Arc::new(RecordingOutbound::new());
    let plugin = Plugin::activate_with(
        PluginConfig {
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                ..Default::default()
            },
            ..config
        },
        outbound.clone(),
        Overrides {
            kv: Some(Arc::new(InMemoryKv::new())),
            connector: Some(connector.clone()),
        },
    )
    .await
    .unwrap();
    Harness {
        plugin: Arc::new(plugin),
        cloud,
        connector,
        outbound,
    }
}

fn droplet(id: u64, name: &str, status: &str) -> Droplet {
    Droplet {
        id,
        name: name.into(),
        status: status.into(),
        ..Default::default()
    }
}

async fn run(h: &Harness, user: &str, channel: &str, text: &str) -> String {
    h.plugin
        .handle_command(&CommandInvocation::from_text(user, channel, text))
        .await
        .text
}

#[tokio::test]
async fn registered_user_gets_handler_output_verbatim() {
    let h = harness(PluginConfig::default()).await;
    h.cloud.state().droplets = vec![droplet(7, "web-1", "active")];

    h.plugin
        .credentials()
        .store_token("alice", &SecretString::new("tok-123".into()))
        .await
        .unwrap();
    let response = run(&h, "alice", "C1", "/do droplets").await;

    assert_eq!(h.connector.tokens(), ["tok-123"]);

    let direct: Arc<dyn CloudClient> = h.cloud.clone();
    let expected = HandlerRegistry::with_defaults()
        .get("droplets")
        .unwrap()
        .execute(direct, Args::default())
        .await
        .unwrap();
    assert_eq!(response, expected);
    assert!(response.contains("web-1"));
    h.plugin.deactivate().await;
}

#[tokio::test]
async fn token_command_registers_credential() {
    let h = harness(PluginConfig::default()).await;
    run(&h, "alice", "C1", "/do token tok-abc").await;
    run(&h, "alice", "C1", "/do account").await;
    assert_eq!(h.connector.tokens(), ["tok-abc"]);
    h.plugin.deactivate().await;
}

#[tokio::test]
async fn unregistered_user_short_circuits() {
    let h = harness(PluginConfig::default()).await;
    let response = run(&h, "bob", "C1", "/do droplets").await;
    assert_eq!(response, MISSING_TOKEN_MESSAGE);
    assert!(h.connector.tokens().is_empty());
    assert_eq!(h.cloud.calls(), 0);
    h.plugin.deactivate().await;
}

#[tokio::test]
async fn rejected_token_asks_for_a_new_one() {
    let h = harness(PluginConfig::default()).await;
    run(&h, "alice", "C1", "/do token tok-old").await;
    h.cloud.state().failure = Some(FakeFailure::Auth);
    assert_eq!(run(&h, "alice", "C1", "/do droplets").await, AUTH_FAILED_MESSAGE);
    h.plugin.deactivate().await;
}

#[tokio::test]
async fn one_change_notifies_each_subscribed_channel_once() {
    let config = PluginConfig {
        service_user: Some("ops".into()),
        ..Default::default()
    };
    let h = harness(config).await;
    run(&h, "ops", "admin", "/do token tok-ops").await;

    let subscribe = h
        .plugin
        .handle_command(&CommandInvocation::from_text("ops", "C1", "/do subscribe"))
        .await;
    assert_eq!(subscribe.kind, ResponseKind::InChannel);
    run(&h, "ops", "C2", "/do subscribe").await;

    h.cloud.state().droplets = vec![droplet(1, "web-1", "new")];
    let job = ResourceKind::Droplets.job_name();
    assert_eq!(h.plugin.scheduler().tick(job).await.unwrap(), RunStatus::Ok);
    assert_eq!(h.outbound.count(), 0);

    h.cloud.state().droplets[0].status = "active".into();
    assert_eq!(h.plugin.scheduler().tick(job).await.unwrap(), RunStatus::Ok);

    let mut posts = h.outbound.posts();
    posts.sort();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].0, "C1");
    assert_eq!(posts[1].0, "C2");
    assert_eq!(posts[0].1, posts[1].1);
    assert!(posts[0].1.contains("from `new` to `active`"));
    h.plugin.deactivate().await;
}

#[tokio::test]
async fn transient_poll_failure_does_not_block_next_tick() {
    let config = PluginConfig {
        service_user: Some("ops".into()),
        ..Default::default()
    };
    let h = harness(config).await;
    run(&h, "ops", "C1", "/do token tok-ops").await;
    let job = ResourceKind::DatabaseClusters.job_name();

    h.cloud.state().failure = Some(FakeFailure::Transient);
    assert_eq!(h.plugin.scheduler().tick(job).await.unwrap(), RunStatus::Error);

    h.cloud.state().failure = None;
    assert_eq!(h.plugin.scheduler().tick(job).await.unwrap(), RunStatus::Ok);

    let info = h.plugin.scheduler_status().job(job).cloned().unwrap();
    assert_eq!(info.state.runs, 2);
    assert_eq!(info.state.last_status, Some(RunStatus::Ok));
    h.plugin.deactivate().await;
}

#[tokio::test]
async fn concurrent_subscribes_are_all_kept() {
    let h = harness(PluginConfig::default()).await;
    let mut tasks = Vec::new();
    for i in 0..16 {
        let plugin = Arc::clone(&h.plugin);
        tasks.push(tokio::spawn(async move {
            plugin
                .handle_command(&CommandInvocation::from_text(
                    "alice",
                    format!("C{i}"),
                    "/do subscribe",
                ))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    let channels = h.plugin.subscriptions().load().await.unwrap().channels;
    assert_eq!(channels.len(), 16);
    h.plugin.deactivate().await;
}

#[tokio::test]
async fn deactivate_stops_scheduler() {
    let h = harness(PluginConfig::default()).await;
    assert!(h.plugin.scheduler_status().running);
    h.plugin.deactivate().await;
    assert!(!h.plugin.scheduler_status().running);
}
