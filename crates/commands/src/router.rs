//! Per-invocation command pipeline: parse, authenticate, dispatch, format,
//! respond. Every invocation yields exactly one [`CommandResponse`].

use std::{
    any::Any,
    fmt::Write,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, Instant},
};

use {
    futures::FutureExt,
    ocean_cloud::{ClientFactory, CloudClient, CloudError, ResolveError},
    ocean_common::ResponseKind,
    ocean_config::ConfigManager,
    ocean_store::{CredentialStore, SubscriptionStore},
    secrecy::SecretString,
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use ocean_metrics::{commands as cmd_metrics, counter, histogram, labels};

use crate::{
    error::ArgError,
    handler::{CommandHandler, HandlerRegistry},
    invocation::{Args, CommandInvocation, ParsedCommand, TRIGGER},
};

pub const MISSING_TOKEN_MESSAGE: &str =
    "Missing DigitalOcean token: Use `/do token` to get instructions on how to add a token";

pub const AUTH_FAILED_MESSAGE: &str = "DigitalOcean rejected your token. It may have been revoked or expired. Register a new one with `/do token <token>`.";

const TOKEN_INSTRUCTIONS: &str = "To connect your DigitalOcean account, create a personal access token at https://cloud.digitalocean.com/account/api/tokens and run `/do token <token>`. Use `/do revoke` to remove it again.";

const STORAGE_UNAVAILABLE_MESSAGE: &str =
    "Plugin storage is temporarily unavailable. Please try again.";

const NOT_ADMIN_MESSAGE: &str = "Only plugin admins can manage notification subscriptions.";

/// Text for the host to show, plus how to show it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub text: String,
    pub kind: ResponseKind,
}

impl CommandResponse {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ResponseKind::Ephemeral,
        }
    }

    pub fn in_channel(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ResponseKind::InChannel,
        }
    }
}

/// Subcommands answered without a cloud client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Help,
    Token,
    Revoke,
    Subscribe,
    Unsubscribe,
    Subscriptions,
}

impl Builtin {
    const ALL: [(Self, &'static str, &'static str); 6] = [
        (Self::Help, "help", "Show this message"),
        (
            Self::Token,
            "token [token]",
            "Register your DigitalOcean token (no argument shows instructions)",
        ),
        (Self::Revoke, "revoke", "Remove your stored token"),
        (
            Self::Subscribe,
            "subscribe",
            "Send resource change notifications to this channel",
        ),
        (
            Self::Unsubscribe,
            "unsubscribe",
            "Stop notifications in this channel",
        ),
        (
            Self::Subscriptions,
            "subscriptions",
            "List channels receiving notifications",
        ),
    ];

    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "help" => Self::Help,
            "token" => Self::Token,
            "revoke" => Self::Revoke,
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "subscriptions" => Self::Subscriptions,
            _ => return None,
        })
    }

    fn usage(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(b, ..)| *b == self)
            .map(|(_, usage, _)| *usage)
            .unwrap_or("help")
    }

    /// First argument as it may appear in logs. The `token` argument is a
    /// credential and never does.
    fn resource_id(self, args: &Args) -> Option<&str> {
        match self {
            Self::Token => None,
            _ => args.get(0),
        }
    }
}

pub struct CommandRouter {
    config: Arc<ConfigManager>,
    credentials: CredentialStore,
    subscriptions: Arc<SubscriptionStore>,
    factory: ClientFactory,
    registry: Arc<HandlerRegistry>,
}

impl CommandRouter {
    pub fn new(
        config: Arc<ConfigManager>,
        credentials: CredentialStore,
        subscriptions: Arc<SubscriptionStore>,
        factory: ClientFactory,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            config,
            credentials,
            subscriptions,
            factory,
            registry,
        }
    }

    pub async fn handle(&self, invocation: &CommandInvocation) -> CommandResponse {
        let Some(command) = ParsedCommand::parse(&invocation.raw_args) else {
            return CommandResponse::ephemeral(self.help_text());
        };

        #[cfg(feature = "metrics")]
        counter!(cmd_metrics::INVOCATIONS_TOTAL, labels::SUBCOMMAND => command.name.clone())
            .increment(1);

        if let Some(builtin) = Builtin::parse(&command.name) {
            return match self.run_builtin(builtin, invocation, &command.args).await {
                Ok(response) => response,
                Err(e) => self.failure(
                    &command,
                    builtin.usage(),
                    builtin.resource_id(&command.args),
                    invocation,
                    &e,
                ),
            };
        }

        let Some(handler) = self.registry.get(&command.name) else {
            debug!(subcommand = %command.name, "unknown subcommand");
            return CommandResponse::ephemeral(format!(
                "Unknown command `{}`. Use `{TRIGGER} help` to see available commands.",
                command.name
            ));
        };

        let client = match self.factory.resolve(&invocation.user_id).await {
            Ok(client) => client,
            Err(ResolveError::MissingCredential { .. }) => {
                debug!(user_id = %invocation.user_id, subcommand = %command.name, "no token on file");
                #[cfg(feature = "metrics")]
                counter!(cmd_metrics::MISSING_CREDENTIAL_TOTAL).increment(1);
                return CommandResponse::ephemeral(MISSING_TOKEN_MESSAGE);
            },
            Err(ResolveError::Store(e)) => {
                let e = anyhow::Error::new(e);
                return self.failure(&command, handler.usage(), command.args.get(0), invocation, &e);
            },
        };

        self.dispatch(handler, client, &command, invocation).await
    }

    async fn dispatch(
        &self,
        handler: Arc<dyn CommandHandler>,
        client: Arc<dyn CloudClient>,
        command: &ParsedCommand,
        invocation: &CommandInvocation,
    ) -> CommandResponse {
        let limit = Duration::from_secs(self.config.get().cloud.timeout_secs.max(1));
        let started = Instant::now();
        let run = AssertUnwindSafe(handler.execute(client, command.args.clone())).catch_unwind();
        let outcome = tokio::time::timeout(limit, run).await;

        #[cfg(feature = "metrics")]
        histogram!(cmd_metrics::DISPATCH_DURATION_SECONDS, labels::SUBCOMMAND => command.name.clone())
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(Ok(text))) => {
                debug!(
                    subcommand = %command.name,
                    user_id = %invocation.user_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "command completed"
                );
                CommandResponse::ephemeral(text)
            },
            Ok(Ok(Err(e))) => {
                self.failure(command, handler.usage(), command.args.get(0), invocation, &e)
            },
            Ok(Err(panic)) => {
                error!(
                    subcommand = %command.name,
                    user_id = %invocation.user_id,
                    resource_id = command.args.get(0).unwrap_or_default(),
                    panic = %panic_message(panic.as_ref()),
                    "command handler panicked"
                );
                #[cfg(feature = "metrics")]
                counter!(cmd_metrics::ERRORS_TOTAL, labels::SUBCOMMAND => command.name.clone())
                    .increment(1);
                CommandResponse::ephemeral(format!(
                    "Something went wrong while running `{TRIGGER} {}`. The error has been logged.",
                    command.name
                ))
            },
            Err(_) => {
                warn!(
                    subcommand = %command.name,
                    user_id = %invocation.user_id,
                    resource_id = command.args.get(0).unwrap_or_default(),
                    timeout_secs = limit.as_secs(),
                    "command timed out"
                );
                #[cfg(feature = "metrics")]
                counter!(cmd_metrics::ERRORS_TOTAL, labels::SUBCOMMAND => command.name.clone())
                    .increment(1);
                CommandResponse::ephemeral(format!(
                    "`{TRIGGER} {}` did not finish within {}s. Please try again.",
                    command.name,
                    limit.as_secs()
                ))
            },
        }
    }

    /// Log the failure with its context and turn it into caller-facing text.
    fn failure(
        &self,
        command: &ParsedCommand,
        usage: &str,
        resource_id: Option<&str>,
        invocation: &CommandInvocation,
        err: &anyhow::Error,
    ) -> CommandResponse {
        let resource_id = resource_id.unwrap_or_default();
        if err.downcast_ref::<ArgError>().is_some() {
            debug!(subcommand = %command.name, error = %err, "bad arguments");
        } else {
            error!(
                subcommand = %command.name,
                user_id = %invocation.user_id,
                resource_id,
                error = %format!("{err:#}"),
                "command failed"
            );
            #[cfg(feature = "metrics")]
            counter!(cmd_metrics::ERRORS_TOTAL, labels::SUBCOMMAND => command.name.clone())
                .increment(1);
        }
        CommandResponse::ephemeral(user_message(&command.name, usage, err))
    }

    async fn run_builtin(
        &self,
        builtin: Builtin,
        invocation: &CommandInvocation,
        args: &Args,
    ) -> anyhow::Result<CommandResponse> {
        let user_id = invocation.user_id.as_str();
        let channel_id = invocation.channel_id.as_str();
        let text = match builtin {
            Builtin::Help => self.help_text(),
            Builtin::Token => match args.get(0) {
                None => TOKEN_INSTRUCTIONS.to_string(),
                Some(token) => {
                    self.credentials
                        .store_token(user_id, &SecretString::new(token.to_string()))
                        .await?;
                    info!(user_id, "token registered");
                    format!(
                        "Your DigitalOcean token has been saved. Try `{TRIGGER} account` to check it."
                    )
                },
            },
            Builtin::Revoke => {
                self.credentials.delete_token(user_id).await?;
                info!(user_id, "token revoked");
                "Your DigitalOcean token has been removed.".to_string()
            },
            Builtin::Subscribe | Builtin::Unsubscribe => {
                let config = self.config.get();
                if !config.admins.is_empty() && !config.is_admin(user_id) {
                    return Ok(CommandResponse::ephemeral(NOT_ADMIN_MESSAGE));
                }
                if builtin == Builtin::Subscribe {
                    if self.subscriptions.add_channel(channel_id).await? {
                        info!(user_id, channel_id, "channel subscribed");
                        return Ok(CommandResponse::in_channel(
                            "This channel will now receive DigitalOcean notifications.",
                        ));
                    }
                    "This channel is already subscribed.".to_string()
                } else {
                    if self.subscriptions.remove_channel(channel_id).await? {
                        info!(user_id, channel_id, "channel unsubscribed");
                        return Ok(CommandResponse::in_channel(
                            "This channel will no longer receive DigitalOcean notifications.",
                        ));
                    }
                    "This channel is not subscribed.".to_string()
                }
            },
            Builtin::Subscriptions => {
                let subscription = self.subscriptions.load().await?;
                if subscription.channels.is_empty() {
                    "No channels are subscribed to notifications.".to_string()
                } else {
                    let mut out = String::from("Channels receiving notifications:");
                    for channel in &subscription.channels {
                        let _ = write!(out, "\n- {channel}");
                    }
                    out
                }
            },
        };
        Ok(CommandResponse::ephemeral(text))
    }

    fn help_text(&self) -> String {
        let mut out = String::from("Available commands:\n");
        let builtins = Builtin::ALL.iter().map(|(_, usage, about)| (*usage, *about));
        let handlers = self.registry.list().map(|h| (h.usage(), h.description()));
        for (usage, about) in builtins.chain(handlers) {
            let _ = writeln!(out, "- `{TRIGGER} {usage}`: {about}");
        }
        out.trim_end().to_string()
    }
}

/// Caller-facing text for a failed command.
fn user_message(subcommand: &str, usage: &str, err: &anyhow::Error) -> String {
    if let Some(arg) = err.downcast_ref::<ArgError>() {
        return format!("{arg}. Usage: `{TRIGGER} {usage}`");
    }
    if let Some(cloud) = err.downcast_ref::<CloudError>() {
        return match cloud {
            CloudError::Auth { .. } => AUTH_FAILED_MESSAGE.to_string(),
            CloudError::NotFound { message } => format!("Not found: {message}"),
            CloudError::RateLimited { .. } => {
                "DigitalOcean is rate limiting requests right now. Please try again in a minute."
                    .to_string()
            },
            e if e.is_transient() => {
                format!("DigitalOcean is not responding right now ({e}). Please try again.")
            },
            e => format!("Error while running `{TRIGGER} {subcommand}`: {e}"),
        };
    }
    if let Some(store) = err.downcast_ref::<ocean_store::Error>()
        && store.is_transient()
    {
        return STORAGE_UNAVAILABLE_MESSAGE.to_string();
    }
    format!("Error while running `{TRIGGER} {subcommand}`: {err}")
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use {
        async_trait::async_trait,
        ocean_cloud::fake::{FakeCloud, FakeConnector, FakeFailure},
        ocean_config::PluginConfig,
        ocean_store::{InMemoryKv, KvStore},
        rstest::rstest,
        secrecy::ExposeSecret,
    };

    use {super::*, crate::handler::FnHandler};

    struct Fixture {
        router: CommandRouter,
        credentials: CredentialStore,
        subscriptions: Arc<SubscriptionStore>,
        config: Arc<ConfigManager>,
        cloud: Arc<FakeCloud>,
        connector: Arc<FakeConnector>,
    }

    fn fixture_with(registry: HandlerRegistry, config: PluginConfig) -> Fixture {
        fixture_on(Arc::new(InMemoryKv::new()), registry, config)
    }

    fn fixture_on(
        kv: Arc<dyn KvStore>,
        mut registry: HandlerRegistry,
        config: PluginConfig,
    ) -> Fixture {
        let credentials = CredentialStore::new(Arc::clone(&kv));
        let subscriptions = Arc::new(SubscriptionStore::new(kv));
        let config = Arc::new(ConfigManager::new(config));
        let cloud = Arc::new(FakeCloud::new());
        let connector = Arc::new(FakeConnector::new(Arc::clone(&cloud)));
        let factory = ClientFactory::new(
            credentials.clone(),
            Arc::clone(&config),
            connector.clone(),
        );
        crate::handlers::register_all(&mut registry);
        let router = CommandRouter::new(
            Arc::clone(&config),
            credentials.clone(),
            Arc::clone(&subscriptions),
            factory,
            Arc::new(registry),
        );
        Fixture {
            router,
            credentials,
            subscriptions,
            config,
            cloud,
            connector,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(HandlerRegistry::new(), PluginConfig::default())
    }

    fn inv(user: &str, text: &str) -> CommandInvocation {
        CommandInvocation::from_text(user, "C1", text)
    }

    async fn register(f: &Fixture, user: &str, token: &str) {
        f.credentials
            .store_token(user, &SecretString::new(token.into()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_invocation_shows_help() {
        let f = fixture();
        let resp = f.router.handle(&inv("alice", "/do")).await;
        assert!(resp.text.starts_with("Available commands:"));
        assert!(resp.text.contains("`/do droplets`"));
        assert!(resp.text.contains("`/do token [token]`"));
    }

    #[tokio::test]
    async fn unknown_subcommand_skips_authentication() {
        let f = fixture();
        let resp = f.router.handle(&inv("alice", "/do frobnicate")).await;
        assert_eq!(
            resp.text,
            "Unknown command `frobnicate`. Use `/do help` to see available commands."
        );
        assert!(f.connector.tokens().is_empty());
    }

    #[tokio::test]
    async fn unregistered_user_gets_token_guidance_without_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        let seen = Arc::clone(&calls);
        registry.register(Box::new(FnHandler::new("probe", "probe", "", move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Ok("ran".to_string()) }
        })));
        let f = fixture_with(registry, PluginConfig::default());

        let resp = f.router.handle(&inv("bob", "/do probe")).await;
        assert_eq!(resp.text, MISSING_TOKEN_MESSAGE);
        assert_eq!(resp.kind, ResponseKind::Ephemeral);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.cloud.calls(), 0);
    }

    #[tokio::test]
    async fn handler_output_is_returned_verbatim() {
        let f = fixture();
        register(&f, "alice", "tok-123").await;
        f.cloud.state().domains.push(ocean_cloud::types::Domain {
            name: "example.com".into(),
            ttl: 1800,
        });

        let resp = f.router.handle(&inv("alice", "/do domains")).await;
        assert_eq!(resp.text, "| Name        | TTL  |\n| ----------- | ---- |\n| example.com | 1800 |");
        assert_eq!(f.connector.tokens(), vec!["tok-123".to_string()]);
    }

    #[tokio::test]
    async fn token_builtin_stores_and_revokes() {
        let f = fixture();
        let resp = f.router.handle(&inv("alice", "/do token")).await;
        assert!(resp.text.contains("personal access token"));

        f.router.handle(&inv("alice", "/do token tok-9")).await;
        let stored = f.credentials.load_token("alice").await.unwrap().unwrap();
        assert_eq!(stored.expose_secret(), "tok-9");

        let resp = f.router.handle(&inv("alice", "/do revoke")).await;
        assert_eq!(resp.text, "Your DigitalOcean token has been removed.");
        assert!(f.credentials.load_token("alice").await.unwrap().is_none());
    }

    #[rstest]
    #[case(FakeFailure::Auth, AUTH_FAILED_MESSAGE)]
    #[case(FakeFailure::NotFound, "Not found: The resource you were accessing could not be found.")]
    #[case(
        FakeFailure::Transient,
        "DigitalOcean is not responding right now (provider error (503): service unavailable). Please try again."
    )]
    #[tokio::test]
    async fn cloud_errors_become_user_messages(
        #[case] failure: FakeFailure,
        #[case] expected: &str,
    ) {
        let f = fixture();
        register(&f, "alice", "tok").await;
        f.cloud.state().failure = Some(failure);
        let resp = f.router.handle(&inv("alice", "/do droplets")).await;
        assert_eq!(resp.text, expected);
    }

    #[tokio::test]
    async fn argument_errors_show_usage() {
        let f = fixture();
        register(&f, "alice", "tok").await;
        let resp = f.router.handle(&inv("alice", "/do delete-droplet")).await;
        assert_eq!(
            resp.text,
            "missing argument <id>. Usage: `/do delete-droplet <id>`"
        );
    }

    #[tokio::test]
    async fn panicking_handler_yields_error_response() {
        let f = fixture();
        register(&f, "alice", "tok").await;
        f.cloud.state().panic = true;
        let resp = f.router.handle(&inv("alice", "/do keys")).await;
        assert!(resp.text.starts_with("Something went wrong while running `/do keys`"));

        // The router keeps working afterwards.
        f.cloud.state().panic = false;
        let resp = f.router.handle(&inv("alice", "/do keys")).await;
        assert!(resp.text.starts_with("You don't have any ssh keys"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let f = fixture();
        register(&f, "alice", "tok").await;
        f.config.update(|c| c.cloud.timeout_secs = 2);
        f.cloud.state().delay = Some(Duration::from_secs(60));
        let resp = f.router.handle(&inv("alice", "/do account")).await;
        assert_eq!(resp.text, "`/do account` did not finish within 2s. Please try again.");
    }

    #[tokio::test]
    async fn subscribe_is_idempotent() {
        let f = fixture();
        let first = f.router.handle(&inv("alice", "/do subscribe")).await;
        assert_eq!(first.kind, ResponseKind::InChannel);
        let second = f.router.handle(&inv("alice", "/do subscribe")).await;
        assert_eq!(second.text, "This channel is already subscribed.");
        assert_eq!(f.subscriptions.load().await.unwrap().channels.len(), 1);

        let listed = f.router.handle(&inv("alice", "/do subscriptions")).await;
        assert_eq!(listed.text, "Channels receiving notifications:\n- C1");

        let gone = f.router.handle(&inv("alice", "/do unsubscribe")).await;
        assert_eq!(gone.kind, ResponseKind::InChannel);
        let again = f.router.handle(&inv("alice", "/do unsubscribe")).await;
        assert_eq!(again.text, "This channel is not subscribed.");
    }

    #[tokio::test]
    async fn subscribe_requires_admin_when_admins_configured() {
        let f = fixture_with(
            HandlerRegistry::new(),
            PluginConfig {
                admins: vec!["alice".into()],
                ..Default::default()
            },
        );
        let resp = f.router.handle(&inv("bob", "/do subscribe")).await;
        assert_eq!(resp.text, NOT_ADMIN_MESSAGE);
        let resp = f.router.handle(&inv("Alice", "/do subscribe")).await;
        assert_eq!(resp.text, NOT_ADMIN_MESSAGE);
        assert!(f.subscriptions.load().await.unwrap().channels.is_empty());

        let resp = f.router.handle(&inv("alice", "/do subscribe")).await;
        assert_eq!(resp.kind, ResponseKind::InChannel);
    }

    /// Reads succeed with nothing stored; writes fail.
    struct FullDiskKv;

    #[async_trait]
    impl KvStore for FullDiskKv {
        async fn get(&self, _key: &str) -> ocean_store::Result<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &[u8]) -> ocean_store::Result<()> {
            Err(io::Error::other("disk full").into())
        }

        async fn delete(&self, _key: &str) -> ocean_store::Result<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_token_registration_never_logs_the_token() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let f = fixture_on(
            Arc::new(FullDiskKv),
            HandlerRegistry::new(),
            PluginConfig::default(),
        );
        let resp = f
            .router
            .handle(&inv("alice", "/do token dop_v1_SUPERSECRET"))
            .await;

        assert_eq!(resp.text, STORAGE_UNAVAILABLE_MESSAGE);
        assert!(!resp.text.contains("SUPERSECRET"));
        let logs = logs.contents();
        assert!(logs.contains("command failed"), "{logs}");
        assert!(logs.contains("subcommand=token"), "{logs}");
        assert!(!logs.contains("SUPERSECRET"), "{logs}");
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
