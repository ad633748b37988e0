use std::{collections::BTreeMap, future::Future, sync::Arc};

use {
    anyhow::Result,
    async_trait::async_trait,
    futures::{FutureExt, future::BoxFuture},
    ocean_cloud::CloudClient,
};

use crate::invocation::Args;

/// A subcommand that needs an authenticated cloud client.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &str;
    /// Argument synopsis, e.g. `"delete-droplet <id>"`.
    fn usage(&self) -> &str;
    fn description(&self) -> &str;
    async fn execute(&self, client: Arc<dyn CloudClient>, args: Args) -> Result<String>;
}

type HandlerFn = dyn Fn(Arc<dyn CloudClient>, Args) -> BoxFuture<'static, Result<String>> + Send + Sync;

/// [`CommandHandler`] backed by an async function.
pub struct FnHandler {
    name: &'static str,
    usage: &'static str,
    description: &'static str,
    run: Box<HandlerFn>,
}

impl FnHandler {
    pub fn new<F, Fut>(
        name: &'static str,
        usage: &'static str,
        description: &'static str,
        run: F,
    ) -> Self
    where
        F: Fn(Arc<dyn CloudClient>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            name,
            usage,
            description,
            run: Box::new(move |client, args| run(client, args).boxed()),
        }
    }
}

#[async_trait]
impl CommandHandler for FnHandler {
    fn name(&self) -> &str {
        self.name
    }

    fn usage(&self) -> &str {
        self.usage
    }

    fn description(&self) -> &str {
        self.description
    }

    async fn execute(&self, client: Arc<dyn CloudClient>, args: Args) -> Result<String> {
        (self.run)(client, args).await
    }
}

/// Subcommand name → handler. Filled once at activation, read-only after.
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Registry preloaded with every cloud handler.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::handlers::register_all(&mut registry);
        registry
    }

    pub fn register(&mut self, handler: Box<dyn CommandHandler>) {
        let name = handler.name().to_ascii_lowercase();
        self.handlers.insert(name, Arc::from(handler));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Handlers in name order.
    pub fn list(&self) -> impl Iterator<Item = &dyn CommandHandler> {
        self.handlers.values().map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
