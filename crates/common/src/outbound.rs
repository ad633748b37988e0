use std::sync::Mutex;

use async_trait::async_trait;

use crate::Result;

/// Posts bot messages into chat channels. The command host provides the
/// concrete implementation.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    async fn post_text(&self, channel_id: &str, text: &str) -> Result<()>;
}

/// Outbound that records every post in memory instead of delivering it.
///
/// Used by tests and by dry-run hosts.
#[derive(Default)]
pub struct RecordingOutbound {
    posts: Mutex<Vec<(String, String)>>,
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(channel_id, text)` pairs posted so far, in order.
    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self) -> usize {
        self.posts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ChannelOutbound for RecordingOutbound {
    async fn post_text(&self, channel_id: &str, text: &str) -> Result<()> {
        tracing::trace!(channel_id, "recording outbound post");
        self.posts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_posts_in_order() {
        let out = RecordingOutbound::new();
        out.post_text("C1", "first").await.unwrap();
        out.post_text("C2", "second").await.unwrap();
        assert_eq!(out.posts(), vec![
            ("C1".to_string(), "first".to_string()),
            ("C2".to_string(), "second".to_string()),
        ]);
    }
}
