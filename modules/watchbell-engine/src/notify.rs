use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use watchbell_common::WatchKind;

/// Outcome of one notification attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Delivered,
    /// Subscriber has no configured channel.
    Skipped,
    Failed(String),
}

/// Outbound message seam. The chat gateway behind it is an external
/// collaborator; the engine only needs "post this content to this
/// channel".
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn send(&self, channel_id: &str, content: &str) -> anyhow::Result<()>;
}

/// Composes and delivers release notifications. Never raises: resolution
/// and send failures come back as `Delivery::Failed` and the caller
/// proceeds regardless.
pub struct Dispatcher {
    sender: Arc<dyn ChannelSender>,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn ChannelSender>) -> Self {
        Self { sender }
    }

    pub async fn notify(
        &self,
        channel_id: Option<&str>,
        user_id: &str,
        kind: WatchKind,
        title: &str,
        body: &str,
    ) -> Delivery {
        let Some(channel_id) = channel_id else {
            debug!(user_id, title, "No channel configured, skipping notification");
            return Delivery::Skipped;
        };

        let content = format!("<@{user_id}>, new {kind} update for **{title}**!\n{body}");
        match self.sender.send(channel_id, &content).await {
            Ok(()) => Delivery::Delivered,
            Err(e) => {
                warn!(user_id, channel_id, title, error = %e, "Notification delivery failed");
                Delivery::Failed(e.to_string())
            }
        }
    }
}
