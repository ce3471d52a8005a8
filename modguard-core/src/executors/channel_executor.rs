// File: src/executors/channel_executor.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;
use modguard_common::models::ModerationAction;
use modguard_common::traits::ModerationExecutor;
use crate::Error;

/// What goes out to the chat transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    Timeout {
        id: Uuid,
        #[serde(flatten)]
        action: ModerationAction,
    },
    Reply {
        id: Uuid,
        channel: String,
        text: String,
    },
}

impl OutboundMessage {
    pub fn id(&self) -> Uuid {
        match self {
            OutboundMessage::Timeout { id, .. } | OutboundMessage::Reply { id, .. } => *id,
        }
    }
}

/// Hands every action to a transport task over an mpsc channel.
///
/// A call succeeds once the message is queued. It fails only when the
/// receiving side is gone.
#[derive(Debug, Clone)]
pub struct ChannelExecutor {
    tx: mpsc::Sender<OutboundMessage>,
}

impl ChannelExecutor {
    pub fn new(tx: mpsc::Sender<OutboundMessage>) -> Self {
        Self { tx }
    }

    /// Executor plus the receiving end, with room for `capacity` pending messages.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl ModerationExecutor for ChannelExecutor {
    async fn timeout_user(&self, action: &ModerationAction) -> Result<(), Error> {
        self.tx
            .send(OutboundMessage::Timeout { id: Uuid::new_v4(), action: action.clone() })
            .await?;
        Ok(())
    }

    async fn send_reply(&self, channel: &str, text: &str) -> Result<(), Error> {
        self.tx
            .send(OutboundMessage::Reply {
                id: Uuid::new_v4(),
                channel: channel.to_string(),
                text: text.to_string(),
            })
            .await?;
        Ok(())
    }
}
