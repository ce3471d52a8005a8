use async_trait::async_trait;
use crate::error::Error;
use crate::models::moderation::ModerationAction;

/// Boundary to whatever actually talks to the chat platform.
///
/// Implementations issue the timeout and post the reply. They must return
/// (with `Ok` or `Err`) for every call: the engine settles its spam cooling
/// state off the back of that return, and does not retry on its own.
#[async_trait]
pub trait ModerationExecutor: Send + Sync {
    /// Mute `action.target_user` in `action.channel` for `action.timeout_seconds`.
    async fn timeout_user(&self, action: &ModerationAction) -> Result<(), Error>;

    /// Post a chat-visible line to `channel`.
    async fn send_reply(&self, channel: &str, text: &str) -> Result<(), Error>;
}

/// Source of "now" in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}
