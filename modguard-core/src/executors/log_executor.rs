use async_trait::async_trait;
use tracing::info;
use modguard_common::models::ModerationAction;
use modguard_common::traits::ModerationExecutor;
use crate::Error;

/// Dry-run executor: logs what would happen and always succeeds.
#[derive(Debug, Default, Clone)]
pub struct LoggingExecutor;

impl LoggingExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ModerationExecutor for LoggingExecutor {
    async fn timeout_user(&self, action: &ModerationAction) -> Result<(), Error> {
        info!(
            "LoggingExecutor: would timeout '{}' in '{}' for {}s ({}: {})",
            action.target_user, action.channel, action.timeout_seconds, action.policy, action.reason
        );
        Ok(())
    }

    async fn send_reply(&self, channel: &str, text: &str) -> Result<(), Error> {
        info!("LoggingExecutor: would say in '{}': {}", channel, text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modguard_common::models::PolicyKind;

    #[test]
    fn test_dry_run_always_succeeds() {
        let executor = LoggingExecutor::new();
        let action = ModerationAction {
            target_user: "alice".into(),
            channel: "#stream".into(),
            policy: PolicyKind::Length,
            timeout_seconds: 30,
            reason: "Message too long".into(),
            reply_text: String::new(),
        };
        tokio_test::block_on(async {
            assert!(executor.timeout_user(&action).await.is_ok());
            assert!(executor.send_reply("#stream", "hi").await.is_ok());
        });
    }
}
