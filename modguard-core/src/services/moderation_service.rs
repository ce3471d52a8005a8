// File: src/services/moderation_service.rs

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use modguard_common::models::{ActionOutcome, ChatMessageEvent};
use modguard_common::traits::{Clock, ModerationExecutor};
use crate::Error;
use crate::moderation::{FilterPipeline, Verdict};
use crate::services::mod_commands::ModCommandHandler;

/// Longest a single executor call may take before it counts as failed.
pub const DEFAULT_DISPATCH_DEADLINE: Duration = Duration::from_secs(10);

/// Bounds an executor call. A call that overruns is `Error::Timeout`.
async fn within<F>(deadline: Duration, call: F) -> Result<(), Error>
where
    F: Future<Output = Result<(), Error>>,
{
    tokio::time::timeout(deadline, call).await?
}

/// Glue between the chat feed, the filter pipeline and the executor.
///
/// Every verdict is carried out on its own task, so a slow executor never
/// holds up the next chat message.
pub struct ModerationService {
    pipeline: Arc<FilterPipeline>,
    commands: ModCommandHandler,
    executor: Arc<dyn ModerationExecutor>,
    clock: Arc<dyn Clock>,
    deadline: Duration,
}

impl ModerationService {
    pub fn new(
        pipeline: Arc<FilterPipeline>,
        executor: Arc<dyn ModerationExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            commands: ModCommandHandler::new(pipeline.clone()),
            pipeline,
            executor,
            clock,
            deadline: DEFAULT_DISPATCH_DEADLINE,
        }
    }

    /// Caps each executor call, so a hung executor still settles spam cooling.
    pub fn with_dispatch_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_permit_seconds(mut self, seconds: u64) -> Self {
        self.commands = self.commands.with_default_permit_seconds(seconds);
        self
    }

    pub fn pipeline(&self) -> &Arc<FilterPipeline> {
        &self.pipeline
    }

    /// Runs one chat message through commands and filters. The returned
    /// handles resolve once each dispatched action has settled.
    pub fn handle_event(&self, mut event: ChatMessageEvent) -> Vec<JoinHandle<ActionOutcome>> {
        if event.timestamp_ms <= 0 {
            event.timestamp_ms = self.clock.now_ms();
        }

        let mut handles = Vec::new();
        if let Some(reply) = self.commands.handle(&event) {
            handles.push(self.spawn_reply(event.channel.clone(), reply));
        }

        for verdict in self.pipeline.process(&event) {
            handles.push(self.dispatch(verdict));
        }
        handles
    }

    /// Carries out one verdict: timeout, then the chat reply. The spam
    /// cooling guard, if any, is settled with whatever came back.
    pub fn dispatch(&self, verdict: Verdict) -> JoinHandle<ActionOutcome> {
        let executor = self.executor.clone();
        let deadline = self.deadline;
        tokio::spawn(async move {
            let Verdict { violation, guard } = verdict;
            let action = violation.to_action();

            let outcome = match within(deadline, executor.timeout_user(&action)).await {
                Ok(()) => {
                    info!(
                        "ModerationService: {}s timeout for '{}' in '{}' ({})",
                        action.timeout_seconds, action.target_user, action.channel, action.policy
                    );
                    if !action.reply_text.is_empty() {
                        if let Err(e) = within(deadline, executor.send_reply(&action.channel, &action.reply_text)).await {
                            warn!("ModerationService: reply to '{}' failed: {}", action.target_user, e);
                        }
                    }
                    ActionOutcome::Applied
                }
                Err(e) => {
                    error!(
                        "ModerationService: timeout for '{}' ({}) failed: {}",
                        action.target_user, action.policy, e
                    );
                    ActionOutcome::Failed(e.to_string())
                }
            };

            if let Some(guard) = guard {
                guard.settle(&outcome);
            }
            outcome
        })
    }

    fn spawn_reply(&self, channel: String, text: String) -> JoinHandle<ActionOutcome> {
        let executor = self.executor.clone();
        let deadline = self.deadline;
        tokio::spawn(async move {
            match within(deadline, executor.send_reply(&channel, &text)).await {
                Ok(()) => ActionOutcome::Applied,
                Err(e) => {
                    warn!("ModerationService: command reply failed: {}", e);
                    ActionOutcome::Failed(e.to_string())
                }
            }
        })
    }

    /// Consumes chat events until every sender is gone.
    pub async fn start(self: Arc<Self>, mut rx: mpsc::Receiver<ChatMessageEvent>) {
        info!("ModerationService: listening for chat events");
        while let Some(event) = rx.recv().await {
            debug!("ModerationService: event from '{}'", event.username);
            self.handle_event(event);
        }
        info!("ModerationService: chat event channel closed, stopping");
    }
}
