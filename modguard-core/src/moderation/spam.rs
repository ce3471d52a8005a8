// File: src/moderation/spam.rs

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use modguard_common::models::{normalize_username, ActionOutcome, PolicyKind, Violation};
use crate::moderation::build_violation;
use crate::moderation::settings::SpamConfig;
use crate::moderation::state_store::PolicyStateStore;
use crate::moderation::strikes::StrikeLedger;

/// Sliding-window flood detector.
///
/// A burst raises one violation and puts the user into "cooling". While
/// cooling, further messages are still counted but never raise another
/// violation. Cooling ends when the returned [`CoolingGuard`] is settled.
#[derive(Debug, Clone)]
pub struct SpamDetector {
    store: Arc<PolicyStateStore>,
}

impl SpamDetector {
    pub fn new(store: Arc<PolicyStateStore>) -> Self {
        Self { store }
    }

    pub fn evaluate(
        &self,
        username: &str,
        channel: &str,
        now: i64,
        cfg: &SpamConfig,
    ) -> Option<(Violation, CoolingGuard)> {
        let user = normalize_username(username);
        let min_messages = usize::try_from(cfg.min_messages).unwrap_or(usize::MAX);

        let is_repeat = self.store.with_state(PolicyKind::Spam, &user, |state| {
            state.last_seen_at = now;
            state.timestamps.push_back(now);
            state.prune_window(now, cfg.window_ms);

            if state.cooling {
                debug!("SpamDetector: '{}' is cooling, {} queued", user, state.timestamps.len());
                return None;
            }
            if state.timestamps.len() <= min_messages {
                return None;
            }

            state.cooling = true;
            Some(state.record_strike(now, cfg.strike_reset_ms))
        })?;

        let timeout = StrikeLedger::timeout_for(is_repeat, cfg);
        let template = if is_repeat { &cfg.message_repeat } else { &cfg.message_first };
        info!(
            "SpamDetector: '{}' sent more than {} messages in {}ms (repeat={}), {}s timeout",
            user, cfg.min_messages, cfg.window_ms, is_repeat, timeout
        );

        let violation = build_violation(PolicyKind::Spam, username, channel, timeout, &cfg.reason, template);
        let guard = CoolingGuard {
            store: self.store.clone(),
            user,
            settled: false,
        };
        Some((violation, guard))
    }

    /// Ends cooling and empties the window so the next burst starts clean.
    pub fn on_action_settled(&self, username: &str) {
        release_cooling(&self.store, &normalize_username(username));
    }

    pub fn is_cooling(&self, username: &str) -> bool {
        self.store
            .peek(PolicyKind::Spam, &normalize_username(username), |state| state.cooling)
            .unwrap_or(false)
    }

    /// Messages currently inside the window, as of the last evaluation.
    pub fn queued(&self, username: &str) -> usize {
        self.store
            .peek(PolicyKind::Spam, &normalize_username(username), |state| state.timestamps.len())
            .unwrap_or(0)
    }
}

fn release_cooling(store: &PolicyStateStore, user: &str) {
    store.with_state(PolicyKind::Spam, user, |state| {
        state.cooling = false;
        state.timestamps.clear();
    });
}

/// Settlement handle for one in-flight spam punishment.
///
/// `settle` consumes the guard, so it runs at most once. A guard dropped
/// without being settled (task panicked, caller forgot) releases cooling on
/// drop so the user is never stuck.
pub struct CoolingGuard {
    store: Arc<PolicyStateStore>,
    user: String,
    settled: bool,
}

impl CoolingGuard {
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn settle(mut self, outcome: &ActionOutcome) {
        match outcome {
            ActionOutcome::Applied => debug!("CoolingGuard: '{}' settled after timeout", self.user),
            ActionOutcome::Failed(err) => {
                warn!("CoolingGuard: '{}' settled after failed action: {}", self.user, err)
            }
        }
        self.release();
    }

    fn release(&mut self) {
        if !self.settled {
            self.settled = true;
            release_cooling(&self.store, &self.user);
        }
    }
}

impl Drop for CoolingGuard {
    fn drop(&mut self) {
        if !self.settled {
            warn!("CoolingGuard: '{}' dropped without settle, releasing cooling", self.user);
            self.release();
        }
    }
}

impl fmt::Debug for CoolingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoolingGuard")
            .field("user", &self.user)
            .field("settled", &self.settled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SpamConfig {
        SpamConfig {
            window_ms: 7_000,
            min_messages: 5,
            strike_reset_ms: 600_000,
            timeout_first_sec: 30,
            timeout_repeat_sec: 60,
            ..SpamConfig::default()
        }
    }

    fn burst(detector: &SpamDetector, user: &str, start: i64, count: usize) -> Vec<(Violation, CoolingGuard)> {
        (0..count)
            .filter_map(|i| detector.evaluate(user, "chan", start + i as i64 * 100, &cfg()))
            .collect()
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let detector = SpamDetector::new(Arc::new(PolicyStateStore::new()));
        assert!(burst(&detector, "alice", 0, 5).is_empty());
        assert!(detector.evaluate("alice", "chan", 600, &cfg()).is_some());
    }

    #[test]
    fn test_burst_coalesces_while_cooling() {
        let detector = SpamDetector::new(Arc::new(PolicyStateStore::new()));
        let mut hits = burst(&detector, "Alice", 0, 15);
        assert_eq!(hits.len(), 1);
        assert!(detector.is_cooling("alice"));

        let (violation, guard) = hits.remove(0);
        assert_eq!(violation.username, "alice");
        assert_eq!(violation.timeout_seconds, 30);
        assert!(violation.reply_text.starts_with("@Alice"));

        guard.settle(&ActionOutcome::Applied);
        assert!(!detector.is_cooling("alice"));
        assert_eq!(detector.queued("alice"), 0);

        // a full burst is needed again
        assert!(burst(&detector, "alice", 2_000, 5).is_empty());
        let again = burst(&detector, "alice", 2_500, 1);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].0.timeout_seconds, 60);
    }

    #[test]
    fn test_slow_messages_never_trigger() {
        let detector = SpamDetector::new(Arc::new(PolicyStateStore::new()));
        for i in 0..30 {
            assert!(detector.evaluate("bob", "chan", i * 2_000, &cfg()).is_none());
        }
        assert!(detector.queued("bob") <= 4);
    }

    #[test]
    fn test_dropped_guard_releases_cooling() {
        let detector = SpamDetector::new(Arc::new(PolicyStateStore::new()));
        let hits = burst(&detector, "carol", 0, 6);
        assert!(detector.is_cooling("carol"));
        drop(hits);
        assert!(!detector.is_cooling("carol"));
    }

    #[test]
    fn test_failed_action_still_settles() {
        let detector = SpamDetector::new(Arc::new(PolicyStateStore::new()));
        let (_, guard) = burst(&detector, "dave", 0, 6).remove(0);
        guard.settle(&ActionOutcome::Failed("rejected".into()));
        assert!(!detector.is_cooling("dave"));
    }
}
