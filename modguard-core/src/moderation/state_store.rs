// File: src/moderation/state_store.rs

use std::collections::VecDeque;
use std::sync::Arc;
use dashmap::DashMap;
use parking_lot::Mutex;
use modguard_common::models::PolicyKind;

/// Key of one per-user record.
pub type StateKey = (PolicyKind, String);

/// Per-(policy, user) moderation state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPolicyState {
    /// Recent message times, spam policy only. Never holds anything older
    /// than the spam window at the moment it is read.
    pub timestamps: VecDeque<i64>,
    pub strikes: u32,
    pub last_strike_at: Option<i64>,
    /// A spam punishment is in flight; see `CoolingGuard`.
    pub cooling: bool,
    pub last_seen_at: i64,
}

impl UserPolicyState {
    /// Drops every timestamp older than `window_ms` relative to `now`.
    pub fn prune_window(&mut self, now: i64, window_ms: u64) {
        let window = as_ms(window_ms);
        self.timestamps.retain(|&t| now.saturating_sub(t) <= window);
    }

    /// Nothing in flight and untouched for `idle_ms`. Every queued timestamp
    /// is at most `last_seen_at`, so those are stale too.
    pub fn is_idle(&self, now: i64, idle_ms: u64) -> bool {
        !self.cooling && now.saturating_sub(self.last_seen_at) > as_ms(idle_ms)
    }
}

/// Clamps a configured millisecond span into the signed timeline.
pub(crate) fn as_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Owns every `UserPolicyState`. Each record sits behind its own lock, so a
/// read-modify-write on one user never races another evaluation of that user
/// and never blocks other users.
#[derive(Debug, Default)]
pub struct PolicyStateStore {
    states: DashMap<StateKey, Arc<Mutex<UserPolicyState>>>,
}

impl PolicyStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, key: &StateKey) -> Arc<Mutex<UserPolicyState>> {
        self.states
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(UserPolicyState::default())))
            .clone()
    }

    fn is_current(&self, key: &StateKey, cell: &Arc<Mutex<UserPolicyState>>) -> bool {
        self.states
            .get(key)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), cell))
    }

    /// Runs `f` with the user's record locked, creating it on first use.
    ///
    /// A record evicted between lookup and lock is no longer in the map, so
    /// writes to it would be lost. The lookup is retried until the locked
    /// record is the one the map holds.
    pub fn with_state<R>(
        &self,
        kind: PolicyKind,
        user: &str,
        f: impl FnOnce(&mut UserPolicyState) -> R,
    ) -> R {
        let key = (kind, user.to_string());
        loop {
            let cell = self.cell(&key);
            let mut state = cell.lock();
            if self.is_current(&key, &cell) {
                return f(&mut state);
            }
        }
    }

    /// Read-only look at an existing record. Does not create one.
    pub fn peek<R>(
        &self,
        kind: PolicyKind,
        user: &str,
        f: impl FnOnce(&UserPolicyState) -> R,
    ) -> Option<R> {
        let cell = self.states.get(&(kind, user.to_string()))?.value().clone();
        let state = cell.lock();
        Some(f(&state))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Forgets records that are idle per [`UserPolicyState::is_idle`].
    /// Records currently locked by an evaluation are kept.
    pub fn evict_idle(&self, now: i64, idle_ms: u64) -> usize {
        let before = self.states.len();
        self.states.retain(|_, cell| match cell.try_lock() {
            Some(state) => !state.is_idle(now, idle_ms),
            None => true,
        });
        before.saturating_sub(self.states.len())
    }

    pub fn clear(&self) {
        self.states.clear();
    }
}
