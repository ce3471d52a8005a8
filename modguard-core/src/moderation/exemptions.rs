// File: src/moderation/exemptions.rs

use dashmap::DashMap;
use tracing::{debug, info};
use modguard_common::models::normalize_username;
use crate::moderation::state_store::as_ms;

/// Time-boxed "permits": a granted user skips every filter until expiry.
///
/// Moderators and the channel owner are exempt anyway; that comes with the
/// event and is never stored here.
#[derive(Debug, Default)]
pub struct ExemptionRegistry {
    grants: DashMap<String, i64>,
}

impl ExemptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants (or extends) a permit and returns its expiry.
    pub fn grant(&self, username: &str, duration_ms: u64, now: i64) -> i64 {
        let user = normalize_username(username);
        let expires_at = now.saturating_add(as_ms(duration_ms));
        info!("ExemptionRegistry: '{}' exempt for {}ms", user, duration_ms);
        self.grants.insert(user, expires_at);
        expires_at
    }

    /// Expired grants are removed on the way out.
    pub fn is_exempt(&self, username: &str, now: i64) -> bool {
        let user = normalize_username(username);
        let expired = match self.grants.get(&user) {
            Some(expires_at) => *expires_at.value() <= now,
            None => return false,
        };
        if expired {
            self.grants.remove_if(&user, |_, expires_at| *expires_at <= now);
            debug!("ExemptionRegistry: grant for '{}' expired", user);
        }
        !expired
    }

    pub fn revoke(&self, username: &str) -> bool {
        self.grants.remove(&normalize_username(username)).is_some()
    }

    pub fn expires_at(&self, username: &str) -> Option<i64> {
        self.grants.get(&normalize_username(username)).map(|e| *e.value())
    }

    /// Drops every expired grant; returns how many went.
    pub fn purge_expired(&self, now: i64) -> usize {
        let before = self.grants.len();
        self.grants.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.grants.len())
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
