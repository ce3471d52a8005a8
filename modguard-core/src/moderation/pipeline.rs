// File: src/moderation/pipeline.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use parking_lot::RwLock;
use tracing::{debug, info};
use modguard_common::models::{ChatMessageEvent, PolicyKind, Violation};
use crate::moderation::exemptions::ExemptionRegistry;
use crate::moderation::length::LengthGuard;
use crate::moderation::link::LinkGuard;
use crate::moderation::settings::FilterSettings;
use crate::moderation::spam::{CoolingGuard, SpamDetector};
use crate::moderation::state_store::PolicyStateStore;
use crate::moderation::strikes::StrikeLedger;

/// One pipeline result. Spam verdicts carry the guard that must be settled
/// once the punishment has been carried out (or has failed).
#[derive(Debug)]
pub struct Verdict {
    pub violation: Violation,
    pub guard: Option<CoolingGuard>,
}

impl Verdict {
    pub fn policy(&self) -> PolicyKind {
        self.violation.policy
    }
}

/// Runtime on/off switches, flipped by moderator commands.
#[derive(Debug)]
struct PolicyToggles {
    spam: AtomicBool,
    length: AtomicBool,
    link: AtomicBool,
}

impl Default for PolicyToggles {
    fn default() -> Self {
        Self {
            spam: AtomicBool::new(true),
            length: AtomicBool::new(true),
            link: AtomicBool::new(true),
        }
    }
}

impl PolicyToggles {
    fn flag(&self, kind: PolicyKind) -> &AtomicBool {
        match kind {
            PolicyKind::Spam => &self.spam,
            PolicyKind::Length => &self.length,
            PolicyKind::Link => &self.link,
        }
    }
}

/// Classifies each chat message against every policy. Performs no I/O.
pub struct FilterPipeline {
    settings: RwLock<Arc<FilterSettings>>,
    store: Arc<PolicyStateStore>,
    exemptions: Arc<ExemptionRegistry>,
    spam: SpamDetector,
    length: LengthGuard,
    link: LinkGuard,
    toggles: PolicyToggles,
}

impl FilterPipeline {
    pub fn new(settings: FilterSettings) -> Self {
        Self::with_state(
            settings,
            Arc::new(PolicyStateStore::new()),
            Arc::new(ExemptionRegistry::new()),
        )
    }

    /// Builds a pipeline over caller-owned state, e.g. to share it or inspect it in tests.
    pub fn with_state(
        settings: FilterSettings,
        store: Arc<PolicyStateStore>,
        exemptions: Arc<ExemptionRegistry>,
    ) -> Self {
        let ledger = StrikeLedger::new(store.clone());
        Self {
            settings: RwLock::new(Arc::new(settings)),
            spam: SpamDetector::new(store.clone()),
            length: LengthGuard::new(ledger.clone()),
            link: LinkGuard::new(ledger),
            store,
            exemptions,
            toggles: PolicyToggles::default(),
        }
    }

    pub fn settings(&self) -> Arc<FilterSettings> {
        self.settings.read().clone()
    }

    /// Swaps in new settings. Per-user state survives.
    pub fn reload(&self, settings: FilterSettings) {
        info!(
            "FilterPipeline: settings reloaded (spam={}, length={}, link={}, allowlist={})",
            settings.spam.is_some(),
            settings.length.is_some(),
            settings.link.is_some(),
            settings.allowlist.len()
        );
        *self.settings.write() = Arc::new(settings);
    }

    pub fn set_policy_enabled(&self, kind: PolicyKind, enabled: bool) {
        info!("FilterPipeline: {} filter {}", kind, if enabled { "enabled" } else { "disabled" });
        self.toggles.flag(kind).store(enabled, Ordering::SeqCst);
    }

    /// Switched on at runtime and configured (section present, `enabled`).
    pub fn is_policy_enabled(&self, kind: PolicyKind) -> bool {
        if !self.toggles.flag(kind).load(Ordering::SeqCst) {
            return false;
        }
        let settings = self.settings();
        match kind {
            PolicyKind::Spam => settings.spam.as_ref().is_some_and(|c| c.enabled),
            PolicyKind::Length => settings.length.as_ref().is_some_and(|c| c.enabled),
            PolicyKind::Link => settings.link.as_ref().is_some_and(|c| c.enabled),
        }
    }

    pub fn exemptions(&self) -> &Arc<ExemptionRegistry> {
        &self.exemptions
    }

    pub fn state_store(&self) -> &Arc<PolicyStateStore> {
        &self.store
    }

    pub fn spam_detector(&self) -> &SpamDetector {
        &self.spam
    }

    /// Why this event skips filtering, if it does.
    pub fn bypass_reason(&self, event: &ChatMessageEvent) -> Option<&'static str> {
        if event.is_privileged {
            return Some("privileged");
        }
        let user = event.normalized_username();
        let settings = self.settings();
        if settings.bots.contains(&user) {
            return Some("bot");
        }
        if settings.exemptions.contains(&user) {
            return Some("static exemption");
        }
        if self.exemptions.is_exempt(&user, event.timestamp_ms) {
            return Some("permit");
        }
        None
    }

    /// Every policy the message violates, evaluated independently.
    pub fn process(&self, event: &ChatMessageEvent) -> Vec<Verdict> {
        if let Some(reason) = self.bypass_reason(event) {
            debug!("FilterPipeline: '{}' bypasses filters ({})", event.username, reason);
            return Vec::new();
        }

        let settings = self.settings();
        let now = event.timestamp_ms;
        let mut verdicts = Vec::new();

        if let Some(cfg) = settings.spam.as_ref().filter(|c| c.enabled) {
            if self.toggles.spam.load(Ordering::SeqCst) {
                if let Some((violation, guard)) = self.spam.evaluate(&event.username, &event.channel, now, cfg) {
                    verdicts.push(Verdict { violation, guard: Some(guard) });
                }
            }
        }

        if let Some(cfg) = settings.length.as_ref().filter(|c| c.enabled) {
            if self.toggles.length.load(Ordering::SeqCst) {
                if let Some(violation) = self.length.evaluate(&event.username, &event.channel, &event.text, now, cfg) {
                    verdicts.push(Verdict { violation, guard: None });
                }
            }
        }

        if let Some(cfg) = settings.link.as_ref().filter(|c| c.enabled) {
            if self.toggles.link.load(Ordering::SeqCst) {
                if let Some(violation) =
                    self.link.evaluate(&event.username, &event.channel, &event.text, &settings.allowlist, now, cfg)
                {
                    verdicts.push(Verdict { violation, guard: None });
                }
            }
        }

        if !verdicts.is_empty() {
            debug!("FilterPipeline: '{}' produced {} verdict(s)", event.username, verdicts.len());
        }
        verdicts
    }

    /// Forgets idle per-user records. Never evicts before the longest strike
    /// decay or the spam window has run out, so eviction cannot reset a
    /// standing strike or a half-counted burst.
    pub fn evict_idle(&self, now: i64, idle_ms: u64) -> usize {
        let settings = self.settings();
        let window_ms = settings.spam.as_ref().map_or(0, |c| c.window_ms);
        let idle_ms = idle_ms.max(settings.max_strike_reset_ms()).max(window_ms);
        self.store.evict_idle(now, idle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::settings::{LengthConfig, SpamConfig};

    fn event(user: &str, text: &str, ts: i64) -> ChatMessageEvent {
        ChatMessageEvent::new(user, text, ts).in_channel("#stream")
    }

    #[test]
    fn test_one_message_can_violate_length_and_link() {
        let pipeline = FilterPipeline::new(FilterSettings {
            length: Some(LengthConfig { max_chars: 20, ..LengthConfig::default() }),
            ..FilterSettings::default()
        });
        let verdicts = pipeline.process(&event("alice", "buy followers at cheap-follows.biz today", 0));
        let policies: Vec<PolicyKind> = verdicts.iter().map(|v| v.policy()).collect();
        assert_eq!(policies, vec![PolicyKind::Length, PolicyKind::Link]);
        assert!(verdicts.iter().all(|v| v.guard.is_none()));
        assert_eq!(verdicts[0].violation.channel, "#stream");
    }

    #[test]
    fn test_privileged_and_bots_bypass() {
        let mut settings = FilterSettings::default();
        settings.bots.insert("nightbot".to_string());
        let pipeline = FilterPipeline::new(settings);

        let link = "evil.org";
        assert!(pipeline.process(&event("mod", link, 0).privileged()).is_empty());
        assert!(pipeline.process(&event("Nightbot", link, 0)).is_empty());
        assert_eq!(pipeline.process(&event("viewer", link, 0)).len(), 1);
    }

    #[test]
    fn test_absent_section_skips_policy() {
        let pipeline = FilterPipeline::new(FilterSettings {
            link: None,
            ..FilterSettings::default()
        });
        assert!(!pipeline.is_policy_enabled(PolicyKind::Link));
        assert!(pipeline.process(&event("viewer", "evil.org", 0)).is_empty());
    }

    #[test]
    fn test_toggle_off_and_on() {
        let pipeline = FilterPipeline::new(FilterSettings::default());
        pipeline.set_policy_enabled(PolicyKind::Link, false);
        assert!(pipeline.process(&event("viewer", "evil.org", 0)).is_empty());
        pipeline.set_policy_enabled(PolicyKind::Link, true);
        assert_eq!(pipeline.process(&event("viewer", "evil.org", 1)).len(), 1);
    }

    #[test]
    fn test_reload_keeps_state() {
        let pipeline = FilterPipeline::new(FilterSettings::default());
        for i in 0..3 {
            assert!(pipeline.process(&event("alice", "hi", i)).is_empty());
        }
        pipeline.reload(FilterSettings {
            spam: Some(SpamConfig { min_messages: 3, ..SpamConfig::default() }),
            ..FilterSettings::default()
        });
        let verdicts = pipeline.process(&event("alice", "hi", 3));
        assert_eq!(verdicts.len(), 1);
        assert!(verdicts[0].guard.is_some());
    }
}
