//! The moderation engine: spam, length and link policies over a shared
//! strike model, plus the exemption registry and the pipeline tying them up.

pub mod allowlist;
pub mod link_tokens;
pub mod state_store;
pub mod strikes;
pub mod settings;
pub mod spam;
pub mod length;
pub mod link;
pub mod exemptions;
pub mod pipeline;

pub use allowlist::{Allowlist, AllowlistEntry, CanonicalUrl};
pub use exemptions::ExemptionRegistry;
pub use length::LengthGuard;
pub use link::LinkGuard;
pub use link_tokens::{extract_link_tokens, LinkToken, LinkTokenKind};
pub use pipeline::{FilterPipeline, Verdict};
pub use settings::{FilterSettings, LengthConfig, LinkConfig, SpamConfig};
pub use spam::{CoolingGuard, SpamDetector};
pub use state_store::{PolicyStateStore, UserPolicyState};
pub use strikes::StrikeLedger;

use modguard_common::models::{normalize_username, PolicyKind, Violation};
use settings::render_template;

/// The name as typed, minus surrounding space and a leading `@`.
pub(crate) fn display_name(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed)
}

pub(crate) fn build_violation(
    policy: PolicyKind,
    username: &str,
    channel: &str,
    timeout_seconds: u64,
    reason: &str,
    template: &str,
) -> Violation {
    Violation {
        policy,
        username: normalize_username(username),
        channel: channel.to_string(),
        timeout_seconds,
        reason: reason.to_string(),
        reply_text: render_template(template, display_name(username)),
    }
}
