// File: modguard-common/src/models/mod.rs
pub mod chat;
pub mod policy;
pub mod moderation;

pub use chat::{ChatMessageEvent, normalize_username};
pub use policy::PolicyKind;
pub use moderation::{ActionOutcome, ModerationAction, Violation};
