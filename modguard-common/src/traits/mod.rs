// File: modguard-common/src/traits/mod.rs
pub mod moderation_traits;

pub use moderation_traits::{Clock, ModerationExecutor};
