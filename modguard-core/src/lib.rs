// src/lib.rs

pub mod moderation;
pub mod services;
pub mod executors;
pub mod tasks;
pub mod utils;

pub use modguard_common::error::Error;
pub use moderation::{FilterPipeline, FilterSettings, Verdict};
pub use services::moderation_service::ModerationService;
