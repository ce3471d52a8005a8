pub mod mod_commands;
pub mod moderation_service;

pub use mod_commands::{ModCommand, ModCommandHandler};
pub use moderation_service::ModerationService;
