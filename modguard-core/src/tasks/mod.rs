pub mod settings_reload;
pub mod state_maintenance;

pub use settings_reload::{reload_if_changed, spawn_settings_reload_task};
pub use state_maintenance::{run_state_maintenance, spawn_state_maintenance_task};
