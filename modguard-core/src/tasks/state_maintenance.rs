// File: src/tasks/state_maintenance.rs

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;
use modguard_common::traits::Clock;
use crate::moderation::FilterPipeline;

/// One maintenance pass: forget idle per-user state and expired permits.
/// Returns (evicted states, purged permits).
pub fn run_state_maintenance(pipeline: &FilterPipeline, now: i64, idle: Duration) -> (usize, usize) {
    let idle_ms = u64::try_from(idle.as_millis()).unwrap_or(u64::MAX);
    let evicted = pipeline.evict_idle(now, idle_ms);
    let purged = pipeline.exemptions().purge_expired(now);
    if evicted > 0 || purged > 0 {
        debug!(
            "state maintenance: evicted {} idle record(s), purged {} permit(s), {} record(s) left",
            evicted,
            purged,
            pipeline.state_store().len()
        );
    }
    (evicted, purged)
}

/// Spawns a background task that periodically prunes idle moderation state.
pub fn spawn_state_maintenance_task(
    pipeline: Arc<FilterPipeline>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    idle: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            run_state_maintenance(&pipeline, clock.now_ms(), idle);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use modguard_common::models::ChatMessageEvent;
    use crate::moderation::{FilterSettings, SpamConfig};

    #[test]
    fn test_pass_evicts_and_purges() {
        let settings = FilterSettings {
            spam: Some(SpamConfig { strike_reset_ms: 1_000, ..SpamConfig::default() }),
            length: None,
            link: None,
            ..FilterSettings::default()
        };
        let pipeline = FilterPipeline::new(settings);
        pipeline.process(&ChatMessageEvent::new("alice", "hi", 0));
        pipeline.exemptions().grant("bob", 1_000, 0);
        assert_eq!(pipeline.state_store().len(), 1);

        // the spam window outlasts the requested idle span
        assert_eq!(run_state_maintenance(&pipeline, 5_000, Duration::from_secs(2)), (0, 1));
        assert_eq!(run_state_maintenance(&pipeline, 20_000, Duration::from_secs(2)), (1, 0));
        assert!(pipeline.state_store().is_empty());
    }
}
