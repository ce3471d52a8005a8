// modguard-server/src/server.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use modguard_common::traits::ModerationExecutor;
use modguard_core::executors::{ChannelExecutor, LoggingExecutor};
use modguard_core::moderation::FilterSettings;
use modguard_core::tasks::{spawn_settings_reload_task, spawn_state_maintenance_task};
use modguard_core::utils::time::SystemClock;
use modguard_core::{FilterPipeline, ModerationService};
use crate::Args;
use crate::transport::{read_events, write_actions};

const EVENT_QUEUE: usize = 1024;

/// Settings from `path`, or the built-in defaults when none is given.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<FilterSettings> {
    match path {
        Some(path) => {
            let settings = FilterSettings::load_from_file(path)
                .map_err(|e| anyhow::anyhow!("failed to load {}: {}", path.display(), e))?;
            info!("Loaded filter settings from {}", path.display());
            Ok(settings)
        }
        None => {
            warn!("No --config given; running with default filter settings");
            Ok(FilterSettings::default())
        }
    }
}

pub async fn run_server(args: Args) -> anyhow::Result<()> {
    let settings = load_settings(args.config.as_deref())?;
    let pipeline = Arc::new(FilterPipeline::new(settings));
    let clock = Arc::new(SystemClock);

    // 1) Executor: stdout writer, or tracing only on a dry run
    let (executor, writer_handle) = if args.dry_run {
        info!("Dry run: actions are logged, nothing is written to stdout");
        (Arc::new(LoggingExecutor::new()) as Arc<dyn ModerationExecutor>, None)
    } else {
        let (executor, out_rx) = ChannelExecutor::channel(EVENT_QUEUE);
        let handle = tokio::spawn(async move {
            if let Err(e) = write_actions(tokio::io::stdout(), out_rx).await {
                error!("stdout writer stopped: {}", e);
            }
        });
        (Arc::new(executor) as Arc<dyn ModerationExecutor>, Some(handle))
    };

    let service = Arc::new(
        ModerationService::new(pipeline.clone(), executor, clock.clone())
            .with_permit_seconds(args.permit_secs)
            .with_dispatch_deadline(Duration::from_secs(args.dispatch_timeout_secs.max(1))),
    );

    // 2) Background maintenance
    let maintenance_handle = spawn_state_maintenance_task(
        pipeline.clone(),
        clock,
        Duration::from_secs(args.maintenance_secs.max(1)),
        Duration::from_secs(args.idle_evict_secs),
    );
    let reload_handle = match (&args.config, args.reload_secs) {
        (Some(path), secs) if secs > 0 => Some(spawn_settings_reload_task(
            pipeline.clone(),
            path.clone(),
            Duration::from_secs(secs),
        )),
        _ => None,
    };

    // 3) stdin -> service
    let (tx, rx) = mpsc::channel(EVENT_QUEUE);
    let mut service_handle = tokio::spawn(service.start(rx));
    let reader_handle = tokio::spawn(async move {
        match read_events(BufReader::new(tokio::io::stdin()), tx).await {
            Ok(n) => info!("stdin closed after {} event(s)", n),
            Err(e) => error!("stdin reader stopped: {}", e),
        }
    });

    let interrupted = tokio::select! {
        res = &mut service_handle => {
            if let Err(e) = res {
                error!("Moderation service task failed: {:?}", e);
            }
            false
        }
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!("Failed to listen for Ctrl-C: {:?}", e);
            }
            info!("Ctrl-C detected; shutting down...");
            true
        }
    };
    if interrupted {
        reader_handle.abort();
        service_handle.abort();
    }

    maintenance_handle.abort();
    if let Some(handle) = reload_handle {
        handle.abort();
    }
    if let Some(handle) = writer_handle {
        // let in-flight actions drain before the process exits
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }
    info!("Shutdown complete.");
    Ok(())
}
