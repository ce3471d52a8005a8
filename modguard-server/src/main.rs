use std::path::PathBuf;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod server;
mod transport;

/// modguard: chat moderation filter.
///
/// Reads chat events as JSON lines on stdin and writes timeouts and replies
/// as JSON lines on stdout. Logs go to stderr.
#[derive(Parser, Debug, Clone)]
#[command(name = "modguard")]
#[command(author, version, about = "modguard - spam, length and link filters for live chat")]
pub struct Args {
    /// Path to the JSON filter settings. Built-in defaults when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Re-read the settings file every N seconds (0 disables hot reload)
    #[arg(long, default_value = "5")]
    pub reload_secs: u64,

    /// Forget per-user state after this many idle seconds
    #[arg(long, default_value = "3600")]
    pub idle_evict_secs: u64,

    /// How often the idle-state sweep runs, in seconds
    #[arg(long, default_value = "60")]
    pub maintenance_secs: u64,

    /// Default `!permit` duration in seconds
    #[arg(long, default_value = "60")]
    pub permit_secs: u64,

    /// Give up on a timeout or reply that has not gone out after this many seconds
    #[arg(long, default_value = "10")]
    pub dispatch_timeout_secs: u64,

    /// Log actions instead of emitting them
    #[arg(long, default_value = "false")]
    pub dry_run: bool,
}

fn init_tracing() {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("log bridge not installed: {}", e);
    }
    let filter = EnvFilter::from_default_env()
        .add_directive("modguard=info".parse().unwrap_or_default());
    let sub = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    info!(
        "modguard starting. config={:?}, reload_secs={}, dry_run={}",
        args.config, args.reload_secs, args.dry_run
    );

    if let Err(e) = server::run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e);
    }
    info!("Main finished. Goodbye!");
    Ok(())
}
