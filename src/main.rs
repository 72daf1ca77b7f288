use brick_tracker::config::AppConfig;
use brick_tracker::error::AppError;
use brick_tracker::services::{BackgroundSync, NetworkMonitor, RemoteGateway, SyncService};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "brick-tracker")]
#[command(about = "Offline-first sync for the LEGO set tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the TOML config file
    #[arg(short, long, default_value = "brick-tracker.toml", env = "BRICK_TRACKER_CONFIG")]
    config: PathBuf,
}

#[derive(Subcommand, Clone, Copy, Default)]
enum Commands {
    /// Pull sets and replay the queue once (default)
    #[default]
    Sync,
    /// Print the number of pending changes
    Status,
    /// Run background sync until stopped
    Watch,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        log::error!("{}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = AppConfig::load(&cli.config)?;
    let service = Arc::new(SyncService::from_config(&config)?);

    match cli.command.unwrap_or_default() {
        Commands::Status => {
            println!("Pending changes: {}", service.pending_count()?);
            Ok(())
        }
        Commands::Sync => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| AppError::Other(format!("Failed to create runtime: {}", e)))?;

            runtime.block_on(sync_once(&service))
        }
        Commands::Watch => {
            let background = BackgroundSync::new(service.clone(), &config.sync);
            background.start();
            background.join();
            Ok(())
        }
    }
}

/// Probe, pull sets and replay the queue once
async fn sync_once(service: &SyncService) -> Result<(), AppError> {
    let reachable = service.gateway().is_reachable().await;
    service.network().set_online(reachable);
    if !service.network().is_online() {
        println!(
            "Server not reachable, {} changes pending",
            service.pending_count()?
        );
        return Ok(());
    }

    let sets = service.pull_sets().await?;
    let summary = service.replay().await?;
    println!(
        "Pulled {} sets; replayed {} of {} changes ({} failed)",
        sets, summary.success, summary.total, summary.failed
    );
    Ok(())
}
