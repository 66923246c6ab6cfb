pub mod difficulty;
pub mod discord;
pub mod game_state;
pub mod gsi_config;
pub mod gsi_server;
pub mod logging;
pub mod presence;
pub mod process;
pub mod settings;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use difficulty::{DifficultyCache, KzGlobalApi};
use discord::{DiscordPresence, DiscordState};
use gsi_server::GsiServer;
use presence::{start_presence_background_task, PresenceManager};
use process::{start_liveness_watchdog, SysinfoMatcher};
use settings::AppSettings;

/// Time given to providers to flush the final clear before exiting
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Wire everything together and run until Ctrl-C.
///
/// Expects logging to be initialised from `settings.logging` already.
pub async fn run(settings_path: &Path, settings: AppSettings) -> Result<(), String> {
    tracing::info!(
        "kz-rich-presence v{} watching '{}', GSI on {}",
        env!("CARGO_PKG_VERSION"),
        settings.process_name,
        settings.gsi_bind
    );

    match settings::write_defaults_if_missing(settings_path) {
        Ok(true) => tracing::info!("Wrote default settings to {}", settings_path.display()),
        Ok(false) => tracing::info!("Settings loaded from {}", settings_path.display()),
        Err(e) => tracing::warn!("{}", e),
    }

    if let Some(cfg_dir) = &settings.csgo_cfg_dir {
        if let Err(e) = gsi_config::install_gsi_config(
            cfg_dir,
            &settings.gsi_bind,
            settings.gsi_auth_token.as_deref(),
        ) {
            tracing::warn!("{}", e);
        }
    }

    let lookup = KzGlobalApi::new(&settings.difficulty_api_url, settings.lookup_timeout())?;
    let tiers = DifficultyCache::new(
        Arc::new(lookup),
        settings.lookup_timeout(),
        settings.lookup_retry(),
    );

    let mut presence_manager = PresenceManager::new(tiers);
    let discord_state = Arc::new(DiscordState::init(settings.discord_app_id));
    presence_manager.add_provider(Box::new(DiscordPresence::new(discord_state)));
    let presence_manager = Arc::new(presence_manager);

    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let gsi_server = GsiServer::start(
        &settings.gsi_bind,
        settings.gsi_auth_token.clone(),
        events_tx.clone(),
    )?;

    let watchdog = start_liveness_watchdog(
        Arc::new(SysinfoMatcher::new()),
        settings.process_name.clone(),
        settings.poll_interval(),
        events_tx,
    );

    let presence_task = start_presence_background_task(Arc::clone(&presence_manager), events_rx);

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for shutdown signal: {}", e))?;

    tracing::info!("Shutting down");
    gsi_server.stop();
    watchdog.abort();
    presence_task.abort();

    presence_manager.clear_all_presence();
    tokio::time::sleep(SHUTDOWN_GRACE).await;

    Ok(())
}
