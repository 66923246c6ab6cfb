//! Discord Rich Presence integration using discord-sdk

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use discord_sdk::{
    activity::{ActivityBuilder, Assets},
    registration::{Application, LaunchCommand},
    wheel::{UserSpoke, UserState, Wheel},
    Discord, Subscriptions,
};
use tokio::sync::mpsc;

use crate::presence::{PresenceDescriptor, PresenceProvider};

/// Steam app id of CS:GO, used so Discord can launch the game
const CSGO_STEAM_APP_ID: u32 = 730;

/// Timeout for waiting for Discord handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Reconnect delay after the first failed attempt, doubled up to `RECONNECT_MAX`
const RECONNECT_MIN: Duration = Duration::from_secs(5);
const RECONNECT_MAX: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
enum DiscordCommand {
    Update(PresenceDescriptor),
    Clear,
}

/// An established connection able to display activities
#[async_trait]
trait ActivitySession: Send {
    async fn update(&mut self, presence: &PresenceDescriptor) -> Result<(), String>;

    async fn clear(&mut self) -> Result<(), String>;

    /// Resolves once the connection is lost
    async fn closed(&mut self);

    async fn disconnect(&mut self);
}

/// Opens `ActivitySession`s
#[async_trait]
trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ActivitySession>, String>;
}

struct DiscordConnector {
    app_id: i64,
}

struct DiscordSession {
    discord: Option<Discord>,
    user: UserSpoke,
    _wheel: Wheel,
}

#[async_trait]
impl Connector for DiscordConnector {
    async fn connect(&self) -> Result<Box<dyn ActivitySession>, String> {
        let (wheel, handler) = Wheel::new(Box::new(|err| {
            tracing::debug!("Discord error: {:?}", err);
        }));

        let mut user = wheel.user();

        let discord = Discord::new(self.app_id, Subscriptions::ACTIVITY, Box::new(handler))
            .map_err(|e| format!("Discord not available: {:?}", e))?;

        tracing::debug!("Discord connecting...");

        let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            if user.0.changed().await.is_err() {
                return Err("Discord connection closed".to_string());
            }
            match &*user.0.borrow() {
                UserState::Connected(connected) => Ok(connected.clone()),
                UserState::Disconnected(err) => Err(format!("Discord disconnected: {:?}", err)),
            }
        })
        .await
        .unwrap_or_else(|_| Err("Discord handshake timed out".to_string()));

        match handshake {
            Ok(connected) => {
                tracing::info!("Discord Rich Presence connected as {}", connected.username);
                Ok(Box::new(DiscordSession {
                    discord: Some(discord),
                    user,
                    _wheel: wheel,
                }))
            }
            Err(e) => {
                discord.disconnect().await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ActivitySession for DiscordSession {
    async fn update(&mut self, presence: &PresenceDescriptor) -> Result<(), String> {
        let discord = self.discord.as_ref().ok_or("Discord disconnected")?;
        discord
            .update_activity(activity_for(ActivityParts::from(presence)))
            .await
            .map(|_| ())
            .map_err(|e| format!("{:?}", e))
    }

    async fn clear(&mut self) -> Result<(), String> {
        let discord = self.discord.as_ref().ok_or("Discord disconnected")?;
        discord
            .clear_activity()
            .await
            .map(|_| ())
            .map_err(|e| format!("{:?}", e))
    }

    async fn closed(&mut self) {
        loop {
            if self.user.0.changed().await.is_err() {
                return;
            }
            let disconnected = matches!(&*self.user.0.borrow(), UserState::Disconnected(_));
            if disconnected {
                return;
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(discord) = self.discord.take() {
            discord.disconnect().await;
        }
    }
}

async fn apply(session: &mut dyn ActivitySession, command: &DiscordCommand) -> Result<(), String> {
    match command {
        DiscordCommand::Update(presence) => session.update(presence).await,
        DiscordCommand::Clear => session.clear().await,
    }
}

/// Keeps a connection alive for as long as commands can arrive.
///
/// While disconnected, commands are folded into the latest one, which is
/// replayed as soon as a connection is (re)established.
async fn run_discord_task(
    connector: Arc<dyn Connector>,
    mut update_rx: mpsc::UnboundedReceiver<DiscordCommand>,
    reconnect_min: Duration,
    reconnect_max: Duration,
) {
    let mut latest: Option<DiscordCommand> = None;
    let mut delay = reconnect_min;

    loop {
        let mut session = match connector.connect().await {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!("{}, retrying in {:?}", e, delay);
                let retry = tokio::time::sleep(delay);
                tokio::pin!(retry);
                loop {
                    tokio::select! {
                        _ = &mut retry => break,
                        command = update_rx.recv() => match command {
                            Some(command) => latest = Some(command),
                            None => return,
                        },
                    }
                }
                delay = (delay * 2).min(reconnect_max);
                continue;
            }
        };
        delay = reconnect_min;

        let mut healthy = match &latest {
            Some(command) => apply(session.as_mut(), command).await,
            None => Ok(()),
        };

        while healthy.is_ok() {
            // `None` means the connection went away
            let received = tokio::select! {
                command = update_rx.recv() => Some(command),
                _ = session.closed() => None,
            };

            match received {
                Some(Some(command)) => {
                    healthy = apply(session.as_mut(), &command).await;
                    latest = Some(command);
                }
                Some(None) => {
                    session.disconnect().await;
                    tracing::info!("Discord Rich Presence disconnected");
                    return;
                }
                None => healthy = Err("Discord connection lost".to_string()),
            }
        }

        if let Err(e) = healthy {
            tracing::warn!("{}, reconnecting", e);
        }
        session.disconnect().await;
    }
}

/// Manages the Discord connection and background task
pub struct DiscordState {
    update_tx: mpsc::UnboundedSender<DiscordCommand>,
}

impl DiscordState {
    /// Initialize Discord integration
    ///
    /// This registers the application with Discord and spawns a background task
    /// that connects, reconnects whenever Discord goes away, and applies presence
    /// updates.
    pub fn init(app_id: i64) -> Self {
        if let Err(e) = discord_sdk::registration::register_app(Application {
            id: app_id,
            name: Some("CS:GO KZ".to_string()),
            command: LaunchCommand::Steam(CSGO_STEAM_APP_ID),
        }) {
            tracing::warn!("Failed to register Discord app: {:?}", e);
        }

        Self::spawn(Arc::new(DiscordConnector { app_id }), RECONNECT_MIN, RECONNECT_MAX)
    }

    fn spawn(connector: Arc<dyn Connector>, reconnect_min: Duration, reconnect_max: Duration) -> Self {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_discord_task(connector, update_rx, reconnect_min, reconnect_max));
        Self { update_tx }
    }

    /// Send a command to the background task
    fn send(&self, command: DiscordCommand) {
        if self.update_tx.send(command).is_err() {
            tracing::warn!("Discord task not running, dropping presence command");
        }
    }
}

/// Discord activity fields for a presence: the title goes on the first line
/// (details) and the detail line on the second (state).
#[derive(Debug, PartialEq)]
struct ActivityParts {
    details: String,
    state: String,
    large_image: String,
    large_text: String,
    start: Option<SystemTime>,
}

impl From<&PresenceDescriptor> for ActivityParts {
    fn from(presence: &PresenceDescriptor) -> Self {
        Self {
            details: presence.title_line.clone(),
            state: presence.detail_line.clone(),
            large_image: presence.icon_key.clone(),
            large_text: presence.icon_label.clone(),
            start: presence.start_timestamp.map(SystemTime::from),
        }
    }
}

fn activity_for(parts: ActivityParts) -> ActivityBuilder {
    let activity = ActivityBuilder::new()
        .details(parts.details)
        .state(parts.state)
        .assets(Assets::default().large(parts.large_image, Some(parts.large_text)));

    match parts.start {
        Some(start) => activity.start_timestamp(start),
        None => activity,
    }
}

/// Discord presence provider implementing the generic PresenceProvider trait
pub struct DiscordPresence {
    state: Arc<DiscordState>,
}

impl DiscordPresence {
    /// Create a new Discord presence provider
    pub fn new(state: Arc<DiscordState>) -> Self {
        Self { state }
    }
}

impl PresenceProvider for DiscordPresence {
    fn name(&self) -> &'static str {
        "Discord"
    }

    fn update_presence(&self, presence: &PresenceDescriptor) {
        self.state.send(DiscordCommand::Update(presence.clone()));
    }

    fn clear_presence(&self) {
        self.state.send(DiscordCommand::Clear);
    }
}
