//! Owns session state and presence providers, and applies presence events

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::projector::build_presence;
use super::session::SessionState;
use super::traits::{PresenceDescriptor, PresenceEvent, PresenceProvider};
use crate::difficulty::DifficultyCache;
use crate::game_state::GameSnapshot;

/// Manages session state, the difficulty cache and multiple presence providers
pub struct PresenceManager {
    providers: Vec<Box<dyn PresenceProvider>>,
    session: Mutex<SessionState>,
    tiers: DifficultyCache,
    last_presence: Mutex<Option<PresenceDescriptor>>,
}

impl PresenceManager {
    pub fn new(tiers: DifficultyCache) -> Self {
        Self {
            providers: Vec::new(),
            session: Mutex::new(SessionState::new()),
            tiers,
            last_presence: Mutex::new(None),
        }
    }

    /// Add a presence provider
    pub fn add_provider(&mut self, provider: Box<dyn PresenceProvider>) {
        tracing::info!("Adding presence provider: {}", provider.name());
        self.providers.push(provider);
    }

    /// Build presence from a snapshot and push it to all providers
    pub async fn handle_snapshot(&self, snapshot: &GameSnapshot) -> PresenceDescriptor {
        let presence = build_presence(Some(snapshot), &self.session, &self.tiers).await;
        self.update_all_presence(&presence);
        presence
    }

    /// The game is gone: clear what is displayed and end the session
    pub fn handle_game_exit(&self) {
        if self.session.lock().reset() {
            tracing::info!("Game session ended");
        }
        self.clear_all_presence();
    }

    pub async fn apply(&self, event: PresenceEvent) {
        match event {
            PresenceEvent::Snapshot(snapshot) => {
                self.handle_snapshot(&snapshot).await;
            }
            PresenceEvent::GameExited => self.handle_game_exit(),
        }
    }

    /// Start of the current session, if one is active
    pub fn session_start(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.session.lock().start()
    }

    /// Update presence on all providers, skipping repeats of the last update
    pub fn update_all_presence(&self, presence: &PresenceDescriptor) {
        {
            let mut last = self.last_presence.lock();
            if last.as_ref() == Some(presence) {
                tracing::trace!("Presence unchanged, skipping update");
                return;
            }
            *last = Some(presence.clone());
        }

        tracing::debug!("Updating presence: {:?}", presence);
        for provider in &self.providers {
            provider.update_presence(presence);
        }
    }

    /// Clear presence on all providers
    pub fn clear_all_presence(&self) {
        *self.last_presence.lock() = None;
        for provider in &self.providers {
            provider.clear_presence();
        }
    }
}

/// Start the task that applies presence events one at a time, in arrival order.
///
/// Snapshot handling and game exit handling never interleave, so a session reset
/// cannot race a presence build that is waiting on a difficulty lookup.
pub fn start_presence_background_task(
    presence_manager: std::sync::Arc<PresenceManager>,
    mut events: mpsc::UnboundedReceiver<PresenceEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            presence_manager.apply(event).await;
        }
        tracing::debug!("Presence event channel closed");
    })
}
