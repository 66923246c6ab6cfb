use chrono::{DateTime, Utc};

use crate::game_state::GameSnapshot;

/// The presence to display, rebuilt from scratch for every snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceDescriptor {
    /// First line, e.g. "Playing kz_reach_v2 T4"
    pub title_line: String,
    /// Second line, e.g. "[KZT] 02:05 | TP: 3 | 4.7%"
    pub detail_line: String,
    pub icon_key: String,
    pub icon_label: String,
    /// Session start, so the elapsed timer keeps counting across updates
    pub start_timestamp: Option<DateTime<Utc>>,
}

impl PresenceDescriptor {
    pub fn main_menu(icon_label: &str, start_timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            title_line: "Main Menu".to_string(),
            detail_line: "In Menu".to_string(),
            icon_key: "menu".to_string(),
            icon_label: icon_label.to_string(),
            start_timestamp,
        }
    }
}

impl Default for PresenceDescriptor {
    fn default() -> Self {
        Self::main_menu("Menu", None)
    }
}

/// Events consumed by the presence manager, in arrival order
#[derive(Debug)]
pub enum PresenceEvent {
    /// A game state payload arrived from the GSI listener
    Snapshot(Box<GameSnapshot>),
    /// The game process went from running to not running
    GameExited,
}

/// Trait for presence providers (Discord, etc.)
pub trait PresenceProvider: Send + Sync {
    /// Returns the name of this presence provider (for logging)
    fn name(&self) -> &'static str;

    /// Display the given presence
    fn update_presence(&self, presence: &PresenceDescriptor);

    /// Clear all presence data. Best effort; failures are logged, not returned.
    fn clear_presence(&self);
}
