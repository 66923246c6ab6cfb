//! Typed view of a CS:GO Game State Integration payload.
//!
//! Every section and field is optional: the game omits whole blocks depending on
//! what the player is doing, and sends `null` for some of them while loading.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameSnapshot {
    pub provider: Option<Provider>,
    pub map: Option<MapInfo>,
    pub player: Option<Player>,
    pub previously: Option<Previously>,
    pub auth: Option<Auth>,
}

impl GameSnapshot {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// A snapshot is usable for presence only once the game reports all three
    /// of provider, map and player.
    pub fn is_complete(&self) -> bool {
        self.provider.is_some() && self.map.is_some() && self.player.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Provider {
    pub name: Option<String>,
    pub appid: Option<i64>,
    pub version: Option<i64>,
    pub steamid: Option<String>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MapInfo {
    pub mode: Option<String>,
    pub name: Option<String>,
    pub phase: Option<String>,
    pub round: Option<i64>,
    pub team_ct: Option<Team>,
    pub team_t: Option<Team>,
    pub num_matches_to_win_series: Option<i64>,
    pub current_spectators: Option<i64>,
    pub souvenirs_total: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Team {
    pub score: Option<i64>,
    pub consecutive_round_losses: Option<i64>,
    pub timeouts_remaining: Option<i64>,
    pub matches_won_this_series: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Player {
    pub steamid: Option<String>,
    /// Clan tag, e.g. `"[KZT Semipro]"`. KZ servers put the timer mode here.
    pub clan: Option<String>,
    pub name: Option<String>,
    pub observer_slot: Option<i64>,
    pub team: Option<String>,
    pub activity: Option<String>,
    pub match_stats: Option<MatchStats>,
    pub state: Option<PlayerState>,
}

/// Scoreboard columns. KZ plugins repurpose them: kills hold the run time in
/// seconds, deaths the teleport count and score the map progress in tenths of a
/// percent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatchStats {
    pub kills: Option<i64>,
    pub assists: Option<i64>,
    pub deaths: Option<i64>,
    pub mvps: Option<i64>,
    pub score: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayerState {
    pub health: Option<i64>,
    pub armor: Option<i64>,
    pub helmet: Option<bool>,
    pub defusekit: Option<bool>,
    pub flashed: Option<i64>,
    pub smoked: Option<i64>,
    pub burning: Option<i64>,
    pub money: Option<i64>,
    pub round_kills: Option<i64>,
    pub round_killhs: Option<i64>,
    pub equip_value: Option<i64>,
}

/// Values that changed since the previous payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Previously {
    pub player: Option<PreviouslyPlayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PreviouslyPlayer {
    pub match_stats: Option<MatchStats>,
}

/// Echo of the `auth` block from the game's GSI config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Auth {
    pub token: Option<String>,
}
