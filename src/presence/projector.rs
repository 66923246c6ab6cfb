//! Turns a game state snapshot into the presence to display.

use chrono::Utc;
use parking_lot::Mutex;

use super::session::SessionState;
use super::traits::PresenceDescriptor;
use crate::difficulty::DifficultyCache;
use crate::game_state::GameSnapshot;

const DEFAULT_KZ_MODE: &str = "KZT";

/// Build the presence for `snapshot`.
///
/// Incomplete snapshots yield the plain menu presence and leave the session
/// untouched. The first complete snapshot starts the session; every presence
/// built afterwards carries that start time until the session is reset.
pub async fn build_presence(
    snapshot: Option<&GameSnapshot>,
    session: &Mutex<SessionState>,
    tiers: &DifficultyCache,
) -> PresenceDescriptor {
    let snapshot = match snapshot {
        Some(snapshot) if snapshot.is_complete() => snapshot,
        _ => return PresenceDescriptor::default(),
    };
    let (Some(map), Some(player)) = (&snapshot.map, &snapshot.player) else {
        return PresenceDescriptor::default();
    };

    let start = session.lock().start_if_unset(Utc::now());

    if player.activity.as_deref() != Some("playing") {
        return PresenceDescriptor::main_menu("Main Menu", Some(start));
    }

    let stats = player.match_stats.as_ref();
    let timer_text = format_timer(stats.and_then(|s| s.kills).unwrap_or(0));
    let teleports = stats.and_then(|s| s.deaths).unwrap_or(0);
    let progress_text = format_progress(stats.and_then(|s| s.score).unwrap_or(0));
    let mode = kz_mode(player.clan.as_deref());

    let map_name = map.name.as_deref().unwrap_or_default();
    let tier = tiers.tier(map_name).await;

    PresenceDescriptor {
        title_line: format!("Playing {} {}", map_name, tier),
        detail_line: format!(
            "[{}] {} | TP: {} | {}",
            mode, timer_text, teleports, progress_text
        ),
        icon_key: map_name.to_string(),
        icon_label: format!("Playing on {}", map_name),
        start_timestamp: Some(start),
    }
}

/// `MM:SS` below one hour, `H:MM:SS` from there on
pub fn format_timer(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours >= 1 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Score is progress in tenths of a percent
pub fn format_progress(score: i64) -> String {
    format!("{:.1}%", score as f64 / 10.0)
}

/// Timer mode from a clan tag such as `"[KZT Semipro]"`: the first word inside
/// the first bracket pair, uppercased. Falls back to KZT.
pub fn kz_mode(clan: Option<&str>) -> String {
    clan.and_then(|clan| {
        let open = clan.find('[')?;
        let inner_start = open + 1;
        let close = inner_start + clan[inner_start..].find(']')?;
        clan[inner_start..close]
            .split_whitespace()
            .next()
            .map(str::to_uppercase)
    })
    .unwrap_or_else(|| DEFAULT_KZ_MODE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::tests::FakeLookup;
    use std::sync::Arc;
    use std::time::Duration;

    fn tiers(lookup: &Arc<FakeLookup>) -> DifficultyCache {
        DifficultyCache::new(lookup.clone(), Duration::from_secs(1), Duration::from_secs(60))
    }

    fn snapshot(json: &str) -> GameSnapshot {
        GameSnapshot::from_json(json).unwrap()
    }

    fn playing(clan: &str, kills: i64, deaths: i64, score: i64) -> GameSnapshot {
        snapshot(&format!(
            r#"{{
                "provider": {{ "appid": 730 }},
                "map": {{ "name": "kz_beginnerblock_go", "phase": "live" }},
                "player": {{
                    "clan": "{}",
                    "activity": "playing",
                    "match_stats": {{ "kills": {}, "deaths": {}, "score": {} }}
                }}
            }}"#,
            clan, kills, deaths, score
        ))
    }

    fn menu() -> GameSnapshot {
        snapshot(
            r#"{
                "provider": { "appid": 730 },
                "map": { "name": "kz_beginnerblock_go" },
                "player": { "activity": "menu" }
            }"#,
        )
    }

    #[tokio::test]
    async fn test_incomplete_snapshots_yield_default_menu() {
        let lookup = Arc::new(FakeLookup::answering(Some(1)));
        let tiers = tiers(&lookup);
        let session = Mutex::new(SessionState::new());

        let incomplete = [
            r#"{}"#,
            r#"{ "map": { "name": "kz_a" }, "player": { "activity": "playing" } }"#,
            r#"{ "provider": {}, "player": { "activity": "playing" } }"#,
            r#"{ "provider": {}, "map": { "name": "kz_a" }, "player": null }"#,
        ];

        assert_eq!(
            build_presence(None, &session, &tiers).await,
            PresenceDescriptor::default()
        );
        for json in incomplete {
            let presence = build_presence(Some(&snapshot(json)), &session, &tiers).await;
            assert_eq!(presence, PresenceDescriptor::default(), "payload: {}", json);
        }

        let default = PresenceDescriptor::default();
        assert_eq!(default.title_line, "Main Menu");
        assert_eq!(default.detail_line, "In Menu");
        assert_eq!(default.icon_key, "menu");
        assert_eq!(default.start_timestamp, None);

        assert_eq!(session.lock().start(), None);
        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test]
    async fn test_playing_presence() {
        let lookup = Arc::new(FakeLookup::answering(Some(3)));
        let tiers = tiers(&lookup);
        let session = Mutex::new(SessionState::new());

        let presence =
            build_presence(Some(&playing("[KZT Semipro]", 125, 3, 47)), &session, &tiers).await;

        assert_eq!(presence.title_line, "Playing kz_beginnerblock_go T3");
        assert_eq!(presence.detail_line, "[KZT] 02:05 | TP: 3 | 4.7%");
        assert_eq!(presence.icon_key, "kz_beginnerblock_go");
        assert_eq!(presence.icon_label, "Playing on kz_beginnerblock_go");
        assert_eq!(presence.start_timestamp, session.lock().start());
        assert!(presence.start_timestamp.is_some());
    }

    #[tokio::test]
    async fn test_playing_without_match_stats() {
        let lookup = Arc::new(FakeLookup::failing());
        let tiers = tiers(&lookup);
        let session = Mutex::new(SessionState::new());

        let snapshot = snapshot(
            r#"{
                "provider": {},
                "map": { "name": "kz_unknown" },
                "player": { "activity": "playing" }
            }"#,
        );
        let presence = build_presence(Some(&snapshot), &session, &tiers).await;

        assert_eq!(presence.title_line, "Playing kz_unknown T?");
        assert_eq!(presence.detail_line, "[KZT] 00:00 | TP: 0 | 0.0%");
    }

    #[tokio::test]
    async fn test_menu_activity_keeps_session_start() {
        let lookup = Arc::new(FakeLookup::answering(Some(3)));
        let tiers = tiers(&lookup);
        let session = Mutex::new(SessionState::new());

        let first = build_presence(Some(&playing("", 10, 0, 0)), &session, &tiers).await;
        let in_menu = build_presence(Some(&menu()), &session, &tiers).await;

        assert_eq!(in_menu.title_line, "Main Menu");
        assert_eq!(in_menu.detail_line, "In Menu");
        assert_eq!(in_menu.icon_key, "menu");
        assert_eq!(in_menu.icon_label, "Main Menu");
        assert_eq!(in_menu.start_timestamp, first.start_timestamp);
    }

    #[tokio::test]
    async fn test_first_valid_snapshot_starts_session_once() {
        let lookup = Arc::new(FakeLookup::answering(Some(3)));
        let tiers = tiers(&lookup);
        let session = Mutex::new(SessionState::new());

        let before = Utc::now();
        let first = build_presence(Some(&menu()), &session, &tiers).await;
        let after = Utc::now();

        let start = first.start_timestamp.unwrap();
        assert!(start >= before && start <= after);

        tokio::time::sleep(Duration::from_millis(5)).await;
        for kills in [1, 2, 3] {
            let presence = build_presence(Some(&playing("", kills, 0, 0)), &session, &tiers).await;
            assert_eq!(presence.start_timestamp, Some(start));
        }
        assert_eq!(lookup.calls(), 1);
    }

    #[tokio::test]
    async fn test_reset_starts_a_later_session() {
        let lookup = Arc::new(FakeLookup::answering(Some(3)));
        let tiers = tiers(&lookup);
        let session = Mutex::new(SessionState::new());

        let first = build_presence(Some(&menu()), &session, &tiers).await;
        session.lock().reset();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = build_presence(Some(&menu()), &session, &tiers).await;

        assert!(second.start_timestamp.unwrap() > first.start_timestamp.unwrap());
    }

    #[test]
    fn test_format_timer() {
        assert_eq!(format_timer(0), "00:00");
        assert_eq!(format_timer(125), "02:05");
        assert_eq!(format_timer(3599), "59:59");
        assert_eq!(format_timer(3600), "1:00:00");
        assert_eq!(format_timer(3725), "1:02:05");
        assert_eq!(format_timer(-5), "00:00");
    }

    #[test]
    fn test_format_progress() {
        assert_eq!(format_progress(47), "4.7%");
        assert_eq!(format_progress(0), "0.0%");
        assert_eq!(format_progress(1000), "100.0%");
        assert_eq!(format_progress(5), "0.5%");
    }

    #[test]
    fn test_kz_mode() {
        assert_eq!(kz_mode(Some("[KZT Semipro] Player")), "KZT");
        assert_eq!(kz_mode(Some("[vnl pro]")), "VNL");
        assert_eq!(kz_mode(Some("[  skz  ]")), "SKZ");
        assert_eq!(kz_mode(Some("NoBrackets")), "KZT");
        assert_eq!(kz_mode(Some("[] empty")), "KZT");
        assert_eq!(kz_mode(Some("[   ]")), "KZT");
        assert_eq!(kz_mode(Some("]vnl[")), "KZT");
        assert_eq!(kz_mode(Some("[vnl")), "KZT");
        assert_eq!(kz_mode(Some("")), "KZT");
        assert_eq!(kz_mode(None), "KZT");
    }
}
