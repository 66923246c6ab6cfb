//! Installs the Game State Integration config file that makes CS:GO post
//! payloads to our listener.

use std::fs;
use std::path::Path;

pub const GSI_CONFIG_FILE: &str = "gamestate_integration_kzpresence.cfg";

/// Payload sections requested from the game
const DATA_SECTIONS: &[&str] = &[
    "provider",
    "map",
    "player_id",
    "player_state",
    "player_match_stats",
];

/// URI the game should post to for a given bind address. A wildcard bind is
/// reached through loopback.
fn listener_uri(bind: &str) -> String {
    let host_port = match bind.strip_prefix("0.0.0.0:") {
        Some(port) => format!("127.0.0.1:{}", port),
        None => bind.to_string(),
    };
    format!("http://{}", host_port)
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Render the config in Valve's KeyValues format
pub fn render_gsi_config(bind: &str, auth_token: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("\"KZ Rich Presence\"\n{\n");
    out.push_str(&format!("    \"uri\"       {}\n", quote(&listener_uri(bind))));
    out.push_str("    \"timeout\"   \"5.0\"\n");
    out.push_str("    \"buffer\"    \"0.1\"\n");
    out.push_str("    \"throttle\"  \"0.5\"\n");
    out.push_str("    \"heartbeat\" \"10.0\"\n");

    if let Some(token) = auth_token {
        out.push_str("    \"auth\"\n    {\n");
        out.push_str(&format!("        \"token\" {}\n", quote(token)));
        out.push_str("    }\n");
    }

    out.push_str("    \"data\"\n    {\n");
    for section in DATA_SECTIONS {
        out.push_str(&format!("        {} \"1\"\n", quote(section)));
    }
    out.push_str("    }\n}\n");
    out
}

/// Write the config into the game's `cfg` directory unless it is already there.
/// Returns whether a file was written.
pub fn install_gsi_config(
    cfg_dir: &Path,
    bind: &str,
    auth_token: Option<&str>,
) -> Result<bool, String> {
    if !cfg_dir.is_dir() {
        return Err(format!("CS:GO cfg directory not found: {}", cfg_dir.display()));
    }

    let path = cfg_dir.join(GSI_CONFIG_FILE);
    if path.exists() {
        tracing::debug!("GSI config already present at {}", path.display());
        return Ok(false);
    }

    fs::write(&path, render_gsi_config(bind, auth_token))
        .map_err(|e| format!("Failed to write GSI config: {}", e))?;

    tracing::info!("Installed GSI config at {}, restart CS:GO to apply", path.display());
    Ok(true)
}
