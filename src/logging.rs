//! Console and rolling file logs.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::settings::LogSettings;

const LOG_FILE: &str = "kz-rich-presence.log";

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_logging(settings: &LogSettings) -> WorkerGuard {
    let log_dir = log_directory(settings);
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&settings.filter).unwrap_or_else(|e| {
            eprintln!("Warning: Invalid log filter {:?}: {}", settings.filter, e);
            EnvFilter::new(LogSettings::default().filter)
        })
    });

    let console_layer = fmt::layer().with_target(true);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Logging to {}", log_dir.display());

    let removed = cleanup_old_logs(&log_dir, settings.retention_days);
    if removed > 0 {
        tracing::debug!(
            "Removed {} log files older than {} days",
            removed,
            settings.retention_days
        );
    }

    guard
}

fn log_directory(settings: &LogSettings) -> PathBuf {
    settings.directory.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kz-rich-presence")
            .join("logs")
    })
}

/// Rotated files (`kz-rich-presence.log.<date>`) last modified before `cutoff`.
/// The live file and anything unrelated are never listed.
fn expired_logs(log_dir: &Path, cutoff: SystemTime) -> std::io::Result<Vec<PathBuf>> {
    let expired = std::fs::read_dir(log_dir)?
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with(LOG_FILE) && name != LOG_FILE
        })
        .filter(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .is_ok_and(|modified| modified < cutoff)
        })
        .map(|entry| entry.path())
        .collect();
    Ok(expired)
}

/// Delete rotated logs older than `keep_days`. Returns how many were removed.
fn cleanup_old_logs(log_dir: &Path, keep_days: u64) -> usize {
    let cutoff = SystemTime::now() - Duration::from_secs(keep_days * 24 * 60 * 60);

    let expired = match expired_logs(log_dir, cutoff) {
        Ok(expired) => expired,
        Err(e) => {
            tracing::warn!("Failed to read log directory for cleanup: {}", e);
            return 0;
        }
    };

    expired
        .into_iter()
        .filter(|path| match std::fs::remove_file(path) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to remove old log file {:?}: {}", path, e);
                false
            }
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotated(dir: &Path) -> PathBuf {
        dir.join(format!("{}.2026-01-01", LOG_FILE))
    }

    #[test]
    fn test_cleanup_removes_only_rotated_logs() {
        let dir = tempfile::tempdir().unwrap();
        let rotated = rotated(dir.path());
        let current = dir.path().join(LOG_FILE);
        let unrelated = dir.path().join("notes.txt");
        for path in [&rotated, &current, &unrelated] {
            std::fs::write(path, "x").unwrap();
        }

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cleanup_old_logs(dir.path(), 0), 1);

        assert!(!rotated.exists());
        assert!(current.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_cleanup_keeps_recent_logs() {
        let dir = tempfile::tempdir().unwrap();
        let rotated = rotated(dir.path());
        std::fs::write(&rotated, "x").unwrap();

        assert_eq!(cleanup_old_logs(dir.path(), 7), 0);
        assert!(rotated.exists());
    }

    #[test]
    fn test_cleanup_of_missing_directory_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(&dir.path().join("missing"), 7), 0);
    }

    #[test]
    fn test_configured_directory_overrides_default() {
        let settings = LogSettings {
            directory: Some(PathBuf::from("/tmp/kz-logs")),
            ..LogSettings::default()
        };
        assert_eq!(log_directory(&settings), PathBuf::from("/tmp/kz-logs"));
        assert!(log_directory(&LogSettings::default()).ends_with("kz-rich-presence/logs"));
    }
}
