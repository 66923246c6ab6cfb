//! Game process liveness watchdog.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sysinfo::System;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::presence::PresenceEvent;

/// Answers whether a process with the given name is currently running.
pub trait ProcessMatcher: Send + Sync {
    fn is_running(&self, process_name: &str) -> bool;
}

/// `ProcessMatcher` backed by the OS process table.
pub struct SysinfoMatcher {
    system: Mutex<System>,
}

impl SysinfoMatcher {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessMatcher for SysinfoMatcher {
    fn is_running(&self, process_name: &str) -> bool {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return false;
        }

        let mut system = self.system.lock();
        system.refresh_processes();
        system
            .processes()
            .values()
            .any(|p| process_name_matches(p.name(), process_name))
    }
}

/// Compares a process table entry with the configured name. Windows names are
/// case-insensitive and may carry an `.exe` suffix on either side.
pub fn process_name_matches(candidate: &str, target: &str) -> bool {
    if cfg!(windows) {
        strip_exe(candidate).eq_ignore_ascii_case(strip_exe(target))
    } else {
        candidate == target
    }
}

fn strip_exe(name: &str) -> &str {
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".exe") {
        &name[..len - 4]
    } else {
        name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Started,
    Exited,
}

/// Edge detector over successive liveness checks.
#[derive(Debug, Default)]
pub struct LivenessMonitor {
    was_running: bool,
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, running_now: bool) -> Transition {
        let transition = match (self.was_running, running_now) {
            (true, false) => Transition::Exited,
            (false, true) => Transition::Started,
            _ => Transition::Unchanged,
        };
        self.was_running = running_now;
        transition
    }
}

/// Start the background task that polls for the game process and reports
/// `PresenceEvent::GameExited` when it goes away.
pub fn start_liveness_watchdog(
    matcher: Arc<dyn ProcessMatcher>,
    process_name: String,
    poll_interval: Duration,
    events: mpsc::UnboundedSender<PresenceEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut monitor = LivenessMonitor::new();

        loop {
            ticker.tick().await;

            let running_now = {
                let matcher = Arc::clone(&matcher);
                let name = process_name.clone();
                match tokio::task::spawn_blocking(move || matcher.is_running(&name)).await {
                    Ok(running) => running,
                    Err(e) => {
                        tracing::warn!("Process check failed: {}", e);
                        false
                    }
                }
            };

            match monitor.observe(running_now) {
                Transition::Started => {
                    tracing::info!("{} is running", process_name);
                }
                Transition::Exited => {
                    tracing::info!("{} not found, clearing presence", process_name);
                    if events.send(PresenceEvent::GameExited).is_err() {
                        tracing::debug!("Presence event channel closed, stopping watchdog");
                        break;
                    }
                }
                Transition::Unchanged => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedMatcher {
        answers: Mutex<VecDeque<bool>>,
    }

    impl ProcessMatcher for ScriptedMatcher {
        fn is_running(&self, _process_name: &str) -> bool {
            self.answers.lock().pop_front().unwrap_or(false)
        }
    }

    #[test]
    fn test_transition_table() {
        let mut monitor = LivenessMonitor::new();
        assert_eq!(monitor.observe(false), Transition::Unchanged);
        assert_eq!(monitor.observe(true), Transition::Started);
        assert_eq!(monitor.observe(true), Transition::Unchanged);
        assert_eq!(monitor.observe(false), Transition::Exited);
        assert_eq!(monitor.observe(false), Transition::Unchanged);
    }

    #[test]
    fn test_exit_reported_once_on_third_tick() {
        let mut monitor = LivenessMonitor::new();
        let exits: Vec<usize> = [true, true, false, false]
            .into_iter()
            .enumerate()
            .filter(|(_, running)| monitor.observe(*running) == Transition::Exited)
            .map(|(tick, _)| tick + 1)
            .collect();
        assert_eq!(exits, vec![3]);
    }

    #[test]
    fn test_process_name_matches() {
        assert!(process_name_matches("csgo", "csgo"));
        assert!(!process_name_matches("cs2", "csgo"));
        assert!(!process_name_matches("csgo_helper", "csgo"));

        if cfg!(windows) {
            assert!(process_name_matches("csgo.exe", "csgo"));
            assert!(process_name_matches("CSGO.EXE", "csgo"));
            assert!(process_name_matches("csgo", "csgo.exe"));
        } else {
            assert!(!process_name_matches("CSGO", "csgo"));
        }
    }

    #[test]
    fn test_strip_exe() {
        assert_eq!(strip_exe("csgo.exe"), "csgo");
        assert_eq!(strip_exe("csgo.EXE"), "csgo");
        assert_eq!(strip_exe("csgo"), "csgo");
        assert_eq!(strip_exe(".exe"), ".exe");
    }

    #[tokio::test]
    async fn test_watchdog_sends_single_exit_event() {
        let matcher = Arc::new(ScriptedMatcher {
            answers: Mutex::new(VecDeque::from(vec![true, true, false, false])),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = start_liveness_watchdog(matcher, "csgo".to_string(), Duration::from_millis(5), tx);
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        let mut exits = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, PresenceEvent::GameExited));
            exits += 1;
        }
        assert_eq!(exits, 1);
    }

    #[test]
    fn test_sysinfo_matcher_does_not_find_missing_process() {
        let matcher = SysinfoMatcher::new();
        assert!(!matcher.is_running("kz-rich-presence-no-such-process"));
    }
}
