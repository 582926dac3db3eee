use crate::persistence::store::CharacterStore;
use crate::zone::state::ZoneState;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    pub interval_seconds: u64,
}

impl AutosaveConfig {
    pub fn interval(self) -> Option<Duration> {
        if self.interval_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.interval_seconds))
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutosaveState {
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl AutosaveState {
    pub fn new(config: AutosaveConfig, now: Instant) -> Self {
        let interval = config.interval();
        let next_due = interval.map(|interval| now + interval);
        Self { interval, next_due }
    }

    pub fn due(&self, now: Instant) -> bool {
        self.next_due.is_some_and(|next| now >= next)
    }

    pub fn mark_saved(&mut self, now: Instant) {
        if let Some(interval) = self.interval {
            self.next_due = Some(now + interval);
        }
    }
}

#[derive(Debug, Default)]
pub struct AutosaveReport {
    pub saved: usize,
    pub errors: Vec<String>,
}

/// Saves every connected character in the zone. Failures are collected,
/// one bad record does not stop the rest.
pub fn autosave_zone(state: &ZoneState, store: &dyn CharacterStore) -> AutosaveReport {
    let mut report = AutosaveReport::default();
    for record in state.character_snapshots() {
        match store.save_character(&record) {
            Ok(()) => report.saved += 1,
            Err(err) => report.errors.push(err.to_string()),
        }
    }
    report
}
