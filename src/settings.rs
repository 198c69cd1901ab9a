//! Runtime settings
//!
//! Everything here is about running a match (seed, services, limits), not
//! gameplay tuning; gameplay constants live in `crate::consts`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Simulation seed (same seed + same inputs = same match)
    pub seed: u64,

    // === Director service ===
    /// Base URL of the tuning/coach service
    pub tuning_url: String,
    /// Credential for the tuning service; without one every request falls back
    pub tuning_key: Option<String>,
    /// Seconds between director polls
    pub director_interval_secs: u64,
    /// Per-request timeout
    pub tuning_timeout_ms: u64,

    // === Headless runner ===
    /// Stop the match after this many ticks (0 = run until it ends)
    pub max_ticks: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 0x5EED_F057,
            tuning_url: "http://127.0.0.1:8787".to_string(),
            tuning_key: None,
            director_interval_secs: 12,
            tuning_timeout_ms: 4000,
            max_ticks: 60 * 60 * 5,
        }
    }
}

impl Settings {
    /// Defaults overridden by `FROSTBITE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns; unparsable values are
    /// ignored with a warning
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(seed) = parse_var(&lookup, "FROSTBITE_SEED") {
            settings.seed = seed;
        }
        if let Some(url) = lookup("FROSTBITE_TUNING_URL").filter(|v| !v.trim().is_empty()) {
            settings.tuning_url = url.trim().to_string();
        }
        if let Some(key) = lookup("FROSTBITE_TUNING_KEY").filter(|v| !v.trim().is_empty()) {
            settings.tuning_key = Some(key.trim().to_string());
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "FROSTBITE_DIRECTOR_INTERVAL_SECS") {
            settings.director_interval_secs = secs.max(1);
        }
        if let Some(ms) = parse_var(&lookup, "FROSTBITE_TUNING_TIMEOUT_MS") {
            settings.tuning_timeout_ms = ms;
        }
        if let Some(ticks) = parse_var(&lookup, "FROSTBITE_MAX_TICKS") {
            settings.max_ticks = ticks;
        }
        settings
    }

    pub fn director_interval(&self) -> Duration {
        Duration::from_secs(self.director_interval_secs)
    }

    pub fn tuning_timeout(&self) -> Duration {
        Duration::from_millis(self.tuning_timeout_ms)
    }

    /// Whether director requests can succeed at all
    pub fn has_tuning_service(&self) -> bool {
        self.tuning_key.is_some()
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}
