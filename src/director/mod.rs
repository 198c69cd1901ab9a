//! External tuning director and coach
//!
//! A remote service periodically retunes the match (difficulty, ambience,
//! a HUD line) and writes one line of feedback when a match ends. Every
//! failure turns into a fixed fallback; nothing here can stall or fail the
//! simulation.

use std::future::Future;

use serde::{Deserialize, Serialize};

pub mod http;
pub mod task;

pub use http::HttpTuningService;
pub use task::DirectorTask;

/// Line shown when the coach service is unavailable
pub const FALLBACK_COACH_LINE: &str = "Even the strongest ice cracks under pressure. Rise again.";

/// Lives hint sent with every director request (the service sees no live value)
pub const DIRECTOR_LIVES_HINT: u32 = 3;

/// Tuning snapshot, replaced wholesale on every update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorConfig {
    /// Ambient light level, 0.1 to 1.0
    pub lighting_intensity: f32,
    /// Fog alpha, 0.0 to 0.7
    pub fog_density: f32,
    /// Snow particles per frame, 1 to 10
    pub snow_rate: f32,
    /// Enemy speed multiplier, 1.0 to 2.5
    pub difficulty: f32,
    /// Flavor text for the HUD
    pub message: String,
}

impl DirectorConfig {
    pub fn fallback() -> Self {
        Self {
            lighting_intensity: 0.5,
            fog_density: 0.2,
            snow_rate: 2.0,
            difficulty: 1.0,
            message: "The storm rages on...".to_string(),
        }
    }

    /// Pull every field into its documented range
    ///
    /// Non-finite values take the fallback's value for that field.
    pub fn clamped(self) -> Self {
        let base = Self::fallback();
        let fit = |value: f32, default: f32, lo: f32, hi: f32| {
            if value.is_finite() { value.clamp(lo, hi) } else { default }
        };
        Self {
            lighting_intensity: fit(self.lighting_intensity, base.lighting_intensity, 0.1, 1.0),
            fog_density: fit(self.fog_density, base.fog_density, 0.0, 0.7),
            snow_rate: fit(self.snow_rate, base.snow_rate, 1.0, 10.0),
            difficulty: fit(self.difficulty, base.difficulty, 1.0, 2.5),
            message: self.message,
        }
    }
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self::fallback()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorRequest {
    pub score: u64,
    pub lives: u32,
    /// Always zero; the service is not told the elapsed time
    pub seconds_played: u32,
}

impl DirectorRequest {
    pub fn for_score(score: u64) -> Self {
        Self {
            score,
            lives: DIRECTOR_LIVES_HINT,
            seconds_played: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachRequest {
    pub reason: String,
    pub score: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("No tuning service credential configured")]
    MissingCredential,

    #[error("Tuning service is offline")]
    Offline,

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("Tuning service returned status {0}")]
    Status(u16),

    #[error(transparent)]
    Parse(#[from] serde_json::Error),

    #[error("Tuning service returned an empty response")]
    Empty,
}

/// Remote tuning backend
pub trait TuningService: Send + Sync + 'static {
    fn director_update(
        &self,
        request: &DirectorRequest,
    ) -> impl Future<Output = Result<DirectorConfig, ServiceError>> + Send;

    fn coach_feedback(
        &self,
        request: &CoachRequest,
    ) -> impl Future<Output = Result<String, ServiceError>> + Send;
}

/// Backend used when no service is configured; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTuningService;

impl TuningService for OfflineTuningService {
    async fn director_update(&self, _request: &DirectorRequest) -> Result<DirectorConfig, ServiceError> {
        Err(ServiceError::Offline)
    }

    async fn coach_feedback(&self, _request: &CoachRequest) -> Result<String, ServiceError> {
        Err(ServiceError::Offline)
    }
}

/// Fetch a new tuning snapshot, falling back on any failure
pub async fn director_update_or_fallback<S: TuningService>(service: &S, score: u64) -> DirectorConfig {
    match service.director_update(&DirectorRequest::for_score(score)).await {
        Ok(config) => config.clamped(),
        Err(e) => {
            log::warn!("Director update failed, using fallback: {}", e);
            DirectorConfig::fallback()
        }
    }
}

/// One line of end-of-match feedback, falling back on any failure
pub async fn coach_feedback_or_fallback<S: TuningService>(service: &S, reason: &str, score: u64) -> String {
    let request = CoachRequest {
        reason: reason.to_string(),
        score,
    };
    match service.coach_feedback(&request).await {
        Ok(line) if !line.trim().is_empty() => line.trim().to_string(),
        Ok(_) => {
            log::warn!("Coach returned nothing, using fallback");
            FALLBACK_COACH_LINE.to_string()
        }
        Err(e) => {
            log::warn!("Coach feedback failed, using fallback: {}", e);
            FALLBACK_COACH_LINE.to_string()
        }
    }
}
