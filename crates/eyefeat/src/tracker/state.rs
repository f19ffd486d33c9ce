use serde::{Deserialize, Serialize};

use super::config::TrackingConfig;
use super::record::FeatureRecord;

/// Why a frame ran the coarse pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReseedReason {
    /// Nothing analyzed since construction or the last reset.
    FirstFrame,
    /// The caller passed no previous guess.
    NoGuess,
    /// A feature was missing or its fit error exceeded the threshold.
    PoorFit,
    /// The tracked-frame budget ran out.
    Periodic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    Reseeding(ReseedReason),
    Seeded,
}

/// Cross-frame state of one tracking stream.
#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    last: Option<FeatureRecord>,
    frames_since_reseed: u32,
    poor_fit: bool,
}

impl TrackerState {
    /// Record produced by the previous `analyze` call.
    pub fn last_record(&self) -> Option<&FeatureRecord> {
        self.last.as_ref()
    }

    /// Tracked frames since the last coarse pass.
    pub fn frames_since_reseed(&self) -> u32 {
        self.frames_since_reseed
    }

    /// Whether the previous record had a missing or poorly fitted feature.
    pub fn poor_fit(&self) -> bool {
        self.poor_fit
    }

    pub fn mode(&self, guess: Option<&FeatureRecord>, config: &TrackingConfig) -> TrackingMode {
        if self.last.is_none() {
            return TrackingMode::Reseeding(ReseedReason::FirstFrame);
        }
        let Some(guess) = guess else {
            return TrackingMode::Reseeding(ReseedReason::NoGuess);
        };
        if self.poor_fit || guess.is_poor(config.reseed_threshold) {
            return TrackingMode::Reseeding(ReseedReason::PoorFit);
        }
        if self.frames_since_reseed >= config.minimum_frames_to_reseed {
            return TrackingMode::Reseeding(ReseedReason::Periodic);
        }
        TrackingMode::Seeded
    }

    pub(crate) fn advance(&mut self, record: &FeatureRecord, config: &TrackingConfig) {
        if record.path.is_reseed() {
            self.frames_since_reseed = 0;
        } else {
            self.frames_since_reseed = self.frames_since_reseed.saturating_add(1);
        }
        self.poor_fit = record.is_poor(config.reseed_threshold);
        self.last = Some(record.clone());
    }
}
