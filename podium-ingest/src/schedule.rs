//! Refresh gating for full runs

use chrono::TimeDelta;
use podium_core::{IngestConfig, Timestamp};
use std::time::Duration;

/// Decides whether a full ingestion run is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    threshold: TimeDelta,
}

impl RefreshSchedule {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold: TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.refresh_threshold())
    }

    /// Due when never run, or when more than the threshold has passed.
    /// A last-run time in the future is treated as recent.
    pub fn is_due(&self, last: Option<Timestamp>, now: Timestamp) -> bool {
        match last {
            None => true,
            Some(last) => now.signed_duration_since(last) > self.threshold,
        }
    }
}
