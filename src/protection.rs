// 🛡️ Protection Gate - never regress a confirmed match
//
// A previous match is KNOWN-GOOD when it has a CRD ID and either
// - confidence ≥ 0.95 (configurable), or
// - method ∈ {exact, normalized_exact, manual}
//
// Known-good matches are returned unchanged and matching is skipped for that record,
// so re-running the pipeline against a changed directory cannot alter them.

use crate::config::MatchConfig;
use crate::entities::SourceFirmRecord;
use crate::matcher::{MatchMethod, MatchResult};

/// Whether a previous match is trusted enough to carry forward
pub fn is_known_good(existing: Option<&MatchResult>, known_good_confidence: f64) -> bool {
    let Some(existing) = existing else {
        return false;
    };

    if existing.crd_id.is_none() {
        return false;
    }

    let confident = existing
        .confidence
        .map_or(false, |confidence| confidence >= known_good_confidence);

    let trusted_method = matches!(
        existing.method,
        MatchMethod::Exact | MatchMethod::NormalizedExact | MatchMethod::Manual
    );

    confident || trusted_method
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtectionGate {
    enabled: bool,
    known_good_confidence: f64,
}

impl ProtectionGate {
    pub fn new(enabled: bool, known_good_confidence: f64) -> Self {
        ProtectionGate {
            enabled,
            known_good_confidence,
        }
    }

    pub fn from_config(config: &MatchConfig) -> Self {
        ProtectionGate::new(config.protect_known_good, config.known_good_confidence)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The record's previous match, if it must be carried forward
    pub fn resolve(&self, record: &SourceFirmRecord) -> Option<MatchResult> {
        if !self.enabled {
            return None;
        }

        let existing = record.existing_match.as_ref();
        if is_known_good(existing, self.known_good_confidence) {
            existing.cloned()
        } else {
            None
        }
    }
}

impl Default for ProtectionGate {
    fn default() -> Self {
        ProtectionGate::from_config(&MatchConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
