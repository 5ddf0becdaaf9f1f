// ⚙️ Match Configuration - every knob of one matching run
//
// Loaded from JSON (every field optional, defaults below) and validated once when
// the matcher is built. Matching never re-checks these values.

use crate::error::ConfigError;
use crate::index::BucketStrategy;
use crate::similarity::ScorerBackend;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// QUALITY TARGETS
// ============================================================================

/// Run-level thresholds that raise quality alerts (never change results)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityTargets {
    /// Minimum expected match rate, in percent
    pub target_match_rate: f64,

    /// Review queue size that deserves attention
    pub high_review_count_alert: usize,
}

impl Default for QualityTargets {
    fn default() -> Self {
        QualityTargets {
            target_match_rate: 70.0,
            high_review_count_alert: 100,
        }
    }
}

// ============================================================================
// MATCH CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Minimum fuzzy score accepted by the Fuzzy tier (default: 0.60)
    pub confidence_threshold: f64,

    /// Best of ratio / token-set / token-sort / partial instead of plain ratio
    pub use_token_fuzzy: bool,

    /// Also search former names and DBAs
    pub use_variants: bool,

    /// Carry known-good previous matches forward unchanged
    pub protect_known_good: bool,

    /// Strip footnote markers and note parentheticals from roster names
    pub cleanup_names: bool,

    pub bucket_strategy: BucketStrategy,

    pub scorer: ScorerBackend,

    /// Fuzzy results whose lead over the runner-up is below this need review
    pub ambiguity_margin: Option<f64>,

    /// Fuzzy results below this confidence need review (default: 0.90)
    pub review_threshold: f64,

    /// Previous matches at or above this confidence are known-good (default: 0.95)
    pub known_good_confidence: f64,

    pub targets: QualityTargets,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            confidence_threshold: 0.60,
            use_token_fuzzy: false,
            use_variants: false,
            protect_known_good: true,
            cleanup_names: false,
            bucket_strategy: BucketStrategy::FirstChar,
            scorer: ScorerBackend::Levenshtein,
            ambiguity_margin: None,
            review_threshold: 0.90,
            known_good_confidence: 0.95,
            targets: QualityTargets::default(),
        }
    }
}

impl MatchConfig {
    /// Load config from a JSON file (missing fields take their defaults)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: MatchConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Check every threshold is a probability and the margin is non-negative
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval("confidence_threshold", self.confidence_threshold)?;
        check_unit_interval("review_threshold", self.review_threshold)?;
        check_unit_interval("known_good_confidence", self.known_good_confidence)?;

        if let Some(margin) = self.ambiguity_margin {
            if !margin.is_finite() || margin < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "ambiguity_margin",
                    reason: format!("must be a non-negative number, got {}", margin),
                });
            }
        }

        if !self.targets.target_match_rate.is_finite()
            || !(0.0..=100.0).contains(&self.targets.target_match_rate)
        {
            return Err(ConfigError::InvalidValue {
                field: "target_match_rate",
                reason: format!(
                    "must be a percentage in [0, 100], got {}",
                    self.targets.target_match_rate
                ),
            });
        }

        Ok(())
    }
}

fn check_unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be in [0, 1], got {}", value),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = MatchConfig::default();

        assert_eq!(config.confidence_threshold, 0.60);
        assert!(!config.use_token_fuzzy);
        assert!(!config.use_variants);
        assert!(config.protect_known_good);
        assert_eq!(config.bucket_strategy, BucketStrategy::FirstChar);
        assert_eq!(config.review_threshold, 0.90);
        assert_eq!(config.targets.target_match_rate, 70.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: MatchConfig = serde_json::from_str(
            r#"{"use_variants": true, "bucket_strategy": "hybrid", "scorer": "indel"}"#,
        )
        .unwrap();

        assert!(config.use_variants);
        assert_eq!(config.bucket_strategy, BucketStrategy::Hybrid);
        assert_eq!(config.scorer, ScorerBackend::Indel);
        assert_eq!(config.confidence_threshold, 0.60);
        assert_eq!(config.targets.high_review_count_alert, 100);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = MatchConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "confidence_threshold", .. })
        ));

        let config = MatchConfig {
            ambiguity_margin: Some(-0.1),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "ambiguity_margin", .. })
        ));

        let config = MatchConfig {
            review_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"confidence_threshold": 0.75, "ambiguity_margin": 0.05}}"#).unwrap();

        let config = MatchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.confidence_threshold, 0.75);
        assert_eq!(config.ambiguity_margin, Some(0.05));
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"known_good_confidence": 2.0}}"#).unwrap();

        assert!(MatchConfig::from_file(file.path()).is_err());
        assert!(MatchConfig::from_file("/nonexistent/config.json").is_err());
    }
}
