// 📊 Match Summary - run-level statistics and quality alerts

use crate::config::QualityTargets;
use crate::matcher::{MatchMethod, MatchResult, MatchedVariant};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// RESOLUTION
// ============================================================================

/// How a record's result was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Known-good previous match carried forward
    Protected,

    /// Manual override (Tier 0)
    Override,

    /// Matching tiers ran (matched or not)
    Matched,

    /// Matching failed unexpectedly; downgraded to unmatched
    Failed,
}

// ============================================================================
// MATCH SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub total: usize,
    pub matched: usize,

    /// Percentage of records with a CRD ID
    pub match_rate: f64,

    pub by_method: BTreeMap<MatchMethod, usize>,
    pub needs_review: usize,
    pub by_variant: BTreeMap<MatchedVariant, usize>,

    pub protected: usize,
    pub overrides: usize,
    pub failed: usize,
}

impl MatchSummary {
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = (&'a MatchResult, Resolution)>,
    {
        let mut summary = MatchSummary::default();

        for (result, resolution) in results {
            summary.total += 1;

            if result.is_matched() {
                summary.matched += 1;
            }
            if result.needs_review {
                summary.needs_review += 1;
            }

            *summary.by_method.entry(result.method).or_insert(0) += 1;
            if let Some(variant) = result.matched_variant {
                *summary.by_variant.entry(variant).or_insert(0) += 1;
            }

            match resolution {
                Resolution::Protected => summary.protected += 1,
                Resolution::Override => summary.overrides += 1,
                Resolution::Failed => summary.failed += 1,
                Resolution::Matched => {}
            }
        }

        summary.match_rate = if summary.total == 0 {
            0.0
        } else {
            summary.matched as f64 / summary.total as f64 * 100.0
        };

        summary
    }

    pub fn method_count(&self, method: MatchMethod) -> usize {
        self.by_method.get(&method).copied().unwrap_or(0)
    }

    pub fn variant_count(&self, variant: MatchedVariant) -> usize {
        self.by_variant.get(&variant).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> String {
        let methods = self
            .by_method
            .iter()
            .map(|(method, count)| format!("{} {}", count, method))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "{} firms: {} matched ({:.1}%) | {} | {} need review, {} protected, {} overrides, {} failed",
            self.total,
            self.matched,
            self.match_rate,
            if methods.is_empty() { "no results".to_string() } else { methods },
            self.needs_review,
            self.protected,
            self.overrides,
            self.failed
        )
    }

    /// Human-readable alerts for targets this run missed
    pub fn quality_alerts(&self, targets: &QualityTargets) -> Vec<String> {
        let mut alerts = Vec::new();

        if self.total > 0 && self.match_rate < targets.target_match_rate {
            alerts.push(format!(
                "Low match rate: {:.1}% (target: {:.1}%)",
                self.match_rate, targets.target_match_rate
            ));
        }

        if self.needs_review > targets.high_review_count_alert {
            alerts.push(format!(
                "High review count: {} firms need manual review (alert above {})",
                self.needs_review, targets.high_review_count_alert
            ));
        }

        alerts
    }
}

// ============================================================================
// TESTS
// ============================================================================
