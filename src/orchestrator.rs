// 🏭 Batch Orchestrator - match a whole roster against one directory snapshot
//
// Per record, in order:
// 1. Protection Gate   known-good previous match → carried forward unchanged
// 2. Manual overrides  curated name → CRD (Tier 0)
// 3. Tiered matcher    best tier over the record's name variants
//
// The candidate index is built once before any record is matched and only read
// afterwards. One record failing never aborts the batch: a panic inside matching is
// caught, logged, and downgraded to unmatched + needs_review.

use crate::config::MatchConfig;
use crate::entities::{Directory, SourceFirmRecord};
use crate::error::MatchError;
use crate::index::{CandidateIndex, SharedIndex};
use crate::matcher::{MatchResult, TieredMatcher};
use crate::overrides::OverrideMap;
use crate::protection::ProtectionGate;
use crate::similarity::{Similarity, SimilarityScorer};
use crate::summary::{MatchSummary, Resolution};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
const PROGRESS_INTERVAL: usize = 100;

// ============================================================================
// MATCH RUN
// ============================================================================

/// Output of one `match_all` pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRun {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Fingerprint of the directory snapshot the run matched against
    pub directory_fingerprint: String,

    /// One result per roster record, in roster order
    pub results: Vec<MatchResult>,

    /// How each result was produced (aligned with `results`)
    pub resolutions: Vec<Resolution>,

    pub summary: MatchSummary,

    /// Quality targets this run missed
    #[serde(default)]
    pub alerts: Vec<String>,
}

impl MatchRun {
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}

// ============================================================================
// FIRM MATCHER
// ============================================================================

pub struct FirmMatcher {
    config: MatchConfig,
    similarity: Similarity,
    gate: ProtectionGate,
    overrides: OverrideMap,
}

impl FirmMatcher {
    /// Build a matcher; the configuration is validated once here
    pub fn new(config: MatchConfig) -> Result<Self, MatchError> {
        config.validate()?;

        Ok(FirmMatcher {
            similarity: Similarity::from_backend(config.scorer, config.use_token_fuzzy),
            gate: ProtectionGate::from_config(&config),
            overrides: OverrideMap::new(),
            config,
        })
    }

    /// Builder pattern: attach manual overrides
    ///
    /// Override names are re-keyed to match how roster names are cleaned.
    pub fn with_overrides(mut self, overrides: OverrideMap) -> Self {
        self.overrides = overrides.with_cleanup_mode(self.config.cleanup_names);
        self
    }

    /// Builder pattern: replace the similarity backend
    pub fn with_scorer(mut self, scorer: Box<dyn SimilarityScorer>) -> Self {
        self.similarity = Similarity::new(scorer, self.config.use_token_fuzzy);
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Build the index for `directory` and match every record against it
    pub fn match_all(&self, records: &[SourceFirmRecord], directory: &Directory) -> MatchRun {
        let index = CandidateIndex::build(directory);
        self.match_all_with_index(records, &index)
    }

    /// Match against the current snapshot of a hot-reloadable index
    ///
    /// The snapshot is held for the whole batch; a concurrent reload only affects
    /// later batches.
    pub fn match_all_shared(&self, records: &[SourceFirmRecord], shared: &SharedIndex) -> MatchRun {
        let index = shared.current();
        self.match_all_with_index(records, &index)
    }

    /// Match every record against a prebuilt index
    pub fn match_all_with_index(&self, records: &[SourceFirmRecord], index: &CandidateIndex) -> MatchRun {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();

        info!(
            "Run {}: matching {} roster firms against {} directory firms \
             (variants: {}, token fuzzy: {}, protection: {}, bucket: {}, scorer: {})",
            run_id,
            records.len(),
            index.len(),
            self.config.use_variants,
            self.config.use_token_fuzzy,
            self.gate.is_enabled(),
            self.config.bucket_strategy.as_str(),
            self.similarity.backend_name()
        );

        let resolved = self.resolve_batch(records, index);
        let (results, resolutions): (Vec<MatchResult>, Vec<Resolution>) = resolved.into_iter().unzip();

        let summary = MatchSummary::from_results(results.iter().zip(resolutions.iter().copied()));

        if summary.protected > 0 {
            info!("Protected {} known-good matches", summary.protected);
        }
        info!("{}", summary.summary());

        let alerts = summary.quality_alerts(&self.config.targets);
        for alert in &alerts {
            warn!("{}", alert);
        }

        MatchRun {
            run_id,
            started_at,
            completed_at: Utc::now(),
            directory_fingerprint: index.fingerprint().to_string(),
            results,
            resolutions,
            summary,
            alerts,
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn resolve_batch(&self, records: &[SourceFirmRecord], index: &CandidateIndex) -> Vec<(MatchResult, Resolution)> {
        records
            .iter()
            .enumerate()
            .map(|(position, record)| {
                if position > 0 && position % PROGRESS_INTERVAL == 0 {
                    debug!("Matched {}/{} roster firms", position, records.len());
                }
                self.resolve_isolated(position, record, index)
            })
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn resolve_batch(&self, records: &[SourceFirmRecord], index: &CandidateIndex) -> Vec<(MatchResult, Resolution)> {
        debug!("Matching in parallel on {} threads", rayon::current_num_threads());
        records
            .par_iter()
            .enumerate()
            .map(|(position, record)| self.resolve_isolated(position, record, index))
            .collect()
    }

    /// Result for one record: protection, then overrides, then the match tiers
    pub fn resolve(&self, record: &SourceFirmRecord, index: &CandidateIndex) -> MatchResult {
        self.resolve_with_source(record, index).0
    }

    /// Match one free-text name (no protection, no variants)
    pub fn match_name(&self, name: &str, index: &CandidateIndex) -> MatchResult {
        self.resolve(&SourceFirmRecord::new(name), index)
    }

    fn resolve_with_source(&self, record: &SourceFirmRecord, index: &CandidateIndex) -> (MatchResult, Resolution) {
        if let Some(existing) = self.gate.resolve(record) {
            return (existing, Resolution::Protected);
        }

        if let Some(manual) = record
            .primary_name
            .as_deref()
            .and_then(|name| self.overrides.lookup(name))
        {
            return (manual.to_result(), Resolution::Override);
        }

        let matcher = TieredMatcher::new(index, &self.similarity, &self.config);
        (matcher.match_record(record), Resolution::Matched)
    }

    fn resolve_isolated(
        &self,
        position: usize,
        record: &SourceFirmRecord,
        index: &CandidateIndex,
    ) -> (MatchResult, Resolution) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.resolve_with_source(record, index))) {
            Ok(resolved) => resolved,
            Err(payload) => {
                warn!(
                    "Matching failed for roster record {} ({:?}): {}",
                    position,
                    record.display_name(),
                    panic_message(payload.as_ref())
                );
                (MatchResult::unmatched(), Resolution::Failed)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityTargets;
    use crate::entities::DirectoryEntry;
    use crate::error::ConfigError;
    use crate::matcher::{MatchMethod, MatchedVariant};
    use crate::overrides::ManualOverride;

    fn create_test_directory(entries: &[(&str, i64)]) -> Directory {
        Directory::from_entries(entries.iter().map(|&(name, crd)| DirectoryEntry::new(name, crd)))
            .unwrap()
    }

    fn create_test_matcher() -> FirmMatcher {
        FirmMatcher::new(MatchConfig::default()).unwrap()
    }

    fn existing_match(crd_id: i64, confidence: f64, method: MatchMethod) -> MatchResult {
        MatchResult {
            crd_id: Some(crd_id),
            matched_name: Some(format!("Firm {}", crd_id)),
            confidence: Some(confidence),
            method,
            needs_review: false,
            matched_variant: None,
            top2_confidence: None,
            confidence_margin: None,
        }
    }

    /// Scorer that panics on one specific name
    struct PanickingScorer;

    impl SimilarityScorer for PanickingScorer {
        fn ratio(&self, a: &str, b: &str) -> f64 {
            if a.contains("boom") || b.contains("boom") {
                panic!("scorer exploded");
            }
            strsim::normalized_levenshtein(a, b)
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    #[test]
    fn test_scenario_a_exact() {
        let directory = create_test_directory(&[("Acme Capital LLC", 100)]);
        let run = create_test_matcher().match_all(&[SourceFirmRecord::new("acme capital llc")], &directory);

        let result = &run.results[0];
        assert_eq!(result.crd_id, Some(100));
        assert_eq!(result.method, MatchMethod::Exact);
        assert_eq!(result.confidence, Some(1.0));
        assert!(!result.needs_review);
    }

    #[test]
    fn test_scenario_b_base_name() {
        let directory = create_test_directory(&[("Beta Wealth Management", 200)]);
        let run = create_test_matcher()
            .match_all(&[SourceFirmRecord::new("Beta Wealth Management LLC")], &directory);

        let result = &run.results[0];
        assert_eq!(result.crd_id, Some(200));
        assert_eq!(result.method, MatchMethod::BaseName);
        assert_eq!(result.confidence, Some(0.85));
    }

    #[test]
    fn test_scenario_c_unmatched() {
        let directory = create_test_directory(&[("Gamma Partners", 300)]);
        let run = create_test_matcher().match_all(&[SourceFirmRecord::new("Zzzzz Unrelated Firm")], &directory);

        let result = &run.results[0];
        assert_eq!(result.crd_id, None);
        assert_eq!(result.method, MatchMethod::Unmatched);
        assert!(result.needs_review);
    }

    #[test]
    fn test_scenario_d_variant_match() {
        let directory = create_test_directory(&[("Old Co", 400)]);
        let record = SourceFirmRecord::new("New Co").with_former_names(vec!["Old Co"]);

        let with_variants = FirmMatcher::new(MatchConfig {
            use_variants: true,
            ..Default::default()
        })
        .unwrap();
        let result = &with_variants.match_all(std::slice::from_ref(&record), &directory).results[0];
        assert_eq!(result.crd_id, Some(400));
        assert_eq!(result.method, MatchMethod::NormalizedExact);
        assert_eq!(result.matched_variant, Some(MatchedVariant::FormerName));

        let result = &create_test_matcher().match_all(&[record], &directory).results[0];
        assert_eq!(result.method, MatchMethod::Unmatched);
    }

    #[test]
    fn test_scenario_e_protection() {
        let directory = create_test_directory(&[("Completely Different Firm", 600)]);
        let existing = existing_match(500, 0.97, MatchMethod::Fuzzy);
        let record = SourceFirmRecord::new("Renamed Advisors").with_existing_match(existing.clone());

        let run = create_test_matcher().match_all(&[record], &directory);
        assert_eq!(run.results[0], existing);
        assert_eq!(run.resolutions[0], Resolution::Protected);
        assert_eq!(run.summary.protected, 1);
    }

    #[test]
    fn test_protection_survives_directory_changes() {
        let mut directory = create_test_directory(&[("Acme Capital LLC", 100), ("Beta Partners", 200)]);
        let record = SourceFirmRecord::new("Acme Capital LLC")
            .with_existing_match(existing_match(100, 1.0, MatchMethod::Exact));
        let matcher = create_test_matcher();

        let first = matcher.resolve(&record, &CandidateIndex::build(&directory));

        directory.remove(100);
        directory.push(DirectoryEntry::new("Acme Capital LLC", 999)).unwrap();
        let second = matcher.resolve(&record, &CandidateIndex::build(&directory));

        assert_eq!(first, second);
        assert_eq!(second.crd_id, Some(100));
    }

    #[test]
    fn test_weak_existing_match_is_rematched() {
        let directory = create_test_directory(&[("Acme Capital LLC", 100)]);
        let record = SourceFirmRecord::new("Acme Capital LLC")
            .with_existing_match(existing_match(42, 0.70, MatchMethod::Fuzzy));

        let run = create_test_matcher().match_all(&[record], &directory);
        assert_eq!(run.results[0].crd_id, Some(100));
        assert_eq!(run.resolutions[0], Resolution::Matched);
    }

    #[test]
    fn test_protection_disabled() {
        let directory = create_test_directory(&[("Acme Capital LLC", 100)]);
        let record = SourceFirmRecord::new("Acme Capital LLC")
            .with_existing_match(existing_match(42, 1.0, MatchMethod::Exact));
        let matcher = FirmMatcher::new(MatchConfig {
            protect_known_good: false,
            ..Default::default()
        })
        .unwrap();

        let run = matcher.match_all(&[record], &directory);
        assert_eq!(run.results[0].crd_id, Some(100));
    }

    #[test]
    fn test_override_beats_tiers_but_not_protection() {
        let directory = create_test_directory(&[("Acme Capital LLC", 100)]);
        let overrides = OverrideMap::from_overrides(
            vec![ManualOverride::new("Acme Capital LLC", 42).with_fintrx_name("Acme Curated")],
            false,
        );
        let matcher = create_test_matcher().with_overrides(overrides);

        let plain = SourceFirmRecord::new("ACME CAPITAL LLC");
        let protected = SourceFirmRecord::new("Acme Capital LLC")
            .with_existing_match(existing_match(100, 1.0, MatchMethod::Exact));

        let run = matcher.match_all(&[plain, protected], &directory);
        assert_eq!(run.results[0].crd_id, Some(42));
        assert_eq!(run.results[0].method, MatchMethod::Manual);
        assert_eq!(run.results[0].matched_variant, Some(MatchedVariant::Override));
        assert_eq!(run.results[1].crd_id, Some(100));
        assert_eq!(run.resolutions, vec![Resolution::Override, Resolution::Protected]);
        assert_eq!(run.summary.overrides, 1);
    }

    #[test]
    fn test_overrides_follow_config_cleanup_mode() {
        let directory = create_test_directory(&[("Acme Capital LLC", 100)]);
        let overrides = OverrideMap::from_overrides(vec![ManualOverride::new("Smith & Jones", 500)], false);
        let matcher = FirmMatcher::new(MatchConfig {
            cleanup_names: true,
            ..Default::default()
        })
        .unwrap()
        .with_overrides(overrides);

        let run = matcher.match_all(&[SourceFirmRecord::new("*Smith & Jones")], &directory);
        assert_eq!(run.results[0].crd_id, Some(500));
        assert_eq!(run.results[0].method, MatchMethod::Manual);
        assert_eq!(run.resolutions, vec![Resolution::Override]);
    }

    #[test]
    fn test_blank_records_do_not_abort_batch() {
        let directory = create_test_directory(&[("Acme Capital LLC", 100)]);
        let records = vec![
            SourceFirmRecord::unnamed(),
            SourceFirmRecord::new("   "),
            SourceFirmRecord::new("Acme Capital LLC"),
        ];

        let run = create_test_matcher().match_all(&records, &directory);
        assert_eq!(run.results.len(), 3);
        assert_eq!(run.results[0].method, MatchMethod::Unmatched);
        assert_eq!(run.results[1].method, MatchMethod::Unmatched);
        assert_eq!(run.results[2].crd_id, Some(100));
        assert_eq!(run.summary.failed, 0);
    }

    #[test]
    fn test_empty_directory() {
        let run = create_test_matcher().match_all(&[SourceFirmRecord::new("Acme")], &Directory::new());

        assert_eq!(run.results, vec![MatchResult::unmatched()]);
        assert_eq!(run.summary.match_rate, 0.0);
    }

    #[test]
    fn test_panicking_record_is_isolated() {
        let directory = create_test_directory(&[("Acme Capital LLC", 100), ("Boomer Advisors", 200)]);
        let matcher = create_test_matcher().with_scorer(Box::new(PanickingScorer));
        let records = vec![
            SourceFirmRecord::new("Boom Capital"),
            SourceFirmRecord::new("Acme Capital LLC"),
        ];

        let run = matcher.match_all(&records, &directory);
        assert_eq!(run.results[0], MatchResult::unmatched());
        assert_eq!(run.resolutions[0], Resolution::Failed);
        assert_eq!(run.results[1].crd_id, Some(100));
        assert_eq!(run.summary.failed, 1);
    }

    #[test]
    fn test_results_stay_aligned_with_roster_order() {
        let directory = create_test_directory(&[
            ("Acme Capital LLC", 100),
            ("Beta Wealth Management", 200),
            ("Gamma Partners", 300),
        ]);
        let records: Vec<SourceFirmRecord> = ["Gamma Partners", "Nobody", "Acme Capital LLC", "Beta Wealth Management"]
            .iter()
            .map(|name| SourceFirmRecord::new(*name))
            .collect();

        let run = create_test_matcher().match_all(&records, &directory);
        let ids: Vec<Option<i64>> = run.results.iter().map(|r| r.crd_id).collect();
        assert_eq!(ids, vec![Some(300), None, Some(100), Some(200)]);
        assert_eq!(run.summary.total, 4);
        assert_eq!(run.summary.matched, 3);
    }

    #[test]
    fn test_run_metadata_and_alerts() {
        let directory = create_test_directory(&[("Acme Capital LLC", 100)]);
        let matcher = FirmMatcher::new(MatchConfig {
            targets: QualityTargets {
                target_match_rate: 70.0,
                high_review_count_alert: 0,
            },
            ..Default::default()
        })
        .unwrap();

        let run = matcher.match_all(&[SourceFirmRecord::new("Nobody Here")], &directory);
        assert_eq!(run.run_id.len(), 36);
        assert!(run.completed_at >= run.started_at);
        assert!(run.duration_ms() >= 0);
        assert_eq!(run.directory_fingerprint, directory.fingerprint());
        assert_eq!(run.alerts.len(), 2);
    }

    #[test]
    fn test_shared_index_snapshot() {
        let mut directory = create_test_directory(&[("Acme Capital LLC", 100)]);
        let shared = SharedIndex::new(&directory);
        let matcher = create_test_matcher();
        let records = [SourceFirmRecord::new("Delta Advisors")];

        assert_eq!(matcher.match_all_shared(&records, &shared).results[0].method, MatchMethod::Unmatched);

        directory.push(DirectoryEntry::new("Delta Advisors", 700)).unwrap();
        assert!(shared.reload(&directory));
        assert_eq!(matcher.match_all_shared(&records, &shared).results[0].crd_id, Some(700));
    }

    #[test]
    fn test_match_name() {
        let directory = create_test_directory(&[("Acme Capital LLC", 100)]);
        let index = CandidateIndex::build(&directory);

        let result = create_test_matcher().match_name("Acme Capital, LLC", &index);
        assert_eq!(result.method, MatchMethod::Exact);
        assert_eq!(result.crd_id, Some(100));
        assert_eq!(result.confidence, Some(1.0));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = FirmMatcher::new(MatchConfig {
            confidence_threshold: -0.5,
            ..Default::default()
        });

        assert!(matches!(
            result,
            Err(MatchError::Config(ConfigError::InvalidValue { field: "confidence_threshold", .. }))
        ));
    }

    #[test]
    fn test_run_serializes_to_json() {
        let directory = create_test_directory(&[("Acme Capital LLC", 100)]);
        let run = create_test_matcher().match_all(&[SourceFirmRecord::new("Acme Capital LLC")], &directory);

        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["results"][0]["method"], "exact");
        assert_eq!(json["results"][0]["matched_variant"], "firm_name");
        assert_eq!(json["resolutions"][0], "matched");
    }
}
