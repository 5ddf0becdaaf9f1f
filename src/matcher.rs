// 🎯 Tiered Matcher - one roster firm → one directory firm (or none)
//
// Tiers, tried in order for each name variant:
// 1. Exact            (1.00) case-insensitive normalized-name equality (primary name only)
// 2. NormalizedExact  (0.95) normalized-name equality (former names and DBAs)
// 3. BaseName         (0.85) equality after stripping the legal-entity suffix
// 4. Fuzzy            (score, capped at 0.99) best similarity in the candidate bucket
//
// A tier is only tried while the best confidence so far is below its ceiling, and a hit
// ends the search for that variant. A later variant replaces the best result only with a
// strictly higher confidence; two Fuzzy results compare by raw score. Fuzzy is never
// tried once a non-fuzzy tier has matched. Ties go to the earliest directory firm.

use crate::config::MatchConfig;
use crate::entities::{DirectoryFirm, NameVariant, SourceFirmRecord};
use crate::index::CandidateIndex;
use crate::normalize::{base_name, cleanup, normalize};
use crate::similarity::Similarity;
use serde::{Deserialize, Serialize};

// ============================================================================
// TIER CONFIDENCES
// ============================================================================

pub const EXACT_CONFIDENCE: f64 = 1.0;
pub const NORMALIZED_EXACT_CONFIDENCE: f64 = 0.95;
pub const BASE_NAME_CONFIDENCE: f64 = 0.85;

/// Fuzzy matches never report full confidence
pub const FUZZY_CEILING: f64 = 0.99;

pub const MANUAL_CONFIDENCE: f64 = 1.0;

// ============================================================================
// MATCH METHOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    NormalizedExact,
    BaseName,
    Fuzzy,
    Manual,
    Unmatched,
}

impl MatchMethod {
    /// Highest confidence the tier can report
    pub fn ceiling(&self) -> f64 {
        match self {
            MatchMethod::Exact => EXACT_CONFIDENCE,
            MatchMethod::NormalizedExact => NORMALIZED_EXACT_CONFIDENCE,
            MatchMethod::BaseName => BASE_NAME_CONFIDENCE,
            MatchMethod::Fuzzy => FUZZY_CEILING,
            MatchMethod::Manual => MANUAL_CONFIDENCE,
            MatchMethod::Unmatched => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Exact => "exact",
            MatchMethod::NormalizedExact => "normalized_exact",
            MatchMethod::BaseName => "base_name",
            MatchMethod::Fuzzy => "fuzzy",
            MatchMethod::Manual => "manual",
            MatchMethod::Unmatched => "unmatched",
        }
    }
}

impl std::str::FromStr for MatchMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(MatchMethod::Exact),
            "normalized_exact" => Ok(MatchMethod::NormalizedExact),
            "base_name" => Ok(MatchMethod::BaseName),
            "fuzzy" => Ok(MatchMethod::Fuzzy),
            "manual" => Ok(MatchMethod::Manual),
            "unmatched" | "none" | "" => Ok(MatchMethod::Unmatched),
            other => Err(format!("Unknown match method: {}", other)),
        }
    }
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MATCHED VARIANT
// ============================================================================

/// Which roster name produced the match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedVariant {
    #[serde(rename = "firm_name", alias = "primary_name")]
    PrimaryName,
    FormerName,
    Dba,
    Override,
}

impl MatchedVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchedVariant::PrimaryName => "firm_name",
            MatchedVariant::FormerName => "former_name",
            MatchedVariant::Dba => "dba",
            MatchedVariant::Override => "override",
        }
    }
}

impl std::str::FromStr for MatchedVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "firm_name" | "primary_name" => Ok(MatchedVariant::PrimaryName),
            "former_name" => Ok(MatchedVariant::FormerName),
            "dba" => Ok(MatchedVariant::Dba),
            "override" => Ok(MatchedVariant::Override),
            other => Err(format!("Unknown matched variant: {}", other)),
        }
    }
}

// ============================================================================
// MATCH RESULT
// ============================================================================

/// Outcome for one roster firm
///
/// `crd_id` is present iff `method != Unmatched`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub crd_id: Option<i64>,

    /// Directory display name of the matched firm
    pub matched_name: Option<String>,

    pub confidence: Option<f64>,

    pub method: MatchMethod,

    pub needs_review: bool,

    #[serde(default)]
    pub matched_variant: Option<MatchedVariant>,

    /// Second-best fuzzy score above the threshold (fuzzy results only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top2_confidence: Option<f64>,

    /// Lead of the winner over the runner-up (only with an ambiguity margin)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_margin: Option<f64>,
}

impl MatchResult {
    /// No directory firm matched
    pub fn unmatched() -> Self {
        MatchResult {
            crd_id: None,
            matched_name: None,
            confidence: None,
            method: MatchMethod::Unmatched,
            needs_review: true,
            matched_variant: None,
            top2_confidence: None,
            confidence_margin: None,
        }
    }

    /// Matched by a tier against `firm`
    pub fn matched(
        firm: &DirectoryFirm,
        confidence: f64,
        method: MatchMethod,
        variant: MatchedVariant,
    ) -> Self {
        MatchResult {
            crd_id: Some(firm.crd_id),
            matched_name: Some(firm.name.clone()),
            confidence: Some(confidence),
            method,
            needs_review: false,
            matched_variant: Some(variant),
            top2_confidence: None,
            confidence_margin: None,
        }
    }

    /// Curated assignment (Tier 0)
    pub fn manual(crd_id: i64, matched_name: Option<String>) -> Self {
        MatchResult {
            crd_id: Some(crd_id),
            matched_name,
            confidence: Some(MANUAL_CONFIDENCE),
            method: MatchMethod::Manual,
            needs_review: false,
            matched_variant: Some(MatchedVariant::Override),
            top2_confidence: None,
            confidence_margin: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.method != MatchMethod::Unmatched && self.crd_id.is_some()
    }
}

// ============================================================================
// BEST MATCH (accumulator across variants)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch {
    /// Position of the firm in the candidate index
    pub position: usize,

    /// Raw tier score (uncapped for Fuzzy)
    pub score: f64,

    pub method: MatchMethod,

    pub variant: MatchedVariant,

    /// Second-best fuzzy score (0.0 for non-fuzzy tiers)
    pub runner_up: f64,
}

impl BestMatch {
    fn tier(position: usize, score: f64, method: MatchMethod, variant: MatchedVariant) -> Self {
        BestMatch {
            position,
            score,
            method,
            variant,
            runner_up: 0.0,
        }
    }

    /// Reported confidence
    pub fn confidence(&self) -> f64 {
        match self.method {
            MatchMethod::Fuzzy => self.score.min(FUZZY_CEILING),
            _ => self.score,
        }
    }

    /// Strictly better than `other`: higher confidence, or a higher raw score when both
    /// are Fuzzy
    pub fn beats(&self, other: Option<&BestMatch>) -> bool {
        match other {
            None => true,
            Some(other) if self.method == MatchMethod::Fuzzy && other.method == MatchMethod::Fuzzy => {
                self.score > other.score
            }
            Some(other) => self.confidence() > other.confidence(),
        }
    }
}

/// Whether `tier` can still improve on `best`
fn worth_trying(best: Option<&BestMatch>, tier: MatchMethod) -> bool {
    match best {
        None => true,
        // every non-fuzzy hit is at or above the base-name ceiling
        Some(best) if tier == MatchMethod::Fuzzy => best.method == MatchMethod::Fuzzy,
        Some(best) => best.confidence() < tier.ceiling(),
    }
}

// ============================================================================
// QUERY KEYS
// ============================================================================

/// Comparison keys of one roster name, derived once per variant
#[derive(Debug, Clone, PartialEq)]
pub struct QueryKeys {
    pub normalized: Option<String>,
    pub base: Option<String>,
}

impl QueryKeys {
    pub fn new(name: &str, cleanup_mode: bool) -> Self {
        let cleaned;
        let name = if cleanup_mode {
            cleaned = cleanup(name);
            cleaned.as_str()
        } else {
            name
        };

        QueryKeys {
            normalized: normalize(name),
            base: base_name(name),
        }
    }
}

// ============================================================================
// TIERED MATCHER
// ============================================================================

/// Matches roster names against one index snapshot
pub struct TieredMatcher<'a> {
    index: &'a CandidateIndex,
    similarity: &'a Similarity,
    config: &'a MatchConfig,
}

impl<'a> TieredMatcher<'a> {
    pub fn new(index: &'a CandidateIndex, similarity: &'a Similarity, config: &'a MatchConfig) -> Self {
        TieredMatcher {
            index,
            similarity,
            config,
        }
    }

    /// Variant aggregator: best result over the record's name variants
    ///
    /// Variants are tried in order (primary, former names, DBAs); a later variant only
    /// replaces the best result when it strictly beats it.
    pub fn match_record(&self, record: &SourceFirmRecord) -> MatchResult {
        let mut best: Option<BestMatch> = None;

        for variant in record.variants(self.config.use_variants) {
            best = self.match_variant(variant, best);
        }

        self.finalize(best)
    }

    /// Match a single free-text name (treated as a primary name)
    pub fn match_name(&self, name: &str) -> MatchResult {
        self.match_record(&SourceFirmRecord::new(name))
    }

    /// Run the tiers for one variant, returning the (possibly unchanged) best
    pub fn match_variant(&self, variant: NameVariant<'_>, best: Option<BestMatch>) -> Option<BestMatch> {
        let keys = QueryKeys::new(variant.text, self.config.cleanup_names);

        match self.best_for_variant(&keys, variant.kind, best.as_ref()) {
            Some(found) if found.beats(best.as_ref()) => Some(found),
            _ => best,
        }
    }

    fn best_for_variant(
        &self,
        keys: &QueryKeys,
        kind: MatchedVariant,
        best: Option<&BestMatch>,
    ) -> Option<BestMatch> {
        // Tier 1: Exact (a former-name/DBA equality is reported by tier 2)
        if kind == MatchedVariant::PrimaryName && worth_trying(best, MatchMethod::Exact) {
            if let Some(position) = keys.normalized.as_deref().and_then(|k| self.index.find_normalized(k)) {
                return Some(BestMatch::tier(position, EXACT_CONFIDENCE, MatchMethod::Exact, kind));
            }
        }

        // Tier 2: NormalizedExact
        if worth_trying(best, MatchMethod::NormalizedExact) {
            if let Some(position) = keys.normalized.as_deref().and_then(|k| self.index.find_normalized(k)) {
                return Some(BestMatch::tier(
                    position,
                    NORMALIZED_EXACT_CONFIDENCE,
                    MatchMethod::NormalizedExact,
                    kind,
                ));
            }
        }

        // Tier 3: BaseName
        if worth_trying(best, MatchMethod::BaseName) {
            if let Some(position) = keys.base.as_deref().and_then(|k| self.index.find_base(k)) {
                return Some(BestMatch::tier(
                    position,
                    BASE_NAME_CONFIDENCE,
                    MatchMethod::BaseName,
                    kind,
                ));
            }
        }

        // Tier 4: Fuzzy
        if worth_trying(best, MatchMethod::Fuzzy) {
            return keys.normalized.as_deref().and_then(|q| self.fuzzy(q, kind));
        }

        None
    }

    /// Highest-scoring candidate at or above the confidence threshold
    fn fuzzy(&self, normalized_query: &str, kind: MatchedVariant) -> Option<BestMatch> {
        let threshold = self.config.confidence_threshold;
        let mut top: Option<(usize, f64)> = None;
        let mut runner_up = 0.0;

        for &position in self.index.candidates(normalized_query, self.config.bucket_strategy) {
            let firm = self.index.firm(position);
            let score = self
                .similarity
                .similarity(Some(normalized_query), firm.normalized_name.as_deref());

            match top {
                Some((_, top_score)) if score <= top_score => {
                    if score > runner_up {
                        runner_up = score;
                    }
                }
                _ => {
                    if let Some((_, previous)) = top {
                        runner_up = previous;
                    }
                    top = Some((position, score));
                }
            }
        }

        let (position, score) = top?;
        if score < threshold {
            return None;
        }

        Some(BestMatch {
            position,
            score,
            method: MatchMethod::Fuzzy,
            variant: kind,
            runner_up: if runner_up >= threshold { runner_up } else { 0.0 },
        })
    }

    /// Turn the winning tier into a result and apply the review rules
    fn finalize(&self, best: Option<BestMatch>) -> MatchResult {
        let Some(best) = best else {
            return MatchResult::unmatched();
        };

        let firm = self.index.firm(best.position);
        let mut result = MatchResult::matched(firm, best.confidence(), best.method, best.variant);

        if best.method == MatchMethod::Fuzzy {
            result.top2_confidence = Some(best.runner_up);

            if best.confidence() < self.config.review_threshold {
                result.needs_review = true;
            }

            if let Some(margin) = self.config.ambiguity_margin {
                let lead = best.score - best.runner_up;
                result.confidence_margin = Some(lead);
                if lead < margin {
                    result.needs_review = true;
                }
            }
        }

        result
    }
}

// ============================================================================
// TESTS
// ============================================================================
