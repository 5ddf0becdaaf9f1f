// 📏 Similarity Scorer - [0, 1] similarity between two normalized names
//
// The character-level ratio comes from a backend chosen once at construction:
// - LevenshteinScorer: strsim normalized Levenshtein (default)
// - IndelScorer: pure LCS-based ratio, 2·LCS / (|a| + |b|)
//
// Token-aware mode returns the best of four heuristics built on that ratio:
// plain ratio, token-set ratio, token-sort ratio, partial (substring) ratio.
//
// Contract: symmetric, 1.0 for identical strings, 0.0 when either side is missing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// BACKEND TRAIT
// ============================================================================

/// Character-level similarity backend
pub trait SimilarityScorer: Send + Sync {
    /// Similarity ratio in [0, 1]; must be symmetric and 1.0 for equal strings
    fn ratio(&self, a: &str, b: &str) -> f64;

    /// Backend name (for logs)
    fn name(&self) -> &'static str;
}

/// Normalized Levenshtein: 1 - distance / max(|a|, |b|)
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinScorer;

impl SimilarityScorer for LevenshteinScorer {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        strsim::normalized_levenshtein(a, b)
    }

    fn name(&self) -> &'static str {
        "levenshtein"
    }
}

/// Indel ratio: 2 · LCS(a, b) / (|a| + |b|)
#[derive(Debug, Clone, Copy, Default)]
pub struct IndelScorer;

impl SimilarityScorer for IndelScorer {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        let a_chars: Vec<char> = a.chars().collect();
        let b_chars: Vec<char> = b.chars().collect();

        let total = a_chars.len() + b_chars.len();
        if total == 0 {
            return 1.0;
        }

        2.0 * lcs_length(&a_chars, &b_chars) as f64 / total as f64
    }

    fn name(&self) -> &'static str {
        "indel"
    }
}

/// Length of the longest common subsequence
///
/// Two-row dynamic programming table, O(|a|·|b|) time, O(|b|) memory.
fn lcs_length(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                previous[j] + 1
            } else {
                std::cmp::max(previous[j + 1], current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

// ============================================================================
// BACKEND SELECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerBackend {
    #[default]
    Levenshtein,
    Indel,
}

impl ScorerBackend {
    pub fn build(&self) -> Box<dyn SimilarityScorer> {
        match self {
            ScorerBackend::Levenshtein => Box::new(LevenshteinScorer),
            ScorerBackend::Indel => Box::new(IndelScorer),
        }
    }
}

impl std::str::FromStr for ScorerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "levenshtein" => Ok(ScorerBackend::Levenshtein),
            "indel" => Ok(ScorerBackend::Indel),
            other => Err(format!("Unknown scorer backend: {}", other)),
        }
    }
}

// ============================================================================
// SIMILARITY
// ============================================================================

/// Configured scorer: one backend + plain or token-aware mode
pub struct Similarity {
    backend: Box<dyn SimilarityScorer>,
    token_aware: bool,
}

impl Similarity {
    pub fn new(backend: Box<dyn SimilarityScorer>, token_aware: bool) -> Self {
        Similarity {
            backend,
            token_aware,
        }
    }

    pub fn from_backend(backend: ScorerBackend, token_aware: bool) -> Self {
        Similarity::new(backend.build(), token_aware)
    }

    pub fn is_token_aware(&self) -> bool {
        self.token_aware
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Similarity of two possibly-missing strings (0.0 when either is missing)
    pub fn similarity(&self, a: Option<&str>, b: Option<&str>) -> f64 {
        match (a, b) {
            (Some(a), Some(b)) => self.score(a, b),
            _ => 0.0,
        }
    }

    /// Similarity of two present strings
    pub fn score(&self, a: &str, b: &str) -> f64 {
        let backend = self.backend.as_ref();

        let score = if self.token_aware {
            [
                backend.ratio(a, b),
                token_set_ratio(backend, a, b),
                token_sort_ratio(backend, a, b),
                partial_ratio(backend, a, b),
            ]
            .into_iter()
            .fold(0.0, f64::max)
        } else {
            backend.ratio(a, b)
        };

        score.clamp(0.0, 1.0)
    }
}

impl Default for Similarity {
    fn default() -> Self {
        Similarity::from_backend(ScorerBackend::default(), false)
    }
}

impl std::fmt::Debug for Similarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Similarity")
            .field("backend", &self.backend.name())
            .field("token_aware", &self.token_aware)
            .finish()
    }
}

// ============================================================================
// TOKEN HEURISTICS
// ============================================================================

/// Ratio after sorting whitespace tokens (order-insensitive)
pub fn token_sort_ratio(scorer: &dyn SimilarityScorer, a: &str, b: &str) -> f64 {
    scorer.ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Token-set ratio (order- and duplicate-insensitive overlap)
///
/// Compares the shared tokens against each side's shared+unique tokens and keeps
/// the best pairing. A name whose tokens are a subset of the other scores 1.0.
pub fn token_set_ratio(scorer: &dyn SimilarityScorer, a: &str, b: &str) -> f64 {
    let a_tokens: BTreeSet<&str> = a.split_whitespace().collect();
    let b_tokens: BTreeSet<&str> = b.split_whitespace().collect();

    if a_tokens.is_empty() || b_tokens.is_empty() {
        return if a_tokens.is_empty() && b_tokens.is_empty() { 1.0 } else { 0.0 };
    }

    let shared = join_tokens(a_tokens.intersection(&b_tokens));
    let a_only = join_tokens(a_tokens.difference(&b_tokens));
    let b_only = join_tokens(b_tokens.difference(&a_tokens));

    let a_combined = join_parts(&shared, &a_only);
    let b_combined = join_parts(&shared, &b_only);

    [
        scorer.ratio(&shared, &a_combined),
        scorer.ratio(&shared, &b_combined),
        scorer.ratio(&a_combined, &b_combined),
    ]
    .into_iter()
    .fold(0.0, f64::max)
}

fn join_tokens<'a, 'b: 'a>(tokens: impl Iterator<Item = &'a &'b str>) -> String {
    tokens.copied().collect::<Vec<_>>().join(" ")
}

fn join_parts(first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (true, _) => second.to_string(),
        (_, true) => first.to_string(),
        _ => format!("{} {}", first, second),
    }
}

/// Best ratio of the shorter string against every same-length window of the longer
pub fn partial_ratio(scorer: &dyn SimilarityScorer, a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let (short, long) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };

    if short.is_empty() {
        return if long.is_empty() { 1.0 } else { 0.0 };
    }

    let needle: String = short.iter().collect();
    let mut best = 0.0;

    for window in long.windows(short.len()) {
        let window: String = window.iter().collect();
        let score = scorer.ratio(&needle, &window);
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }

    best
}

// ============================================================================
// TESTS
// ============================================================================
