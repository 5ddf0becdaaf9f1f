// 🗂️ Candidate Index - directory lookups built once per batch
//
// Exact/normalized/base-name tiers are hash lookups. The fuzzy tier only scores the
// bucket sharing the query's first character (or first two characters, or first
// token), falling back to the full directory when that bucket is empty.
//
// Bucketing trades recall for speed: a firm whose best fuzzy match starts with a
// different character can be missed.

use crate::entities::{Directory, DirectoryFirm};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

// ============================================================================
// BUCKET STRATEGY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketStrategy {
    /// First character of the normalized name
    #[default]
    FirstChar,

    /// First two characters of the normalized name
    FirstTwo,

    /// First whitespace-delimited token of the normalized name
    FirstToken,

    /// First character, then first token, then everything
    Hybrid,
}

impl BucketStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketStrategy::FirstChar => "first_char",
            BucketStrategy::FirstTwo => "first_two",
            BucketStrategy::FirstToken => "first_token",
            BucketStrategy::Hybrid => "hybrid",
        }
    }
}

impl std::str::FromStr for BucketStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first_char" => Ok(BucketStrategy::FirstChar),
            "first_two" | "first2" => Ok(BucketStrategy::FirstTwo),
            "first_token" => Ok(BucketStrategy::FirstToken),
            "hybrid" => Ok(BucketStrategy::Hybrid),
            other => Err(format!("Unknown bucket strategy: {}", other)),
        }
    }
}

// ============================================================================
// BUCKET KEYS
// ============================================================================

pub fn first_char_key(normalized: &str) -> String {
    normalized.chars().take(1).collect()
}

pub fn first_two_key(normalized: &str) -> String {
    normalized.chars().take(2).collect()
}

pub fn first_token_key(normalized: &str) -> String {
    normalized.split_whitespace().next().unwrap_or("").to_string()
}

// ============================================================================
// CANDIDATE INDEX
// ============================================================================

/// Read-only lookup structure over one directory snapshot
///
/// Every map keeps the FIRST firm (directory order) for a given key, so tier ties
/// are deterministic.
#[derive(Debug, Clone)]
pub struct CandidateIndex {
    firms: Vec<DirectoryFirm>,
    all: Vec<usize>,
    by_normalized: HashMap<String, usize>,
    by_base: HashMap<String, usize>,
    first_char: HashMap<String, Vec<usize>>,
    first_two: HashMap<String, Vec<usize>>,
    first_token: HashMap<String, Vec<usize>>,
    fingerprint: String,
}

impl CandidateIndex {
    /// Build the index from a directory snapshot
    pub fn build(directory: &Directory) -> Self {
        let firms = directory.firms().to_vec();

        let mut by_normalized = HashMap::new();
        let mut by_base = HashMap::new();
        let mut first_char: HashMap<String, Vec<usize>> = HashMap::new();
        let mut first_two: HashMap<String, Vec<usize>> = HashMap::new();
        let mut first_token: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, firm) in firms.iter().enumerate() {
            if let Some(key) = &firm.base_name {
                by_base.entry(key.clone()).or_insert(i);
            }

            first_char.entry(firm.bucket_key.clone()).or_default().push(i);

            let normalized = firm.normalized_name.as_deref().unwrap_or("");
            if !normalized.is_empty() {
                by_normalized.entry(normalized.to_string()).or_insert(i);
            }
            first_two.entry(first_two_key(normalized)).or_default().push(i);
            first_token.entry(first_token_key(normalized)).or_default().push(i);
        }

        debug!(
            "Built candidate index: {} firms, {} first-char buckets, {} first-token buckets",
            firms.len(),
            first_char.len(),
            first_token.len()
        );

        CandidateIndex {
            all: (0..firms.len()).collect(),
            fingerprint: directory.fingerprint(),
            firms,
            by_normalized,
            by_base,
            first_char,
            first_two,
            first_token,
        }
    }

    pub fn firms(&self) -> &[DirectoryFirm] {
        &self.firms
    }

    pub fn firm(&self, position: usize) -> &DirectoryFirm {
        &self.firms[position]
    }

    pub fn len(&self) -> usize {
        self.firms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firms.is_empty()
    }

    /// Fingerprint of the directory this index was built from
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// First firm whose normalized name equals `normalized`
    pub fn find_normalized(&self, normalized: &str) -> Option<usize> {
        self.by_normalized.get(normalized).copied()
    }

    /// First firm whose base name equals `base`
    pub fn find_base(&self, base: &str) -> Option<usize> {
        self.by_base.get(base).copied()
    }

    /// First-character bucket for a normalized query, or the full directory
    pub fn lookup_bucket(&self, normalized_query: &str) -> &[usize] {
        self.candidates(normalized_query, BucketStrategy::FirstChar)
    }

    /// Fuzzy candidates for a normalized query under `strategy`
    ///
    /// Never returns an empty slice for a non-empty directory: a missing or empty
    /// bucket falls back to every firm.
    pub fn candidates(&self, normalized_query: &str, strategy: BucketStrategy) -> &[usize] {
        if normalized_query.is_empty() {
            return &self.all;
        }

        let bucket = match strategy {
            BucketStrategy::FirstChar => {
                non_empty(self.first_char.get(&first_char_key(normalized_query)))
            }
            BucketStrategy::FirstTwo => {
                non_empty(self.first_two.get(&first_two_key(normalized_query)))
            }
            BucketStrategy::FirstToken => {
                non_empty(self.first_token.get(&first_token_key(normalized_query)))
            }
            BucketStrategy::Hybrid => {
                non_empty(self.first_char.get(&first_char_key(normalized_query))).or_else(|| {
                    non_empty(self.first_token.get(&first_token_key(normalized_query)))
                })
            }
        };

        bucket.unwrap_or(&self.all)
    }
}

fn non_empty(bucket: Option<&Vec<usize>>) -> Option<&[usize]> {
    bucket.filter(|b| !b.is_empty()).map(Vec::as_slice)
}

// ============================================================================
// SHARED INDEX (hot reload)
// ============================================================================

/// Index handle that can be swapped when the directory changes
///
/// Readers take an `Arc` snapshot with `current()` and keep it for a whole batch;
/// `reload` never mutates an index in place.
pub struct SharedIndex {
    current: RwLock<Arc<CandidateIndex>>,
}

impl SharedIndex {
    pub fn new(directory: &Directory) -> Self {
        SharedIndex {
            current: RwLock::new(Arc::new(CandidateIndex::build(directory))),
        }
    }

    /// Snapshot of the current index
    pub fn current(&self) -> Arc<CandidateIndex> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Rebuild and swap if the directory fingerprint changed
    ///
    /// Returns true when a new index was published.
    pub fn reload(&self, directory: &Directory) -> bool {
        if self.current().fingerprint() == directory.fingerprint() {
            debug!("Directory unchanged, keeping candidate index");
            return false;
        }

        let rebuilt = Arc::new(CandidateIndex::build(directory));
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = rebuilt;
        true
    }
}

// ============================================================================
// TESTS
// ============================================================================
