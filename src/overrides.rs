// ✋ Manual Overrides - curated roster name → CRD assignments (Tier 0)
//
// An override wins over every match tier: a roster firm whose normalized primary
// name is in the map resolves to method=manual, confidence=1.0, no review.
// Only the Protection Gate runs before it.

use crate::matcher::MatchResult;
use crate::normalize::normalize_with_cleanup;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// OVERRIDE ENTRY
// ============================================================================

/// One curated assignment, as written in the override file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualOverride {
    /// Roster firm name the override applies to
    #[serde(alias = "broker_protocol_firm_name")]
    pub firm_name: String,

    #[serde(alias = "firm_crd_id")]
    pub crd_id: i64,

    /// Directory display name to report
    #[serde(default, alias = "fintrx_firm_name")]
    pub fintrx_name: Option<String>,

    /// Inactive overrides are ignored
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl ManualOverride {
    pub fn new(firm_name: impl Into<String>, crd_id: i64) -> Self {
        ManualOverride {
            firm_name: firm_name.into(),
            crd_id,
            fintrx_name: None,
            is_active: true,
        }
    }

    /// Builder pattern: set the reported directory name
    pub fn with_fintrx_name(mut self, name: impl Into<String>) -> Self {
        self.fintrx_name = Some(name.into());
        self
    }

    pub fn to_result(&self) -> MatchResult {
        MatchResult::manual(self.crd_id, self.fintrx_name.clone())
    }
}

// ============================================================================
// OVERRIDE MAP
// ============================================================================

/// Normalized roster name → override
///
/// When two overrides normalize to the same name, the later one wins.
#[derive(Debug, Clone, Default)]
pub struct OverrideMap {
    entries: HashMap<String, ManualOverride>,
    /// Active overrides in insertion order, kept so the map can be re-keyed
    active: Vec<ManualOverride>,
    cleanup_mode: bool,
}

impl OverrideMap {
    pub fn new() -> Self {
        OverrideMap::default()
    }

    /// Build from overrides; names normalize the same way roster names will
    pub fn from_overrides<I>(overrides: I, cleanup_mode: bool) -> Self
    where
        I: IntoIterator<Item = ManualOverride>,
    {
        let mut map = OverrideMap {
            cleanup_mode,
            ..Default::default()
        };
        for entry in overrides {
            map.insert(entry);
        }
        map
    }

    /// Load overrides from a JSON array of `{firm_name, crd_id, fintrx_name?}`
    pub fn from_file<P: AsRef<Path>>(path: P, cleanup_mode: bool) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read overrides file: {:?}", path.as_ref()))?;

        let overrides: Vec<ManualOverride> =
            serde_json::from_str(&content).context("Failed to parse overrides JSON")?;

        Ok(OverrideMap::from_overrides(overrides, cleanup_mode))
    }

    /// Add one override (inactive or unnamed overrides are skipped)
    pub fn insert(&mut self, entry: ManualOverride) -> bool {
        if !entry.is_active {
            return false;
        }
        self.active.push(entry.clone());
        match normalize_with_cleanup(&entry.firm_name, self.cleanup_mode) {
            Some(key) => {
                self.entries.insert(key, entry);
                true
            }
            None => false,
        }
    }

    pub fn cleanup_mode(&self) -> bool {
        self.cleanup_mode
    }

    /// Re-key every override for `cleanup_mode`, keeping later-wins order
    pub fn with_cleanup_mode(self, cleanup_mode: bool) -> Self {
        if self.cleanup_mode == cleanup_mode {
            return self;
        }
        OverrideMap::from_overrides(self.active, cleanup_mode)
    }

    /// Override for a roster primary name, if any
    pub fn lookup(&self, primary_name: &str) -> Option<&ManualOverride> {
        let key = normalize_with_cleanup(primary_name, self.cleanup_mode)?;
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
