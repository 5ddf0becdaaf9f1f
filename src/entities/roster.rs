// 📋 Roster Firm Record - one Broker Protocol signatory to be matched
//
// A roster firm is known by its current name, and optionally by former names (f/k/a)
// and DBAs (d/b/a). Each of those is a VARIANT searched against the directory.

use crate::matcher::{MatchResult, MatchedVariant};
use serde::{Deserialize, Serialize};

// ============================================================================
// NAME VARIANT
// ============================================================================

/// One searchable name of a roster firm
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameVariant<'a> {
    pub text: &'a str,
    pub kind: MatchedVariant,
}

// ============================================================================
// SOURCE FIRM RECORD
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFirmRecord {
    /// Current firm name (None when the roster cell was empty)
    pub primary_name: Option<String>,

    /// Former names, in roster order
    #[serde(default)]
    pub former_names: Vec<String>,

    /// Doing-business-as names, in roster order
    #[serde(default)]
    pub dbas: Vec<String>,

    /// Match produced by a previous run, if any
    #[serde(default)]
    pub existing_match: Option<MatchResult>,
}

impl SourceFirmRecord {
    pub fn new(primary_name: impl Into<String>) -> Self {
        SourceFirmRecord {
            primary_name: Some(primary_name.into()),
            ..Default::default()
        }
    }

    /// Record whose primary name is missing
    pub fn unnamed() -> Self {
        SourceFirmRecord::default()
    }

    /// Builder pattern: add former names
    pub fn with_former_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.former_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Builder pattern: add DBAs
    pub fn with_dbas<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dbas = names.into_iter().map(Into::into).collect();
        self
    }

    /// Builder pattern: attach the previous run's match
    pub fn with_existing_match(mut self, existing: MatchResult) -> Self {
        self.existing_match = Some(existing);
        self
    }

    /// Names to search, in priority order: primary, former names, DBAs
    ///
    /// Blank names are skipped. With `use_variants == false` only the primary name
    /// is returned.
    pub fn variants(&self, use_variants: bool) -> Vec<NameVariant<'_>> {
        let mut variants = Vec::new();

        if let Some(primary) = self.primary_name.as_deref() {
            push_variant(&mut variants, primary, MatchedVariant::PrimaryName);
        }

        if use_variants {
            for name in &self.former_names {
                push_variant(&mut variants, name, MatchedVariant::FormerName);
            }
            for name in &self.dbas {
                push_variant(&mut variants, name, MatchedVariant::Dba);
            }
        }

        variants
    }

    /// Primary name for logging ("<unnamed>" when missing)
    pub fn display_name(&self) -> &str {
        self.primary_name.as_deref().unwrap_or("<unnamed>")
    }
}

fn push_variant<'a>(variants: &mut Vec<NameVariant<'a>>, text: &'a str, kind: MatchedVariant) {
    let text = text.trim();
    if !text.is_empty() {
        variants.push(NameVariant { text, kind });
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Split a comma-separated roster cell into names
///
/// Example: "Old Name Inc, Previous Name Corp" → ["Old Name Inc", "Previous Name Corp"]
pub fn parse_delimited(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
