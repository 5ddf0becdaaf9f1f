// 🧹 Firm Name Normalizer - comparison keys for directory and roster names
//
// "Acme, Inc." and "ACME INC"  → "acme inc"          (normalized key)
// "Beta Wealth Management LLC" → "beta wealth management" (base key, legal suffix stripped)
//
// All functions are pure. Directory and roster names go through the same path so the
// keys are comparable with plain string equality.

use once_cell::sync::Lazy;
use regex::Regex;

// ============================================================================
// PATTERNS
// ============================================================================

/// Characters removed by `normalize`
const STRIPPED_PUNCTUATION: [char; 14] = [
    '.', ',', ';', ':', '!', '?', '\'', '"', '(', ')', '[', ']', '{', '}',
];

/// Legal-entity suffixes, tried in order. Only the first match is stripped.
const ENTITY_SUFFIX_PATTERNS: [&str; 21] = [
    r"\s+llc\s*$",
    r"\s+l\.l\.c\.\s*$",
    r"\s+inc\s*$",
    r"\s+inc\.\s*$",
    r"\s+incorporated\s*$",
    r"\s+corp\s*$",
    r"\s+corp\.\s*$",
    r"\s+corporation\s*$",
    r"\s+ltd\s*$",
    r"\s+ltd\.\s*$",
    r"\s+limited\s*$",
    r"\s+lp\s*$",
    r"\s+l\.p\.\s*$",
    r"\s+llp\s*$",
    r"\s+l\.l\.p\.\s*$",
    r"\s+pc\s*$",
    r"\s+p\.c\.\s*$",
    r"\s+pa\s*$",
    r"\s+p\.a\.\s*$",
    r"\s+plc\s*$",
    r"\s+p\.l\.c\.\s*$",
];

static ENTITY_SUFFIXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    ENTITY_SUFFIX_PATTERNS
        .iter()
        .map(|pattern| Regex::new(&format!("(?i){}", pattern)).expect("entity suffix pattern"))
        .collect()
});

static FOOTNOTE_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\*†‡§]+").expect("footnote pattern"));

static SEE_NOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\([^)]*see[^)]*\)").expect("see-note pattern"));

static QUALIFICATION_NOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\([^)]*specific[^)]*qualification[^)]*\)")
        .expect("qualification-note pattern")
});

static AMPERSAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*&\s*").expect("ampersand pattern"));

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Canonical comparison key for a firm name
///
/// - Lowercase
/// - Remove `. , ; : ! ? ' " ( ) [ ] { }`
/// - Collapse whitespace runs, trim both ends
///
/// Returns `None` for blank input, and for input that is nothing but punctuation.
/// `normalize(normalize(s)) == normalize(s)` for every `s`.
pub fn normalize(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }

    let stripped: String = trimmed
        .to_lowercase()
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .collect();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Normalized name with one trailing legal-entity suffix removed
///
/// Example: "Acme Capital, L.L.C." → "acme capital"
pub fn base_name(name: &str) -> Option<String> {
    let normalized = normalize(name)?;
    let base = strip_entity_suffix(&normalized);
    if base.is_empty() {
        None
    } else {
        Some(base)
    }
}

fn strip_entity_suffix(normalized: &str) -> String {
    for suffix in ENTITY_SUFFIXES.iter() {
        if suffix.is_match(normalized) {
            return suffix.replace(normalized, "").trim().to_string();
        }
    }
    normalized.trim().to_string()
}

// ============================================================================
// CLEANUP MODE (roster names only)
// ============================================================================

/// Remove roster noise before normalization
///
/// - Leading footnote markers: "*Firm" → "Firm"
/// - Note parentheticals: "Firm (*See attached list)" → "Firm"
/// - "&" → "and"
pub fn cleanup(name: &str) -> String {
    let cleaned = FOOTNOTE_MARKERS.replace(name.trim(), "");
    let cleaned = SEE_NOTE.replace_all(&cleaned, "");
    let cleaned = QUALIFICATION_NOTE.replace_all(&cleaned, "");
    AMPERSAND.replace_all(&cleaned, " and ").into_owned()
}

/// `normalize`, optionally preceded by `cleanup`
pub fn normalize_with_cleanup(name: &str, cleanup_mode: bool) -> Option<String> {
    if cleanup_mode {
        normalize(&cleanup(name))
    } else {
        normalize(name)
    }
}

// ============================================================================
// TESTS
// ============================================================================
