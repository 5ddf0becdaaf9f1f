// 📥 Loaders - CSV/JSON files → directory, roster records, overrides
//
// Adapters only: rows are turned into typed records here and nothing else.
// Directory CSV: NAME/name, CRD_ID/crd_id
// Roster CSV:    firm_name, former_names, dbas (comma-separated lists) and the previous
//                run's firm_crd_id, fintrx_firm_name, match_confidence, match_method,
//                needs_manual_review, matched_on_variant

use crate::entities::{parse_delimited, Directory, DirectoryEntry, SourceFirmRecord};
use crate::matcher::{MatchMethod, MatchResult, MatchedVariant};
use crate::orchestrator::MatchRun;
use crate::overrides::{ManualOverride, OverrideMap};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;
use std::fs;
use std::path::Path;

// ============================================================================
// DIRECTORY
// ============================================================================

#[derive(Debug, Deserialize)]
struct DirectoryRow {
    #[serde(default, alias = "NAME")]
    name: Option<String>,

    #[serde(default, alias = "CRD_ID")]
    crd_id: Option<i64>,
}

/// Load the firm directory; rows without a CRD ID are skipped
pub fn load_directory_csv(csv_path: &Path) -> Result<Directory> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open directory CSV: {:?}", csv_path))?;

    let mut directory = Directory::new();
    let mut skipped = 0;

    for (line, row) in rdr.deserialize::<DirectoryRow>().enumerate() {
        let row = row.with_context(|| format!("Failed to deserialize directory row {}", line + 1))?;

        let Some(crd_id) = row.crd_id else {
            skipped += 1;
            continue;
        };

        directory
            .push(DirectoryEntry::new(row.name.unwrap_or_default(), crd_id))
            .with_context(|| format!("Invalid directory row {}", line + 1))?;
    }

    if skipped > 0 {
        warn!("Skipped {} directory rows without a CRD ID", skipped);
    }
    info!("Loaded {} directory firms from {:?}", directory.len(), csv_path);

    Ok(directory)
}

// ============================================================================
// ROSTER
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RosterRow {
    firm_name: Option<String>,
    former_names: Option<String>,
    dbas: Option<String>,
    firm_crd_id: Option<i64>,
    fintrx_firm_name: Option<String>,
    match_confidence: Option<f64>,
    match_method: Option<String>,
    needs_manual_review: Option<String>,
    matched_on_variant: Option<String>,
}

impl RosterRow {
    fn into_record(self) -> SourceFirmRecord {
        let existing_match = self.existing_match();

        SourceFirmRecord {
            primary_name: self.firm_name.filter(|name| !name.trim().is_empty()),
            former_names: self.former_names.as_deref().map(parse_delimited).unwrap_or_default(),
            dbas: self.dbas.as_deref().map(parse_delimited).unwrap_or_default(),
            existing_match,
        }
    }

    /// Previous run's match; only rows with a CRD ID carry one
    fn existing_match(&self) -> Option<MatchResult> {
        let crd_id = self.firm_crd_id?;

        // A CRD without a recognizable method is treated as a fuzzy match of unknown quality
        let method = match self.match_method.as_deref().map(str::parse::<MatchMethod>) {
            Some(Ok(MatchMethod::Unmatched)) | None => MatchMethod::Fuzzy,
            Some(Ok(method)) => method,
            Some(Err(e)) => {
                warn!("Roster firm {:?}: {}", self.firm_name, e);
                MatchMethod::Fuzzy
            }
        };

        Some(MatchResult {
            crd_id: Some(crd_id),
            matched_name: self.fintrx_firm_name.clone(),
            confidence: self.match_confidence,
            method,
            needs_review: self.needs_manual_review.as_deref().map(parse_flag).unwrap_or(false),
            matched_variant: self
                .matched_on_variant
                .as_deref()
                .and_then(|v| v.parse::<MatchedVariant>().ok()),
            top2_confidence: None,
            confidence_margin: None,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "y")
}

/// Load roster records (one per row, in file order)
pub fn load_roster_csv(csv_path: &Path) -> Result<Vec<SourceFirmRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open roster CSV: {:?}", csv_path))?;

    let headers = csv::StringRecord::from_byte_record_lossy(
        rdr.byte_headers()
            .with_context(|| format!("Failed to read roster headers: {:?}", csv_path))?
            .clone(),
    );

    let mut records = Vec::new();

    // Names with invalid UTF-8 are kept with replacement characters
    for (line, bytes) in rdr.byte_records().enumerate() {
        let bytes = bytes.with_context(|| format!("Failed to read roster row {}", line + 1))?;
        if std::str::from_utf8(bytes.as_slice()).is_err() {
            warn!("Roster row {} is not valid UTF-8; invalid bytes replaced", line + 1);
        }

        let row: RosterRow = csv::StringRecord::from_byte_record_lossy(bytes)
            .deserialize(Some(&headers))
            .with_context(|| format!("Failed to deserialize roster row {}", line + 1))?;
        records.push(row.into_record());
    }

    let with_previous = records.iter().filter(|r| r.existing_match.is_some()).count();
    info!(
        "Loaded {} roster firms from {:?} ({} with a previous match)",
        records.len(),
        csv_path,
        with_previous
    );

    Ok(records)
}

// ============================================================================
// OVERRIDES
// ============================================================================

#[derive(Debug, Deserialize)]
struct OverrideRow {
    #[serde(alias = "broker_protocol_firm_name")]
    firm_name: String,

    #[serde(alias = "firm_crd_id")]
    crd_id: i64,

    #[serde(default, alias = "fintrx_firm_name")]
    fintrx_name: Option<String>,

    #[serde(default)]
    is_active: Option<String>,
}

/// Load manual overrides from JSON (`.json`) or CSV (anything else)
pub fn load_overrides(path: &Path, cleanup_mode: bool) -> Result<OverrideMap> {
    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

    let overrides = if is_json {
        OverrideMap::from_file(path, cleanup_mode)?
    } else {
        let mut rdr = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open overrides CSV: {:?}", path))?;

        let mut entries = Vec::new();
        for (line, row) in rdr.deserialize::<OverrideRow>().enumerate() {
            let row = row.with_context(|| format!("Failed to deserialize override row {}", line + 1))?;
            entries.push(ManualOverride {
                firm_name: row.firm_name,
                crd_id: row.crd_id,
                fintrx_name: row.fintrx_name.filter(|name| !name.is_empty()),
                is_active: row.is_active.as_deref().map_or(true, parse_flag),
            });
        }
        OverrideMap::from_overrides(entries, cleanup_mode)
    };

    info!("Loaded {} manual overrides from {:?}", overrides.len(), path);
    Ok(overrides)
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Write a run (results + summary) as pretty JSON
pub fn write_run_json(path: &Path, run: &MatchRun) -> Result<()> {
    let json = serde_json::to_string_pretty(run).context("Failed to serialize match run")?;
    fs::write(path, json).with_context(|| format!("Failed to write results: {:?}", path))?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::orchestrator::FirmMatcher;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn create_test_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_directory_csv() {
        let file = create_test_file(
            "NAME,CRD_ID,STATE\n\
             Acme Capital LLC,100,NY\n\
             Beta Wealth Management,200,CA\n\
             No Id Firm,,TX\n",
        );

        let directory = load_directory_csv(file.path()).unwrap();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.find_by_crd(200).unwrap().name, "Beta Wealth Management");
    }

    #[test]
    fn test_load_directory_lowercase_headers() {
        let file = create_test_file("name,crd_id\n\"Gamma Partners, L.P.\",300\n");

        let directory = load_directory_csv(file.path()).unwrap();
        assert_eq!(directory.find_by_crd(300).unwrap().name, "Gamma Partners, L.P.");
    }

    #[test]
    fn test_load_directory_rejects_duplicate_crd() {
        let file = create_test_file("NAME,CRD_ID\nAcme,100\nAcme Two,100\n");

        let error = load_directory_csv(file.path()).unwrap_err();
        assert!(format!("{:#}", error).contains("duplicate crd_id 100"));
    }

    #[test]
    fn test_load_roster_csv() {
        let file = create_test_file(
            "firm_name,former_names,dbas,firm_crd_id,fintrx_firm_name,match_confidence,match_method,needs_manual_review,matched_on_variant\n\
             New Co,\"Old Co, Older Co\",,,,,,,\n\
             Acme Capital LLC,,Acme,100,ACME CAPITAL LLC,1.0,exact,False,firm_name\n\
             ,,,,,,,,\n",
        );

        let records = load_roster_csv(file.path()).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].primary_name.as_deref(), Some("New Co"));
        assert_eq!(records[0].former_names, vec!["Old Co".to_string(), "Older Co".to_string()]);
        assert!(records[0].dbas.is_empty());
        assert!(records[0].existing_match.is_none());

        let existing = records[1].existing_match.as_ref().unwrap();
        assert_eq!(existing.crd_id, Some(100));
        assert_eq!(existing.method, MatchMethod::Exact);
        assert_eq!(existing.confidence, Some(1.0));
        assert!(!existing.needs_review);
        assert_eq!(existing.matched_variant, Some(MatchedVariant::PrimaryName));
        assert_eq!(records[1].dbas, vec!["Acme".to_string()]);

        assert_eq!(records[2].primary_name, None);
    }

    #[test]
    fn test_roster_invalid_utf8_row_is_kept() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"firm_name,former_names\nAcme Capital LLC,\nCaf\xe9 Advisors,Old Caf\xe9\nBeta Partners,\n")
            .unwrap();

        let records = load_roster_csv(file.path()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].primary_name.as_deref(), Some("Caf\u{FFFD} Advisors"));
        assert_eq!(records[1].former_names, vec!["Old Caf\u{FFFD}".to_string()]);
        assert_eq!(records[2].primary_name.as_deref(), Some("Beta Partners"));
    }

    #[test]
    fn test_roster_minimal_columns() {
        let file = create_test_file("firm_name\nAcme Capital LLC\n");

        let records = load_roster_csv(file.path()).unwrap();
        assert_eq!(records, vec![SourceFirmRecord::new("Acme Capital LLC")]);
    }

    #[test]
    fn test_previous_match_without_method_is_fuzzy() {
        let row = RosterRow {
            firm_name: Some("Acme".to_string()),
            firm_crd_id: Some(100),
            match_confidence: Some(0.97),
            needs_manual_review: Some("True".to_string()),
            ..Default::default()
        };

        let existing = row.existing_match().unwrap();
        assert_eq!(existing.method, MatchMethod::Fuzzy);
        assert!(existing.needs_review);
    }

    #[test]
    fn test_load_overrides_csv() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        write!(
            file,
            "broker_protocol_firm_name,firm_crd_id,fintrx_firm_name,is_active\n\
             Acme Capital,100,Acme Capital LLC,True\n\
             Old Firm,200,,False\n\
             Beta Partners,300,,\n"
        )
        .unwrap();

        let overrides = load_overrides(file.path(), false).unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(
            overrides.lookup("acme capital").unwrap().fintrx_name.as_deref(),
            Some("Acme Capital LLC")
        );
        assert!(overrides.lookup("old firm").is_none());
        assert_eq!(overrides.lookup("Beta Partners").unwrap().fintrx_name, None);
    }

    #[test]
    fn test_load_overrides_json() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"[{{"firm_name": "Acme Capital", "crd_id": 100}}]"#).unwrap();

        let overrides = load_overrides(file.path(), false).unwrap();
        assert_eq!(overrides.lookup("ACME CAPITAL").unwrap().crd_id, 100);
    }

    #[test]
    fn test_missing_files_error() {
        assert!(load_directory_csv(Path::new("/nonexistent/directory.csv")).is_err());
        assert!(load_roster_csv(Path::new("/nonexistent/roster.csv")).is_err());
        assert!(load_overrides(Path::new("/nonexistent/overrides.csv"), false).is_err());
    }

    #[test]
    fn test_write_run_json() {
        let directory = Directory::from_entries(vec![DirectoryEntry::new("Acme Capital LLC", 100)]).unwrap();
        let matcher = FirmMatcher::new(MatchConfig::default()).unwrap();
        let run = matcher.match_all(&[SourceFirmRecord::new("Acme Capital LLC")], &directory);

        let out = NamedTempFile::new().unwrap();
        write_run_json(out.path(), &run).unwrap();

        let written: MatchRun = serde_json::from_str(&fs::read_to_string(out.path()).unwrap()).unwrap();
        assert_eq!(written.results, run.results);
        assert_eq!(written.run_id, run.run_id);
    }
}
