// 🏦 Directory Firm Entity - canonical firm identity + derived match keys
//
// "CRD ID is IDENTITY (never changes), the display name is a VALUE"
//
// Problem solved:
// - "Acme Capital LLC", "ACME CAPITAL, L.L.C.", "Acme Capital" → same comparison keys
// - Keys are derived once per directory build, never stored by the caller
// - CRD ID uniqueness is checked when the directory is built

use crate::error::DirectoryError;
use crate::index::first_char_key;
use crate::normalize::{base_name, normalize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

// ============================================================================
// DIRECTORY ENTRY (input row)
// ============================================================================

/// One row supplied by the directory source (e.g. the FINTRX firm export)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Display name
    #[serde(alias = "NAME")]
    pub name: String,

    /// Unique CRD identifier
    #[serde(alias = "CRD_ID")]
    pub crd_id: i64,
}

impl DirectoryEntry {
    pub fn new(name: impl Into<String>, crd_id: i64) -> Self {
        DirectoryEntry {
            name: name.into(),
            crd_id,
        }
    }
}

// ============================================================================
// DIRECTORY FIRM
// ============================================================================

/// Directory firm with its derived comparison keys
///
/// Identity: `crd_id`
/// Value: `name`, and every key below (pure functions of `name`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryFirm {
    pub crd_id: i64,

    /// Display name, returned as `matched_name`
    pub name: String,

    /// Lowercase, punctuation stripped, whitespace collapsed
    pub normalized_name: Option<String>,

    /// `normalized_name` without its legal-entity suffix
    pub base_name: Option<String>,

    /// First character of `normalized_name` ("" when it normalizes to nothing)
    pub bucket_key: String,
}

impl DirectoryFirm {
    pub fn new(name: impl Into<String>, crd_id: i64) -> Self {
        let name = name.into();
        let normalized_name = normalize(&name);
        let bucket_key = normalized_name
            .as_deref()
            .map(first_char_key)
            .unwrap_or_default();

        DirectoryFirm {
            crd_id,
            base_name: base_name(&name),
            normalized_name,
            bucket_key,
            name,
        }
    }
}

impl From<DirectoryEntry> for DirectoryFirm {
    fn from(entry: DirectoryEntry) -> Self {
        DirectoryFirm::new(entry.name, entry.crd_id)
    }
}

// ============================================================================
// DIRECTORY
// ============================================================================

/// Canonical firm directory, in source order
///
/// Source order matters: ties inside a match tier go to the earliest firm.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    firms: Vec<DirectoryFirm>,
    positions: HashMap<i64, usize>,
}

impl Directory {
    /// Create an empty directory
    pub fn new() -> Self {
        Directory::default()
    }

    /// Build a directory from source rows, rejecting duplicate CRD IDs
    pub fn from_entries<I>(entries: I) -> Result<Self, DirectoryError>
    where
        I: IntoIterator<Item = DirectoryEntry>,
    {
        let mut directory = Directory::new();
        for entry in entries {
            directory.push(entry)?;
        }
        Ok(directory)
    }

    /// Append one firm (keys are derived here)
    pub fn push(&mut self, entry: DirectoryEntry) -> Result<(), DirectoryError> {
        if let Some(&existing) = self.positions.get(&entry.crd_id) {
            return Err(DirectoryError::DuplicateCrd {
                crd_id: entry.crd_id,
                first: self.firms[existing].name.clone(),
                second: entry.name,
            });
        }

        self.positions.insert(entry.crd_id, self.firms.len());
        self.firms.push(DirectoryFirm::from(entry));
        Ok(())
    }

    /// Remove a firm by CRD ID, keeping the order of the rest
    pub fn remove(&mut self, crd_id: i64) -> Option<DirectoryFirm> {
        let position = self.positions.remove(&crd_id)?;
        let removed = self.firms.remove(position);
        for (i, firm) in self.firms.iter().enumerate().skip(position) {
            self.positions.insert(firm.crd_id, i);
        }
        Some(removed)
    }

    pub fn firms(&self) -> &[DirectoryFirm] {
        &self.firms
    }

    pub fn get(&self, position: usize) -> Option<&DirectoryFirm> {
        self.firms.get(position)
    }

    pub fn find_by_crd(&self, crd_id: i64) -> Option<&DirectoryFirm> {
        self.positions.get(&crd_id).map(|&i| &self.firms[i])
    }

    pub fn len(&self) -> usize {
        self.firms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firms.is_empty()
    }

    /// SHA-256 over (crd_id, name) in directory order
    ///
    /// Two directories with the same fingerprint produce the same index.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for firm in &self.firms {
            hasher.update(format!("{}\u{1f}{}\u{1e}", firm.crd_id, firm.name));
        }
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// TESTS
// ============================================================================
