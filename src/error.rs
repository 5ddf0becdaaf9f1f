// ⚠️ Error types for the firm matcher
//
// Matching itself never fails: missing names resolve to Unmatched and ties resolve
// by directory order. These errors cover configuration and directory construction.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum DirectoryError {
    #[error("duplicate crd_id {crd_id} (\"{first}\" and \"{second}\")")]
    DuplicateCrd {
        crd_id: i64,
        first: String,
        second: String,
    },
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}
