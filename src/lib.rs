// Firm Matcher - Core Library
// Resolves roster firm names to canonical directory firms (CRD IDs)

pub mod config;
pub mod entities;
pub mod error;
pub mod index;
pub mod loader;
pub mod matcher;
pub mod normalize;
pub mod orchestrator;
pub mod overrides;
pub mod protection;
pub mod similarity;
pub mod summary;

// Re-export commonly used types
pub use config::{MatchConfig, QualityTargets};
pub use entities::{
    parse_delimited, Directory, DirectoryEntry, DirectoryFirm, NameVariant, SourceFirmRecord,
};
pub use error::{ConfigError, DirectoryError, MatchError};
pub use index::{BucketStrategy, CandidateIndex, SharedIndex};
pub use loader::{load_directory_csv, load_overrides, load_roster_csv, write_run_json};
pub use matcher::{
    BestMatch, MatchMethod, MatchResult, MatchedVariant, QueryKeys, TieredMatcher,
    BASE_NAME_CONFIDENCE, EXACT_CONFIDENCE, FUZZY_CEILING, MANUAL_CONFIDENCE,
    NORMALIZED_EXACT_CONFIDENCE,
};
pub use normalize::{base_name, cleanup, normalize, normalize_with_cleanup};
pub use orchestrator::{FirmMatcher, MatchRun};
pub use overrides::{ManualOverride, OverrideMap};
pub use protection::{is_known_good, ProtectionGate};
pub use similarity::{
    partial_ratio, token_set_ratio, token_sort_ratio, IndelScorer, LevenshteinScorer,
    ScorerBackend, Similarity, SimilarityScorer,
};
pub use summary::{MatchSummary, Resolution};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
