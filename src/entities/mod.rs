// Entity Models
//
// Directory side: DirectoryFirm (identity = CRD ID, keys derived from the name)
// Roster side: SourceFirmRecord (primary name + former names + DBAs + previous match)

pub mod firm;
pub mod roster;

pub use firm::{Directory, DirectoryEntry, DirectoryFirm};
pub use roster::{parse_delimited, NameVariant, SourceFirmRecord};
