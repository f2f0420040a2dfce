//! Part-number extraction and validation against the master list.

pub mod master;
pub mod resolver;

pub use master::{alnum_only, normalize_part_number, MasterPartList};
pub use resolver::{
    is_valid_part_number, PartCandidates, PartNumberResolver, PartSource, ResolvedPart,
    MISSING_PART_NUMBER,
};
