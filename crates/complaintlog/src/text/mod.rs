//! Text normalization for incoming mail: subject cleanup, markup stripping,
//! quoted-history trimming, and origin (first-seen) resolution.

pub mod datetime;
pub mod normalize;
pub mod origin;

pub use datetime::{
    format_utc, format_utc_seconds, parse_human_datetime, parse_leading_datetime, parse_stored_utc,
};
pub use normalize::{
    clean_subject, html_to_text, split_quoted_history, BodyFormat, NormalizedThread,
};
pub use origin::{Origin, OriginCandidate, OriginScanner};
