//! Collation, forwarded verbatim as the top-level `collation` field on `aggregate` (spec §4.2
//! step 5).

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Collation options used to customize string comparison.
///
/// This crate never interprets a `Collation`; it only serializes it into the `aggregate` command
/// unchanged, so its fields mirror the server's collation document directly.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collation {
    /// ICU locale.
    pub locale: Option<String>,
    /// Whether to include case comparison.
    pub case_level: Option<bool>,
    /// The level of comparison to perform.
    pub strength: Option<i32>,
    /// Whether to check if numeric strings should be compared as numbers.
    pub numeric_ordering: Option<bool>,
    /// Whether collation should consider whitespace and punctuation as base characters.
    pub alternate: Option<String>,
}
