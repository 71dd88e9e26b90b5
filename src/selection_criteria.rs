//! The read preference used to select a server, forwarded but never interpreted by this crate.
//!
//! Server selection itself is an external collaborator (spec §1, Out of scope); the only
//! contract this crate has with it is that resuming a stream must reuse the *original*
//! [`ReadPreference`], never whichever server happened to serve the last batch (spec §4.5 step 3).

use serde::{Deserialize, Serialize};

/// Criteria used to select a server for an operation.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SelectionCriteria {
    /// Select a server according to a [`ReadPreference`].
    ReadPreference(ReadPreference),
}

impl SelectionCriteria {
    /// Convenience constructor wrapping a [`ReadPreference`].
    pub fn from_read_preference(read_preference: ReadPreference) -> Self {
        Self::ReadPreference(read_preference)
    }
}

/// A tag set used to narrow which secondaries are eligible for a non-primary read preference.
pub type TagSet = std::collections::BTreeMap<String, String>;

/// Which member(s) of a replica set (or which shard-routed equivalent) an operation may be
/// served from.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadPreference {
    /// Only route this operation to the primary.
    #[default]
    Primary,
    /// Only route this operation to a secondary.
    Secondary {
        /// Optional tag sets narrowing eligible secondaries.
        #[serde(skip_serializing_if = "Option::is_none")]
        tag_sets: Option<Vec<TagSet>>,
    },
    /// Route this operation to the primary if available, falling back to a secondary.
    PrimaryPreferred {
        /// Optional tag sets narrowing eligible secondaries.
        #[serde(skip_serializing_if = "Option::is_none")]
        tag_sets: Option<Vec<TagSet>>,
    },
    /// Route this operation to a secondary if available, falling back to the primary.
    SecondaryPreferred {
        /// Optional tag sets narrowing eligible secondaries.
        #[serde(skip_serializing_if = "Option::is_none")]
        tag_sets: Option<Vec<TagSet>>,
    },
    /// Route this operation to whichever member has the lowest network latency.
    Nearest {
        /// Optional tag sets narrowing eligible members.
        #[serde(skip_serializing_if = "Option::is_none")]
        tag_sets: Option<Vec<TagSet>>,
    },
}
