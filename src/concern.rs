//! Read and write concern, forwarded verbatim into commands this crate issues.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// The level of consistency and isolation requested of the server for a read operation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadConcern {
    /// The read concern level.
    pub level: ReadConcernLevel,
}

impl ReadConcern {
    /// The `"majority"` read concern.
    pub fn majority() -> Self {
        Self {
            level: ReadConcernLevel::Majority,
        }
    }
}

/// The read concern levels understood by the server.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ReadConcernLevel {
    /// See the server documentation on the `local` read concern level.
    Local,
    /// See the server documentation on the `majority` read concern level.
    Majority,
    /// See the server documentation on the `linearizable` read concern level.
    Linearizable,
    /// See the server documentation on the `available` read concern level.
    Available,
    /// See the server documentation on the `snapshot` read concern level.
    Snapshot,
}

/// The write concern acknowledgment level requested for a write operation.
///
/// Change streams themselves never write; this type exists because `watch`'s aggregate pipeline
/// may be one the caller chose to forward a write concern for (spec §4.1), per the `aggregate`
/// command contract.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteConcern {
    /// The number of nodes (or "majority") that must acknowledge the write.
    pub w: Option<Acknowledgment>,
}

/// The `w` field of a [`WriteConcern`].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Acknowledgment {
    /// Acknowledgment from a specific number of nodes.
    Nodes(u32),
    /// Acknowledgment from a majority of the replica set.
    Majority,
    /// Acknowledgment tagged with a custom getLastErrorMode set name.
    Custom(String),
}
