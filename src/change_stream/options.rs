//! Options accepted by the `watch` family of entry points (spec §4.1).

use std::time::Duration;

use bson::{Bson, Timestamp};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use typed_builder::TypedBuilder;

use crate::{
    change_stream::event::ResumeToken,
    collation::Collation,
    concern::{ReadConcern, WriteConcern},
    selection_criteria::SelectionCriteria,
};

/// Options accepted by `watch` when opening a change stream (spec §4.1).
///
/// Fields annotated `#[serde(skip_serializing)]` never appear in the `aggregate` command body
/// itself; they configure the command envelope (batch size, collation, ...) or this crate's own
/// behavior and are consumed directly by the Command Builder instead (spec §4.2).
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ChangeStreamOptions {
    /// Configures how the [`full_document`](crate::change_stream::event::ChangeStreamEvent::full_document)
    /// field is populated. By default the field is empty for updates.
    pub full_document: Option<FullDocumentType>,

    /// Configures how the
    /// [`full_document_before_change`](crate::change_stream::event::ChangeStreamEvent::full_document_before_change)
    /// field is populated.
    pub full_document_before_change: Option<FullDocumentBeforeChangeType>,

    /// The logical starting point for the stream. Mutually exclusive with `start_after`; if a
    /// watched collection was dropped and recreated or renamed, prefer `start_after` instead
    /// (spec §4.1, §4.5).
    pub resume_after: Option<ResumeToken>,

    /// Only provide changes that occurred at or after this timestamp.
    pub start_at_operation_time: Option<Timestamp>,

    /// Like `resume_after`, but also tolerates collections that were dropped and recreated, or
    /// renamed, in between (spec §4.1, §4.5).
    pub start_after: Option<ResumeToken>,

    /// Set only by the deployment-wide `watch` entry point (spec §4.1); never user-settable.
    #[builder(setter(skip))]
    pub(crate) all_changes_for_cluster: Option<bool>,

    /// Maximum time the server should block a `getMore` waiting for new documents.
    #[serde(skip_serializing)]
    pub max_await_time: Option<Duration>,

    /// The number of documents to return per batch.
    #[serde(skip_serializing)]
    pub batch_size: Option<u32>,

    /// Collation to apply to the underlying aggregation.
    #[serde(skip_serializing)]
    pub collation: Option<Collation>,

    /// Read concern for the operation; falls back to whatever the target object has configured.
    /// Forwarded as top-level `readConcern` on `aggregate` (spec §4.1, §6).
    #[serde(skip_serializing)]
    pub read_concern: Option<ReadConcern>,

    /// Write concern for the operation; falls back to whatever the target object has configured.
    /// Forwarded as top-level `writeConcern` on `aggregate` (spec §4.1, §6) — the aggregate
    /// command accepts one for any pipeline ending in a writing stage such as `$merge`/`$out`.
    #[serde(skip_serializing)]
    pub write_concern: Option<WriteConcern>,

    /// Server selection criteria for the operation; falls back to whatever the target object has
    /// configured. Reused unchanged across resumes (spec §4.5 step 3).
    #[serde(skip_serializing)]
    pub selection_criteria: Option<SelectionCriteria>,

    /// Enables the server to send the expanded set of change stream events (spec §4.1).
    pub show_expanded_events: Option<bool>,

    /// An arbitrary value attached to the command for tracing through the server's profiler,
    /// currentOp, and logs (spec §4.2 step 6). Must be a [`Bson::String`] on servers older than
    /// 4.4.
    pub comment: Option<Bson>,
}

/// Describes how [`full_document`](crate::change_stream::event::ChangeStreamEvent::full_document)
/// is populated.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum FullDocumentType {
    /// The server's default behavior: omit `fullDocument` for updates. Explicit spelling of the
    /// value the Command Builder also emits when `full_document` is left unset (spec §4.1, §8
    /// scenario 2).
    Default,
    /// Populate with a copy of the entire updated document, fetched separately by the server.
    UpdateLookup,
    /// Populate with the post-image if one is available.
    WhenAvailable,
    /// Like `WhenAvailable`, but raise a server error if no post-image is available.
    Required,
    /// Unrecognized value, kept for forward compatibility.
    Other(String),
}

/// Describes how
/// [`full_document_before_change`](crate::change_stream::event::ChangeStreamEvent::full_document_before_change)
/// is populated.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum FullDocumentBeforeChangeType {
    /// Populate with the pre-image if one is available.
    WhenAvailable,
    /// Like `WhenAvailable`, but raise a server error if no pre-image is available.
    Required,
    /// Do not request a pre-image.
    Off,
    /// Unrecognized value, kept for forward compatibility.
    Other(String),
}
