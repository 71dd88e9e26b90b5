//! The decoded shape of a change event (spec §4 "Document source" / GLOSSARY).

use bson::{Document, Timestamp};
use serde::{Deserialize, Serialize};

use crate::coll::Namespace;

/// The resume token attached to every change event, and to the cursor's post-batch position.
///
/// This crate never interprets the contents of a resume token; it only compares them for
/// equality and threads them back into a resume command's `resumeAfter`/`startAfter` field
/// (spec §3, §4.5). The inner document is whatever shape the server chose to emit.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResumeToken(pub Document);

impl From<Document> for ResumeToken {
    fn from(doc: Document) -> Self {
        Self(doc)
    }
}

impl From<ResumeToken> for Document {
    fn from(token: ResumeToken) -> Self {
        token.0
    }
}

/// The kind of change a [`ChangeStreamEvent`] describes.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum OperationType {
    Insert,
    Update,
    Replace,
    Delete,
    Drop,
    RenameCollection,
    DropDatabase,
    Invalidate,
    CreateIndexes,
    DropIndexes,
    Create,
    Modify,
    ShardCollection,
    ReshardCollection,
    RefineCollectionShardKey,
}

/// Which document a namespace rename applies to.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RenameNamespaces {
    pub from: Namespace,
    pub to: Namespace,
}

/// The `updateDescription` field of an `update` event.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDescription {
    /// Fields that were changed, excluding array index updates captured below.
    pub updated_fields: Option<Document>,
    /// Top-level fields that were removed.
    pub removed_fields: Option<Vec<String>>,
    /// Array indices touched by a truncation, only present with `showExpandedEvents`.
    pub truncated_arrays: Option<Vec<TruncatedArray>>,
    /// Top-level fields disambiguated when `updatedFields` contains ambiguous dotted paths,
    /// only present with `showExpandedEvents`.
    pub disambiguated_paths: Option<Document>,
}

/// One entry of [`UpdateDescription::truncated_arrays`].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncatedArray {
    pub field: String,
    pub new_size: i32,
}

/// A single decoded change event.
///
/// `T` is the shape the caller wants `fullDocument` (and, transitively, the rest of the event)
/// deserialized into; most callers use [`bson::Document`] here, but anything `Deserialize` works
/// since events are decoded generically (spec §9, document-as-opaque-value-type design note).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStreamEvent<T = Document> {
    /// This event's resume token; becomes the stream's new resume position once observed
    /// (spec §4.5, rule 2).
    #[serde(rename = "_id")]
    pub id: ResumeToken,
    pub operation_type: OperationType,
    /// Absent for `invalidate` and cluster-wide `dropDatabase` events.
    pub ns: Option<Namespace>,
    /// Present only for `rename` events.
    pub rename_namespaces: Option<RenameNamespaces>,
    /// The document's `_id` (or shard key plus `_id`) at the time of the operation.
    pub document_key: Option<Document>,
    /// Present for `update` events, and for `replace`/`delete` when
    /// `fullDocumentBeforeChange` requested it.
    pub full_document_before_change: Option<T>,
    /// Present for `insert`, `replace`, and for `update` when `fullDocument` requested it.
    pub full_document: Option<T>,
    /// Present for `update` events.
    pub update_description: Option<UpdateDescription>,
    /// The wall-clock time of the operation on the server, per the oplog entry.
    pub cluster_time: Option<Timestamp>,
    /// Populated when the change resulted from a multi-document transaction.
    pub txn_number: Option<i64>,
    pub lsid: Option<Document>,
    /// Forwarded verbatim from the aggregate command that opened the stream (spec §4.2 step 6).
    pub comment: Option<bson::Bson>,
}
