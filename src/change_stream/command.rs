//! Assembles the three wire commands a change stream issues (spec §4.2, §6).

use bson::{doc, Bson, Document};
use serde_with::skip_serializing_none;

use crate::{
    change_stream::{
        options::ChangeStreamOptions,
        resume::ResumeSelector,
    },
    coll::Namespace,
};

/// What a change stream watches: a single collection, every collection in a database, or the
/// whole deployment (spec §4.1's three `watch` entry points).
#[derive(Clone, Debug)]
pub(crate) enum AggregateTarget {
    Collection(Namespace),
    Database(String),
    Cluster,
}

impl AggregateTarget {
    fn to_bson(&self) -> Bson {
        match self {
            Self::Collection(ns) => Bson::String(ns.coll.clone()),
            Self::Database(_) | Self::Cluster => Bson::Int32(1),
        }
    }

    fn db_name(&self) -> &str {
        match self {
            Self::Collection(ns) => ns.db.as_str(),
            Self::Database(db) => db.as_str(),
            Self::Cluster => "admin",
        }
    }
}

#[skip_serializing_none]
#[derive(serde::Serialize)]
struct CursorBody {
    #[serde(rename = "batchSize")]
    batch_size: Option<u32>,
}

/// Build the `aggregate` command that opens (or reopens) a change stream.
///
/// `selector` is the first open's option-sourced selector
/// ([`super::resume::ResumeState::initial_selector`]) or a resume's precedence-table selector
/// ([`super::resume::ResumeState::resume_selector`]); either way exactly one of
/// `resumeAfter`/`startAfter`/`startAtOperationTime` lands in the `$changeStream` stage
/// (spec §4.5 step 2).
pub(crate) fn build_aggregate(
    target: &AggregateTarget,
    user_pipeline: &[Document],
    options: &ChangeStreamOptions,
    selector: &ResumeSelector,
) -> Document {
    let mut change_stream_stage = Document::new();
    change_stream_stage.insert(
        "fullDocument",
        options
            .full_document
            .as_ref()
            .map(full_document_bson)
            .unwrap_or_else(|| Bson::String("default".to_string())),
    );
    if let Some(before) = &options.full_document_before_change {
        change_stream_stage.insert(
            "fullDocumentBeforeChange",
            full_document_before_change_bson(before),
        );
    }
    if let Some(true) = options.show_expanded_events {
        change_stream_stage.insert("showExpandedEvents", true);
    }
    if matches!(target, AggregateTarget::Cluster) {
        change_stream_stage.insert("allChangesForCluster", true);
    }
    match selector {
        ResumeSelector::ResumeAfter(token) => {
            change_stream_stage.insert("resumeAfter", token.0.clone());
        }
        ResumeSelector::StartAfter(token) => {
            change_stream_stage.insert("startAfter", token.0.clone());
        }
        ResumeSelector::StartAtOperationTime(ts) => {
            change_stream_stage.insert("startAtOperationTime", *ts);
        }
        ResumeSelector::None => {}
    }

    let mut pipeline = vec![doc! { "$changeStream": change_stream_stage }];
    pipeline.extend(user_pipeline.iter().cloned());

    let mut command = doc! {
        "aggregate": target.to_bson(),
        "pipeline": pipeline,
        "cursor": bson::to_document(&CursorBody {
            batch_size: options.batch_size,
        })
        .unwrap_or_default(),
    };
    if let Some(collation) = &options.collation {
        command.insert("collation", bson::to_bson(collation).unwrap_or(Bson::Null));
    }
    if let Some(read_concern) = &options.read_concern {
        command.insert("readConcern", bson::to_bson(read_concern).unwrap_or(Bson::Null));
    }
    if let Some(write_concern) = &options.write_concern {
        command.insert("writeConcern", bson::to_bson(write_concern).unwrap_or(Bson::Null));
    }
    if let Some(comment) = &options.comment {
        command.insert("comment", comment.clone());
    }
    command
}

fn full_document_bson(value: &crate::change_stream::options::FullDocumentType) -> Bson {
    use crate::change_stream::options::FullDocumentType::*;
    Bson::String(
        match value {
            Default => "default",
            UpdateLookup => "updateLookup",
            WhenAvailable => "whenAvailable",
            Required => "required",
            Other(s) => return Bson::String(s.clone()),
        }
        .to_string(),
    )
}

fn full_document_before_change_bson(
    value: &crate::change_stream::options::FullDocumentBeforeChangeType,
) -> Bson {
    use crate::change_stream::options::FullDocumentBeforeChangeType::*;
    Bson::String(
        match value {
            WhenAvailable => "whenAvailable",
            Required => "required",
            Off => "off",
            Other(s) => return Bson::String(s.clone()),
        }
        .to_string(),
    )
}

/// Build a `getMore` command for the given cursor (spec §6).
pub(crate) fn build_get_more(
    cursor_id: i64,
    collection: &str,
    batch_size: Option<u32>,
    max_await_time_ms: Option<i64>,
) -> Document {
    let mut command = doc! {
        "getMore": cursor_id,
        "collection": collection,
    };
    if let Some(batch_size) = batch_size {
        command.insert("batchSize", batch_size as i32);
    }
    if let Some(max_time) = max_await_time_ms {
        command.insert("maxTimeMS", max_time);
    }
    command
}

/// Build a best-effort `killCursors` command (spec §6).
pub(crate) fn build_kill_cursors(cursor_id: i64, collection: &str) -> Document {
    doc! {
        "killCursors": collection,
        "cursors": [cursor_id],
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::change_stream::event::ResumeToken;

    #[test]
    fn resume_after_is_the_only_selector_field_present() {
        let target = AggregateTarget::Collection(Namespace::new("db", "coll"));
        let options = ChangeStreamOptions::default();
        let token = ResumeToken(doc! { "_data": "abc" });
        let command = build_aggregate(
            &target,
            &[],
            &options,
            &ResumeSelector::ResumeAfter(token.clone()),
        );
        let stage = command
            .get_array("pipeline")
            .unwrap()[0]
            .as_document()
            .unwrap()
            .get_document("$changeStream")
            .unwrap();
        assert_eq!(stage.get_document("resumeAfter").unwrap(), &token.0);
        assert!(!stage.contains_key("startAfter"));
        assert!(!stage.contains_key("startAtOperationTime"));
    }

    #[test]
    fn cluster_target_sets_all_changes_for_cluster() {
        let options = ChangeStreamOptions::default();
        let command = build_aggregate(&AggregateTarget::Cluster, &[], &options, &ResumeSelector::None);
        assert_eq!(command.get_i32("aggregate").unwrap(), 1);
        let stage = command
            .get_array("pipeline")
            .unwrap()[0]
            .as_document()
            .unwrap()
            .get_document("$changeStream")
            .unwrap();
        assert_eq!(stage.get_bool("allChangesForCluster").unwrap(), true);
    }

    #[test]
    fn cursor_subdocument_is_always_present() {
        let target = AggregateTarget::Collection(Namespace::new("db", "coll"));
        let options = ChangeStreamOptions::default();
        let command = build_aggregate(&target, &[], &options, &ResumeSelector::None);
        assert!(command.get_document("cursor").is_ok());
    }
}
