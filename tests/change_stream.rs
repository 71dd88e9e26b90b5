//! Scenario-level tests driving a [`changestream_core::Client`] against a fully in-memory
//! transport double, the way the upstream driver's prose tests drive a real deployment.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use bson::{doc, Document};
use changestream_core::{
    cursor::{AggregateReply, CommandTransport, GetMoreReply, ServerAddress},
    error::{CommandError, Error, ErrorKind},
    selection_criteria::SelectionCriteria,
    Client, ChangeStreamEvent,
};

type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

enum AggregateStep {
    Ok(AggregateReply),
    Err(Error),
}

enum GetMoreStep {
    Ok(GetMoreReply),
    Err(Error),
}

/// A fully scripted [`CommandTransport`]: each call pops the next queued step, panicking if the
/// queue runs dry (a test bug, not a crate bug).
#[derive(Default)]
struct ScriptedTransport {
    aggregates: Mutex<VecDeque<AggregateStep>>,
    get_mores: Mutex<VecDeque<GetMoreStep>>,
    kill_cursor_calls: Mutex<Vec<i64>>,
    aggregate_criteria: Mutex<Vec<Option<SelectionCriteria>>>,
}

impl ScriptedTransport {
    fn push_aggregate_ok(&self, reply: AggregateReply) {
        self.aggregates.lock().unwrap().push_back(AggregateStep::Ok(reply));
    }

    fn push_aggregate_err(&self, err: Error) {
        self.aggregates.lock().unwrap().push_back(AggregateStep::Err(err));
    }

    fn push_get_more_ok(&self, reply: GetMoreReply) {
        self.get_mores.lock().unwrap().push_back(GetMoreStep::Ok(reply));
    }

    fn push_get_more_err(&self, err: Error) {
        self.get_mores.lock().unwrap().push_back(GetMoreStep::Err(err));
    }
}

impl CommandTransport for ScriptedTransport {
    fn aggregate<'a>(
        &'a self,
        _command: Document,
        criteria: Option<&'a SelectionCriteria>,
    ) -> BoxFuture<'a, changestream_core::error::Result<AggregateReply>> {
        self.aggregate_criteria.lock().unwrap().push(criteria.cloned());
        let step = self.aggregates.lock().unwrap().pop_front().expect("aggregate script exhausted");
        Box::pin(async move {
            match step {
                AggregateStep::Ok(reply) => Ok(reply),
                AggregateStep::Err(err) => Err(err),
            }
        })
    }

    fn get_more<'a>(
        &'a self,
        _command: Document,
        _address: &'a ServerAddress,
    ) -> BoxFuture<'a, changestream_core::error::Result<GetMoreReply>> {
        let step = self.get_mores.lock().unwrap().pop_front().expect("getMore script exhausted");
        Box::pin(async move {
            match step {
                GetMoreStep::Ok(reply) => Ok(reply),
                GetMoreStep::Err(err) => Err(err),
            }
        })
    }

    fn kill_cursors<'a>(
        &'a self,
        command: Document,
        _address: &'a ServerAddress,
    ) -> BoxFuture<'a, ()> {
        if let Some(id) = command.get_array("cursors").ok().and_then(|a| a.first()).and_then(|b| b.as_i64()) {
            self.kill_cursor_calls.lock().unwrap().push(id);
        }
        Box::pin(async {})
    }
}

/// Lets a test keep its own `Arc<ScriptedTransport>` handle for inspection while also handing
/// [`Client::new`] something it can wrap in its own `Arc` — `Client` owns whatever `Tr` it is
/// given, so the test drives the double through a second, thin layer of sharing instead.
impl CommandTransport for Arc<ScriptedTransport> {
    fn aggregate<'a>(
        &'a self,
        command: Document,
        criteria: Option<&'a SelectionCriteria>,
    ) -> BoxFuture<'a, changestream_core::error::Result<AggregateReply>> {
        (**self).aggregate(command, criteria)
    }

    fn get_more<'a>(
        &'a self,
        command: Document,
        address: &'a ServerAddress,
    ) -> BoxFuture<'a, changestream_core::error::Result<GetMoreReply>> {
        (**self).get_more(command, address)
    }

    fn kill_cursors<'a>(&'a self, command: Document, address: &'a ServerAddress) -> BoxFuture<'a, ()> {
        (**self).kill_cursors(command, address)
    }
}

fn ns_reply(cursor_id: i64, docs: Vec<Document>, post_batch_token: Option<Document>) -> AggregateReply {
    AggregateReply {
        address: ServerAddress("server-a:27017".into()),
        cursor_id,
        ns: changestream_core::coll::Namespace::new("db", "coll"),
        first_batch: docs,
        post_batch_resume_token: post_batch_token,
        operation_time: Some(bson::Timestamp { time: 1, increment: 0 }),
    }
}

fn event_doc(id: i32, op: &str) -> Document {
    doc! {
        "_id": { "_data": id.to_string() },
        "operationType": op,
        "documentKey": { "_id": id },
    }
}

fn resumable_error() -> Error {
    Error::from(ErrorKind::Command(CommandError {
        code: 6,
        code_name: "HostUnreachable".into(),
        message: "host unreachable".into(),
        raw: None,
    }))
}

#[tokio::test]
async fn tracks_resume_token_across_documents() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_aggregate_ok(ns_reply(123, vec![event_doc(1, "insert")], None));
    transport.push_get_more_ok(GetMoreReply {
        cursor_id: 123,
        next_batch: vec![event_doc(2, "insert")],
        post_batch_resume_token: Some(doc! { "_data": "2" }),
    });

    let client = Client::new(Arc::clone(&transport));
    let mut stream = client
        .collection("db", "coll")
        .watch::<ChangeStreamEvent>(vec![], None)
        .await
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.document_key.unwrap(), doc! { "_id": 1 });
    assert_eq!(
        stream.get_resume_token().unwrap().0,
        doc! { "_data": "1" }
    );

    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second.document_key.unwrap(), doc! { "_id": 2 });
    assert_eq!(
        stream.get_resume_token().unwrap().0,
        doc! { "_data": "2" }
    );
}

#[tokio::test]
async fn empty_batch_returns_none_without_blocking() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_aggregate_ok(ns_reply(123, vec![], Some(doc! { "_data": "0" })));
    transport.push_get_more_ok(GetMoreReply {
        cursor_id: 123,
        next_batch: vec![],
        post_batch_resume_token: Some(doc! { "_data": "0" }),
    });

    let client = Client::new(Arc::clone(&transport));
    let mut stream = client
        .collection("db", "coll")
        .watch::<ChangeStreamEvent>(vec![], None)
        .await
        .unwrap();

    assert!(stream.next().await.unwrap().is_none());
    assert!(stream.is_alive());
}

#[tokio::test]
async fn missing_resume_token_is_fatal() {
    let transport = Arc::new(ScriptedTransport::default());
    let mut doc_no_id = event_doc(1, "insert");
    doc_no_id.remove("_id");
    transport.push_aggregate_ok(ns_reply(123, vec![doc_no_id], None));

    let client = Client::new(Arc::clone(&transport));
    let mut stream = client
        .collection("db", "coll")
        .watch::<ChangeStreamEvent>(vec![], None)
        .await
        .unwrap();

    let err = stream.next().await.unwrap_err();
    assert!(matches!(err.kind.as_ref(), ErrorKind::MissingResumeToken));
    assert!(!stream.is_alive());
}

#[tokio::test]
async fn resumes_once_then_fails_on_second_resumable_error_in_same_call() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_aggregate_ok(ns_reply(123, vec![event_doc(1, "insert")], None));
    // First getMore fails resumably; resume's aggregate also fails resumably. The single-resume
    // cap means this second resumable failure must surface as a terminal error, not a second
    // resume attempt.
    transport.push_get_more_err(resumable_error());
    transport.push_aggregate_err(resumable_error());

    let client = Client::new(Arc::clone(&transport));
    let mut stream = client
        .collection("db", "coll")
        .watch::<ChangeStreamEvent>(vec![], None)
        .await
        .unwrap();

    stream.next().await.unwrap();
    let err = stream.next().await.unwrap_err();
    assert!(matches!(err.kind.as_ref(), ErrorKind::Command(_)));
    assert!(!stream.is_alive());
}

#[tokio::test]
async fn resumable_error_triggers_kill_cursors_before_resuming() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_aggregate_ok(ns_reply(123, vec![event_doc(1, "insert")], None));
    transport.push_get_more_err(resumable_error());
    transport.push_aggregate_ok(ns_reply(456, vec![event_doc(2, "insert")], None));

    let client = Client::new(Arc::clone(&transport));
    let mut stream = client
        .collection("db", "coll")
        .watch::<ChangeStreamEvent>(vec![], None)
        .await
        .unwrap();

    stream.next().await.unwrap();
    let resumed = stream.next().await.unwrap().unwrap();
    assert_eq!(resumed.document_key.unwrap(), doc! { "_id": 2 });
    assert_eq!(*transport.kill_cursor_calls.lock().unwrap(), vec![123]);
}

#[tokio::test]
async fn resume_reuses_original_selection_criteria() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_aggregate_ok(ns_reply(123, vec![event_doc(1, "insert")], None));
    transport.push_get_more_err(resumable_error());
    transport.push_aggregate_ok(ns_reply(456, vec![event_doc(2, "insert")], None));

    let client = Client::new(Arc::clone(&transport));
    let criteria = SelectionCriteria::ReadPreference(
        changestream_core::selection_criteria::ReadPreference::Secondary { tag_sets: None },
    );
    let options = changestream_core::ChangeStreamOptions::builder()
        .selection_criteria(Some(criteria.clone()))
        .build();
    let mut stream = client
        .collection("db", "coll")
        .watch::<ChangeStreamEvent>(vec![], options)
        .await
        .unwrap();

    stream.next().await.unwrap();
    stream.next().await.unwrap();

    let seen = transport.aggregate_criteria.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], Some(criteria.clone()));
    assert_eq!(seen[1], Some(criteria));
}
