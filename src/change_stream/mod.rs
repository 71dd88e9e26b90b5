//! The change stream state machine (spec §4.5, the heart of this crate).

pub(crate) mod command;
pub mod event;
pub mod options;
pub(crate) mod resume;
pub mod session;

mod cursor_adapter;

use std::{marker::PhantomData, sync::Arc};

use bson::Document;
use serde::de::DeserializeOwned;

use self::{
    command::AggregateTarget,
    cursor_adapter::{Advance, CursorAdapter},
    event::ChangeStreamEvent,
    options::ChangeStreamOptions,
    resume::ResumeState,
};
use crate::{
    bson_util,
    cursor::CommandTransport,
    error::{Error, ErrorKind, Result},
};

#[derive(Debug, PartialEq, Eq)]
enum State {
    Open,
    Errored,
    Closed,
}

/// A change stream: an iterator-like handle over a server-side cursor that knows how to resume
/// itself after a transient error (spec §2, §4.5).
///
/// `T` is the shape events are deserialized into (see [`ChangeStreamEvent`]); `Tr` is the
/// transport collaborator this stream was opened against.
pub struct ChangeStream<Tr: CommandTransport, T = ChangeStreamEvent<Document>> {
    transport: Arc<Tr>,
    target: AggregateTarget,
    pipeline: Vec<Document>,
    options: ChangeStreamOptions,
    resume_state: ResumeState,
    cursor: Option<CursorAdapter<Tr>>,
    /// Cleared whenever a cursor delivers a document or a successful-but-empty `getMore`;
    /// enforces the single-resume-per-`next` invariant (spec §4.5 `next()`, §8).
    resumed_once_this_batch: bool,
    state: State,
    last_error: Option<(Error, Option<Document>)>,
    _marker: PhantomData<T>,
}

impl<Tr: CommandTransport, T: DeserializeOwned> ChangeStream<Tr, T> {
    /// `open()` (spec §4.5): issue the initial `aggregate`, recording the reply's `operationTime`
    /// and `postBatchResumeToken` into a fresh [`ResumeState`]. No resume is ever attempted for a
    /// failure on the very first open.
    pub(crate) async fn open(
        transport: Arc<Tr>,
        target: AggregateTarget,
        pipeline: Vec<Document>,
        options: ChangeStreamOptions,
    ) -> Result<Self> {
        let resume_state = ResumeState::new(&options);
        let selector = resume_state.initial_selector();
        let command = command::build_aggregate(&target, &pipeline, &options, &selector);

        let mut stream = Self {
            transport,
            target,
            pipeline,
            options,
            resume_state,
            cursor: None,
            resumed_once_this_batch: false,
            state: State::Open,
            last_error: None,
            _marker: PhantomData,
        };

        let reply_result = stream
            .transport
            .aggregate(command, stream.options.selection_criteria.as_ref())
            .await;
        match reply_result {
            Ok(reply) => {
                stream.resume_state.record_open_reply(
                    reply.operation_time,
                    reply.post_batch_resume_token.clone().map(event::ResumeToken),
                );
                #[cfg(feature = "tracing-unstable")]
                tracing::debug!(
                    target: "changestream_core",
                    cursor_id = reply.cursor_id,
                    "change stream opened"
                );
                let cursor = CursorAdapter::new(
                    Arc::clone(&stream.transport),
                    reply.address,
                    reply.ns.coll.clone(),
                    reply.cursor_id,
                    reply.first_batch,
                    reply.post_batch_resume_token,
                    stream.options.batch_size,
                    stream.options.max_await_time.map(|d| d.as_millis() as i64),
                );
                stream.cursor = Some(cursor);
                Ok(stream)
            }
            Err(err) => {
                stream.fail(err.clone());
                Err(err)
            }
        }
    }

    /// `next()` (spec §4.5): pull one document, updating the resume anchor, or classify and
    /// react to an error with at most one resume attempt. Makes at most one `getMore`; if the
    /// batch it receives is empty, returns `Ok(None)` rather than blocking for another one
    /// (spec §6, "Public API surface").
    pub async fn next(&mut self) -> Result<Option<T>> {
        if self.state != State::Open {
            return match &self.last_error {
                Some((e, _)) => Err(e.clone()),
                None => Ok(None),
            };
        }

        loop {
            let cursor = self.cursor.as_mut().expect("open() always sets a cursor");
            match cursor.advance().await {
                Ok(Advance::Document(doc)) => {
                    let doc_token = match bson_util::lookup_document(&doc, "_id") {
                        Some(token_doc) => event::ResumeToken(token_doc),
                        None => {
                            let err = Error::from_kind(ErrorKind::MissingResumeToken);
                            self.fail(err.clone());
                            return Err(err);
                        }
                    };
                    let post_batch_token =
                        cursor.post_batch_token.clone().map(event::ResumeToken);
                    self.resume_state
                        .record_batch(Some(doc_token), post_batch_token);
                    self.resumed_once_this_batch = false;
                    return bson::from_document(doc).map(Some).map_err(|e| {
                        Error::from_kind(ErrorKind::BsonInvalid {
                            message: e.to_string(),
                        })
                    });
                }
                Ok(Advance::NoDocument) => {
                    let post_batch_token =
                        cursor.post_batch_token.clone().map(event::ResumeToken);
                    self.resume_state.record_batch(None, post_batch_token);
                    self.resumed_once_this_batch = false;
                    return Ok(None);
                }
                Err(err) => {
                    let classified = err.classify();
                    if classified.is_fatal() {
                        if classified.should_kill_cursor() {
                            cursor.kill().await;
                            cursor.disarm();
                        }
                        self.fail(err.clone());
                        return Err(err);
                    }
                    if self.resumed_once_this_batch {
                        self.fail(err.clone());
                        return Err(err);
                    }
                    self.resumed_once_this_batch = true;
                    #[cfg(feature = "tracing-unstable")]
                    tracing::debug!(
                        target: "changestream_core",
                        error = %err,
                        kill_cursor = classified.should_kill_cursor(),
                        "resuming change stream"
                    );
                    if classified.should_kill_cursor() {
                        cursor.kill().await;
                        cursor.disarm();
                    }
                    if let Err(resume_err) = self.resume().await {
                        self.fail(resume_err.clone());
                        return Err(resume_err);
                    }
                    continue;
                }
            }
        }
    }

    /// An explicit alias for [`Self::next`], matching the upstream driver's naming for "make at
    /// most one request and return `None` if the batch was empty" (spec §6).
    pub async fn next_if_any(&mut self) -> Result<Option<T>> {
        self.next().await
    }

    /// `resume()` (spec §4.5): pick the precedence-table selector, rebuild the `aggregate`
    /// command with every original option preserved, and open a fresh cursor using the
    /// *original* selection criteria.
    async fn resume(&mut self) -> Result<()> {
        let selector = self.resume_state.resume_selector();
        let command = command::build_aggregate(&self.target, &self.pipeline, &self.options, &selector);

        let reply = self
            .transport
            .aggregate(command, self.options.selection_criteria.as_ref())
            .await?;

        self.resume_state.record_open_reply(
            reply.operation_time,
            reply.post_batch_resume_token.clone().map(event::ResumeToken),
        );
        #[cfg(feature = "tracing-unstable")]
        tracing::debug!(
            target: "changestream_core",
            new_cursor_id = reply.cursor_id,
            "change stream resumed"
        );
        self.cursor = Some(CursorAdapter::new(
            Arc::clone(&self.transport),
            reply.address,
            reply.ns.coll.clone(),
            reply.cursor_id,
            reply.first_batch,
            reply.post_batch_resume_token,
            self.options.batch_size,
            self.options.max_await_time.map(|d| d.as_millis() as i64),
        ));
        Ok(())
    }

    /// `destroy()` (spec §4.5): best-effort `killCursors` if the cursor is still alive, then
    /// transition to `Closed`.
    pub async fn destroy(mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            if cursor.cursor_id() != 0 {
                cursor.kill().await;
                cursor.disarm();
            }
        }
        self.state = State::Closed;
    }

    /// The most recent error this stream surfaced, alongside the raw reply document it came
    /// from, if any (spec §4, "Public API surface").
    pub fn error(&self) -> Option<(&Error, Option<&Document>)> {
        self.last_error.as_ref().map(|(e, d)| (e, d.as_ref()))
    }

    /// The current best resume token, chosen by the same precedence table `resume()` uses
    /// (spec §4, "Public API surface").
    pub fn get_resume_token(&self) -> Option<&event::ResumeToken> {
        self.resume_state.best_token()
    }

    /// Whether this stream is still able to produce documents: it hasn't errored out or been
    /// `destroy`ed, and its cursor hasn't been exhausted.
    pub fn is_alive(&self) -> bool {
        self.state == State::Open && self.cursor.as_ref().is_some_and(|c| !c.is_exhausted())
    }

    fn fail(&mut self, err: Error) {
        let fatal = err.classify().is_fatal();
        #[cfg(feature = "tracing-unstable")]
        tracing::warn!(target: "changestream_core", error = %err, fatal, "change stream errored");
        let raw = err.raw_reply().cloned();
        self.state = State::Errored;
        self.last_error = Some((err, raw));
    }
}

impl<Tr: CommandTransport, T: DeserializeOwned> ChangeStream<Tr, T> {
    /// Reinterpret the event type this stream deserializes into, used when switching from the
    /// untyped resume path back to the caller's requested type (spec §6).
    pub(crate) fn with_type<U: DeserializeOwned>(self) -> ChangeStream<Tr, U> {
        ChangeStream {
            transport: self.transport,
            target: self.target,
            pipeline: self.pipeline,
            options: self.options,
            resume_state: self.resume_state,
            cursor: self.cursor,
            resumed_once_this_batch: self.resumed_once_this_batch,
            state: self.state,
            last_error: self.last_error,
            _marker: PhantomData,
        }
    }
}
