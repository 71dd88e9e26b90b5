//! Interface to the low-level cursor collaborator (spec §6).
//!
//! Everything in this module is the *interface* to an external collaborator: the component that
//! actually issues `aggregate` / `getMore` / `killCursors` over the wire, having already done
//! server selection, connection checkout, and BSON encoding. This crate never implements that
//! side; it only depends on the [`CommandTransport`] trait, so any driver transport can plug in.

use std::{future::Future, pin::Pin};

use bson::{Document, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A boxed, `Send` future, matching the shape the rest of the driver uses for its own operation
/// futures.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque identifier for whichever server a command was most recently served by.
///
/// Resuming a stream must reuse the *original* read preference and re-run server selection
/// rather than simply retrying against this address (spec §4.5 step 3); the address is retained
/// only so a `killCursors` can be targeted at the server that actually owns the cursor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ServerAddress(pub String);

impl std::fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The server's reply to the initial `aggregate` command (spec §6).
#[derive(Clone, Debug)]
pub struct AggregateReply {
    /// The server this reply was served by.
    pub address: ServerAddress,
    /// `cursor.id`.
    pub cursor_id: i64,
    /// `cursor.ns`: the namespace `getMore`/`killCursors` must address this cursor through,
    /// which for a database- or deployment-scoped stream differs from the watched namespace.
    pub ns: crate::coll::Namespace,
    /// `cursor.firstBatch`.
    pub first_batch: Vec<Document>,
    /// `cursor.postBatchResumeToken`, if the server supports it.
    pub post_batch_resume_token: Option<Document>,
    /// The top-level `operationTime`, if the server returned one.
    pub operation_time: Option<Timestamp>,
}

/// The server's reply to a `getMore` command (spec §6).
#[derive(Clone, Debug)]
pub struct GetMoreReply {
    /// `cursor.id`; zero means the cursor is now exhausted.
    pub cursor_id: i64,
    /// `cursor.nextBatch`.
    pub next_batch: Vec<Document>,
    /// `cursor.postBatchResumeToken`, if the server supports it.
    pub post_batch_resume_token: Option<Document>,
}

/// The collaborator this crate depends on for the three wire commands a change stream issues.
///
/// Implementations own server selection, connection checkout, and wire encoding; this crate only
/// ever sees the command document it built and the reply fields named in spec §6.
pub trait CommandTransport: Send + Sync + 'static {
    /// Issue the `aggregate` command that opens a new cursor.
    fn aggregate<'a>(
        &'a self,
        command: Document,
        criteria: Option<&'a crate::selection_criteria::SelectionCriteria>,
    ) -> BoxFuture<'a, Result<AggregateReply>>;

    /// Issue a `getMore` against the given server for the given cursor.
    fn get_more<'a>(
        &'a self,
        command: Document,
        address: &'a ServerAddress,
    ) -> BoxFuture<'a, Result<GetMoreReply>>;

    /// Issue a best-effort `killCursors`. Failures are swallowed by the caller (spec §7).
    fn kill_cursors<'a>(
        &'a self,
        command: Document,
        address: &'a ServerAddress,
    ) -> BoxFuture<'a, ()>;
}
