//! Wraps the generic cursor collaborator with the batch-buffer bookkeeping a change stream needs
//! (spec §4.3).

use std::{collections::VecDeque, sync::Arc};

use bson::Document;

use crate::{
    cursor::{CommandTransport, GetMoreReply, ServerAddress},
    error::Result,
};

/// The outcome of asking the adapter for the next document (spec §4.3).
pub(crate) enum Advance {
    Document(Document),
    /// The batch buffer is empty and the cursor is exhausted, or a `getMore` returned an empty
    /// batch against a still-live cursor.
    NoDocument,
}

/// Wraps a [`CommandTransport`] with the buffer and cursor-id bookkeeping a change stream needs.
/// Never decides whether to resume; errors are surfaced to the caller for classification
/// (spec §4.3).
pub(crate) struct CursorAdapter<T: CommandTransport> {
    transport: Arc<T>,
    address: ServerAddress,
    cursor_id: i64,
    collection: String,
    batch: VecDeque<Document>,
    pub(crate) post_batch_token: Option<Document>,
    batch_size: Option<u32>,
    max_await_time_ms: Option<i64>,
}

impl<T: CommandTransport> CursorAdapter<T> {
    pub(crate) fn new(
        transport: Arc<T>,
        address: ServerAddress,
        collection: String,
        cursor_id: i64,
        first_batch: Vec<Document>,
        post_batch_token: Option<Document>,
        batch_size: Option<u32>,
        max_await_time_ms: Option<i64>,
    ) -> Self {
        Self {
            transport,
            address,
            cursor_id,
            collection,
            batch: first_batch.into(),
            post_batch_token,
            batch_size,
            max_await_time_ms,
        }
    }

    pub(crate) fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub(crate) fn cursor_id(&self) -> i64 {
        self.cursor_id
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.cursor_id == 0 && self.batch.is_empty()
    }

    /// Pull one document, issuing a `getMore` if the local buffer is empty and the cursor is
    /// still alive (spec §4.3).
    pub(crate) async fn advance(&mut self) -> Result<Advance> {
        if let Some(doc) = self.batch.pop_front() {
            return Ok(Advance::Document(doc));
        }
        if self.cursor_id == 0 {
            return Ok(Advance::NoDocument);
        }

        let command = super::command::build_get_more(
            self.cursor_id,
            &self.collection,
            self.batch_size,
            self.max_await_time_ms,
        );
        let GetMoreReply {
            cursor_id,
            next_batch,
            post_batch_resume_token,
        } = self.transport.get_more(command, &self.address).await?;

        self.cursor_id = cursor_id;
        if let Some(token) = post_batch_resume_token {
            self.post_batch_token = Some(token);
        }
        self.batch = next_batch.into();

        match self.batch.pop_front() {
            Some(doc) => Ok(Advance::Document(doc)),
            None => Ok(Advance::NoDocument),
        }
    }

    /// Send a best-effort `killCursors`; errors are swallowed by the caller's contract
    /// (spec §4.5 `resume()` step 1, `destroy()`).
    pub(crate) async fn kill(&self) {
        if self.cursor_id == 0 {
            return;
        }
        let command = super::command::build_kill_cursors(self.cursor_id, &self.collection);
        self.transport.kill_cursors(command, &self.address).await;
    }

    /// Disarm the drop-time `killCursors`, used once an explicit `destroy()` or `resume()` has
    /// already issued one for this cursor.
    pub(crate) fn disarm(&mut self) {
        self.cursor_id = 0;
    }
}

impl<T: CommandTransport> Drop for CursorAdapter<T> {
    /// Best-effort `killCursors` for a cursor that goes out of scope still alive, without the
    /// caller ever calling `destroy()` (spec §6).
    fn drop(&mut self) {
        if self.cursor_id == 0 {
            return;
        }
        let transport = Arc::clone(&self.transport);
        let address = self.address.clone();
        let command = super::command::build_kill_cursors(self.cursor_id, &self.collection);
        tokio::spawn(async move {
            transport.kill_cursors(command, &address).await;
        });
    }
}
