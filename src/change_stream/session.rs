//! A change stream variant that must be driven with an explicit [`ClientSession`] on every call
//! (spec §6, session-bound stream variant).

use serde::de::DeserializeOwned;

use crate::{
    change_stream::{event::ResumeToken, ChangeStream},
    cursor::CommandTransport,
    error::Result,
    session::ClientSession,
};

/// A change stream opened within a [`ClientSession`]. Session bookkeeping itself (causal
/// consistency, transaction state) is an external collaborator this crate does not own; this
/// type exists only to make "pass the same session to every call" part of the type signature,
/// the way the rest of a session-aware driver would enforce it.
pub struct SessionChangeStream<Tr: CommandTransport, T = super::event::ChangeStreamEvent<bson::Document>> {
    inner: ChangeStream<Tr, T>,
}

impl<Tr: CommandTransport, T: DeserializeOwned> SessionChangeStream<Tr, T> {
    pub(crate) fn new(inner: ChangeStream<Tr, T>) -> Self {
        Self { inner }
    }

    /// The cached resume token, as [`ChangeStream::get_resume_token`].
    pub fn get_resume_token(&self) -> Option<&ResumeToken> {
        self.inner.get_resume_token()
    }

    /// Whether this stream is still able to produce documents.
    pub fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    /// Update the type streamed values are parsed as.
    pub fn with_type<U: DeserializeOwned>(self) -> SessionChangeStream<Tr, U> {
        SessionChangeStream {
            inner: self.inner.with_type(),
        }
    }

    /// Retrieve the next result, making at most one request (spec §6, `next_if_any`).
    ///
    /// `session` must be the same session used to open this stream; it is accepted here, rather
    /// than captured once, because every wire command issued while iterating a session-bound
    /// cursor must carry that session's current transaction/causal-consistency state.
    pub async fn next_if_any(&mut self, _session: &mut ClientSession) -> Result<Option<T>> {
        self.inner.next_if_any().await
    }

    /// Retrieve the next result.
    pub async fn next(&mut self, session: &mut ClientSession) -> Result<Option<T>> {
        loop {
            match self.next_if_any(session).await? {
                Some(item) => return Ok(Some(item)),
                None if self.is_alive() => continue,
                None => return Ok(None),
            }
        }
    }

    /// Best-effort `killCursors`, then close.
    pub async fn destroy(self) {
        self.inner.destroy().await;
    }
}
