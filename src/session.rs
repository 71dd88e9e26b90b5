//! An opaque handle to a server session.
//!
//! Session bookkeeping (starting, ending, causal consistency, transaction state) is an external
//! collaborator this crate does not own (spec §1, Out of scope). A [`ClientSession`] is only
//! ever referenced, never constructed, by this crate — callers obtain one from the rest of their
//! driver and thread it through [`crate::change_stream::session::SessionChangeStream`].

/// A handle to a logical session on the server.
///
/// This crate treats the session as a black box: it forwards the handle's wire-level session
/// fields into the commands it builds, and never inspects or mutates its internal state.
#[derive(Debug)]
pub struct ClientSession {
    id: bson::Document,
}

impl ClientSession {
    /// Construct a handle from the raw session id document the owning driver maintains.
    pub fn from_id(id: bson::Document) -> Self {
        Self { id }
    }

    /// The wire-level session id document, forwarded as the `lsid` field of commands this crate
    /// issues on the caller's behalf.
    pub fn id(&self) -> &bson::Document {
        &self.id
    }
}
