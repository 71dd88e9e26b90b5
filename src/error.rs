//! Contains the `Error` and `Result` types used throughout this crate, along with the pure
//! classification function that decides whether a given error is resumable.

use std::{collections::HashSet, fmt, sync::Arc};

use bson::Document;
use thiserror::Error;

/// The result type used by fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Label attached to a server error that a 9.0+ (wire version 9+) server uses to tell the driver
/// a change stream error is resumable, superseding the fixed code table for older servers.
pub const RESUMABLE_CHANGE_STREAM_ERROR: &str = "ResumableChangeStreamError";

/// Label attached to a server error that tells the driver a change stream error is NOT resumable
/// even though its code would otherwise suggest it is.
pub const NON_RESUMABLE_CHANGE_STREAM_ERROR: &str = "NonResumableChangeStreamError";

const NON_RESUMABLE_CODES: [i32; 3] = [
    11601, // Interrupted
    136,   // CappedPositionLost
    237,   // CursorKilled
];

/// Codes for which the classifier also attempts a best-effort `killCursors` even though the
/// error is fatal. Kept as data so it can be exercised directly by the classifier's tests.
const KILL_CURSOR_ON_FATAL_CODES: [i32; 1] = [136];

/// An error that can occur while driving a change stream. The inner [`ErrorKind`] is wrapped in
/// an `Arc` so that `Error` is cheap to clone into a sticky, terminal slot on a stream.
#[derive(Clone, Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: Arc<ErrorKind>,
    labels: HashSet<String>,
    pub(crate) wire_version: Option<i32>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, labels: HashSet<String>) -> Self {
        Self {
            kind: Arc::new(kind),
            labels,
            wire_version: None,
        }
    }

    /// Construct an error with no labels and no known wire version.
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, HashSet::new())
    }

    pub(crate) fn with_wire_version(mut self, wire_version: Option<i32>) -> Self {
        self.wire_version = wire_version;
        self
    }

    /// The labels the server (or the client, for locally-constructed errors) attached to this
    /// error.
    pub fn labels(&self) -> &HashSet<String> {
        &self.labels
    }

    /// Whether this error carries the given label.
    pub fn contains_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    fn command_code(&self) -> Option<i32> {
        match self.kind.as_ref() {
            ErrorKind::Command(c) => Some(c.code),
            _ => None,
        }
    }

    /// The raw server reply this error was built from, if it carries one (spec §7,
    /// `error_document`). Only `ErrorKind::Command` can carry one.
    pub fn raw_reply(&self) -> Option<&Document> {
        match self.kind.as_ref() {
            ErrorKind::Command(c) => c.raw.as_ref(),
            _ => None,
        }
    }

    /// The Error Classifier (spec §4.4): a pure, table-driven function from this error to a
    /// [`ClassifiedError`]. Never mutates `self` and never inspects anything but `kind`,
    /// `labels`, and `wire_version`.
    pub fn classify(&self) -> ClassifiedError {
        match self.kind.as_ref() {
            ErrorKind::ServerSelection { .. } => ClassifiedError::Fatal,
            ErrorKind::Transport { during_get_more, .. } if *during_get_more => {
                ClassifiedError::ResumableNoKill
            }
            ErrorKind::Transport { .. } => ClassifiedError::ResumableKillCursor,
            ErrorKind::Command(c) => self.classify_command(c),
            ErrorKind::MissingResumeToken => ClassifiedError::Fatal,
            ErrorKind::InvalidArgument { .. } | ErrorKind::BsonInvalid { .. } => {
                ClassifiedError::Fatal
            }
        }
    }

    fn classify_command(&self, c: &CommandError) -> ClassifiedError {
        if c.code == 0 {
            let msg = c.message.to_ascii_lowercase();
            if msg.contains("not master") || msg.contains("node is recovering") {
                return ClassifiedError::ResumableNoKill;
            }
        }

        if NON_RESUMABLE_CODES.contains(&c.code)
            || self.contains_label(NON_RESUMABLE_CHANGE_STREAM_ERROR)
        {
            return if KILL_CURSOR_ON_FATAL_CODES.contains(&c.code) {
                ClassifiedError::FatalKillCursor
            } else {
                ClassifiedError::Fatal
            };
        }

        ClassifiedError::ResumableKillCursor
    }

    /// Convenience matching the boolean the state machine needs: whether exactly one resume
    /// attempt should be made.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self.classify(),
            ClassifiedError::ResumableKillCursor | ClassifiedError::ResumableNoKill
        )
    }
}

/// The outcome of running the Error Classifier (spec §4.4) over a reply or transport event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassifiedError {
    /// Not an error (reserved for callers that want a uniform "none" variant; never produced by
    /// [`Error::classify`] since it is only called on an existing `Error`).
    None,
    /// Recoverable by resuming; a best-effort `killCursors` should be sent first.
    ResumableKillCursor,
    /// Recoverable by resuming; the server-side cursor is already gone, so no `killCursors` is
    /// sent.
    ResumableNoKill,
    /// Terminal; the stream must not attempt to resume.
    Fatal,
    /// Terminal, but a best-effort `killCursors` is still attempted (spec §4.4 rule 4, code 136).
    FatalKillCursor,
}

impl ClassifiedError {
    /// Whether this classification calls for a best-effort `killCursors` before anything else.
    pub fn should_kill_cursor(&self) -> bool {
        matches!(self, Self::ResumableKillCursor | Self::FatalKillCursor)
    }

    /// Whether this classification is terminal for the stream.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal | Self::FatalKillCursor)
    }
}

/// The kinds of error this crate's operations can fail with.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An invalid argument was provided to a `watch` call.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// The server returned an error to an `aggregate`, `getMore`, or `killCursors` command.
    #[error("command failed: {0}")]
    Command(CommandError),

    /// A client-local transport failure (socket hang-up, connection reset, deadline exceeded).
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
        /// Whether the failure happened while awaiting a `getMore` reply specifically; this
        /// changes classification per spec §4.4 rule 2.
        during_get_more: bool,
    },

    /// The client could not select a server for the operation.
    #[error("server selection failed: {message}")]
    ServerSelection {
        /// Description of the selection failure.
        message: String,
    },

    /// No resume token was present (or it was not document-typed) in a change stream document.
    #[error("cannot provide resume functionality when the resume token is missing")]
    MissingResumeToken,

    /// The document returned by the server could not be decoded.
    #[error("invalid bson: {message}")]
    BsonInvalid {
        /// Description of the decode failure.
        message: String,
    },
}

/// An error reported by the server in reply to a command.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandError {
    /// The numeric error code, or `0` if the server reply had none (e.g. a bare `errmsg` on an
    /// older topology during a state change).
    pub code: i32,
    /// The server's symbolic name for `code`, if it sent one.
    pub code_name: String,
    /// The human-readable message, corresponding to the wire `errmsg` field.
    pub message: String,
    /// The full raw reply document, when the transport collaborator was able to supply one
    /// (spec §7, `error_document`/`ServerError{..., raw}`). Surfaced to callers via
    /// [`super::change_stream::ChangeStream::error`].
    pub raw: Option<Document>,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(code={}, codeName={:?}) {}", self.code, self.code_name, self.message)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::from_kind(kind)
    }
}

#[cfg(test)]
fn command_error(code: i32, message: &str) -> Error {
    Error::from_kind(ErrorKind::Command(CommandError {
        code,
        code_name: String::new(),
        message: message.to_string(),
        raw: None,
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn server_selection_is_fatal() {
        let err = Error::from_kind(ErrorKind::ServerSelection {
            message: "no suitable server".into(),
        });
        assert_eq!(err.classify(), ClassifiedError::Fatal);
        assert!(!err.is_resumable());
    }

    #[test]
    fn get_more_hangup_is_resumable_no_kill() {
        let err = Error::from_kind(ErrorKind::Transport {
            message: "connection reset".into(),
            during_get_more: true,
        });
        assert_eq!(err.classify(), ClassifiedError::ResumableNoKill);
        assert!(!err.classify().should_kill_cursor());
    }

    #[test]
    fn not_master_errmsg_without_code_is_resumable_no_kill() {
        let err = command_error(0, "not master or recovering");
        assert_eq!(err.classify(), ClassifiedError::ResumableNoKill);
    }

    #[test]
    fn denylisted_code_is_fatal() {
        let err = command_error(11601, "operation was interrupted");
        assert_eq!(err.classify(), ClassifiedError::Fatal);
        assert!(err.classify().is_fatal());
        assert!(!err.classify().should_kill_cursor());
    }

    #[test]
    fn capped_position_lost_is_fatal_but_still_kills_cursor() {
        let err = command_error(136, "capped position lost");
        assert_eq!(err.classify(), ClassifiedError::FatalKillCursor);
        assert!(err.classify().is_fatal());
        assert!(err.classify().should_kill_cursor());
    }

    #[test]
    fn non_resumable_label_overrides_an_otherwise_resumable_code() {
        let mut labels = HashSet::new();
        labels.insert(NON_RESUMABLE_CHANGE_STREAM_ERROR.to_string());
        let err = Error::new(
            ErrorKind::Command(CommandError {
                code: 6,
                code_name: "HostUnreachable".into(),
                message: "host unreachable".into(),
                raw: None,
            }),
            labels,
        );
        assert_eq!(err.classify(), ClassifiedError::Fatal);
    }

    #[test]
    fn other_nonzero_code_is_resumable_kill_cursor() {
        let err = command_error(6, "host unreachable");
        assert_eq!(err.classify(), ClassifiedError::ResumableKillCursor);
        assert!(err.is_resumable());
        assert!(err.classify().should_kill_cursor());
    }

    #[test]
    fn missing_resume_token_is_fatal() {
        let err = Error::from_kind(ErrorKind::MissingResumeToken);
        assert_eq!(err.classify(), ClassifiedError::Fatal);
    }
}
