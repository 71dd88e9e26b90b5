//! Resume-token bookkeeping and the resume-selector precedence table (spec §3, §4.5).

use bson::Timestamp;

use crate::change_stream::{event::ResumeToken, options::ChangeStreamOptions};

/// The selector to emit into a `$changeStream` stage, chosen by [`ResumeState::resume_selector`]
/// (on resume) or [`ResumeState::initial_selector`] (on the very first open).
///
/// Exactly one variant is ever emitted per command (spec §4.5 step 2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ResumeSelector {
    ResumeAfter(ResumeToken),
    StartAfter(ResumeToken),
    StartAtOperationTime(Timestamp),
    None,
}

/// Everything a stream needs to remember in order to resume itself (spec §3's `ResumeState`).
///
/// `token` unifies precedence rows 1 and 2 of the table in spec §4.5: it is updated to the
/// front-of-buffer document's `_id` every time a document is consumed, and falls back to the
/// most recent `postBatchResumeToken` whenever the buffer empties out, exactly mirroring how a
/// single field can stand in for "are we at a batch boundary".
#[derive(Clone, Debug, Default)]
pub(crate) struct ResumeState {
    token: Option<ResumeToken>,
    document_returned: bool,
    resume_after: Option<ResumeToken>,
    start_after: Option<ResumeToken>,
    operation_time: Option<Timestamp>,
    start_at_operation_time: Option<Timestamp>,
}

impl ResumeState {
    /// Seed a fresh `ResumeState` from the user-supplied options (spec §4.5 `open()` step 1).
    pub(crate) fn new(options: &ChangeStreamOptions) -> Self {
        Self {
            token: None,
            document_returned: false,
            resume_after: options.resume_after.clone(),
            start_after: options.start_after.clone(),
            operation_time: None,
            start_at_operation_time: options.start_at_operation_time,
        }
    }

    /// The selector for the very first `aggregate` (spec §4.5 `open()` step 2): forwards
    /// whichever option-sourced field the caller supplied, verbatim, with no document-derived
    /// token in play yet.
    pub(crate) fn initial_selector(&self) -> ResumeSelector {
        if let Some(token) = &self.start_after {
            return ResumeSelector::StartAfter(token.clone());
        }
        if let Some(token) = &self.resume_after {
            return ResumeSelector::ResumeAfter(token.clone());
        }
        if let Some(ts) = self.start_at_operation_time {
            return ResumeSelector::StartAtOperationTime(ts);
        }
        ResumeSelector::None
    }

    /// The selector for a resume attempt (spec §4.5 `resume()` step 2), applying the full
    /// 7-row precedence table.
    pub(crate) fn resume_selector(&self) -> ResumeSelector {
        if let Some(token) = &self.token {
            return ResumeSelector::ResumeAfter(token.clone());
        }
        if !self.document_returned {
            if let Some(token) = &self.start_after {
                return ResumeSelector::ResumeAfter(token.clone());
            }
            if let Some(token) = &self.resume_after {
                return ResumeSelector::ResumeAfter(token.clone());
            }
        }
        if let Some(ts) = self.operation_time {
            return ResumeSelector::StartAtOperationTime(ts);
        }
        if let Some(ts) = self.start_at_operation_time {
            return ResumeSelector::StartAtOperationTime(ts);
        }
        ResumeSelector::None
    }

    /// Record the `operationTime` and `postBatchResumeToken` of an `aggregate` reply
    /// (spec §4.5 `open()` step 3). `operation_time` is captured only once: it is the
    /// timestamp of the *original* open, used only as a last-resort fallback (row 5).
    pub(crate) fn record_open_reply(
        &mut self,
        operation_time: Option<Timestamp>,
        post_batch_token: Option<ResumeToken>,
    ) {
        if self.operation_time.is_none() {
            self.operation_time = operation_time;
        }
        self.token = post_batch_token;
    }

    /// Record the outcome of consuming one batch (initial or `getMore`): if a document was
    /// popped from the front of the buffer, its token becomes the new resume anchor; otherwise
    /// the batch's `postBatchResumeToken` does (spec §4.5 table rows 1-2).
    pub(crate) fn record_batch(
        &mut self,
        returned_doc_token: Option<ResumeToken>,
        post_batch_token: Option<ResumeToken>,
    ) {
        if let Some(token) = returned_doc_token {
            self.document_returned = true;
            self.token = Some(token);
        } else if let Some(token) = post_batch_token {
            self.token = Some(token);
        }
    }

    /// The best current resume token, exposed by the stream's `get_resume_token` accessor
    /// (spec §6 public API surface).
    pub(crate) fn best_token(&self) -> Option<&ResumeToken> {
        self.token.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bson::doc;

    fn token(n: i32) -> ResumeToken {
        ResumeToken(doc! { "_data": n.to_string() })
    }

    #[test]
    fn initial_selector_prefers_start_after_over_resume_after() {
        let mut opts = ChangeStreamOptions::default();
        opts.start_after = Some(token(1));
        opts.resume_after = Some(token(2));
        let state = ResumeState::new(&opts);
        assert_eq!(state.initial_selector(), ResumeSelector::StartAfter(token(1)));
    }

    #[test]
    fn empty_first_batch_falls_back_to_captured_operation_time() {
        let opts = ChangeStreamOptions::default();
        let mut state = ResumeState::new(&opts);
        let ts = Timestamp {
            time: 10,
            increment: 1,
        };
        state.record_open_reply(Some(ts), None);
        assert_eq!(state.resume_selector(), ResumeSelector::StartAtOperationTime(ts));
    }

    #[test]
    fn document_token_wins_over_captured_operation_time() {
        let opts = ChangeStreamOptions::default();
        let mut state = ResumeState::new(&opts);
        state.record_open_reply(
            Some(Timestamp {
                time: 10,
                increment: 1,
            }),
            None,
        );
        state.record_batch(Some(token(5)), None);
        assert_eq!(state.resume_selector(), ResumeSelector::ResumeAfter(token(5)));
    }

    #[test]
    fn post_batch_token_at_boundary_wins_once_buffer_drains() {
        let opts = ChangeStreamOptions::default();
        let mut state = ResumeState::new(&opts);
        state.record_batch(Some(token(1)), None);
        state.record_batch(None, Some(token(2)));
        assert_eq!(state.resume_selector(), ResumeSelector::ResumeAfter(token(2)));
    }

    #[test]
    fn user_resume_after_only_applies_before_any_document_returned() {
        let mut opts = ChangeStreamOptions::default();
        opts.resume_after = Some(token(9));
        let mut state = ResumeState::new(&opts);
        assert_eq!(state.resume_selector(), ResumeSelector::ResumeAfter(token(9)));
        state.record_batch(Some(token(1)), None);
        assert_eq!(state.resume_selector(), ResumeSelector::ResumeAfter(token(1)));
    }

    #[test]
    fn no_information_yields_none() {
        let opts = ChangeStreamOptions::default();
        let state = ResumeState::new(&opts);
        assert_eq!(state.resume_selector(), ResumeSelector::None);
    }
}
