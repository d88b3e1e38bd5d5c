//! Live session state.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::command::CompletionSink;
use crate::error::{Result, StepwiseError};
use crate::messaging::{MessageHandle, OutboundMessage};
use crate::step::{ParseFailure, Response, SessionSpec, StepSpec, validate};

/// Identifies whose replies belong to a session: one participant in one channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub channel_id: String,
    pub participant_id: String,
}

impl SessionKey {
    pub fn new(channel_id: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            participant_id: participant_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.participant_id, self.channel_id)
    }
}

/// Context of the command invocation that started a session.
///
/// The engine never inspects it; it is handed back to the completion sink untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Server the command was issued in, if any
    pub guild_id: Option<String>,
    /// Display name of the participant
    pub display_name: String,
    /// The message that invoked the command
    pub message: Option<MessageHandle>,
}

/// Result of feeding one reply to [`Session::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The reply failed validation; nothing but the activity timestamp changed.
    Rejected(ParseFailure),
    /// The reply was recorded. Carries the prompts sent for the answered step.
    Accepted { answered_prompts: Vec<MessageHandle> },
}

/// One in-progress guided conversation.
///
/// Invariant: `responses.len() == current_step <= spec.steps.len()`. The only mutators
/// are [`Session::apply`] and [`Session::record_prompt`], and neither can break it.
#[derive(Clone)]
pub struct Session {
    id: Uuid,
    key: SessionKey,
    spec: Arc<SessionSpec>,
    sink: Arc<dyn CompletionSink>,
    current_step: usize,
    responses: Vec<Response>,
    started_by: Invocation,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    prompts: Vec<MessageHandle>,
}

impl Session {
    pub fn new(
        key: SessionKey,
        spec: Arc<SessionSpec>,
        sink: Arc<dyn CompletionSink>,
        started_by: Invocation,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            spec,
            sink,
            current_step: 0,
            responses: Vec::new(),
            started_by,
            created_at: now,
            last_activity: now,
            prompts: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn spec(&self) -> &Arc<SessionSpec> {
        &self.spec
    }

    pub fn sink(&self) -> &Arc<dyn CompletionSink> {
        &self.sink
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    pub fn started_by(&self) -> &Invocation {
        &self.started_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// The step awaiting a reply, or `None` once every step is answered.
    pub fn current_step_spec(&self) -> Option<&StepSpec> {
        self.spec.steps.get(self.current_step)
    }

    pub fn is_complete(&self) -> bool {
        self.current_step == self.spec.steps.len()
    }

    /// Verifies the response count still matches the step index.
    pub fn check_consistency(&self) -> Result<()> {
        if self.responses.len() != self.current_step || self.current_step > self.spec.steps.len()
        {
            return Err(StepwiseError::InternalConsistency {
                key: self.key.clone(),
                step_index: self.current_step,
                responses: self.responses.len(),
            });
        }
        Ok(())
    }

    /// Validates `raw` against the current step and records it on success.
    pub fn apply(&mut self, raw: &str, now: DateTime<Utc>) -> Advance {
        self.last_activity = now;

        let Some(step) = self.current_step_spec() else {
            return Advance::Accepted {
                answered_prompts: Vec::new(),
            };
        };

        match validate(step, raw) {
            Ok(response) => {
                self.responses.push(response);
                self.current_step += 1;
                Advance::Accepted {
                    answered_prompts: std::mem::take(&mut self.prompts),
                }
            }
            Err(failure) => Advance::Rejected(failure),
        }
    }

    /// The prompt for the current step, optionally prefixed by a validation notice.
    pub fn prompt_message(&self, notice: Option<&str>) -> Option<OutboundMessage> {
        let step = self.current_step_spec()?;
        Some(OutboundMessage::Prompt {
            title: self.spec.title.clone(),
            step_index: self.current_step,
            step_count: self.spec.steps.len(),
            prompt: step.prompt.clone(),
            breakout_keyword: self.spec.breakout_keyword.clone(),
            notice: notice.map(str::to_string),
        })
    }

    /// Remembers a prompt sent for `step`. Ignored if the session has moved on.
    pub fn record_prompt(&mut self, step: usize, handle: MessageHandle) -> bool {
        if step != self.current_step {
            return false;
        }
        self.prompts.push(handle);
        true
    }

    /// Prompts sent for the current step that are still visible.
    pub fn pending_prompts(&self) -> &[MessageHandle] {
        &self.prompts
    }

    /// True when the session has been idle for at least `max_idle`.
    pub fn is_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> bool {
        now - self.last_activity >= max_idle
    }

    /// Consumes the session, yielding what the completion sink receives.
    pub fn into_parts(self) -> (SessionKey, Vec<Response>, Invocation) {
        (self.key, self.responses, self.started_by)
    }

    #[cfg(test)]
    pub(crate) fn push_stray_response(&mut self, response: Response) {
        self.responses.push(response);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("title", &self.spec.title)
            .field("current_step", &self.current_step)
            .field("responses", &self.responses)
            .field("created_at", &self.created_at)
            .field("last_activity", &self.last_activity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::NoopSink;
    use crate::step::{FailureReason, StepSpec};

    fn scenario_spec() -> Arc<SessionSpec> {
        Arc::new(
            SessionSpec::new("Bot configuration", "finish")
                .step(StepSpec::yes_no("Limit to one role?"))
                .step(StepSpec::integer("Max per 15s?")),
        )
    }

    fn session() -> Session {
        Session::new(
            SessionKey::new("general", "alice"),
            scenario_spec(),
            Arc::new(NoopSink),
            Invocation::default(),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_session_awaits_first_step() {
        let session = session();
        assert_eq!(session.current_step(), 0);
        assert!(session.responses().is_empty());
        assert_eq!(
            session.current_step_spec().map(|s| s.prompt.as_str()),
            Some("Limit to one role?")
        );
        assert!(session.check_consistency().is_ok());
    }

    #[test]
    fn test_rejected_reply_leaves_state_unchanged() {
        let mut session = session();
        session.apply("yes", Utc::now());

        for _ in 0..3 {
            match session.apply("abc", Utc::now()) {
                Advance::Rejected(failure) => {
                    assert_eq!(failure.reason, FailureReason::NotInteger)
                }
                other => panic!("expected rejection, got {other:?}"),
            }
            assert_eq!(session.current_step(), 1);
            assert_eq!(session.responses(), &[Response::YesNo(true)]);
        }
        assert!(session.check_consistency().is_ok());
    }

    #[test]
    fn test_accepting_last_step_completes() {
        let mut session = session();
        session.apply("y", Utc::now());
        session.apply("5", Utc::now());

        assert!(session.is_complete());
        assert!(session.prompt_message(None).is_none());
        let (key, responses, _) = session.into_parts();
        assert_eq!(key, SessionKey::new("general", "alice"));
        assert_eq!(responses, vec![Response::YesNo(true), Response::Integer(5)]);
    }

    #[test]
    fn test_prompts_are_handed_back_when_step_is_answered() {
        let mut session = session();
        assert!(session.record_prompt(0, MessageHandle::new("m1")));
        session.apply("maybe", Utc::now());
        assert!(session.record_prompt(0, MessageHandle::new("m2")));
        assert!(!session.record_prompt(1, MessageHandle::new("stale")));

        match session.apply("no", Utc::now()) {
            Advance::Accepted { answered_prompts } => assert_eq!(
                answered_prompts,
                vec![MessageHandle::new("m1"), MessageHandle::new("m2")]
            ),
            other => panic!("expected acceptance, got {other:?}"),
        }
        assert!(session.pending_prompts().is_empty());
    }

    #[test]
    fn test_prompt_message_carries_notice() {
        let session = session();
        let message = session.prompt_message(Some("Please answer yes or no."));
        match message {
            Some(OutboundMessage::Prompt {
                step_index,
                step_count,
                notice,
                ..
            }) => {
                assert_eq!(step_index, 0);
                assert_eq!(step_count, 2);
                assert_eq!(notice.as_deref(), Some("Please answer yes or no."));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_idle_detection() {
        let start = Utc::now();
        let session = Session::new(
            SessionKey::new("c", "p"),
            scenario_spec(),
            Arc::new(NoopSink),
            Invocation::default(),
            start,
        );
        assert!(!session.is_idle(start + Duration::seconds(59), Duration::seconds(60)));
        assert!(session.is_idle(start + Duration::seconds(60), Duration::seconds(60)));
    }

    #[test]
    fn test_consistency_check_detects_mismatch() {
        let mut session = session();
        session.push_stray_response(Response::YesNo(true));
        let err = session.check_consistency().unwrap_err();
        assert!(err.is_internal_consistency());
    }

    #[test]
    fn test_session_key_display() {
        assert_eq!(SessionKey::new("general", "alice").to_string(), "alice@general");
    }
}
