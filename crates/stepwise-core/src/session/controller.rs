use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::model::{Advance, Invocation, Session, SessionKey};
use super::registry::{Disposition, SessionRegistry};
use crate::command::{CommandSpecProvider, CompletionSink, GuidedCommand};
use crate::config::EngineConfig;
use crate::error::{Result, StepwiseError};
use crate::messaging::{MessageDeleter, MessageHandle, MessageSender, OutboundMessage};
use crate::step::{ParseFailure, SessionSpec};

/// What a single inbound reply did to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No live session for the key; the message belongs to ordinary processing.
    NoSession,
    /// The reply failed validation and the current prompt was sent again.
    Reprompted(ParseFailure),
    /// The reply was accepted; `step_index` is the step now awaiting an answer.
    Advanced { step_index: usize },
    /// The last step was answered and the completion sink has run.
    Completed,
    /// The breakout keyword ended the session.
    Aborted,
    /// The session was found in an inconsistent state and dropped.
    Faulted(StepwiseError),
}

impl UpdateOutcome {
    /// True if the reply was consumed by a session.
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::NoSession)
    }
}

/// Decided under the registry lock, carried out after it is released.
enum Transition {
    Inconsistent(StepwiseError),
    Aborted {
        title: String,
    },
    Rejected {
        failure: ParseFailure,
        step_index: usize,
        prompt: Option<OutboundMessage>,
    },
    Advanced {
        step_index: usize,
        answered: Vec<MessageHandle>,
        prompt: Option<OutboundMessage>,
    },
    Completed {
        answered: Vec<MessageHandle>,
    },
}

/// Drives guided sessions from start to completion.
///
/// Every transition is computed by a synchronous closure run under the registry's
/// write lock. Prompts, deletions, notices and completion callbacks are dispatched
/// only after the lock has been released.
pub struct SessionController {
    registry: SessionRegistry,
    sender: Arc<dyn MessageSender>,
    deleter: Arc<dyn MessageDeleter>,
    commands: Arc<dyn CommandSpecProvider>,
    config: EngineConfig,
}

impl SessionController {
    pub fn new(
        registry: SessionRegistry,
        sender: Arc<dyn MessageSender>,
        deleter: Arc<dyn MessageDeleter>,
        commands: Arc<dyn CommandSpecProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            sender,
            deleter,
            commands,
            config,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn active_sessions(&self) -> usize {
        self.registry.len().await
    }

    /// Starts `command` for `key` and sends its first prompt.
    ///
    /// # Errors
    ///
    /// Returns [`StepwiseError::DuplicateSession`] if `key` already has a live session,
    /// or [`StepwiseError::EmptySpec`] if the command has no steps.
    pub async fn begin(
        &self,
        key: SessionKey,
        command: &GuidedCommand,
        started_by: Invocation,
    ) -> Result<()> {
        self.begin_with(
            key,
            Arc::clone(&command.spec),
            Arc::clone(&command.sink),
            started_by,
        )
        .await
    }

    /// Starts a session from a bare spec and sink.
    pub async fn begin_with(
        &self,
        key: SessionKey,
        spec: Arc<SessionSpec>,
        sink: Arc<dyn CompletionSink>,
        started_by: Invocation,
    ) -> Result<()> {
        if spec.is_empty() {
            return Err(StepwiseError::EmptySpec(spec.title.clone()));
        }

        let session = Session::new(key.clone(), spec, sink, started_by, Utc::now());
        let session_id = session.id();
        let title = session.spec().title.clone();
        let first_prompt = session.prompt_message(None);

        self.registry.register(session).await?;
        tracing::info!(
            "[SessionController] Started '{}' for {} (session {})",
            title,
            key,
            session_id
        );

        if let Some(prompt) = first_prompt {
            self.send_prompt(&key, 0, prompt).await;
        }
        Ok(())
    }

    /// Resolves `command_id` and starts it for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StepwiseError::UnknownCommand`] if no guided command matches, otherwise
    /// the errors of [`SessionController::begin`].
    pub async fn start_command(
        &self,
        command_id: &str,
        key: SessionKey,
        started_by: Invocation,
    ) -> Result<()> {
        let command = self
            .commands
            .command(command_id)
            .ok_or_else(|| StepwiseError::UnknownCommand(command_id.to_string()))?;
        self.begin(key, &command, started_by).await
    }

    /// Entry point for the message pipeline. Returns true if a session claimed the text.
    pub async fn on_inbound_message(&self, key: &SessionKey, raw: &str) -> bool {
        self.update(key, raw).await.is_handled()
    }

    /// Feeds one reply to the session for `key`.
    pub async fn update(&self, key: &SessionKey, raw: &str) -> UpdateOutcome {
        let now = Utc::now();
        let Some((transition, removed)) = self
            .registry
            .modify(key, |session| Self::transition(session, raw, now))
            .await
        else {
            return UpdateOutcome::NoSession;
        };

        match transition {
            Transition::Inconsistent(err) => {
                tracing::error!("[SessionController] Dropped session for {}: {}", key, err);
                UpdateOutcome::Faulted(err)
            }
            Transition::Aborted { title } => {
                tracing::info!("[SessionController] '{}' aborted by {}", title, key);
                if self.config.notify_on_abort {
                    self.notify(key, OutboundMessage::Aborted { title }).await;
                }
                UpdateOutcome::Aborted
            }
            Transition::Rejected {
                failure,
                step_index,
                prompt,
            } => {
                tracing::debug!(
                    "[SessionController] Rejected reply from {} at step {}: {}",
                    key,
                    step_index,
                    failure
                );
                if let Some(prompt) = prompt {
                    self.send_prompt(key, step_index, prompt).await;
                }
                UpdateOutcome::Reprompted(failure)
            }
            Transition::Advanced {
                step_index,
                answered,
                prompt,
            } => {
                self.delete_prompts(answered).await;
                if let Some(prompt) = prompt {
                    self.send_prompt(key, step_index, prompt).await;
                }
                UpdateOutcome::Advanced { step_index }
            }
            Transition::Completed { answered } => {
                self.delete_prompts(answered).await;
                if let Some(session) = removed {
                    self.complete(session).await;
                }
                UpdateOutcome::Completed
            }
        }
    }

    /// Aborts the session for `key` without running its completion sink.
    pub async fn cancel(&self, key: &SessionKey) -> bool {
        let Some(session) = self.registry.remove(key).await else {
            return false;
        };
        let title = session.spec().title.clone();
        tracing::info!("[SessionController] '{}' cancelled for {}", title, key);
        if self.config.notify_on_abort {
            self.notify(key, OutboundMessage::Aborted { title }).await;
        }
        true
    }

    /// Drops every session idle beyond the configured timeout. Returns how many were
    /// dropped.
    pub async fn sweep_idle(&self) -> usize {
        self.sweep_idle_at(Utc::now()).await
    }

    /// [`SessionController::sweep_idle`] against an explicit clock reading.
    pub async fn sweep_idle_at(&self, now: DateTime<Utc>) -> usize {
        let Some(max_idle) = self
            .config
            .idle_timeout()
            .and_then(|timeout| chrono::Duration::from_std(timeout).ok())
        else {
            return 0;
        };

        let expired = self.registry.remove_idle(now, max_idle).await;
        for session in &expired {
            let title = session.spec().title.clone();
            tracing::info!(
                "[SessionController] '{}' for {} timed out at step {}",
                title,
                session.key(),
                session.current_step()
            );
            if self.config.notify_on_timeout {
                self.notify(session.key(), OutboundMessage::TimedOut { title })
                    .await;
            }
        }
        expired.len()
    }

    /// Runs [`SessionController::sweep_idle`] periodically until `cancel` fires.
    ///
    /// Returns `None` when the idle timeout is disabled.
    pub fn spawn_idle_sweeper(
        self: Arc<Self>,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        self.config.idle_timeout()?;
        let every = self.config.sweep_interval();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("[SessionController] Idle sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let dropped = self.sweep_idle().await;
                        if dropped > 0 {
                            tracing::debug!("[SessionController] Swept {} idle sessions", dropped);
                        }
                    }
                }
            }
        }))
    }

    fn transition(
        session: &mut Session,
        raw: &str,
        now: DateTime<Utc>,
    ) -> (Transition, Disposition) {
        if let Err(err) = session.check_consistency() {
            return (Transition::Inconsistent(err), Disposition::Remove);
        }
        // A live session always has a step awaiting an answer.
        if session.is_complete() {
            let err = StepwiseError::InternalConsistency {
                key: session.key().clone(),
                step_index: session.current_step(),
                responses: session.responses().len(),
            };
            return (Transition::Inconsistent(err), Disposition::Remove);
        }

        if session.spec().is_breakout(raw) {
            let title = session.spec().title.clone();
            return (Transition::Aborted { title }, Disposition::Remove);
        }

        let delete_answered = session.spec().delete_previous_prompt;
        match session.apply(raw, now) {
            Advance::Rejected(failure) => {
                let prompt = session.prompt_message(Some(failure.reason.notice()));
                let transition = Transition::Rejected {
                    failure,
                    step_index: session.current_step(),
                    prompt,
                };
                (transition, Disposition::Keep)
            }
            Advance::Accepted { answered_prompts } => {
                let answered = if delete_answered {
                    answered_prompts
                } else {
                    Vec::new()
                };
                if session.is_complete() {
                    (Transition::Completed { answered }, Disposition::Remove)
                } else {
                    let transition = Transition::Advanced {
                        step_index: session.current_step(),
                        answered,
                        prompt: session.prompt_message(None),
                    };
                    (transition, Disposition::Keep)
                }
            }
        }
    }

    async fn complete(&self, session: Session) {
        let session_id = session.id();
        let title = session.spec().title.clone();
        let sink = Arc::clone(session.sink());
        let (key, responses, started_by) = session.into_parts();

        tracing::info!(
            "[SessionController] '{}' completed by {} with {} responses (session {})",
            title,
            key,
            responses.len(),
            session_id
        );
        if let Err(e) = sink.finish(&key, responses, started_by).await {
            tracing::warn!(
                "[SessionController] Completion of '{}' for {} failed: {}",
                title,
                key,
                e
            );
        }
    }

    async fn send_prompt(&self, key: &SessionKey, step_index: usize, prompt: OutboundMessage) {
        match self.sender.send(key, prompt).await {
            Ok(handle) => {
                self.registry.record_prompt(key, step_index, handle).await;
            }
            Err(e) => {
                tracing::warn!(
                    "[SessionController] Failed to send prompt {} to {}: {}",
                    step_index + 1,
                    key,
                    e
                );
            }
        }
    }

    async fn notify(&self, key: &SessionKey, message: OutboundMessage) {
        if let Err(e) = self.sender.send(key, message).await {
            tracing::warn!("[SessionController] Failed to notify {}: {}", key, e);
        }
    }

    async fn delete_prompts(&self, handles: Vec<MessageHandle>) {
        for handle in handles {
            if let Err(e) = self.deleter.delete(&handle).await {
                tracing::debug!(
                    "[SessionController] Could not delete prompt {}: {}",
                    handle,
                    e
                );
            }
        }
    }
}
