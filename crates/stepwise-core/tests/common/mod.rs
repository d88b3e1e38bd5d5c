#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use stepwise_core::{
    CommandTable, CompletionSink, EngineConfig, GuidedCommand, Invocation, MessageDeleter,
    MessageHandle, MessageSender, OutboundMessage, Response, Result, SessionController,
    SessionKey, SessionRegistry, SessionSpec, StepSpec, StepwiseError,
};
use tokio::sync::Mutex;

/// Records everything sent or deleted. Sending can be switched to fail.
#[derive(Default)]
pub struct MockMessenger {
    pub sent: Mutex<Vec<(SessionKey, OutboundMessage)>>,
    pub deleted: Mutex<Vec<MessageHandle>>,
    pub fail_sends: AtomicBool,
    next_id: AtomicUsize,
}

impl MockMessenger {
    pub async fn sent_to(&self, key: &SessionKey) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(target, _)| target == key)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

#[async_trait]
impl MessageSender for MockMessenger {
    async fn send(&self, target: &SessionKey, message: OutboundMessage) -> Result<MessageHandle> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(StepwiseError::messaging("transport offline"));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().await.push((target.clone(), message));
        Ok(MessageHandle::new(format!("msg-{id}")))
    }
}

#[async_trait]
impl MessageDeleter for MockMessenger {
    async fn delete(&self, handle: &MessageHandle) -> Result<()> {
        self.deleted.lock().await.push(handle.clone());
        Ok(())
    }
}

/// Records each completion with the key and invocation it was started with.
#[derive(Default)]
pub struct RecordingSink {
    pub completions: Mutex<Vec<(SessionKey, Vec<Response>, Invocation)>>,
    pub fail: AtomicBool,
}

impl RecordingSink {
    pub async fn count_for(&self, key: &SessionKey) -> usize {
        self.completions
            .lock()
            .await
            .iter()
            .filter(|(k, _, _)| k == key)
            .count()
    }
}

#[async_trait]
impl CompletionSink for RecordingSink {
    async fn finish(
        &self,
        key: &SessionKey,
        responses: Vec<Response>,
        started_by: Invocation,
    ) -> Result<()> {
        self.completions
            .lock()
            .await
            .push((key.clone(), responses, started_by));
        if self.fail.load(Ordering::SeqCst) {
            return Err(StepwiseError::completion("storage unavailable"));
        }
        Ok(())
    }
}

pub struct Harness {
    pub controller: Arc<SessionController>,
    pub messenger: Arc<MockMessenger>,
    pub sink: Arc<RecordingSink>,
    pub command: GuidedCommand,
}

/// `[YES_NO("Limit to one role?"), INTEGER("Max per 15s?")]`, breakout "finish".
pub fn limit_spec() -> SessionSpec {
    SessionSpec::new("Bot configuration", "finish")
        .step(StepSpec::yes_no("Limit to one role?"))
        .step(StepSpec::integer("Max per 15s?"))
}

pub fn harness(spec: SessionSpec, config: EngineConfig) -> Harness {
    let messenger = Arc::new(MockMessenger::default());
    let sink = Arc::new(RecordingSink::default());
    let command = GuidedCommand::new("limits", Arc::new(spec), sink.clone());
    let table = CommandTable::new().with(command.clone());
    let controller = Arc::new(SessionController::new(
        SessionRegistry::new(),
        messenger.clone(),
        messenger.clone(),
        Arc::new(table),
        config,
    ));
    Harness {
        controller,
        messenger,
        sink,
        command,
    }
}
