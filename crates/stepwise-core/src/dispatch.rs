//! Routing of inbound messages to live sessions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::messaging::MessageHandle;
use crate::session::{Invocation, SessionController, SessionKey, UpdateOutcome};

/// One message observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel_id: String,
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Messages from bots, including our own, never reach a session
    #[serde(default)]
    pub author_is_bot: bool,
    pub content: String,
    #[serde(default)]
    pub handle: Option<MessageHandle>,
}

impl InboundMessage {
    pub fn new(
        channel_id: impl Into<String>,
        author_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let author_id = author_id.into();
        Self {
            channel_id: channel_id.into(),
            author_name: author_id.clone(),
            author_id,
            guild_id: None,
            author_is_bot: false,
            content: content.into(),
            handle: None,
        }
    }

    /// The session this message would belong to.
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(&self.channel_id, &self.author_id)
    }

    /// Invocation context for a command started by this message.
    pub fn invocation(&self) -> Invocation {
        Invocation {
            guild_id: self.guild_id.clone(),
            display_name: self.author_name.clone(),
            message: self.handle.clone(),
        }
    }
}

/// What the dispatcher did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A live session consumed the message.
    Claimed(UpdateOutcome),
    /// No session matched; the message goes on to ordinary processing unchanged.
    PassThrough(InboundMessage),
}

impl Dispatch {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }
}

/// Checks every inbound message against live sessions before command handling.
///
/// Must run ahead of prefix-based command dispatch so that plain, unprefixed replies
/// reach the session waiting for them.
#[derive(Clone)]
pub struct InboundDispatcher {
    controller: Arc<SessionController>,
}

impl InboundDispatcher {
    pub fn new(controller: Arc<SessionController>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }

    pub async fn dispatch(&self, message: InboundMessage) -> Dispatch {
        if message.author_is_bot {
            return Dispatch::PassThrough(message);
        }

        let key = message.session_key();
        match self.controller.update(&key, &message.content).await {
            UpdateOutcome::NoSession => Dispatch::PassThrough(message),
            outcome => {
                tracing::debug!("[InboundDispatcher] {} claimed by session: {:?}", key, outcome);
                Dispatch::Claimed(outcome)
            }
        }
    }
}
