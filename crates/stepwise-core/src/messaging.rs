//! Outbound messaging collaborators.
//!
//! The engine never talks to a transport directly. It hands structured
//! [`OutboundMessage`]s to a [`MessageSender`] and asks a [`MessageDeleter`] to remove
//! prompts that have been answered. Rendering is left to the transport;
//! [`OutboundMessage::render_plain`] is available for transports without formatting.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::SessionKey;

/// Transport-assigned identifier of a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle(String);

impl MessageHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message the engine wants delivered to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// The prompt for one step. `notice` is set when the previous reply was rejected.
    Prompt {
        title: String,
        step_index: usize,
        step_count: usize,
        prompt: String,
        breakout_keyword: String,
        #[serde(default)]
        notice: Option<String>,
    },
    /// The participant typed the breakout keyword.
    Aborted { title: String },
    /// The session was idle for too long and has been dropped.
    TimedOut { title: String },
    /// A new session was refused because one is already running for the key.
    AlreadyActive { title: String },
}

impl OutboundMessage {
    /// Plain-text rendering for transports without rich formatting.
    pub fn render_plain(&self) -> String {
        match self {
            Self::Prompt {
                title,
                step_index,
                step_count,
                prompt,
                breakout_keyword,
                notice,
            } => {
                let mut text = String::new();
                if let Some(notice) = notice {
                    text.push_str(notice);
                    text.push('\n');
                }
                text.push_str(&format!(
                    "[{title} {}/{step_count}] {prompt}\n(type `{breakout_keyword}` to stop)",
                    step_index + 1
                ));
                text
            }
            Self::Aborted { title } => format!("{title}: cancelled, nothing was saved."),
            Self::TimedOut { title } => {
                format!("{title}: no reply for a while, the session has been closed.")
            }
            Self::AlreadyActive { title } => {
                format!("{title}: you already have a session in progress here.")
            }
        }
    }

    /// Returns true for step prompts (including reprompts).
    pub fn is_prompt(&self) -> bool {
        matches!(self, Self::Prompt { .. })
    }
}

/// Delivers messages to a participant.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends `message` to the channel and participant identified by `target`.
    async fn send(&self, target: &SessionKey, message: OutboundMessage) -> Result<MessageHandle>;
}

/// Removes previously sent messages. Failures are logged and otherwise ignored.
#[async_trait]
pub trait MessageDeleter: Send + Sync {
    async fn delete(&self, handle: &MessageHandle) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(notice: Option<&str>) -> OutboundMessage {
        OutboundMessage::Prompt {
            title: "Bot configuration".into(),
            step_index: 1,
            step_count: 5,
            prompt: "Automatically delete invite links?".into(),
            breakout_keyword: "finish".into(),
            notice: notice.map(str::to_string),
        }
    }

    #[test]
    fn test_render_prompt_shows_position_and_breakout() {
        let text = prompt(None).render_plain();
        assert_eq!(
            text,
            "[Bot configuration 2/5] Automatically delete invite links?\n(type `finish` to stop)"
        );
    }

    #[test]
    fn test_render_reprompt_leads_with_notice() {
        let text = prompt(Some("Please answer yes or no.")).render_plain();
        assert!(text.starts_with("Please answer yes or no.\n[Bot configuration 2/5]"));
    }

    #[test]
    fn test_terminal_notices() {
        let aborted = OutboundMessage::Aborted {
            title: "Setup".into(),
        };
        assert!(!aborted.is_prompt());
        assert!(aborted.render_plain().contains("cancelled"));
    }
}
