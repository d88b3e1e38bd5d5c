//! Console stand-in for a chat transport.
//!
//! Every message, from participants or from the bot, is kept in a transcript so that
//! deletions and channel clears have something to act on.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use colored::Colorize;
use stepwise_core::{
    InboundMessage, MessageDeleter, MessageHandle, MessageSender, OutboundMessage, Result,
    SessionKey, StepwiseError,
};
use tokio::sync::Mutex;

pub const BOT_NAME: &str = "stepwise";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub handle: MessageHandle,
    pub channel_id: String,
    pub author: String,
    pub text: String,
    pub deleted: bool,
}

#[derive(Default)]
pub struct ConsoleTransport {
    next_id: AtomicU64,
    transcript: Mutex<Vec<TranscriptEntry>>,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn record(&self, channel_id: &str, author: &str, text: &str) -> MessageHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = MessageHandle::new(format!("{channel_id}/{id}"));
        self.transcript.lock().await.push(TranscriptEntry {
            handle: handle.clone(),
            channel_id: channel_id.to_string(),
            author: author.to_string(),
            text: text.to_string(),
            deleted: false,
        });
        handle
    }

    /// Stores a participant's message and stamps it with a handle.
    pub async fn record_inbound(&self, message: &mut InboundMessage) {
        let handle = self
            .record(&message.channel_id, &message.author_name, &message.content)
            .await;
        message.handle = Some(handle);
    }

    /// Posts a bot message to a whole channel.
    pub async fn announce(&self, channel_id: &str, text: &str) -> MessageHandle {
        println!("{}", format!("[{BOT_NAME} #{channel_id}] {text}").bright_green());
        self.record(channel_id, BOT_NAME, text).await
    }

    /// Deletes every visible message in `channel_id`. Returns how many were removed.
    pub async fn clear_channel(&self, channel_id: &str) -> usize {
        let mut transcript = self.transcript.lock().await;
        let mut cleared = 0;
        for entry in transcript
            .iter_mut()
            .filter(|e| e.channel_id == channel_id && !e.deleted)
        {
            entry.deleted = true;
            cleared += 1;
        }
        cleared
    }

    /// Visible messages of `channel_id`, oldest first.
    pub async fn history(&self, channel_id: &str) -> Vec<TranscriptEntry> {
        self.transcript
            .lock()
            .await
            .iter()
            .filter(|e| e.channel_id == channel_id && !e.deleted)
            .cloned()
            .collect()
    }
}

fn print_outbound(target: &SessionKey, message: &OutboundMessage) {
    let header = format!("[{BOT_NAME} -> {target}]");
    match message {
        OutboundMessage::Prompt { notice, .. } => {
            if let Some(notice) = notice {
                println!("{} {}", header.bright_blue(), notice.yellow());
            }
            let text = message.render_plain();
            let prompt = text.lines().skip(usize::from(notice.is_some()));
            for line in prompt {
                println!("{} {}", header.bright_blue(), line.bright_blue());
            }
        }
        OutboundMessage::AlreadyActive { .. } => {
            println!("{} {}", header.yellow(), message.render_plain().yellow());
        }
        OutboundMessage::Aborted { .. } | OutboundMessage::TimedOut { .. } => {
            println!(
                "{} {}",
                header.bright_black(),
                message.render_plain().bright_black()
            );
        }
    }
}

#[async_trait]
impl MessageSender for ConsoleTransport {
    async fn send(&self, target: &SessionKey, message: OutboundMessage) -> Result<MessageHandle> {
        print_outbound(target, &message);
        Ok(self
            .record(&target.channel_id, BOT_NAME, &message.render_plain())
            .await)
    }
}

#[async_trait]
impl MessageDeleter for ConsoleTransport {
    async fn delete(&self, handle: &MessageHandle) -> Result<()> {
        let mut transcript = self.transcript.lock().await;
        let entry = transcript
            .iter_mut()
            .find(|e| &e.handle == handle && !e.deleted)
            .ok_or_else(|| StepwiseError::messaging(format!("no visible message {handle}")))?;
        entry.deleted = true;
        println!("{}", format!("  (deleted {handle})").bright_black());
        Ok(())
    }
}
