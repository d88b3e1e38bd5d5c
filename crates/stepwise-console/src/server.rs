//! In-memory server settings and the completion sinks that change them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use stepwise_core::command::{
    ClearChatAnswers, ConfigureAnswers, WelcomeAnswers, find_builtin_command,
};
use stepwise_core::{
    CommandTable, CompletionSink, Invocation, Response, Result, SessionKey, StepwiseError,
};
use tokio::sync::Mutex;

use crate::transport::ConsoleTransport;

/// Per-server settings edited by guided commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GuildSettings {
    pub limit_to_one_role: bool,
    pub disable_invites: bool,
    pub messages_per_fifteen: i64,
    pub rules_channel: Option<String>,
    pub report_channel: Option<String>,
    pub welcome_message: Option<String>,
    pub pm_welcome_message: bool,
}

#[derive(Default)]
pub struct ServerState {
    guilds: Mutex<BTreeMap<String, GuildSettings>>,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn settings(&self, guild_id: &str) -> GuildSettings {
        self.guilds
            .lock()
            .await
            .get(guild_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn update<F>(&self, guild_id: &str, f: F)
    where
        F: FnOnce(&mut GuildSettings),
    {
        let mut guilds = self.guilds.lock().await;
        f(guilds.entry(guild_id.to_string()).or_default());
    }

    /// JSON dump of every server's settings.
    pub async fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.guilds.lock().await)
    }
}

fn guild_of(started_by: &Invocation) -> Result<&str> {
    started_by
        .guild_id
        .as_deref()
        .ok_or_else(|| StepwiseError::completion("command was not issued in a server"))
}

pub struct ConfigureSink {
    state: Arc<ServerState>,
    transport: Arc<ConsoleTransport>,
}

#[async_trait]
impl CompletionSink for ConfigureSink {
    async fn finish(
        &self,
        key: &SessionKey,
        responses: Vec<Response>,
        started_by: Invocation,
    ) -> Result<()> {
        let answers = ConfigureAnswers::try_from(responses.as_slice())?;
        let guild = guild_of(&started_by)?;
        self.state
            .update(guild, |settings| {
                settings.limit_to_one_role = answers.limit_to_one_role;
                settings.disable_invites = answers.disable_invites;
                settings.messages_per_fifteen = answers.messages_per_fifteen;
                settings.rules_channel = answers.rules_channel().map(str::to_string);
                settings.report_channel = answers.report_channel().map(str::to_string);
            })
            .await;
        self.transport
            .announce(
                &key.channel_id,
                "Success: configured my settings for your server!",
            )
            .await;
        Ok(())
    }
}

pub struct WelcomeSink {
    state: Arc<ServerState>,
    transport: Arc<ConsoleTransport>,
}

#[async_trait]
impl CompletionSink for WelcomeSink {
    async fn finish(
        &self,
        key: &SessionKey,
        responses: Vec<Response>,
        started_by: Invocation,
    ) -> Result<()> {
        let answers = WelcomeAnswers::try_from(responses.as_slice())?;
        let guild = guild_of(&started_by)?;
        let preview = answers.render(&started_by.display_name, guild);
        self.state
            .update(guild, |settings| {
                settings.welcome_message = Some(answers.message.clone());
                settings.pm_welcome_message = answers.private_message;
            })
            .await;
        let delivery = if answers.private_message {
            "private message"
        } else {
            "channel message"
        };
        self.transport
            .announce(
                &key.channel_id,
                &format!("Welcome message saved ({delivery}). Preview: {preview}"),
            )
            .await;
        Ok(())
    }
}

pub struct ClearChatSink {
    transport: Arc<ConsoleTransport>,
}

#[async_trait]
impl CompletionSink for ClearChatSink {
    async fn finish(
        &self,
        key: &SessionKey,
        responses: Vec<Response>,
        _started_by: Invocation,
    ) -> Result<()> {
        let answers = ClearChatAnswers::try_from(responses.as_slice())?;
        if !answers.confirmed {
            self.transport
                .announce(&key.channel_id, "Nothing was cleared.")
                .await;
            return Ok(());
        }
        let cleared = self.transport.clear_channel(&key.channel_id).await;
        self.transport
            .announce(
                &key.channel_id,
                &format!("Cleared channel ({cleared} messages)."),
            )
            .await;
        Ok(())
    }
}

/// Binds every builtin guided command to its console sink.
pub fn command_table(
    state: &Arc<ServerState>,
    transport: &Arc<ConsoleTransport>,
) -> Result<CommandTable> {
    let builtin = |name: &str| {
        find_builtin_command(name).ok_or_else(|| StepwiseError::UnknownCommand(name.to_string()))
    };

    Ok(CommandTable::new()
        .with(builtin("configure")?.with_sink(Arc::new(ConfigureSink {
            state: Arc::clone(state),
            transport: Arc::clone(transport),
        })))
        .with(builtin("changewelcome")?.with_sink(Arc::new(WelcomeSink {
            state: Arc::clone(state),
            transport: Arc::clone(transport),
        })))
        .with(builtin("clearchat")?.with_sink(Arc::new(ClearChatSink {
            transport: Arc::clone(transport),
        }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::CommandSpecProvider;

    fn invocation() -> Invocation {
        Invocation {
            guild_id: Some("console".into()),
            display_name: "alice".into(),
            message: None,
        }
    }

    fn fixtures() -> (Arc<ServerState>, Arc<ConsoleTransport>, CommandTable) {
        let state = Arc::new(ServerState::new());
        let transport = Arc::new(ConsoleTransport::new());
        let table = command_table(&state, &transport).unwrap();
        (state, transport, table)
    }

    #[tokio::test]
    async fn test_configure_sink_stores_settings() {
        let (state, transport, table) = fixtures();
        let key = SessionKey::new("general", "alice");
        let responses = vec![
            Response::YesNo(true),
            Response::YesNo(true),
            Response::Integer(4),
            Response::Text("0".into()),
            Response::Text("123".into()),
        ];

        let configure = table.command("config").unwrap();
        configure.sink.finish(&key, responses, invocation()).await.unwrap();

        let settings = state.settings("console").await;
        assert!(settings.limit_to_one_role);
        assert_eq!(settings.messages_per_fifteen, 4);
        assert_eq!(settings.rules_channel, None);
        assert_eq!(settings.report_channel.as_deref(), Some("123"));
        assert_eq!(transport.history("general").await.len(), 1);
    }

    #[tokio::test]
    async fn test_configure_sink_requires_server() {
        let (_, _, table) = fixtures();
        let responses = vec![
            Response::YesNo(false),
            Response::YesNo(false),
            Response::Integer(0),
            Response::Text(String::new()),
            Response::Text(String::new()),
        ];

        let err = table
            .command("configure")
            .unwrap()
            .sink
            .finish(&SessionKey::new("dm", "alice"), responses, Invocation::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StepwiseError::Completion(_)));
    }

    #[tokio::test]
    async fn test_clear_chat_respects_confirmation() {
        let (_, transport, table) = fixtures();
        let key = SessionKey::new("general", "alice");
        transport.announce("general", "old news").await;
        let clearchat = table.command("clearchannel").unwrap();

        clearchat
            .sink
            .finish(&key, vec![Response::YesNo(false)], invocation())
            .await
            .unwrap();
        assert_eq!(transport.history("general").await.len(), 2);

        clearchat
            .sink
            .finish(&key, vec![Response::YesNo(true)], invocation())
            .await
            .unwrap();
        let history = transport.history("general").await;
        assert_eq!(history.len(), 1);
        assert!(history[0].text.starts_with("Cleared channel (2 messages)"));
    }

    #[tokio::test]
    async fn test_welcome_sink_saves_template() {
        let (state, _, table) = fixtures();
        table
            .command("setwelcome")
            .unwrap()
            .sink
            .finish(
                &SessionKey::new("general", "alice"),
                vec![
                    Response::Text("Hi $user$, welcome to $server$".into()),
                    Response::YesNo(true),
                ],
                invocation(),
            )
            .await
            .unwrap();

        let settings = state.settings("console").await;
        assert_eq!(
            settings.welcome_message.as_deref(),
            Some("Hi $user$, welcome to $server$")
        );
        assert!(settings.pm_welcome_message);
        assert!(state.to_json().await.unwrap().contains("pm_welcome_message"));
    }
}
