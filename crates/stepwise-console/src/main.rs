mod config;
mod server;
mod transport;

use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use stepwise_core::{
    CommandSpecProvider, CommandTable, Dispatch, InboundDispatcher, InboundMessage,
    MessageSender, OutboundMessage, SessionController, SessionKey, SessionRegistry,
    StepwiseError, UpdateOutcome,
};

use crate::config::ConsoleConfig;
use crate::server::{ServerState, command_table};
use crate::transport::ConsoleTransport;

const LOCAL_COMMANDS: &[(&str, &str)] = &[
    ("/as", "/as <name>      speak as another participant"),
    ("/in", "/in <channel>   move to another channel"),
    ("/sessions", "/sessions       list live guided sessions"),
    ("/settings", "/settings       show stored server settings"),
    ("/history", "/history        show the current channel"),
    ("/help", "/help           show this help"),
];

/// Completion, highlighting and hints for the REPL's local slash commands.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: LOCAL_COMMANDS
                .iter()
                .map(|(name, _)| name.to_string())
                .collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Extracts the command name from `content` if it starts with `prefix`.
fn parse_command<'a>(prefix: &str, content: &'a str) -> Option<&'a str> {
    let rest = content.trim_start().strip_prefix(prefix)?;
    rest.split_whitespace().next()
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Who is typing, and where.
struct Speaker {
    participant: String,
    channel: String,
    guild: String,
}

impl Speaker {
    fn from_config(config: &ConsoleConfig) -> Self {
        Self {
            participant: config.participant.clone(),
            channel: config.channel.clone(),
            guild: config.guild.clone(),
        }
    }

    fn prompt(&self) -> String {
        format!("{}@#{}> ", self.participant, self.channel)
    }

    fn message(&self, content: &str) -> InboundMessage {
        let mut message = InboundMessage::new(&self.channel, &self.participant, content);
        message.guild_id = Some(self.guild.clone());
        message
    }
}

struct Console {
    config: ConsoleConfig,
    transport: Arc<ConsoleTransport>,
    state: Arc<ServerState>,
    commands: Arc<CommandTable>,
    dispatcher: InboundDispatcher,
}

impl Console {
    fn controller(&self) -> &Arc<SessionController> {
        self.dispatcher.controller()
    }

    async fn handle_local(&self, speaker: &mut Speaker, line: &str) -> Result<()> {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let argument = parts.next();

        match (command, argument) {
            ("/as", Some(name)) => speaker.participant = name.to_string(),
            ("/in", Some(channel)) => speaker.channel = channel.trim_start_matches('#').to_string(),
            ("/sessions", _) => {
                let keys = self.controller().registry().keys().await;
                if keys.is_empty() {
                    println!("{}", "No live sessions.".bright_black());
                }
                for key in keys {
                    if let Some(session) = self.controller().registry().lookup(&key).await {
                        println!(
                            "  {} {} step {}/{} (idle since {})",
                            key.to_string().bright_magenta(),
                            session.spec().title,
                            session.current_step() + 1,
                            session.spec().len(),
                            session.last_activity().format("%H:%M:%S")
                        );
                    }
                }
            }
            ("/settings", _) => {
                let json = self
                    .state
                    .to_json()
                    .await
                    .context("failed to render settings")?;
                println!("{}", json);
            }
            ("/history", _) => {
                for entry in self.transport.history(&speaker.channel).await {
                    println!(
                        "  {} {}: {}",
                        entry.handle.to_string().bright_black(),
                        entry.author.bright_magenta(),
                        entry.text
                    );
                }
            }
            ("/help", _) => self.print_help(),
            _ => println!("{}", "Unknown command".bright_black()),
        }
        Ok(())
    }

    fn print_help(&self) {
        for (_, usage) in LOCAL_COMMANDS {
            println!("  {}", usage.bright_black());
        }
        for id in self.commands.ids() {
            if let Some(command) = self.commands.get(id) {
                println!(
                    "  {}{:<14} {}",
                    self.config.command_prefix,
                    id,
                    command.description.bright_black()
                );
            }
        }
    }

    /// Runs one chat line through the session check, then prefix commands.
    async fn handle_chat(&self, speaker: &Speaker, content: &str) -> Result<()> {
        let mut message = speaker.message(content);
        self.transport.record_inbound(&mut message).await;

        let message = match self.dispatcher.dispatch(message).await {
            Dispatch::Claimed(UpdateOutcome::Faulted(err)) => {
                eprintln!("{}", format!("Session dropped: {}", err).red());
                return Ok(());
            }
            Dispatch::Claimed(_) => return Ok(()),
            Dispatch::PassThrough(message) => message,
        };

        let Some(name) = parse_command(&self.config.command_prefix, &message.content) else {
            return Ok(());
        };
        let key = message.session_key();
        match self
            .controller()
            .start_command(name, key.clone(), message.invocation())
            .await
        {
            Ok(()) => Ok(()),
            Err(StepwiseError::UnknownCommand(_)) => {
                println!("{}", "Unknown command".bright_black());
                Ok(())
            }
            Err(err @ StepwiseError::DuplicateSession { .. }) => {
                tracing::debug!("{}", err);
                self.already_active(&key).await
            }
            Err(err) => Err(err).context("failed to start command"),
        }
    }

    async fn already_active(&self, key: &SessionKey) -> Result<()> {
        let title = self
            .controller()
            .registry()
            .lookup(key)
            .await
            .map(|session| session.spec().title.clone())
            .unwrap_or_default();
        self.transport
            .send(key, OutboundMessage::AlreadyActive { title })
            .await?;
        Ok(())
    }

    /// Aborts every live session before exit.
    async fn shutdown(&self) {
        for key in self.controller().registry().keys().await {
            self.controller().cancel(&key).await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (engine_config, console_config) = config::load().context("failed to load config")?;
    init_tracing(&console_config.log_filter);

    let transport = Arc::new(ConsoleTransport::new());
    let state = Arc::new(ServerState::new());
    let commands = Arc::new(command_table(&state, &transport)?);
    let provider: Arc<dyn CommandSpecProvider> = commands.clone();
    let controller = Arc::new(SessionController::new(
        SessionRegistry::new(),
        transport.clone(),
        transport.clone(),
        provider,
        engine_config,
    ));

    let cancel = CancellationToken::new();
    let sweeper = Arc::clone(&controller).spawn_idle_sweeper(cancel.clone());

    let console = Console {
        transport,
        state,
        commands,
        dispatcher: InboundDispatcher::new(controller),
        config: console_config,
    };
    let mut speaker = Speaker::from_config(&console.config);

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    println!("{}", "=== Stepwise console ===".bright_magenta().bold());
    println!(
        "{}",
        format!(
            "Chat as '{}' in #{}. Try '{}configure', '/help', or 'quit' to exit.",
            speaker.participant, speaker.channel, console.config.command_prefix
        )
        .bright_black()
    );
    println!();

    loop {
        match rl.readline(&speaker.prompt()) {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }

                let _ = rl.add_history_entry(&line);

                let result = if trimmed.starts_with('/') {
                    console.handle_local(&mut speaker, trimmed).await
                } else {
                    // Empty lines still reach sessions: a STRING step may accept them.
                    console.handle_chat(&speaker, &line).await
                };
                if let Err(err) = result {
                    eprintln!("{}", format!("Error: {:?}", err).red());
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    console.shutdown().await;
    cancel.cancel();
    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_takes_first_word() {
        assert_eq!(parse_command("!", "!configure"), Some("configure"));
        assert_eq!(parse_command("!", "  !clearchat now"), Some("clearchat"));
        assert_eq!(parse_command("?!", "?!config"), Some("config"));
    }

    #[test]
    fn test_parse_command_ignores_plain_text() {
        assert_eq!(parse_command("!", "configure"), None);
        assert_eq!(parse_command("!", "!"), None);
        assert_eq!(parse_command("!", "hello !configure"), None);
    }

    #[test]
    fn test_speaker_messages_carry_guild() {
        let speaker = Speaker::from_config(&ConsoleConfig::default());
        let message = speaker.message("!configure");

        assert_eq!(message.session_key(), SessionKey::new("general", "alice"));
        assert_eq!(message.guild_id.as_deref(), Some("console"));
        assert_eq!(speaker.prompt(), "alice@#general> ");
    }

    #[tokio::test]
    async fn test_chat_line_starts_and_feeds_session() {
        let transport = Arc::new(ConsoleTransport::new());
        let state = Arc::new(ServerState::new());
        let commands = Arc::new(command_table(&state, &transport).unwrap());
        let provider: Arc<dyn CommandSpecProvider> = commands.clone();
        let controller = Arc::new(SessionController::new(
            SessionRegistry::new(),
            transport.clone(),
            transport.clone(),
            provider,
            stepwise_core::EngineConfig::default(),
        ));
        let console = Console {
            config: ConsoleConfig::default(),
            transport,
            state,
            commands,
            dispatcher: InboundDispatcher::new(controller),
        };
        let speaker = Speaker::from_config(&console.config);

        console.handle_chat(&speaker, "!clearchannel").await.unwrap();
        assert_eq!(console.controller().active_sessions().await, 1);

        console.handle_chat(&speaker, "!clearchannel").await.unwrap();
        assert_eq!(console.controller().active_sessions().await, 1);

        console.handle_chat(&speaker, "no").await.unwrap();
        assert_eq!(console.controller().active_sessions().await, 0);
        let history = console.transport.history("general").await;
        assert_eq!(history.last().unwrap().text, "Nothing was cleared.");
    }
}
