//! Builtin guided commands.
//!
//! The specs are initialized once and shared by every session started from them.
//! Each command has a typed view of its answers so completion sinks never index into
//! the raw response list.

use std::sync::{Arc, OnceLock};

use super::{CompletionSink, GuidedCommand};
use crate::error::{Result, StepwiseError};
use crate::step::{Response, SessionSpec, StepSpec};

/// A builtin guided command and its spec.
#[derive(Debug, Clone)]
pub struct BuiltinGuidedCommand {
    /// Command name (without prefix)
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Human-readable description
    pub description: &'static str,
    spec: Arc<SessionSpec>,
}

impl BuiltinGuidedCommand {
    fn new(
        name: &'static str,
        aliases: &'static [&'static str],
        description: &'static str,
        spec: SessionSpec,
    ) -> Self {
        Self {
            name,
            aliases,
            description,
            spec: Arc::new(spec),
        }
    }

    pub fn spec(&self) -> Arc<SessionSpec> {
        Arc::clone(&self.spec)
    }

    /// Binds the command to the sink that performs its effect.
    pub fn with_sink(&self, sink: Arc<dyn CompletionSink>) -> GuidedCommand {
        GuidedCommand::new(self.name, self.spec(), sink)
            .with_aliases(self.aliases.iter().copied())
            .with_description(self.description)
    }
}

static BUILTIN_COMMANDS: OnceLock<Vec<BuiltinGuidedCommand>> = OnceLock::new();

/// Returns all builtin guided commands.
pub fn builtin_commands() -> &'static [BuiltinGuidedCommand] {
    BUILTIN_COMMANDS.get_or_init(|| {
        vec![
            BuiltinGuidedCommand::new(
                "configure",
                &["config"],
                "Configure various settings for your server",
                SessionSpec::new("Bot configuration", "finish")
                    .step(StepSpec::yes_no("Limit $joinrole to a single role?"))
                    .step(StepSpec::yes_no(
                        "Automatically delete invite links sent by non-moderator users?",
                    ))
                    .step(StepSpec::integer(
                        "How many messages can a user send per 15 seconds? Use 0 to disable slow mode",
                    ))
                    .step(StepSpec::text("ID for the rules channel (if not present 0)"))
                    .step(StepSpec::text("ID for the mod report channel (if not present 0)"))
                    .delete_previous_prompt(true),
            ),
            BuiltinGuidedCommand::new(
                "changewelcome",
                &["setwelcome"],
                "Set the message greeting new members",
                SessionSpec::new("Welcome message", "cancel")
                    .step(
                        StepSpec::text(
                            "What should the welcome message say? $user$ and $server$ are replaced",
                        )
                        .required(),
                    )
                    .step(StepSpec::yes_no(
                        "Send the welcome message as a private message?",
                    )),
            ),
            BuiltinGuidedCommand::new(
                "clearchat",
                &["clearchannel"],
                "Clear the channel history after confirmation",
                SessionSpec::new("Clear channel", "cancel").step(StepSpec::yes_no(
                    "Do you want to clear out this channel? (irreversible)",
                )),
            ),
        ]
    })
}

/// Find a builtin command by name or alias.
pub fn find_builtin_command(name: &str) -> Option<&'static BuiltinGuidedCommand> {
    let name = name.to_lowercase();
    builtin_commands()
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name.as_str()))
}

fn unexpected(command: &str, responses: &[Response]) -> StepwiseError {
    StepwiseError::completion(format!(
        "{command}: unexpected responses {responses:?}"
    ))
}

/// Channel ids use "0" (or nothing) for "not present".
fn channel_id(raw: &str) -> Option<&str> {
    match raw {
        "" | "0" => None,
        id => Some(id),
    }
}

/// Answers of the `configure` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureAnswers {
    pub limit_to_one_role: bool,
    pub disable_invites: bool,
    pub messages_per_fifteen: i64,
    rules_channel: String,
    report_channel: String,
}

impl ConfigureAnswers {
    pub fn rules_channel(&self) -> Option<&str> {
        channel_id(&self.rules_channel)
    }

    pub fn report_channel(&self) -> Option<&str> {
        channel_id(&self.report_channel)
    }

    /// Slow mode limit, `None` when disabled.
    pub fn slow_mode(&self) -> Option<i64> {
        (self.messages_per_fifteen > 0).then_some(self.messages_per_fifteen)
    }
}

impl TryFrom<&[Response]> for ConfigureAnswers {
    type Error = StepwiseError;

    fn try_from(responses: &[Response]) -> Result<Self> {
        match responses {
            [
                Response::YesNo(limit_to_one_role),
                Response::YesNo(disable_invites),
                Response::Integer(messages_per_fifteen),
                Response::Text(rules_channel),
                Response::Text(report_channel),
            ] => Ok(Self {
                limit_to_one_role: *limit_to_one_role,
                disable_invites: *disable_invites,
                messages_per_fifteen: *messages_per_fifteen,
                rules_channel: rules_channel.clone(),
                report_channel: report_channel.clone(),
            }),
            other => Err(unexpected("configure", other)),
        }
    }
}

/// Answers of the `changewelcome` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeAnswers {
    pub message: String,
    pub private_message: bool,
}

impl WelcomeAnswers {
    /// Fills the `$user$` and `$server$` placeholders.
    pub fn render(&self, user: &str, server: &str) -> String {
        self.message
            .replace("$user$", user)
            .replace("$server$", server)
    }
}

impl TryFrom<&[Response]> for WelcomeAnswers {
    type Error = StepwiseError;

    fn try_from(responses: &[Response]) -> Result<Self> {
        match responses {
            [Response::Text(message), Response::YesNo(private_message)] => Ok(Self {
                message: message.clone(),
                private_message: *private_message,
            }),
            other => Err(unexpected("changewelcome", other)),
        }
    }
}

/// Answers of the `clearchat` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearChatAnswers {
    pub confirmed: bool,
}

impl TryFrom<&[Response]> for ClearChatAnswers {
    type Error = StepwiseError;

    fn try_from(responses: &[Response]) -> Result<Self> {
        match responses {
            [Response::YesNo(confirmed)] => Ok(Self {
                confirmed: *confirmed,
            }),
            other => Err(unexpected("clearchat", other)),
        }
    }
}
