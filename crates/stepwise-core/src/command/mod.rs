//! Guided command definitions.
//!
//! A guided command pairs a static [`SessionSpec`] with the [`CompletionSink`] that
//! performs the command's effect once every step has been answered. Commands are
//! collected in a [`CommandTable`] built at startup.

pub mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::session::{Invocation, SessionKey};
use crate::step::{Response, SessionSpec};

pub use builtin::{
    BuiltinGuidedCommand, ClearChatAnswers, ConfigureAnswers, WelcomeAnswers, builtin_commands,
    find_builtin_command,
};

/// Receives the answers of a completed session.
///
/// Invoked exactly once per completed session, after the session has left the
/// registry. Never invoked for aborted or timed-out sessions.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn finish(
        &self,
        key: &SessionKey,
        responses: Vec<Response>,
        started_by: Invocation,
    ) -> Result<()>;
}

/// Discards the answers. Useful for tests and for commands with no effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl CompletionSink for NoopSink {
    async fn finish(&self, _: &SessionKey, _: Vec<Response>, _: Invocation) -> Result<()> {
        Ok(())
    }
}

/// Resolves guided command identifiers.
pub trait CommandSpecProvider: Send + Sync {
    fn command(&self, id: &str) -> Option<GuidedCommand>;
}

/// A guided command ready to be started.
#[derive(Clone)]
pub struct GuidedCommand {
    /// Primary name (without prefix)
    pub id: String,
    /// Alternative names
    pub aliases: Vec<String>,
    /// Human-readable description
    pub description: String,
    pub spec: Arc<SessionSpec>,
    pub sink: Arc<dyn CompletionSink>,
}

impl GuidedCommand {
    pub fn new(
        id: impl Into<String>,
        spec: Arc<SessionSpec>,
        sink: Arc<dyn CompletionSink>,
    ) -> Self {
        Self {
            id: id.into(),
            aliases: Vec::new(),
            description: String::new(),
            spec,
            sink,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Debug for GuidedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuidedCommand")
            .field("id", &self.id)
            .field("aliases", &self.aliases)
            .field("title", &self.spec.title)
            .finish_non_exhaustive()
    }
}

/// Statically built table of guided commands, looked up by id or alias.
#[derive(Clone, Default)]
pub struct CommandTable {
    commands: HashMap<String, GuidedCommand>,
    aliases: HashMap<String, String>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `command`, replacing any command with the same id.
    pub fn insert(&mut self, command: GuidedCommand) {
        let id = command.id.to_lowercase();
        for alias in &command.aliases {
            self.aliases.insert(alias.to_lowercase(), id.clone());
        }
        self.commands.insert(id, command);
    }

    /// Builder form of [`CommandTable::insert`].
    pub fn with(mut self, command: GuidedCommand) -> Self {
        self.insert(command);
        self
    }

    /// Looks a command up by id or alias, ignoring case.
    pub fn get(&self, name: &str) -> Option<&GuidedCommand> {
        let name = name.to_lowercase();
        let id = self.aliases.get(&name).unwrap_or(&name);
        self.commands.get(id)
    }

    /// Primary ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl CommandSpecProvider for CommandTable {
    fn command(&self, id: &str) -> Option<GuidedCommand> {
        self.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepSpec;

    fn command(id: &str) -> GuidedCommand {
        let spec = SessionSpec::new(id, "cancel").step(StepSpec::yes_no("Sure?"));
        GuidedCommand::new(id, Arc::new(spec), Arc::new(NoopSink))
    }

    #[test]
    fn test_lookup_by_id_and_alias() {
        let table = CommandTable::new()
            .with(command("configure").with_aliases(["config"]))
            .with(command("clearchat"));

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("configure").map(|c| c.id.as_str()), Some("configure"));
        assert_eq!(table.get("CONFIG").map(|c| c.id.as_str()), Some("configure"));
        assert!(table.get("kick").is_none());
        assert_eq!(table.ids(), vec!["clearchat", "configure"]);
    }

    #[test]
    fn test_provider_returns_shared_spec() {
        let table = CommandTable::new().with(command("configure"));
        let a = table.command("configure").unwrap();
        let b = table.command("configure").unwrap();
        assert!(Arc::ptr_eq(&a.spec, &b.spec));
    }

    #[tokio::test]
    async fn test_noop_sink_accepts_anything() {
        let result = NoopSink
            .finish(
                &SessionKey::new("c", "p"),
                vec![Response::YesNo(true)],
                Invocation::default(),
            )
            .await;
        assert!(result.is_ok());
    }
}
