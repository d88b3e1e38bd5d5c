//! Guided multi-step chat sessions.
//!
//! A guided command is a declarative list of prompts ([`SessionSpec`]). Starting one
//! registers a [`Session`] for the participant and channel that invoked it; every later
//! message from that participant in that channel is routed by the [`InboundDispatcher`]
//! to the [`SessionController`], which validates it against the current step, reprompts
//! or advances, and hands the ordered answers to the command's [`CompletionSink`]
//! exactly once.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod messaging;
pub mod session;
pub mod step;

pub use command::{CommandSpecProvider, CommandTable, CompletionSink, GuidedCommand};
pub use config::EngineConfig;
pub use dispatch::{Dispatch, InboundDispatcher, InboundMessage};
pub use error::{Result, StepwiseError};
pub use messaging::{MessageDeleter, MessageHandle, MessageSender, OutboundMessage};
pub use session::{
    Invocation, Session, SessionController, SessionKey, SessionRegistry, UpdateOutcome,
};
pub use step::{Response, SessionSpec, StepSpec, StepType};
