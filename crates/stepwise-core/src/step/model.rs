//! Declarative step specifications and the typed responses they produce.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The kind of input one step expects.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum StepType {
    /// Affirmative/negative answer, parsed into a boolean
    YesNo,
    /// Optionally signed decimal integer
    Integer,
    /// Free text, trimmed
    String,
}

/// One prompt within a guided command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Text shown to the participant
    pub prompt: String,
    /// Expected input type
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Rejects empty text for `String` steps
    #[serde(default)]
    pub required: bool,
}

impl StepSpec {
    pub fn new(prompt: impl Into<String>, step_type: StepType) -> Self {
        Self {
            prompt: prompt.into(),
            step_type,
            required: false,
        }
    }

    pub fn yes_no(prompt: impl Into<String>) -> Self {
        Self::new(prompt, StepType::YesNo)
    }

    pub fn integer(prompt: impl Into<String>) -> Self {
        Self::new(prompt, StepType::Integer)
    }

    pub fn text(prompt: impl Into<String>) -> Self {
        Self::new(prompt, StepType::String)
    }

    /// Marks the step as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// The static description of a guided command's conversation.
///
/// A spec is shared by every session started from it and is never mutated once a
/// session holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSpec {
    /// Heading shown with every prompt
    pub title: String,
    /// Ordered steps
    pub steps: Vec<StepSpec>,
    /// Reserved reply that aborts the session
    pub breakout_keyword: String,
    /// Delete the previous prompt once it has been answered
    #[serde(default)]
    pub delete_previous_prompt: bool,
}

impl SessionSpec {
    pub fn new(title: impl Into<String>, breakout_keyword: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            steps: Vec::new(),
            breakout_keyword: breakout_keyword.into(),
            delete_previous_prompt: false,
        }
    }

    /// Appends a step.
    pub fn step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    pub fn delete_previous_prompt(mut self, delete: bool) -> Self {
        self.delete_previous_prompt = delete;
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns true if `raw` is the breakout keyword, ignoring case and surrounding
    /// whitespace.
    pub fn is_breakout(&self, raw: &str) -> bool {
        raw.trim().to_lowercase() == self.breakout_keyword.trim().to_lowercase()
    }
}

/// A validated answer to one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Response {
    YesNo(bool),
    Integer(i64),
    Text(String),
}

impl Response {
    /// The step type that produces this variant.
    pub fn step_type(&self) -> StepType {
        match self {
            Self::YesNo(_) => StepType::YesNo,
            Self::Integer(_) => StepType::Integer,
            Self::Text(_) => StepType::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::YesNo(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::YesNo(true) => write!(f, "yes"),
            Self::YesNo(false) => write!(f, "no"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_step_type_names() {
        assert_eq!(StepType::YesNo.to_string(), "YES_NO");
        assert_eq!(StepType::from_str("integer").unwrap(), StepType::Integer);
        assert!(StepType::from_str("float").is_err());
    }

    #[test]
    fn test_breakout_matches_case_insensitively() {
        let spec = SessionSpec::new("Bot configuration", "finish");
        assert!(spec.is_breakout("finish"));
        assert!(spec.is_breakout("FINISH"));
        assert!(spec.is_breakout("  Finish "));
        assert!(!spec.is_breakout("finished"));
        assert!(!spec.is_breakout("fin ish"));
    }

    #[test]
    fn test_builder_keeps_step_order() {
        let spec = SessionSpec::new("Setup", "cancel")
            .step(StepSpec::yes_no("First?"))
            .step(StepSpec::integer("Second?"))
            .step(StepSpec::text("Third?").required())
            .delete_previous_prompt(true);

        assert_eq!(spec.len(), 3);
        assert_eq!(spec.steps[0].step_type, StepType::YesNo);
        assert_eq!(spec.steps[1].step_type, StepType::Integer);
        assert!(spec.steps[2].required);
        assert!(spec.delete_previous_prompt);
    }

    #[test]
    fn test_spec_deserializes_from_toml() {
        let spec: SessionSpec = toml::from_str(
            r#"
title = "Welcome setup"
breakout_keyword = "cancel"

[[steps]]
prompt = "Welcome text?"
type = "STRING"
required = true

[[steps]]
prompt = "PM it?"
type = "YES_NO"
"#,
        )
        .unwrap();

        assert_eq!(spec.len(), 2);
        assert!(spec.steps[0].required);
        assert_eq!(spec.steps[1].step_type, StepType::YesNo);
        assert!(!spec.delete_previous_prompt);
    }

    #[test]
    fn test_response_accessors() {
        assert_eq!(Response::YesNo(true).as_bool(), Some(true));
        assert_eq!(Response::Integer(5).as_bool(), None);
        assert_eq!(Response::Integer(-3).as_integer(), Some(-3));
        assert_eq!(Response::Text("42".into()).as_text(), Some("42"));
        assert_eq!(Response::Text("x".into()).step_type(), StepType::String);
        assert_eq!(Response::YesNo(false).to_string(), "no");
    }
}
