//! Per-type parsing of raw participant replies.
//!
//! Every function here is pure: the outcome depends only on the step and the raw text.

use std::num::IntErrorKind;

use thiserror::Error;

use super::model::{Response, StepSpec, StepType};

/// Replies accepted as "yes".
pub const AFFIRMATIVE: &[&str] = &["yes", "y", "true"];

/// Replies accepted as "no".
pub const NEGATIVE: &[&str] = &["no", "n", "false"];

/// Why a reply was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NotYesNo,
    NotInteger,
    IntegerOutOfRange,
    Empty,
}

impl FailureReason {
    /// Notice shown to the participant alongside the repeated prompt.
    pub fn notice(self) -> &'static str {
        match self {
            Self::NotYesNo => "Please answer yes or no.",
            Self::NotInteger => "Please answer with a whole number.",
            Self::IntegerOutOfRange => "That number is too large.",
            Self::Empty => "An answer is required.",
        }
    }
}

/// A reply that does not satisfy its step's type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid reply '{raw}': {}", .reason.notice())]
pub struct ParseFailure {
    pub raw: String,
    pub reason: FailureReason,
}

impl ParseFailure {
    fn new(raw: &str, reason: FailureReason) -> Self {
        Self {
            raw: raw.to_string(),
            reason,
        }
    }
}

/// Validates `raw` against one step.
pub fn validate(step: &StepSpec, raw: &str) -> Result<Response, ParseFailure> {
    match step.step_type {
        StepType::YesNo => parse_yes_no(raw),
        StepType::Integer => parse_integer(raw),
        StepType::String => parse_text(raw, step.required),
    }
}

pub fn parse_yes_no(raw: &str) -> Result<Response, ParseFailure> {
    let answer = raw.trim().to_lowercase();
    if AFFIRMATIVE.contains(&answer.as_str()) {
        Ok(Response::YesNo(true))
    } else if NEGATIVE.contains(&answer.as_str()) {
        Ok(Response::YesNo(false))
    } else {
        Err(ParseFailure::new(raw, FailureReason::NotYesNo))
    }
}

pub fn parse_integer(raw: &str) -> Result<Response, ParseFailure> {
    raw.trim()
        .parse::<i64>()
        .map(Response::Integer)
        .map_err(|e| {
            let reason = match e.kind() {
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                    FailureReason::IntegerOutOfRange
                }
                _ => FailureReason::NotInteger,
            };
            ParseFailure::new(raw, reason)
        })
}

pub fn parse_text(raw: &str, required: bool) -> Result<Response, ParseFailure> {
    let text = raw.trim();
    if required && text.is_empty() {
        return Err(ParseFailure::new(raw, FailureReason::Empty));
    }
    Ok(Response::Text(text.to_string()))
}
