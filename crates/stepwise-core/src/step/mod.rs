//! Step specifications and input validation.
//!
//! # Module Structure
//!
//! - `model`: declarative specs (`StepType`, `StepSpec`, `SessionSpec`) and `Response`
//! - `validator`: pure per-type parsing (`validate`, `ParseFailure`)

mod model;
mod validator;

pub use model::{Response, SessionSpec, StepSpec, StepType};
pub use validator::{
    AFFIRMATIVE, FailureReason, NEGATIVE, ParseFailure, parse_integer, parse_text,
    parse_yes_no, validate,
};
