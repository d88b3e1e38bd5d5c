//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: live session state (`Session`, `SessionKey`, `Invocation`)
//! - `registry`: ownership of live sessions (`SessionRegistry`)
//! - `controller`: transitions, completion and idle sweeping (`SessionController`)

mod controller;
mod model;
mod registry;

pub use controller::{SessionController, UpdateOutcome};
pub use model::{Advance, Invocation, Session, SessionKey};
pub use registry::{Disposition, SessionRegistry};
