//! Deterministic planning for DeskPilot.
//!
//! - [`parser::CommandInterpreter`] turns a French free-text command into a
//!   [`Plan`] using a fixed-priority list of regex intents.
//! - [`executor::PlanExecutor`] runs a plan step by step against the
//!   [`deskpilot_adapters::ActionSurface`], stopping at the first failure.

pub mod error;
pub mod executor;
pub mod parser;
pub mod plan;

pub use error::{IntentError, Result};
pub use executor::{PlanExecutor, PlanOutcome};
pub use parser::{CommandInterpreter, IntentKind};
pub use plan::{ActionStep, Plan};
