//! Domain types for nodeplanner
//!
//! Requests and constraints coming in, attempts recorded during a refinement
//! session, and the plan or failure report going out. All are serde types so
//! the HTTP API, the CLI and the client SDK share them.

mod attempt;
mod plan;
mod task;

pub use attempt::{Attempt, AttemptOutcome};
pub use plan::{PlanFailure, PlanMetadata, PlanResponse, ValidationResult};
pub use task::{Complexity, Constraints, PlanRequest, TaskAnalysis};
