//! Planning: analysis, refinement loop, and the service that ties them together

mod analyzer;
mod error;
mod extractor;
mod generator;
mod service;
mod session;

pub use analyzer::{Analyzed, TaskAnalyzer};
pub use error::{AnalysisError, PlanError};
pub use extractor::{Extraction, ExtractionError, Extractor, extract_reasoning};
pub use generator::{Artifact, Generator};
pub use service::PlannerService;
pub use session::{RefinementSession, SessionState};
