//! Matchmaker Orchestrator Crate
//!
//! AI-assisted match scoring: hard compatibility filters over the candidate
//! pool, a Gemini prompt that scores what is left, a per-user cache of the
//! last scan and background jobs that run scans off the request path.

pub mod compatibility;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod prompt;
pub mod provider;

pub use compatibility::{are_religious_levels_compatible, compatible_religious_levels, AgeRange};
pub use engine::{MatchSearch, MatchingEngine, NoProgress, ProgressReporter, SearchMeta, ALGORITHM_VERSION};
pub use error::{OrchestratorError, OrchestratorResult};
pub use jobs::JobRunner;
pub use prompt::MatchResult;
pub use provider::{CompletionProvider, GeminiClient};
