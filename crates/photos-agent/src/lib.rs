//! photos-agent: natural-language photo search over the photo graph.
//!
//! A request is prefixed with the trusted identity statement and handed to
//! a language model together with its tools: three for search, plus
//! `create_collage` and `create_memory` for turning results into a stored
//! memory. The model's final answer is a JSON array of storage locations;
//! progress is reported as [`AgentEvent`]s.
//!
//! [`AgentEvent`]: photos_core::AgentEvent

pub mod error;
pub mod format;
pub mod identity;
pub mod model;
pub mod pipeline;
pub mod policy;
pub mod prompt;
pub mod runner;
pub mod tools;
pub mod transcript;

pub use error::{AgentError, Result, GENERIC_FAILURE};
pub use format::parse_final_answer;
pub use identity::{identity_prefix, with_identity};
pub use model::{Content, FunctionCall, GeminiModel, LanguageModel, ModelTurn, Part};
pub use pipeline::{SearchOutcome, SearchParameters, SearchPipeline, Stage};
pub use policy::GroupPolicy;
pub use runner::{collect_until_terminal, AgentRunner};
pub use tools::{collage_plan, render_collage, CollagePlan, RunContext, ToolOutput, ToolSet};
pub use transcript::{Transcript, TranscriptSession, TranscriptStore};
