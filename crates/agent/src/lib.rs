//! Support pipeline runtime.
//!
//! This crate drives one support turn end to end:
//! 1. **Admission** (`pipeline`) - per-session token-bucket check
//! 2. **Memoization** (`pipeline`) - single-flight response cache lookup
//! 3. **Workflow** (`workflow`) - classify -> route -> respond/escalate
//! 4. **Persistence** (`pipeline`) - append the completed turn
//!
//! The language model is strictly a collaborator behind the `Classifier` and
//! `Generator` seams. Routing is a deterministic decision made in
//! `deskline-core`; the model never decides whether a turn escalates.

pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod testing;
pub mod workflow;

pub use llm::{Classifier, Generator, OpenAiChatClient};
pub use pipeline::{PipelineSettings, SupportPipeline, TurnOutcome, TurnRequest};
pub use workflow::run_turn;
