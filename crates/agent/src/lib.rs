//! The studyforge orchestration loop — the heart of the system.
//!
//! One iteration per step:
//!
//! 1. **Check** the step budget and the cancellation signal
//! 2. **Ask the policy** (a schema-constrained model call) for the next action
//! 3. **Apply hard overrides** that bound research deterministically
//! 4. **Dispatch** to the research, generation, or answer handler
//! 5. **Recover** from failures through the classifier and strategy planner
//!
//! The loop runs until a terminal action (`answer` / `complete`), the step
//! budget runs out, or a non-recoverable error surfaces.

pub mod content;
pub mod context;
pub mod loop_runner;
pub mod policy;
pub mod recovery;
pub mod research;
pub mod testing;

pub use content::ContentEngine;
pub use context::{ExecutionContext, GenerationAttempt, RefinementRecord};
pub use loop_runner::{AgentLoop, AnswerHandle, RunHooks, RunRequest, RunResult};
pub use policy::Policy;
pub use recovery::{ErrorInfo, ErrorKind, RecoveryStrategy, SuggestedAction};
