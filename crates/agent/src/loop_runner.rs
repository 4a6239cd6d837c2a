//! The agent orchestration loop.
//!
//! One iteration per step: check the step budget, check cancellation, ask
//! the policy for an action, apply hard overrides, dispatch, and on failure
//! run the error-classification/recovery state machine. Conversational
//! `answer` and structured `complete` are terminal.
//!
//! The loop owns the execution context for the lifetime of the run and is
//! its only writer. Exactly one of the finish/error hooks fires per run.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use studyforge_core::action::{Action, Mode};
use studyforge_core::artifact::ContentArtifact;
use studyforge_core::error::{Error, ModelError, Result};
use studyforge_core::message::Message;
use studyforge_core::model::LanguageModel;
use studyforge_core::progress::{ProgressBus, ProgressEvent};
use studyforge_core::research::{Scraper, SearchProvider};

use crate::content::ContentEngine;
use crate::context::ExecutionContext;
use crate::policy::Policy;
use crate::recovery::{self, RecoveryStrategy};
use crate::research::{handle_scrape, handle_search};

/// From this step on, conversational research proposals are forced to
/// `answer`.
pub const CONVERSATIONAL_RESEARCH_STEP_LIMIT: u32 = 6;

/// With this many scraped pages and no content, structured scrape proposals
/// are forced to `generate_structured`.
pub const STRUCTURED_SCRAPE_PAGE_LIMIT: usize = 3;

/// The input of a run.
pub enum RunRequest {
    /// Answer a question given conversation history.
    Conversational { messages: Vec<Message> },

    /// Produce a validated artifact from an outline.
    Structured {
        outline: String,
        title: String,
        description: String,
    },
}

/// The caller's handle on a streaming conversational answer.
#[derive(Debug)]
pub struct AnswerHandle {
    /// Text chunks; errors arrive in-band.
    pub stream: mpsc::Receiver<std::result::Result<String, ModelError>>,

    /// Whether this answer was forced at a resource bound rather than
    /// chosen by the policy.
    pub final_attempt: bool,
}

impl AnswerHandle {
    /// Drain the stream into a single string.
    pub async fn collect(mut self) -> std::result::Result<String, ModelError> {
        let mut full = String::new();
        while let Some(chunk) = self.stream.recv().await {
            full.push_str(&chunk?);
        }
        Ok(full)
    }
}

/// The terminal output of a run.
#[derive(Debug)]
pub enum RunResult {
    Answer(AnswerHandle),
    Artifact(ContentArtifact),
}

impl RunResult {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Answer(_) => "answer",
            Self::Artifact(_) => "artifact",
        }
    }
}

/// Terminal callbacks. Exactly one fires per run.
#[derive(Default)]
pub struct RunHooks {
    on_finish: Option<Box<dyn FnOnce(&RunResult) + Send>>,
    on_error: Option<Box<dyn FnOnce(&Error) + Send>>,
}

impl RunHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_finish(mut self, f: impl FnOnce(&RunResult) + Send + 'static) -> Self {
        self.on_finish = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&Error) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

/// What recovery decided the loop should do next.
enum Flow {
    Continue,
    Finish(RunResult),
}

/// The orchestration loop driver. Collaborators are injected; the loop
/// holds no global state and one `AgentLoop` can serve many runs.
pub struct AgentLoop {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchProvider>,
    scraper: Arc<dyn Scraper>,
    model_name: String,
    temperature: f32,
    max_tokens: Option<u32>,
    progress: Arc<ProgressBus>,
    cancel: CancellationToken,
}

impl AgentLoop {
    /// Create a new loop over the given collaborators.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
        scraper: Arc<dyn Scraper>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            model,
            search,
            scraper,
            model_name: model_name.into(),
            temperature: 0.7,
            max_tokens: None,
            progress: Arc::new(ProgressBus::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the sampling temperature for model calls.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Attach a progress bus for outward notifications.
    pub fn with_progress(mut self, progress: Arc<ProgressBus>) -> Self {
        self.progress = progress;
        self
    }

    /// Attach a cancellation token, checked at each iteration boundary.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute a run to its terminal state.
    ///
    /// On terminal success the finish hook fires with the result; on
    /// unrecoverable failure the error hook fires. Never both, never
    /// neither.
    pub async fn run(&self, request: RunRequest, hooks: RunHooks) -> Result<RunResult> {
        let RunHooks {
            on_finish,
            on_error,
        } = hooks;

        let result = self.run_inner(request).await;
        match &result {
            Ok(run_result) => {
                if let Some(f) = on_finish {
                    f(run_result);
                }
            }
            Err(e) => {
                if let Some(f) = on_error {
                    f(e);
                }
            }
        }
        result
    }

    async fn run_inner(&self, request: RunRequest) -> Result<RunResult> {
        let mut context = match request {
            RunRequest::Conversational { messages } => ExecutionContext::conversational(messages),
            RunRequest::Structured {
                outline,
                title,
                description,
            } => ExecutionContext::structured(outline, title, description),
        };

        let policy = Policy::new(self.model.clone(), &self.model_name, self.temperature);
        let engine = ContentEngine::new(
            self.model.clone(),
            &self.model_name,
            self.temperature,
            self.max_tokens,
        );

        info!(mode = ?context.mode(), model = %self.model_name, "Run starting");

        loop {
            if context.should_stop() {
                warn!(step = context.step(), "Step budget exhausted");
                self.progress.publish(ProgressEvent::MaxStepsReached {
                    step: context.step(),
                });
                return self.finish_exhausted(&engine, &mut context).await;
            }

            context.advance_step();

            if self.cancel.is_cancelled() {
                warn!(step = context.step(), "Cancellation observed at iteration boundary");
                return Err(Error::Aborted);
            }

            self.progress.publish(ProgressEvent::StepStarted {
                step: context.step(),
                max_steps: context.max_steps(),
            });

            let decision = match policy.next_action(&context).await {
                Ok(d) => d,
                Err(e) => match self.recover(&engine, &mut context, e).await? {
                    Flow::Continue => continue,
                    Flow::Finish(result) => return Ok(result),
                },
            };

            let proposed_label = decision.action.label();
            let action = self.apply_overrides(&context, decision.action);
            if action.label() != proposed_label {
                self.progress.publish(ProgressEvent::ActionOverridden {
                    step: context.step(),
                    proposed: proposed_label.into(),
                    forced: action.label().into(),
                });
            }
            self.progress.publish(ProgressEvent::ActionSelected {
                step: context.step(),
                action: action.label().into(),
                detail: decision.reasoning.clone(),
            });

            debug!(step = context.step(), action = action.label(), "Dispatching action");

            let outcome: Result<Option<RunResult>> = match action {
                Action::Search { query } => {
                    handle_search(&mut context, self.search.as_ref(), &query, &self.cancel)
                        .await
                        .map(|_| None)
                }
                Action::Scrape { urls } => {
                    handle_scrape(&mut context, self.scraper.as_ref(), &urls)
                        .await
                        .map(|_| None)
                }
                Action::Answer => engine.answer(&context, false).await.map(|stream| {
                    Some(RunResult::Answer(AnswerHandle {
                        stream,
                        final_attempt: false,
                    }))
                }),
                Action::DetermineType { content_type } => {
                    context.set_content_type(content_type);
                    Ok(None)
                }
                Action::GenerateStructured => engine.generate(&mut context).await.map(|_| None),
                Action::RefineStructured { feedback } => {
                    engine.refine(&mut context, &feedback).await.map(|_| None)
                }
                Action::Complete => match context.generated_content() {
                    Some(artifact) => Ok(Some(RunResult::Artifact(artifact.clone()))),
                    None => Err(Error::NoContentGenerated),
                },
            };

            match outcome {
                Ok(Some(result)) => {
                    info!(step = context.step(), outcome = result.label(), "Run finished");
                    self.progress.publish(ProgressEvent::Finished {
                        step: context.step(),
                        outcome: result.label().into(),
                    });
                    return Ok(result);
                }
                Ok(None) => {}
                // Caller-contract violations indicate a policy/schema
                // mismatch, not a transient condition: propagate, no retry.
                Err(e @ Error::InvalidAction(_)) => return Err(e),
                Err(e) => match self.recover(&engine, &mut context, e).await? {
                    Flow::Continue => {}
                    Flow::Finish(result) => return Ok(result),
                },
            }
        }
    }

    /// Hard overrides: the policy is not trusted to self-limit research
    /// breadth, so the loop enforces the bounds deterministically.
    fn apply_overrides(&self, context: &ExecutionContext, action: Action) -> Action {
        match context.mode() {
            Mode::Structured => {
                if matches!(action, Action::Scrape { .. }) {
                    if context.generated_content().is_some() {
                        debug!("Override: scrape after generation, forcing complete");
                        return Action::Complete;
                    }
                    if context.scraped_page_count() >= STRUCTURED_SCRAPE_PAGE_LIMIT {
                        debug!("Override: scrape past page bound, forcing generate_structured");
                        return Action::GenerateStructured;
                    }
                }
                if context.research_disabled() && action.is_research() {
                    debug!("Override: research disabled, forcing generation path");
                    return if context.generated_content().is_some() {
                        Action::Complete
                    } else {
                        Action::GenerateStructured
                    };
                }
                action
            }
            Mode::Conversational => {
                if action.is_research()
                    && (context.step() >= CONVERSATIONAL_RESEARCH_STEP_LIMIT
                        || context.research_disabled())
                {
                    debug!("Override: research bound reached, forcing answer");
                    return Action::Answer;
                }
                action
            }
        }
    }

    /// The error-handling state machine, branched by mode.
    async fn recover(
        &self,
        engine: &ContentEngine,
        context: &mut ExecutionContext,
        error: Error,
    ) -> Result<Flow> {
        let info = recovery::classify(&error);
        warn!(
            kind = info.kind.label(),
            error = %info.message,
            retries = context.retries(),
            "Step failed"
        );
        self.progress.publish(ProgressEvent::ErrorOccurred {
            step: context.step(),
            kind: info.kind.label().into(),
            message: info.message.clone(),
        });

        match context.mode() {
            Mode::Conversational => {
                // Degrade to a best-effort final answer once any research
                // exists, instead of surfacing raw errors.
                if context.has_research() {
                    self.publish_recovery(context.step(), "fallback", "answering with partial context");
                    let stream = engine.answer(context, true).await?;
                    return Ok(Flow::Finish(RunResult::Answer(AnswerHandle {
                        stream,
                        final_attempt: true,
                    })));
                }
                if recovery::should_retry_after_error(&info, context) {
                    context.record_retry();
                    self.publish_recovery(context.step(), "retry", &info.message);
                    return Ok(Flow::Continue);
                }
                Err(error)
            }
            Mode::Structured => {
                let strategy = recovery::error_recovery_strategy(&info, context);
                self.publish_recovery(context.step(), strategy.label(), &info.message);

                match strategy {
                    RecoveryStrategy::Retry => {
                        if recovery::should_retry_after_error(&info, context) {
                            context.record_retry();
                            Ok(Flow::Continue)
                        } else {
                            Err(error)
                        }
                    }
                    RecoveryStrategy::SkipResearch => {
                        context.disable_research();
                        Ok(Flow::Continue)
                    }
                    RecoveryStrategy::Simplify => {
                        let simplified = recovery::simplify_outline(
                            context.effective_outline(),
                            context.content_type(),
                        );
                        context.apply_simplified_outline(simplified);
                        Ok(Flow::Continue)
                    }
                    RecoveryStrategy::Fallback => match context.generated_content() {
                        Some(artifact) => {
                            Ok(Flow::Finish(RunResult::Artifact(artifact.clone())))
                        }
                        None => Err(error),
                    },
                    RecoveryStrategy::Abort { .. } => Err(error),
                }
            }
        }
    }

    /// Termination after max steps with no terminal action reached.
    async fn finish_exhausted(
        &self,
        engine: &ContentEngine,
        context: &mut ExecutionContext,
    ) -> Result<RunResult> {
        match context.mode() {
            Mode::Conversational => {
                info!("Forcing final answer with available research");
                let stream = engine.answer(context, true).await?;
                self.progress.publish(ProgressEvent::Finished {
                    step: context.step(),
                    outcome: "answer".into(),
                });
                Ok(RunResult::Answer(AnswerHandle {
                    stream,
                    final_attempt: true,
                }))
            }
            Mode::Structured => match context.generated_content() {
                Some(artifact) => {
                    info!("Returning best generated content");
                    self.progress.publish(ProgressEvent::Finished {
                        step: context.step(),
                        outcome: "artifact".into(),
                    });
                    Ok(RunResult::Artifact(artifact.clone()))
                }
                None => Err(Error::NoContentGenerated),
            },
        }
    }

    fn publish_recovery(&self, step: u32, strategy: &str, detail: &str) {
        self.progress.publish(ProgressEvent::RecoveryApplied {
            step,
            strategy: strategy.into(),
            detail: Some(detail.to_string()),
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
