//! The action-selection policy — one schema-constrained model call per
//! loop iteration.
//!
//! The policy is advisory only: it proposes the next action, and the loop
//! applies hard overrides before dispatch. Malformed policy output is a
//! generation failure, never swallowed.

use std::sync::Arc;

use tracing::debug;

use studyforge_core::action::{Action, Mode, PolicyDecision};
use studyforge_core::error::{Error, ModelError, Result};
use studyforge_core::message::{Message, Role};
use studyforge_core::model::{CompletionRequest, LanguageModel, SchemaRequest};

use crate::context::ExecutionContext;

pub struct Policy {
    model: Arc<dyn LanguageModel>,
    model_name: String,
    temperature: f32,
}

impl Policy {
    pub fn new(model: Arc<dyn LanguageModel>, model_name: impl Into<String>, temperature: f32) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            temperature,
        }
    }

    /// Ask the model for the next action, constrained to the mode's legal
    /// subset of the action schema.
    pub async fn next_action(&self, context: &ExecutionContext) -> Result<PolicyDecision> {
        let request = SchemaRequest {
            completion: CompletionRequest {
                model: self.model_name.clone(),
                messages: vec![
                    Message::system(self.guidance(context)),
                    Message::user(task_block(context)),
                ],
                temperature: self.temperature,
                max_tokens: None,
            },
            schema_name: "next_action".into(),
            schema: Action::decision_schema(context.mode()),
        };

        let value = self.model.structured(request).await.map_err(Error::Model)?;

        let decision: PolicyDecision = serde_json::from_value(value).map_err(|e| {
            Error::Model(ModelError::MalformedOutput(format!(
                "policy output did not match the action schema: {e}"
            )))
        })?;

        if !decision.action.allowed_in(context.mode()) {
            return Err(Error::Model(ModelError::MalformedOutput(format!(
                "policy proposed '{}', which is not legal in this mode",
                decision.action.label()
            ))));
        }

        debug!(
            action = decision.action.label(),
            reasoning = decision.reasoning.as_deref().unwrap_or(""),
            "Policy decision"
        );

        Ok(decision)
    }

    fn guidance(&self, context: &ExecutionContext) -> String {
        let mode_guidance = match context.mode() {
            Mode::Conversational => {
                "You decide the next step for answering a user's question.\n\
                 Search the web when facts are needed, scrape promising pages for \
                 detail, and answer once you have enough. Prefer answering over \
                 endless research."
            }
            Mode::Structured => {
                "You decide the next step for producing study content from an \
                 outline.\n\
                 First determine the content type (quiz, tutorial, or flashcard). \
                 Research only when the outline needs factual grounding. Generate \
                 once you have enough, refine if the result has problems, and \
                 complete when the content is good."
            }
        };

        let mut state = format!(
            "\n\nState: step {}/{}, {} searches, {} scraped pages.",
            context.step(),
            context.max_steps(),
            context.search_history().len(),
            context.scraped_page_count(),
        );
        if context.research_disabled() {
            state.push_str(" Research is unavailable; do not propose search or scrape.");
        }
        if let Some(ct) = context.content_type() {
            state.push_str(&format!(" Content type: {ct}."));
        }
        if context.generated_content().is_some() {
            state.push_str(" Content has been generated.");
        }
        if let Some(errors) = context.last_attempt_errors() {
            state.push_str(&format!(" Last attempt failed: {errors}."));
        }

        format!("{mode_guidance}{state}")
    }
}

/// Render the run's input for the policy prompt: the conversation history,
/// or the outline of a structured run.
fn task_block(context: &ExecutionContext) -> String {
    match context.mode() {
        Mode::Conversational => context
            .messages()
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                    Role::System => "System",
                };
                format!("{role}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Mode::Structured => format!(
            "Title: {}\nDescription: {}\nOutline:\n{}",
            context.title(),
            context.description(),
            context.effective_outline()
        ),
    }
}
