//! Content generation, refinement, and answer handlers.
//!
//! Generation invokes the model against the type-specific schema and
//! validates the result structurally. Refinement regenerates the full
//! artifact guided by feedback text, never a partial patch. Answers are
//! streamed free text grounded in whatever research exists.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use studyforge_core::artifact::ContentArtifact;
use studyforge_core::error::{ContentError, Error, ModelError, Result};
use studyforge_core::message::Message;
use studyforge_core::model::{CompletionRequest, LanguageModel, SchemaRequest};

use crate::context::ExecutionContext;

pub struct ContentEngine {
    model: Arc<dyn LanguageModel>,
    model_name: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ContentEngine {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        model_name: impl Into<String>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            temperature,
            max_tokens,
        }
    }

    fn completion(&self, messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest {
            model: self.model_name.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Generate the artifact against the determined type's schema.
    ///
    /// Success stores the artifact and records the attempt; failure records
    /// the attempt with its errors and surfaces the error so the outer
    /// handler can decide recovery.
    pub async fn generate(&self, context: &mut ExecutionContext) -> Result<()> {
        let content_type = context
            .content_type()
            .ok_or(Error::Content(ContentError::TypeNotDetermined))?;

        let mut system = format!(
            "Produce a {content_type} from the outline below. \
             Follow the outline's scope; do not invent topics it does not cover."
        );
        let digest = context.research_digest();
        if !digest.is_empty() {
            system.push_str("\n\nGround the content in this research:\n\n");
            system.push_str(&digest);
        }
        if let Some(errors) = context.last_attempt_errors() {
            system.push_str(&format!(
                "\n\nA previous attempt was rejected: {errors}. Avoid repeating those problems."
            ));
        }

        let user = format!(
            "Title: {}\nDescription: {}\nOutline:\n{}",
            context.title(),
            context.description(),
            context.effective_outline()
        );

        let request = SchemaRequest {
            completion: self.completion(vec![Message::system(system), Message::user(user)]),
            schema_name: content_type.label().into(),
            schema: content_type.schema(),
        };

        debug!(content_type = %content_type, "Generating structured content");

        let value = match self.model.structured(request).await {
            Ok(v) => v,
            Err(e) => {
                context.record_failed_attempt(e.to_string());
                return Err(Error::Model(e));
            }
        };

        match ContentArtifact::from_model_output(content_type, value) {
            Ok(artifact) => {
                info!(
                    content_type = %content_type,
                    items = artifact.item_count(),
                    "Generated artifact"
                );
                context.record_generated(artifact);
                Ok(())
            }
            Err(e) => {
                context.record_failed_attempt(e.to_string());
                Err(Error::Content(e))
            }
        }
    }

    /// Regenerate the artifact wholesale, guided by feedback.
    pub async fn refine(&self, context: &mut ExecutionContext, feedback: &str) -> Result<()> {
        let content_type = context
            .content_type()
            .ok_or(Error::Content(ContentError::TypeNotDetermined))?;
        let current = context
            .generated_content()
            .ok_or(Error::Content(ContentError::NothingToRefine))?;

        let current_json = serde_json::to_string_pretty(current)?;
        let system = format!(
            "Improve the {content_type} below according to the feedback. \
             Return the complete improved {content_type}, not a diff."
        );
        let user = format!(
            "Current content:\n{current_json}\n\nFeedback: {feedback}\n\nOriginal outline:\n{}",
            context.effective_outline()
        );

        let request = SchemaRequest {
            completion: self.completion(vec![Message::system(system), Message::user(user)]),
            schema_name: content_type.label().into(),
            schema: content_type.schema(),
        };

        debug!(content_type = %content_type, feedback, "Refining structured content");

        let value = match self.model.structured(request).await {
            Ok(v) => v,
            Err(e) => {
                context.record_failed_attempt(e.to_string());
                return Err(Error::Model(e));
            }
        };

        match ContentArtifact::from_model_output(content_type, value) {
            Ok(artifact) => {
                info!(content_type = %content_type, "Refined artifact");
                context.record_refinement(feedback, artifact);
                Ok(())
            }
            Err(e) => {
                context.record_failed_attempt(e.to_string());
                Err(Error::Content(e))
            }
        }
    }

    /// Stream the final free-text answer for a conversational run.
    ///
    /// `final_attempt` marks a forced answer at the research bound or step
    /// budget: the model is told to answer with what it has instead of
    /// apologizing for incompleteness.
    pub async fn answer(
        &self,
        context: &ExecutionContext,
        final_attempt: bool,
    ) -> Result<mpsc::Receiver<std::result::Result<String, ModelError>>> {
        let mut system = String::from(
            "Answer the user's question directly and concisely. \
             Cite the research below where it is relevant.",
        );
        if final_attempt {
            system.push_str(
                "\n\nThis is the final attempt: answer with the information \
                 available. Do not apologize for missing research or suggest \
                 searching further.",
            );
        }
        let digest = context.research_digest();
        if !digest.is_empty() {
            system.push_str("\n\n");
            system.push_str(&digest);
        }

        let mut messages = vec![Message::system(system)];
        messages.extend_from_slice(context.messages());

        debug!(final_attempt, "Streaming answer");
        let rx = self
            .model
            .stream_text(self.completion(messages))
            .await
            .map_err(Error::Model)?;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SequentialMockModel;
    use studyforge_core::artifact::ContentType;

    fn quiz_value() -> serde_json::Value {
        serde_json::json!({
            "title": "Solar System Quiz",
            "questions": [
                {
                    "prompt": "Which planet is largest?",
                    "options": ["Mars", "Jupiter", "Venus", "Mercury"],
                    "correct_index": 1
                }
            ]
        })
    }

    fn engine(model: Arc<SequentialMockModel>) -> ContentEngine {
        ContentEngine::new(model, "mock-model", 0.4, None)
    }

    #[tokio::test]
    async fn generate_stores_valid_artifact() {
        let model = Arc::new(SequentialMockModel::new().then_structured(quiz_value()));
        let engine = engine(model);
        let mut ctx = ExecutionContext::structured("Quiz about the solar system", "Solar", "");
        ctx.set_content_type(ContentType::Quiz);

        engine.generate(&mut ctx).await.unwrap();

        let artifact = ctx.generated_content().unwrap();
        assert_eq!(artifact.content_type(), ContentType::Quiz);
        assert_eq!(ctx.generation_attempts().len(), 1);
        assert!(ctx.generation_attempts()[0].errors.is_none());
    }

    #[tokio::test]
    async fn generate_without_type_fails() {
        let model = Arc::new(SequentialMockModel::new());
        let engine = engine(model);
        let mut ctx = ExecutionContext::structured("outline", "t", "d");

        let err = engine.generate(&mut ctx).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Content(ContentError::TypeNotDetermined)
        ));
    }

    #[tokio::test]
    async fn invalid_output_records_failed_attempt() {
        let model = Arc::new(
            SequentialMockModel::new()
                .then_structured(serde_json::json!({"title": "Empty", "questions": []})),
        );
        let engine = engine(model);
        let mut ctx = ExecutionContext::structured("outline", "t", "d");
        ctx.set_content_type(ContentType::Quiz);

        let err = engine.generate(&mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::Content(ContentError::Validation(_))));
        assert_eq!(ctx.generation_attempts().len(), 1);
        let recorded = ctx.last_attempt_errors().unwrap();
        assert!(recorded.starts_with("Validation failed:"));
        assert!(ctx.generated_content().is_none());
    }

    #[tokio::test]
    async fn model_failure_recorded_on_attempt() {
        let model = Arc::new(
            SequentialMockModel::new()
                .then_structured_error(ModelError::Timeout("deadline exceeded".into())),
        );
        let engine = engine(model);
        let mut ctx = ExecutionContext::structured("outline", "t", "d");
        ctx.set_content_type(ContentType::Quiz);

        let err = engine.generate(&mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::Model(ModelError::Timeout(_))));
        assert!(ctx.last_attempt_errors().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn refine_replaces_artifact() {
        let improved = serde_json::json!({
            "title": "Solar System Quiz, improved",
            "questions": [
                {
                    "prompt": "Which planet is largest?",
                    "options": ["Mars", "Jupiter"],
                    "correct_index": 1,
                    "explanation": "Jupiter dwarfs the rest."
                },
                {
                    "prompt": "Closest planet to the Sun?",
                    "options": ["Venus", "Mercury"],
                    "correct_index": 1
                }
            ]
        });
        let model = Arc::new(
            SequentialMockModel::new()
                .then_structured(quiz_value())
                .then_structured(improved),
        );
        let engine = engine(model);
        let mut ctx = ExecutionContext::structured("Quiz about the solar system", "Solar", "");
        ctx.set_content_type(ContentType::Quiz);

        engine.generate(&mut ctx).await.unwrap();
        engine
            .refine(&mut ctx, "add a second question")
            .await
            .unwrap();

        assert_eq!(ctx.generated_content().unwrap().item_count(), 2);
        assert_eq!(ctx.refinement_history().len(), 1);
        assert_eq!(ctx.refinement_history()[0].feedback, "add a second question");
    }

    #[tokio::test]
    async fn refine_without_content_fails() {
        let model = Arc::new(SequentialMockModel::new());
        let engine = engine(model);
        let mut ctx = ExecutionContext::structured("outline", "t", "d");
        ctx.set_content_type(ContentType::Quiz);

        let err = engine.refine(&mut ctx, "anything").await.unwrap_err();
        assert!(matches!(err, Error::Content(ContentError::NothingToRefine)));
    }

    #[tokio::test]
    async fn answer_streams_text() {
        let model = Arc::new(SequentialMockModel::new().then_answer("The ocean is deep."));
        let engine = engine(model);
        let ctx = ExecutionContext::conversational(vec![Message::user("How deep is the ocean?")]);

        let mut rx = engine.answer(&ctx, false).await.unwrap();
        let mut full = String::new();
        while let Some(chunk) = rx.recv().await {
            full.push_str(&chunk.unwrap());
        }
        assert_eq!(full, "The ocean is deep.");
    }
}
