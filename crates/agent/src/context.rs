//! The execution context — the per-run mutable state container.
//!
//! One instance exists per run, owned exclusively by the orchestration loop
//! for its lifetime. There is no interior mutability and no locking: the
//! loop is the single writer, and everything it hands to collaborators is a
//! read-only view or a formatted copy.
//!
//! Invariants held here:
//! - `step` never decreases
//! - `search_history` and `scraped_content` never shrink
//! - `content_type`, once set, is never unset
//! - `generated_content` is set at most once per generation attempt but may
//!   be replaced wholesale by a later successful refinement

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use studyforge_core::action::Mode;
use studyforge_core::artifact::{ContentArtifact, ContentType};
use studyforge_core::message::Message;
use studyforge_core::research::{QueryResult, ScrapedPage};

/// Step budget for a conversational run. Fixed at creation.
pub const CONVERSATIONAL_MAX_STEPS: u32 = 10;

/// Baseline step budget for a structured run.
pub const STRUCTURED_BASE_MAX_STEPS: u32 = 15;

/// Extra steps granted once research has occurred.
pub const STRUCTURED_RESEARCH_BONUS: u32 = 3;

/// Extra steps granted once refinement has occurred.
pub const STRUCTURED_REFINEMENT_BONUS: u32 = 2;

/// Hard ceiling on the structured step budget.
pub const STRUCTURED_MAX_STEPS_CEILING: u32 = 20;

/// One recorded attempt at generating the artifact.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationAttempt {
    pub attempt_number: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentArtifact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,

    pub timestamp: DateTime<Utc>,
}

/// One recorded refinement pass over the artifact.
#[derive(Debug, Clone, Serialize)]
pub struct RefinementRecord {
    pub attempt_number: u32,
    pub feedback: String,
    pub improved_content: ContentArtifact,
    pub timestamp: DateTime<Utc>,
}

/// The per-run state container shared across all steps.
#[derive(Debug)]
pub struct ExecutionContext {
    step: u32,
    max_steps: u32,
    mode: Mode,
    messages: Vec<Message>,
    search_history: Vec<QueryResult>,
    scraped_content: Vec<ScrapedPage>,
    retries: u32,
    research_disabled: bool,

    // Structured-mode-only fields
    content_type: Option<ContentType>,
    title: String,
    description: String,
    simplified_outline: Option<String>,
    generated_content: Option<ContentArtifact>,
    generation_attempts: Vec<GenerationAttempt>,
    refinement_history: Vec<RefinementRecord>,
}

impl ExecutionContext {
    /// Create a context for a conversational run.
    pub fn conversational(messages: Vec<Message>) -> Self {
        Self {
            step: 0,
            max_steps: CONVERSATIONAL_MAX_STEPS,
            mode: Mode::Conversational,
            messages,
            search_history: Vec::new(),
            scraped_content: Vec::new(),
            retries: 0,
            research_disabled: false,
            content_type: None,
            title: String::new(),
            description: String::new(),
            simplified_outline: None,
            generated_content: None,
            generation_attempts: Vec::new(),
            refinement_history: Vec::new(),
        }
    }

    /// Create a context for a structured run. The outline becomes the single
    /// message of the run; it is never rewritten (simplification overlays it).
    pub fn structured(
        outline: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            step: 0,
            max_steps: STRUCTURED_BASE_MAX_STEPS,
            mode: Mode::Structured,
            messages: vec![Message::user(outline)],
            search_history: Vec::new(),
            scraped_content: Vec::new(),
            retries: 0,
            research_disabled: false,
            content_type: None,
            title: title.into(),
            description: description.into(),
            simplified_outline: None,
            generated_content: None,
            generation_attempts: Vec::new(),
            refinement_history: Vec::new(),
        }
    }

    // --- Step accounting (loop-only mutators) ---

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Advance to the next step. Called exactly once per loop iteration.
    pub fn advance_step(&mut self) {
        self.step += 1;
    }

    /// Whether the step budget is exhausted. Structured mode recomputes the
    /// budget from current research/refinement counts first.
    pub fn should_stop(&mut self) -> bool {
        if self.mode == Mode::Structured {
            self.max_steps = self.computed_structured_budget();
        }
        self.step >= self.max_steps
    }

    fn computed_structured_budget(&self) -> u32 {
        let mut budget = STRUCTURED_BASE_MAX_STEPS;
        if self.has_research() {
            budget += STRUCTURED_RESEARCH_BONUS;
        }
        if !self.refinement_history.is_empty() {
            budget += STRUCTURED_REFINEMENT_BONUS;
        }
        budget.min(STRUCTURED_MAX_STEPS_CEILING)
    }

    // --- Messages ---

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The outline of a structured run: the simplified overlay if recovery
    /// installed one, otherwise the original single message.
    pub fn effective_outline(&self) -> &str {
        self.simplified_outline
            .as_deref()
            .unwrap_or_else(|| self.messages.first().map(|m| m.content.as_str()).unwrap_or(""))
    }

    /// Overlay a simplified outline. The original message is kept intact.
    pub fn apply_simplified_outline(&mut self, outline: String) {
        debug!(chars = outline.len(), "Applying simplified outline");
        self.simplified_outline = Some(outline);
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    // --- Research history ---

    pub fn search_history(&self) -> &[QueryResult] {
        &self.search_history
    }

    pub fn scraped_content(&self) -> &[ScrapedPage] {
        &self.scraped_content
    }

    pub fn scraped_page_count(&self) -> usize {
        self.scraped_content.len()
    }

    pub fn has_research(&self) -> bool {
        !self.search_history.is_empty() || !self.scraped_content.is_empty()
    }

    pub fn record_search(&mut self, entry: QueryResult) {
        self.search_history.push(entry);
    }

    pub fn record_page(&mut self, page: ScrapedPage) {
        self.scraped_content.push(page);
    }

    /// Stop proposing research: after a research failure degrades, any
    /// further policy-proposed search/scrape is rewritten by the loop.
    pub fn disable_research(&mut self) {
        self.research_disabled = true;
    }

    pub fn research_disabled(&self) -> bool {
        self.research_disabled
    }

    /// Format the accumulated research for inclusion in a model prompt.
    /// This is the read-only view collaborators get; they never see the
    /// underlying containers.
    pub fn research_digest(&self) -> String {
        if !self.has_research() {
            return String::new();
        }

        let mut digest = String::from("## Research gathered\n");
        for query in &self.search_history {
            digest.push_str(&format!("\n### Search: {}\n", query.query));
            for result in &query.results {
                digest.push_str(&format!(
                    "- {} ({})\n  {}\n",
                    result.title, result.url, result.snippet
                ));
            }
        }
        for page in &self.scraped_content {
            digest.push_str(&format!("\n### Page: {}\n{}\n", page.url, page.content));
        }
        digest
    }

    // --- Retries ---

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Incremented only on recoverable-error recovery attempts.
    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    // --- Structured content ---

    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type
    }

    /// Commit to a content type. One-way: the first determination wins, and
    /// a later conflicting determination is ignored.
    pub fn set_content_type(&mut self, content_type: ContentType) {
        match self.content_type {
            None => {
                debug!(content_type = %content_type, "Content type determined");
                self.content_type = Some(content_type);
            }
            Some(existing) if existing == content_type => {}
            Some(existing) => {
                warn!(
                    existing = %existing,
                    proposed = %content_type,
                    "Ignoring conflicting content type determination"
                );
            }
        }
    }

    pub fn generated_content(&self) -> Option<&ContentArtifact> {
        self.generated_content.as_ref()
    }

    pub fn generation_attempts(&self) -> &[GenerationAttempt] {
        &self.generation_attempts
    }

    pub fn refinement_history(&self) -> &[RefinementRecord] {
        &self.refinement_history
    }

    /// Validation errors from the most recent attempt, if it failed. Used
    /// to build refinement feedback on later iterations.
    pub fn last_attempt_errors(&self) -> Option<&str> {
        self.generation_attempts
            .last()
            .and_then(|a| a.errors.as_deref())
    }

    /// Record a successful generation attempt and store the artifact.
    pub fn record_generated(&mut self, artifact: ContentArtifact) {
        let attempt_number = self.generation_attempts.len() as u32 + 1;
        self.generation_attempts.push(GenerationAttempt {
            attempt_number,
            content: Some(artifact.clone()),
            errors: None,
            timestamp: Utc::now(),
        });
        self.generated_content = Some(artifact);
    }

    /// Record a failed generation attempt with its errors.
    pub fn record_failed_attempt(&mut self, errors: impl Into<String>) {
        let attempt_number = self.generation_attempts.len() as u32 + 1;
        self.generation_attempts.push(GenerationAttempt {
            attempt_number,
            content: None,
            errors: Some(errors.into()),
            timestamp: Utc::now(),
        });
    }

    /// Record a successful refinement: the artifact is replaced wholesale.
    pub fn record_refinement(&mut self, feedback: impl Into<String>, improved: ContentArtifact) {
        let attempt_number = self.refinement_history.len() as u32 + 1;
        self.refinement_history.push(RefinementRecord {
            attempt_number,
            feedback: feedback.into(),
            improved_content: improved.clone(),
            timestamp: Utc::now(),
        });
        self.generated_content = Some(improved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyforge_core::artifact::{Flashcard, FlashcardSet};
    use studyforge_core::research::SearchResult;

    fn sample_artifact() -> ContentArtifact {
        ContentArtifact::Flashcard(FlashcardSet {
            title: "Moons".into(),
            cards: vec![Flashcard {
                front: "Largest moon of Jupiter?".into(),
                back: "Ganymede".into(),
            }],
        })
    }

    fn sample_query() -> QueryResult {
        QueryResult {
            query: "solar system".into(),
            results: vec![SearchResult {
                title: "The Solar System".into(),
                url: "https://example.com/solar".into(),
                snippet: "Eight planets orbit the Sun.".into(),
                date: None,
            }],
            timestamp: Utc::now(),
        }
    }

    fn sample_page(url: &str) -> ScrapedPage {
        ScrapedPage {
            url: url.into(),
            content: "page text".into(),
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn conversational_budget_is_fixed() {
        let mut ctx = ExecutionContext::conversational(vec![Message::user("hi")]);
        assert_eq!(ctx.max_steps(), CONVERSATIONAL_MAX_STEPS);
        for _ in 0..CONVERSATIONAL_MAX_STEPS {
            assert!(!ctx.should_stop());
            ctx.advance_step();
        }
        assert!(ctx.should_stop());
    }

    #[test]
    fn step_is_monotonic() {
        let mut ctx = ExecutionContext::conversational(vec![]);
        let mut last = ctx.step();
        for _ in 0..5 {
            ctx.advance_step();
            assert_eq!(ctx.step(), last + 1);
            last = ctx.step();
        }
    }

    #[test]
    fn structured_budget_grows_with_research_and_refinement() {
        let mut ctx = ExecutionContext::structured("Make a quiz", "Quiz", "");
        assert!(!ctx.should_stop());
        assert_eq!(ctx.max_steps(), STRUCTURED_BASE_MAX_STEPS);

        ctx.record_search(sample_query());
        ctx.should_stop();
        assert_eq!(
            ctx.max_steps(),
            STRUCTURED_BASE_MAX_STEPS + STRUCTURED_RESEARCH_BONUS
        );

        ctx.record_refinement("tighten wording", sample_artifact());
        ctx.should_stop();
        assert_eq!(ctx.max_steps(), STRUCTURED_MAX_STEPS_CEILING);
    }

    #[test]
    fn content_type_is_one_way() {
        let mut ctx = ExecutionContext::structured("outline", "t", "d");
        ctx.set_content_type(ContentType::Quiz);
        ctx.set_content_type(ContentType::Tutorial);
        assert_eq!(ctx.content_type(), Some(ContentType::Quiz));
    }

    #[test]
    fn histories_append_in_order() {
        let mut ctx = ExecutionContext::conversational(vec![]);
        ctx.record_page(sample_page("https://a.example"));
        ctx.record_page(sample_page("https://b.example"));
        let urls: Vec<&str> = ctx
            .scraped_content()
            .iter()
            .map(|p| p.url.as_str())
            .collect();
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn refinement_replaces_content_wholesale() {
        let mut ctx = ExecutionContext::structured("outline", "t", "d");
        ctx.record_generated(sample_artifact());
        assert_eq!(ctx.generation_attempts().len(), 1);

        let improved = ContentArtifact::Flashcard(FlashcardSet {
            title: "Moons, revised".into(),
            cards: vec![Flashcard {
                front: "Largest moon of Saturn?".into(),
                back: "Titan".into(),
            }],
        });
        ctx.record_refinement("cover Saturn too", improved.clone());
        assert_eq!(ctx.generated_content(), Some(&improved));
        assert_eq!(ctx.refinement_history().len(), 1);
    }

    #[test]
    fn failed_attempt_errors_are_retrievable() {
        let mut ctx = ExecutionContext::structured("outline", "t", "d");
        ctx.record_failed_attempt("Validation failed: quiz has no questions");
        assert_eq!(
            ctx.last_attempt_errors(),
            Some("Validation failed: quiz has no questions")
        );
        assert!(ctx.generated_content().is_none());
    }

    #[test]
    fn simplified_outline_overlays_original() {
        let mut ctx = ExecutionContext::structured("full outline text", "t", "d");
        assert_eq!(ctx.effective_outline(), "full outline text");
        ctx.apply_simplified_outline("short version".into());
        assert_eq!(ctx.effective_outline(), "short version");
        // Original message untouched
        assert_eq!(ctx.messages()[0].content, "full outline text");
    }

    #[test]
    fn research_digest_includes_searches_and_pages() {
        let mut ctx = ExecutionContext::conversational(vec![]);
        assert!(ctx.research_digest().is_empty());
        ctx.record_search(sample_query());
        ctx.record_page(sample_page("https://example.com/solar"));
        let digest = ctx.research_digest();
        assert!(digest.contains("Search: solar system"));
        assert!(digest.contains("Page: https://example.com/solar"));
    }
}
