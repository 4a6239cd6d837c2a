//! The action schema — the closed vocabulary of operations the policy may
//! select, one per loop iteration.
//!
//! The loop dispatches over this enum with an exhaustive `match`; adding a
//! variant without updating the dispatcher is a compile error. The policy
//! (a language model) proposes actions, but the loop is the final authority
//! via hard overrides.

use serde::{Deserialize, Serialize};

use crate::artifact::ContentType;

/// Which output mode a run operates in. Immutable after context creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Free-text answer to a conversational question.
    Conversational,
    /// Validated structured artifact (quiz, tutorial, flashcard set).
    Structured,
}

/// One discrete operation the loop can execute in a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Query the web search collaborator.
    Search { query: String },

    /// Fetch and extract readable text from pages found by search.
    Scrape { urls: Vec<String> },

    /// Produce the final free-text answer. Terminal. Conversational only.
    Answer,

    /// Commit to a content type for this run. Structured only.
    DetermineType { content_type: ContentType },

    /// Generate the artifact against its type schema. Structured only.
    GenerateStructured,

    /// Regenerate the artifact wholesale, guided by feedback. Structured only.
    RefineStructured { feedback: String },

    /// Accept the current artifact as final. Terminal. Structured only.
    Complete,
}

impl Action {
    /// Snake-case label matching the serde tag, for logs and progress events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Search { .. } => "search",
            Self::Scrape { .. } => "scrape",
            Self::Answer => "answer",
            Self::DetermineType { .. } => "determine_type",
            Self::GenerateStructured => "generate_structured",
            Self::RefineStructured { .. } => "refine_structured",
            Self::Complete => "complete",
        }
    }

    /// Whether this action is legal in the given mode.
    pub fn allowed_in(&self, mode: Mode) -> bool {
        match self {
            Self::Search { .. } | Self::Scrape { .. } => true,
            Self::Answer => mode == Mode::Conversational,
            Self::DetermineType { .. }
            | Self::GenerateStructured
            | Self::RefineStructured { .. }
            | Self::Complete => mode == Mode::Structured,
        }
    }

    /// Research actions are the ones subject to resource overrides.
    pub fn is_research(&self) -> bool {
        matches!(self, Self::Search { .. } | Self::Scrape { .. })
    }

    /// JSON Schema for the policy call, restricted to the mode's legal
    /// action types.
    pub fn decision_schema(mode: Mode) -> serde_json::Value {
        let types: Vec<&str> = match mode {
            Mode::Conversational => vec!["search", "scrape", "answer"],
            Mode::Structured => vec![
                "search",
                "scrape",
                "determine_type",
                "generate_structured",
                "refine_structured",
                "complete",
            ],
        };
        serde_json::json!({
            "type": "object",
            "properties": {
                "type": { "type": "string", "enum": types },
                "query": { "type": "string", "description": "Search query. Required when type is search." },
                "urls": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Page URLs to scrape. Required when type is scrape."
                },
                "content_type": {
                    "type": "string",
                    "enum": ["quiz", "tutorial", "flashcard"],
                    "description": "Required when type is determine_type."
                },
                "feedback": {
                    "type": "string",
                    "description": "What to improve. Required when type is refine_structured."
                },
                "reasoning": { "type": "string", "description": "Brief rationale for the choice." }
            },
            "required": ["type"]
        })
    }
}

/// The policy's proposal for the next step: an action plus optional
/// free-text reasoning. Advisory only: hard overrides may replace the
/// action before dispatch, regardless of the stated reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    #[serde(flatten)]
    pub action: Action,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_tag_roundtrip() {
        let action = Action::Search {
            query: "largest moon".into(),
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains(r#""type":"search""#));
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn answer_is_conversational_only() {
        assert!(Action::Answer.allowed_in(Mode::Conversational));
        assert!(!Action::Answer.allowed_in(Mode::Structured));
    }

    #[test]
    fn structured_actions_rejected_in_conversational() {
        for action in [
            Action::DetermineType {
                content_type: ContentType::Quiz,
            },
            Action::GenerateStructured,
            Action::RefineStructured {
                feedback: "shorter".into(),
            },
            Action::Complete,
        ] {
            assert!(action.allowed_in(Mode::Structured), "{}", action.label());
            assert!(
                !action.allowed_in(Mode::Conversational),
                "{}",
                action.label()
            );
        }
    }

    #[test]
    fn research_allowed_in_both_modes() {
        let scrape = Action::Scrape {
            urls: vec!["https://example.com".into()],
        };
        assert!(scrape.allowed_in(Mode::Conversational));
        assert!(scrape.allowed_in(Mode::Structured));
        assert!(scrape.is_research());
        assert!(!Action::Complete.is_research());
    }

    #[test]
    fn decision_deserializes_flattened() {
        let json = r#"{"type":"determine_type","content_type":"quiz","reasoning":"outline asks for questions"}"#;
        let decision: PolicyDecision = serde_json::from_str(json).unwrap();
        assert_eq!(
            decision.action,
            Action::DetermineType {
                content_type: ContentType::Quiz
            }
        );
        assert_eq!(
            decision.reasoning.as_deref(),
            Some("outline asks for questions")
        );
    }

    #[test]
    fn decision_schema_restricts_types_by_mode() {
        let schema = Action::decision_schema(Mode::Conversational);
        let types = schema["properties"]["type"]["enum"].as_array().unwrap();
        assert!(types.iter().any(|t| t == "answer"));
        assert!(!types.iter().any(|t| t == "complete"));

        let schema = Action::decision_schema(Mode::Structured);
        let types = schema["properties"]["type"]["enum"].as_array().unwrap();
        assert!(types.iter().any(|t| t == "complete"));
        assert!(!types.iter().any(|t| t == "answer"));
    }
}
