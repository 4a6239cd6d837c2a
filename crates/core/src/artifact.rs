//! Content artifacts — the structured outputs of a generation run.
//!
//! An artifact is a tagged union over the three supported content types.
//! It is created by a generation handler, validated structurally, and
//! replaced wholesale by refinement, never patched in place.

use serde::{Deserialize, Serialize};

use crate::error::ContentError;

/// The kind of structured content a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Quiz,
    Tutorial,
    Flashcard,
}

impl ContentType {
    /// Lowercase wire label, matching the serde tag.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Quiz => "quiz",
            Self::Tutorial => "tutorial",
            Self::Flashcard => "flashcard",
        }
    }

    /// JSON Schema the language model is constrained to when generating
    /// this content type.
    pub fn schema(&self) -> serde_json::Value {
        match self {
            Self::Quiz => serde_json::json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "questions": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "prompt": { "type": "string" },
                                "options": {
                                    "type": "array",
                                    "items": { "type": "string" },
                                    "minItems": 2,
                                    "maxItems": 6
                                },
                                "correct_index": { "type": "integer", "minimum": 0 },
                                "explanation": { "type": "string" }
                            },
                            "required": ["prompt", "options", "correct_index"]
                        }
                    }
                },
                "required": ["title", "questions"]
            }),
            Self::Tutorial => serde_json::json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "summary": { "type": "string" },
                    "sections": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "heading": { "type": "string" },
                                "body": { "type": "string" }
                            },
                            "required": ["heading", "body"]
                        }
                    }
                },
                "required": ["title", "sections"]
            }),
            Self::Flashcard => serde_json::json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "cards": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "front": { "type": "string" },
                                "back": { "type": "string" }
                            },
                            "required": ["front", "back"]
                        }
                    }
                },
                "required": ["title", "cards"]
            }),
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A multiple-choice quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub questions: Vec<QuizQuestion>,
}

/// A single quiz question with one correct option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub prompt: String,

    pub options: Vec<String>,

    /// Index into `options` of the correct answer.
    pub correct_index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A sectioned tutorial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tutorial {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    pub sections: Vec<TutorialSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorialSection {
    pub heading: String,
    pub body: String,
}

/// A set of two-sided flashcards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub title: String,
    pub cards: Vec<Flashcard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

/// The validated output of a structured run.
///
/// Wire format: `{"type": "quiz", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ContentArtifact {
    Quiz(Quiz),
    Tutorial(Tutorial),
    Flashcard(FlashcardSet),
}

impl ContentArtifact {
    /// Which content type this artifact is.
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Quiz(_) => ContentType::Quiz,
            Self::Tutorial(_) => ContentType::Tutorial,
            Self::Flashcard(_) => ContentType::Flashcard,
        }
    }

    /// The artifact's display title.
    pub fn title(&self) -> &str {
        match self {
            Self::Quiz(q) => &q.title,
            Self::Tutorial(t) => &t.title,
            Self::Flashcard(f) => &f.title,
        }
    }

    /// Number of top-level items (questions, sections, or cards).
    pub fn item_count(&self) -> usize {
        match self {
            Self::Quiz(q) => q.questions.len(),
            Self::Tutorial(t) => t.sections.len(),
            Self::Flashcard(f) => f.cards.len(),
        }
    }

    /// Parse raw model output into an artifact of the expected type.
    ///
    /// The model is asked for the bare data object (no tag), so the
    /// expected type supplies the discriminant.
    pub fn from_model_output(
        content_type: ContentType,
        value: serde_json::Value,
    ) -> std::result::Result<Self, ContentError> {
        let artifact = match content_type {
            ContentType::Quiz => serde_json::from_value::<Quiz>(value).map(Self::Quiz),
            ContentType::Tutorial => serde_json::from_value::<Tutorial>(value).map(Self::Tutorial),
            ContentType::Flashcard => {
                serde_json::from_value::<FlashcardSet>(value).map(Self::Flashcard)
            }
        }
        .map_err(|e| ContentError::Validation(format!("schema mismatch: {e}")))?;

        artifact.validate()?;
        Ok(artifact)
    }

    /// Structural validation beyond what deserialization enforces.
    pub fn validate(&self) -> std::result::Result<(), ContentError> {
        let mut issues = Vec::new();

        match self {
            Self::Quiz(quiz) => {
                if quiz.title.trim().is_empty() {
                    issues.push("quiz title is empty".to_string());
                }
                if quiz.questions.is_empty() {
                    issues.push("quiz has no questions".to_string());
                }
                for (i, q) in quiz.questions.iter().enumerate() {
                    if q.prompt.trim().is_empty() {
                        issues.push(format!("question {} has an empty prompt", i + 1));
                    }
                    if q.options.len() < 2 || q.options.len() > 6 {
                        issues.push(format!(
                            "question {} has {} options, expected 2–6",
                            i + 1,
                            q.options.len()
                        ));
                    }
                    if q.correct_index >= q.options.len() {
                        issues.push(format!(
                            "question {} correct_index {} out of range",
                            i + 1,
                            q.correct_index
                        ));
                    }
                }
            }
            Self::Tutorial(tutorial) => {
                if tutorial.title.trim().is_empty() {
                    issues.push("tutorial title is empty".to_string());
                }
                if tutorial.sections.is_empty() {
                    issues.push("tutorial has no sections".to_string());
                }
                for (i, s) in tutorial.sections.iter().enumerate() {
                    if s.heading.trim().is_empty() {
                        issues.push(format!("section {} has an empty heading", i + 1));
                    }
                    if s.body.trim().is_empty() {
                        issues.push(format!("section {} has an empty body", i + 1));
                    }
                }
            }
            Self::Flashcard(set) => {
                if set.title.trim().is_empty() {
                    issues.push("flashcard set title is empty".to_string());
                }
                if set.cards.is_empty() {
                    issues.push("flashcard set has no cards".to_string());
                }
                for (i, c) in set.cards.iter().enumerate() {
                    if c.front.trim().is_empty() || c.back.trim().is_empty() {
                        issues.push(format!("card {} has an empty side", i + 1));
                    }
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ContentError::Validation(issues.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_quiz() -> Quiz {
        Quiz {
            title: "Solar System".into(),
            description: None,
            questions: vec![QuizQuestion {
                prompt: "Which planet is largest?".into(),
                options: vec!["Mars".into(), "Jupiter".into(), "Venus".into()],
                correct_index: 1,
                explanation: Some("Jupiter is the largest planet.".into()),
            }],
        }
    }

    #[test]
    fn valid_quiz_passes() {
        let artifact = ContentArtifact::Quiz(sample_quiz());
        assert!(artifact.validate().is_ok());
        assert_eq!(artifact.content_type(), ContentType::Quiz);
        assert_eq!(artifact.item_count(), 1);
    }

    #[test]
    fn empty_quiz_fails_validation() {
        let artifact = ContentArtifact::Quiz(Quiz {
            title: "Empty".into(),
            description: None,
            questions: vec![],
        });
        let err = artifact.validate().unwrap_err();
        assert!(err.to_string().contains("no questions"));
    }

    #[test]
    fn out_of_range_correct_index_fails() {
        let mut quiz = sample_quiz();
        quiz.questions[0].correct_index = 7;
        let err = ContentArtifact::Quiz(quiz).validate().unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn artifact_wire_format_is_adjacently_tagged() {
        let artifact = ContentArtifact::Flashcard(FlashcardSet {
            title: "Kanji".into(),
            cards: vec![Flashcard {
                front: "水".into(),
                back: "water".into(),
            }],
        });
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["type"], "flashcard");
        assert_eq!(json["data"]["title"], "Kanji");
    }

    #[test]
    fn from_model_output_validates() {
        let raw = serde_json::json!({
            "title": "Oceans",
            "cards": []
        });
        let err = ContentArtifact::from_model_output(ContentType::Flashcard, raw).unwrap_err();
        assert!(err.to_string().starts_with("Validation failed:"));
    }

    #[test]
    fn from_model_output_accepts_valid_tutorial() {
        let raw = serde_json::json!({
            "title": "Intro to Rust",
            "summary": "Ownership and borrowing",
            "sections": [
                { "heading": "Ownership", "body": "Every value has a single owner." }
            ]
        });
        let artifact = ContentArtifact::from_model_output(ContentType::Tutorial, raw).unwrap();
        assert_eq!(artifact.title(), "Intro to Rust");
        assert_eq!(artifact.item_count(), 1);
    }

    #[test]
    fn schema_names_required_fields() {
        let schema = ContentType::Quiz.schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(required.contains(&"questions"));
    }
}
