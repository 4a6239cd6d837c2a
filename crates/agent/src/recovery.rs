//! Error classification and recovery planning.
//!
//! Classification is pattern-based over the error's rendered message
//! (case-insensitive substring checks) in a fixed priority order, except
//! structural-validation errors, which are matched by error class. The
//! substring heuristic is a known fragility carried over deliberately:
//! collaborators raise typed errors, but classification outcomes must stay
//! equivalent to matching on message text.

use serde::Serialize;

use studyforge_core::artifact::ContentType;
use studyforge_core::error::{ContentError, Error};

use crate::context::ExecutionContext;

/// Maximum recoverable-error retries per run.
pub const MAX_RETRIES: u32 = 2;

/// The error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Schema/structural failure
    Validation,
    /// Model-invocation failure
    Generation,
    /// Search/scrape transport failure
    Research,
    /// Explicit timeout or abort
    Timeout,
    /// Uncategorized
    Unknown,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Generation => "generation",
            Self::Research => "research",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

/// Hint attached to a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    RefineContent,
    RetryLater,
    Retry,
    SkipResearch,
}

/// The classifier's verdict on a raised error. Transient; never persisted.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    pub recoverable: bool,
    pub suggested_action: Option<SuggestedAction>,
}

/// Categorize a raised error.
pub fn classify(error: &Error) -> ErrorInfo {
    let message = error.to_string();
    let lower = message.to_lowercase();

    // Structural validation is matched by class, not message.
    if matches!(error, Error::Content(ContentError::Validation(_))) {
        return ErrorInfo {
            kind: ErrorKind::Validation,
            message,
            recoverable: true,
            suggested_action: Some(SuggestedAction::RefineContent),
        };
    }

    if contains_any(&lower, &["rate limit", "too many requests", "429"]) {
        return ErrorInfo {
            kind: ErrorKind::Generation,
            message,
            recoverable: true,
            suggested_action: Some(SuggestedAction::RetryLater),
        };
    }

    if contains_any(&lower, &["timed out", "timeout", "abort"]) {
        return ErrorInfo {
            kind: ErrorKind::Timeout,
            message,
            recoverable: true,
            suggested_action: Some(SuggestedAction::Retry),
        };
    }

    if contains_any(
        &lower,
        &["network", "fetch", "connection", "dns", "search", "scrape"],
    ) {
        return ErrorInfo {
            kind: ErrorKind::Research,
            message,
            recoverable: true,
            suggested_action: Some(SuggestedAction::SkipResearch),
        };
    }

    if contains_any(
        &lower,
        &["generat", "malformed", "llm", "completion", "schema"],
    ) {
        return ErrorInfo {
            kind: ErrorKind::Generation,
            message,
            recoverable: true,
            suggested_action: Some(SuggestedAction::Retry),
        };
    }

    ErrorInfo {
        kind: ErrorKind::Unknown,
        message,
        recoverable: false,
        suggested_action: None,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Whether a bounded retry is permitted for this error right now.
///
/// Research-kind and unknown-kind errors are never retried by this gate:
/// research failures degrade (skip) rather than loop.
pub fn should_retry_after_error(info: &ErrorInfo, context: &mut ExecutionContext) -> bool {
    if !info.recoverable {
        return false;
    }
    if context.retries() >= MAX_RETRIES {
        return false;
    }
    if context.should_stop() {
        return false;
    }
    matches!(
        info.kind,
        ErrorKind::Validation | ErrorKind::Timeout | ErrorKind::Generation
    )
}

/// What the loop should do about a failed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Try again next iteration.
    Retry,
    /// Stop researching; proceed straight to generation/answer.
    SkipResearch,
    /// Reduce the outline and ask for less.
    Simplify,
    /// Return the content already produced.
    Fallback,
    /// Give up with the original error message.
    Abort { message: String },
}

impl RecoveryStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::SkipResearch => "skip_research",
            Self::Simplify => "simplify",
            Self::Fallback => "fallback",
            Self::Abort { .. } => "abort",
        }
    }
}

/// Resolve the recovery strategy for a classified error.
///
/// If content already exists, returning it always beats another attempt.
pub fn error_recovery_strategy(info: &ErrorInfo, context: &ExecutionContext) -> RecoveryStrategy {
    if context.generated_content().is_some() {
        return RecoveryStrategy::Fallback;
    }

    match info.kind {
        ErrorKind::Validation => {
            if context.retries() < 2 {
                RecoveryStrategy::Retry
            } else {
                RecoveryStrategy::Simplify
            }
        }
        ErrorKind::Research => RecoveryStrategy::SkipResearch,
        ErrorKind::Timeout => {
            if context.retries() < 1 {
                RecoveryStrategy::Retry
            } else {
                RecoveryStrategy::Simplify
            }
        }
        ErrorKind::Generation => {
            if context.retries() < 2 {
                RecoveryStrategy::Retry
            } else {
                RecoveryStrategy::Simplify
            }
        }
        ErrorKind::Unknown => RecoveryStrategy::Abort {
            message: info.message.clone(),
        },
    }
}

/// Build the simplified outline: the first 3 non-blank lines plus a terse
/// per-type instruction to produce fewer items.
pub fn simplify_outline(outline: &str, content_type: Option<ContentType>) -> String {
    let head: Vec<&str> = outline
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(3)
        .collect();

    let instruction = match content_type {
        Some(ContentType::Quiz) => "Produce a short quiz with fewer questions.",
        Some(ContentType::Tutorial) => "Produce a brief tutorial with fewer sections.",
        Some(ContentType::Flashcard) => "Produce a small flashcard set with fewer cards.",
        None => "Produce a shorter, simpler version.",
    };

    format!("{}\n\n{}", head.join("\n"), instruction)
}
