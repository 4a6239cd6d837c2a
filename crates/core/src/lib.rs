//! # studyforge Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! studyforge research-and-generation agent. This crate has **zero
//! framework dependencies**: it defines the domain model that all other
//! crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator (language model, search provider, scraper) is defined
//! as a trait here. Implementations live in their respective crates. This
//! enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted mock implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod action;
pub mod artifact;
pub mod error;
pub mod message;
pub mod model;
pub mod progress;
pub mod research;

// Re-export key types at crate root for ergonomics
pub use action::{Action, Mode, PolicyDecision};
pub use artifact::{ContentArtifact, ContentType, FlashcardSet, Quiz, Tutorial};
pub use error::{ContentError, Error, ModelError, ResearchError, Result};
pub use message::{Message, Role};
pub use model::{CompletionRequest, LanguageModel, SchemaRequest};
pub use progress::{ProgressBus, ProgressEvent};
pub use research::{QueryResult, ScrapeOutcome, ScrapedPage, Scraper, SearchProvider, SearchResult};
