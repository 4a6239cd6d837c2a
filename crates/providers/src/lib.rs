//! Collaborator implementations for studyforge.
//!
//! The core crate defines the contracts (`LanguageModel`, `SearchProvider`,
//! `Scraper`); this crate provides the production implementations:
//!
//! - [`OpenAiCompatModel`] — any OpenAI-compatible chat endpoint
//! - [`BraveSearch`] — Brave Web Search API
//! - [`HttpScraper`] — reqwest + readable-text extraction

pub mod brave_search;
pub mod http_scraper;
pub mod openai_compat;

pub use brave_search::BraveSearch;
pub use http_scraper::HttpScraper;
pub use openai_compat::OpenAiCompatModel;
