//! Orchestration core for an AI-assisted dream journal.
//!
//! Two responsibilities live here: the ingestion pipeline, which turns a
//! raw submission into a persisted [`JournalEntry`] plus a validated
//! [`StructuredAnalysis`], and the streaming coach session, which relays
//! generated text fragment by fragment through a per-owner
//! [`SessionRegistry`]. Page rendering, authentication, and CRUD plumbing
//! live elsewhere and reach this crate only through the [`JournalStore`]
//! and [`LlmClient`] seams.

mod analysis;
mod coach;
mod ingest;
mod journal;
mod llm_client;
mod ollama_llm;
mod prompt;
mod session;
mod store;
mod template;
#[cfg(test)]
pub mod test_helpers;

pub use analysis::{StructuredAnalysis, ValidationError, parse_analysis};
pub use coach::{CoachTurnHandler, TurnError, TurnOutcome};
pub use ingest::{IngestError, IngestOrchestrator, IngestOutcome};
pub use journal::{JournalEntry, MOOD_MAX, MOOD_MIN, NewEntry};
pub use llm_client::{LlmClient, LlmError, Token, TokenStream};
pub use ollama_llm::OllamaLlm;
pub use session::{SessionEvent, SessionRegistry};
pub use store::{Goal, InMemoryJournalStore, JournalStore, Profile};
pub use template::render_template;
