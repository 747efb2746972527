use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analysis::{StructuredAnalysis, parse_analysis};
use crate::journal::{JournalEntry, MOOD_MAX, MOOD_MIN, NewEntry};
use crate::llm_client::LlmClient;
use crate::prompt;
use crate::store::JournalStore;

/// How many of the owner's prior entries are embedded in the analysis
/// prompt as stylistic and thematic context.
const ANALYSIS_CONTEXT_LIMIT: usize = 4;

/// Result of one ingestion. The entry always exists once this is returned;
/// `analysis_persisted` is true iff an analysis record was actually written.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub entry_id: Uuid,
    pub analysis_persisted: bool,
}

/// Failures that abort ingestion. Everything analysis-related is soft and
/// collapses into [`IngestOutcome::analysis_persisted`] instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("mood score {0} is out of range ({MOOD_MIN}-{MOOD_MAX})")]
    InvalidMoodScore(u8),
    #[error("entry text is empty")]
    EmptyText,
    #[error("failed to persist journal entry")]
    EntryPersistFailed(#[source] anyhow::Error),
}

/// Drives a raw submission end to end: persist the entry, summarize it
/// best-effort, obtain a valid analysis (pre-generated or fresh), and
/// persist that analysis.
///
/// Holds no state between invocations; every call is independent.
pub struct IngestOrchestrator<S> {
    store: S,
    llm: Arc<dyn LlmClient>,
}

impl<S: JournalStore> IngestOrchestrator<S> {
    pub fn new(store: S, llm: Arc<dyn LlmClient>) -> Self {
        Self { store, llm }
    }

    /// Ingest one submission for `owner_id`.
    ///
    /// Only entry-level invariant violations and the entry write itself can
    /// fail this call. Summary and analysis generation are best-effort: any
    /// provider, validation, or late store failure is logged and reported
    /// through `analysis_persisted` only.
    pub async fn ingest(
        &self,
        owner_id: &str,
        submission: NewEntry,
        pre_generated: Option<serde_json::Value>,
    ) -> Result<IngestOutcome, IngestError> {
        if submission.text.trim().is_empty() {
            return Err(IngestError::EmptyText);
        }
        if !(MOOD_MIN..=MOOD_MAX).contains(&submission.mood_score) {
            return Err(IngestError::InvalidMoodScore(submission.mood_score));
        }

        let entry = JournalEntry {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            text: submission.text,
            mood_score: submission.mood_score,
            tags: submission.tags,
            summary_bullets: None,
            created_at: Utc::now(),
        };
        self.store
            .create_entry(&entry)
            .await
            .map_err(IngestError::EntryPersistFailed)?;
        debug!(entry_id = %entry.id, %owner_id, "journal entry persisted");

        self.summarize(&entry).await;

        let Some(candidate) = self.analysis_candidate(&entry, pre_generated).await else {
            return Ok(IngestOutcome {
                entry_id: entry.id,
                analysis_persisted: false,
            });
        };

        // A valid candidate exists; a failed write is reported, not retried.
        let analysis_persisted = match self.store.create_analysis(entry.id, &candidate).await {
            Ok(()) => {
                debug!(entry_id = %entry.id, "analysis record persisted");
                true
            }
            Err(e) => {
                warn!(entry_id = %entry.id, ?e, "analysis record write failed");
                false
            }
        };
        Ok(IngestOutcome {
            entry_id: entry.id,
            analysis_persisted,
        })
    }

    /// Best-effort bullet summary. Never fails the surrounding ingestion.
    async fn summarize(&self, entry: &JournalEntry) {
        let prompt = prompt::summary_prompt(&entry.text);
        match self.llm.complete_text(&prompt).await {
            Ok(summary) => {
                if let Err(e) = self
                    .store
                    .update_entry_summary(entry.id, summary.trim())
                    .await
                {
                    warn!(entry_id = %entry.id, ?e, "summary write failed");
                }
            }
            Err(e) => warn!(entry_id = %entry.id, ?e, "summary generation failed"),
        }
    }

    /// Resolves a valid analysis candidate, preferring a pre-generated
    /// payload and falling back to fresh generation. Returns `None` when no
    /// candidate passes validation.
    async fn analysis_candidate(
        &self,
        entry: &JournalEntry,
        pre_generated: Option<serde_json::Value>,
    ) -> Option<StructuredAnalysis> {
        if let Some(raw) = pre_generated {
            match parse_analysis(&raw) {
                Ok(analysis) => {
                    debug!(entry_id = %entry.id, "using pre-generated analysis");
                    return Some(analysis);
                }
                Err(e) => {
                    warn!(entry_id = %entry.id, %e, "pre-generated analysis rejected, regenerating")
                }
            }
        }

        // The entry under analysis was already persisted above and comes
        // back as the newest row, so fetch one extra and drop it: context
        // carries only prior entries.
        let mut recent = match self
            .store
            .list_recent_entries(&entry.owner_id, ANALYSIS_CONTEXT_LIMIT + 1)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(?e, "recent entry context unavailable");
                Vec::new()
            }
        };
        recent.retain(|e| e.id != entry.id);
        recent.truncate(ANALYSIS_CONTEXT_LIMIT);

        let prompt = prompt::analysis_prompt(&entry.text, &recent);
        let raw = match self.llm.complete_structured(&prompt).await {
            Ok(value) => value,
            Err(e) => {
                warn!(entry_id = %entry.id, ?e, "analysis generation failed");
                return None;
            }
        };
        match parse_analysis(&raw) {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!(entry_id = %entry.id, %e, "generated analysis failed validation");
                None
            }
        }
    }
}
