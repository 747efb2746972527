use std::sync::Arc;

use dashmap::DashMap;
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::llm_client::LlmClient;
use crate::prompt;
use crate::session::SessionRegistry;
use crate::store::JournalStore;

/// How many active goals are embedded in the coach prompt.
const GOAL_CONTEXT_LIMIT: usize = 3;
/// How many recent entries are embedded in the coach prompt.
const ENTRY_CONTEXT_LIMIT: usize = 3;

/// Failures surfaced for one coach turn. There is no retry; the caller
/// resubmits a failed turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("no coaching profile exists for this owner")]
    ProfileMissing,
    #[error("failed to load coaching context")]
    ContextFailed(#[source] anyhow::Error),
    #[error("text generation failed: {0}")]
    ProviderFailed(String),
}

/// Result of a completed turn. `delivered` is false when the owner had no
/// open session for part or all of the stream, in which case the undelivered
/// fragments are simply lost.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub fragments_sent: usize,
    pub delivered: bool,
}

/// Consumes one user message, gathers context, and relays the streamed
/// reply through the [`SessionRegistry`] to whichever channel is registered
/// for the owner.
///
/// Turns for the same owner are serialized through a per-owner lock so two
/// overlapping requests cannot interleave their fragments. Turns for
/// different owners run freely in parallel.
pub struct CoachTurnHandler<S> {
    store: S,
    llm: Arc<dyn LlmClient>,
    registry: Arc<SessionRegistry>,
    turn_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: JournalStore> CoachTurnHandler<S> {
    pub fn new(store: S, llm: Arc<dyn LlmClient>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            store,
            llm,
            registry,
            turn_locks: DashMap::new(),
        }
    }

    #[cfg(test)]
    fn turn_lock_count(&self) -> usize {
        self.turn_locks.len()
    }

    /// Runs one turn for `owner_id`.
    ///
    /// Fragments are relayed in provider emission order. A session that
    /// disappears mid-turn stops further relaying but does not fail the
    /// turn; the provider stream is drained quietly.
    pub async fn turn(&self, owner_id: &str, user_message: &str) -> Result<TurnOutcome, TurnError> {
        let lock = self
            .turn_locks
            .entry(owner_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _turn = lock.lock().await;
            self.run_turn(owner_id, user_message).await
        };
        drop(lock);
        // A waiting turn holds its own clone, so this only drops idle
        // entries and the map stays bounded by in-flight owners.
        self.turn_locks
            .remove_if(owner_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn run_turn(&self, owner_id: &str, user_message: &str) -> Result<TurnOutcome, TurnError> {
        // Independent reads, gathered in parallel.
        let (profile, goals, recent) = tokio::join!(
            self.store.get_profile(owner_id),
            self.store.list_active_goals(owner_id, GOAL_CONTEXT_LIMIT),
            self.store.list_recent_entries(owner_id, ENTRY_CONTEXT_LIMIT),
        );

        let Some(profile) = profile.map_err(TurnError::ContextFailed)? else {
            warn!(%owner_id, "coach turn without a profile");
            self.registry
                .send_error(owner_id, "Set up your profile before chatting with the coach.");
            return Err(TurnError::ProfileMissing);
        };
        let goals = goals.unwrap_or_else(|e| {
            warn!(%owner_id, ?e, "goal context unavailable");
            Vec::new()
        });
        let recent = recent.unwrap_or_else(|e| {
            warn!(%owner_id, ?e, "recent entry context unavailable");
            Vec::new()
        });

        let prompt = prompt::coach_prompt(&profile, &goals, &recent, user_message);
        debug!(%owner_id, "coach llm call started");
        let mut stream = match self.llm.stream_text(&prompt).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(%owner_id, ?e, "coach llm failed before streaming");
                self.registry
                    .send_error(owner_id, "The coach is unavailable right now.");
                return Err(TurnError::ProviderFailed(e.to_string()));
            }
        };

        let mut fragments_sent = 0usize;
        let mut delivered = true;
        while let Some(token) = stream.next().await {
            match token {
                Ok(token) => {
                    if !delivered {
                        continue;
                    }
                    if self.registry.send(owner_id, &token.text) {
                        fragments_sent += 1;
                    } else {
                        // Session gone; drain the rest of the stream quietly.
                        warn!(%owner_id, "session lost mid-turn, dropping remaining fragments");
                        delivered = false;
                    }
                }
                Err(e) => {
                    warn!(%owner_id, ?e, "coach llm stream failed mid-turn");
                    self.registry
                        .send_error(owner_id, "The coach was interrupted.");
                    return Err(TurnError::ProviderFailed(e.to_string()));
                }
            }
        }
        debug!(%owner_id, fragments_sent, "coach turn completed");
        Ok(TurnOutcome {
            fragments_sent,
            delivered,
        })
    }
}
