use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::StructuredAnalysis;
use crate::journal::JournalEntry;

/// Coaching profile kept per owner. Presence of a profile is a precondition
/// for coach turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub owner_id: String,
    pub summary: String,
}

/// An active goal the owner is working toward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Durable storage consumed by the orchestration core.
///
/// Every operation is per-record atomic; the core never requires
/// multi-record transactions. An analysis record either exists in full for
/// an entry or not at all.
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Persist a freshly created entry.
    async fn create_entry(&self, entry: &JournalEntry) -> anyhow::Result<()>;

    /// Set the best-effort summary bullets on an existing entry.
    async fn update_entry_summary(&self, id: Uuid, summary: &str) -> anyhow::Result<()>;

    /// Persist a validated analysis for an entry. At most one analysis may
    /// exist per entry.
    async fn create_analysis(
        &self,
        entry_id: Uuid,
        analysis: &StructuredAnalysis,
    ) -> anyhow::Result<()>;

    /// Fetch the owner's most recent entries, newest first.
    async fn list_recent_entries(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<JournalEntry>>;

    /// Look up the owner's coaching profile, if one exists.
    async fn get_profile(&self, owner_id: &str) -> anyhow::Result<Option<Profile>>;

    /// Fetch the owner's active goals, bounded by `limit`.
    async fn list_active_goals(&self, owner_id: &str, limit: usize) -> anyhow::Result<Vec<Goal>>;
}

/// Simple in-memory implementation used for tests. This does **not**
/// provide durability but mimics the API and its atomicity.
#[derive(Default)]
pub struct InMemoryJournalStore {
    entries: Mutex<HashMap<Uuid, JournalEntry>>,
    analyses: Mutex<HashMap<Uuid, StructuredAnalysis>>,
    profiles: Mutex<HashMap<String, Profile>>,
    goals: Mutex<HashMap<String, Vec<Goal>>>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.owner_id.clone(), profile);
    }

    pub fn push_goal(&self, owner_id: &str, goal: Goal) {
        self.goals
            .lock()
            .unwrap()
            .entry(owner_id.to_string())
            .or_default()
            .push(goal);
    }

    pub fn entry(&self, id: Uuid) -> Option<JournalEntry> {
        self.entries.lock().unwrap().get(&id).cloned()
    }

    pub fn analysis(&self, entry_id: Uuid) -> Option<StructuredAnalysis> {
        self.analyses.lock().unwrap().get(&entry_id).cloned()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn analysis_count(&self) -> usize {
        self.analyses.lock().unwrap().len()
    }
}

#[async_trait]
impl JournalStore for InMemoryJournalStore {
    async fn create_entry(&self, entry: &JournalEntry) -> anyhow::Result<()> {
        self.entries.lock().unwrap().insert(entry.id, entry.clone());
        Ok(())
    }

    async fn update_entry_summary(&self, id: Uuid, summary: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("entry {id} not found"))?;
        entry.summary_bullets = Some(summary.to_string());
        Ok(())
    }

    async fn create_analysis(
        &self,
        entry_id: Uuid,
        analysis: &StructuredAnalysis,
    ) -> anyhow::Result<()> {
        let mut analyses = self.analyses.lock().unwrap();
        if analyses.contains_key(&entry_id) {
            anyhow::bail!("analysis already exists for entry {entry_id}");
        }
        analyses.insert(entry_id, analysis.clone());
        Ok(())
    }

    async fn list_recent_entries(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<JournalEntry>> {
        let mut entries: Vec<_> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| std::cmp::Reverse(e.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn get_profile(&self, owner_id: &str) -> anyhow::Result<Option<Profile>> {
        Ok(self.profiles.lock().unwrap().get(owner_id).cloned())
    }

    async fn list_active_goals(&self, owner_id: &str, limit: usize) -> anyhow::Result<Vec<Goal>> {
        let mut goals = self
            .goals
            .lock()
            .unwrap()
            .get(owner_id)
            .cloned()
            .unwrap_or_default();
        goals.truncate(limit);
        Ok(goals)
    }
}

#[async_trait]
impl<S> JournalStore for std::sync::Arc<S>
where
    S: JournalStore + ?Sized,
{
    async fn create_entry(&self, entry: &JournalEntry) -> anyhow::Result<()> {
        (**self).create_entry(entry).await
    }

    async fn update_entry_summary(&self, id: Uuid, summary: &str) -> anyhow::Result<()> {
        (**self).update_entry_summary(id, summary).await
    }

    async fn create_analysis(
        &self,
        entry_id: Uuid,
        analysis: &StructuredAnalysis,
    ) -> anyhow::Result<()> {
        (**self).create_analysis(entry_id, analysis).await
    }

    async fn list_recent_entries(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<JournalEntry>> {
        (**self).list_recent_entries(owner_id, limit).await
    }

    async fn get_profile(&self, owner_id: &str) -> anyhow::Result<Option<Profile>> {
        (**self).get_profile(owner_id).await
    }

    async fn list_active_goals(&self, owner_id: &str, limit: usize) -> anyhow::Result<Vec<Goal>> {
        (**self).list_active_goals(owner_id, limit).await
    }
}
