//! Durable checkpoint storage for workflow threads
//!
//! The orchestrator persists the full [`WorkflowState`] through this trait
//! after every transition, keyed by the thread id. A thread can therefore sit
//! at the approval interrupt indefinitely and be resumed from a different
//! process. There is no automatic expiry; stale threads are reaped explicitly
//! via [`CheckpointStore::purge_stale`] (surfaced as the CLI `purge` command).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::report::types::WorkflowState;
use crate::store::Database;

pub trait CheckpointStore: Send + Sync {
    fn save(&self, state: &WorkflowState) -> Result<()>;
    fn load(&self, thread_id: &Uuid) -> Result<Option<WorkflowState>>;
    fn delete(&self, thread_id: &Uuid) -> Result<()>;
    /// Delete checkpoints not updated since the cutoff; returns the count.
    fn purge_stale(&self, cutoff: DateTime<Local>) -> Result<usize>;
}

/// Production checkpoint store backed by the SQLite record store.
pub struct SqliteCheckpointStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteCheckpointStore {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    fn db(&self) -> std::sync::MutexGuard<'_, Database> {
        // A poisoned lock means another thread panicked mid-write; the
        // underlying SQLite state is still consistent.
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn save(&self, state: &WorkflowState) -> Result<()> {
        let json = serde_json::to_string(state).context("serializing workflow state")?;
        self.db()
            .save_checkpoint(&state.thread_id, state.phase.as_str(), &json)
    }

    fn load(&self, thread_id: &Uuid) -> Result<Option<WorkflowState>> {
        let raw = self.db().load_checkpoint(thread_id)?;
        match raw {
            Some(json) => {
                let state = serde_json::from_str(&json)
                    .with_context(|| format!("deserializing checkpoint for thread {}", thread_id))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, thread_id: &Uuid) -> Result<()> {
        self.db().delete_checkpoint(thread_id)
    }

    fn purge_stale(&self, cutoff: DateTime<Local>) -> Result<usize> {
        self.db().purge_checkpoints_before(cutoff)
    }
}

/// In-memory checkpoint store for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    states: Mutex<HashMap<Uuid, (WorkflowState, DateTime<Local>)>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, state: &WorkflowState) -> Result<()> {
        self.states
            .lock()
            .unwrap()
            .insert(state.thread_id, (state.clone(), Local::now()));
        Ok(())
    }

    fn load(&self, thread_id: &Uuid) -> Result<Option<WorkflowState>> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .get(thread_id)
            .map(|(state, _)| state.clone()))
    }

    fn delete(&self, thread_id: &Uuid) -> Result<()> {
        self.states.lock().unwrap().remove(thread_id);
        Ok(())
    }

    fn purge_stale(&self, cutoff: DateTime<Local>) -> Result<usize> {
        let mut states = self.states.lock().unwrap();
        let before = states.len();
        states.retain(|_, (_, updated)| *updated >= cutoff);
        Ok(before - states.len())
    }
}
