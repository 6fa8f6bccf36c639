//! Session memory.
//!
//! Process-lifetime map of per-session carry-over state: the entities
//! and period of the last turn, the surfaces visited so far, and a
//! turn counter. Last-write-wins per field; no expiry beyond explicit
//! deletion.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use finsight_core::types::{Period, SessionContext};

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, SessionContext>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionContext> {
        self.inner.read().await.get(session_id).cloned()
    }

    /// Record the outcome of one turn. Entity list and period only
    /// overwrite when the turn actually touched one — a macro-only
    /// turn does not erase what a follow-up question may still refer
    /// back to. Surfaces accumulate; the counter always advances.
    pub async fn update(
        &self,
        session_id: &str,
        entities: &[String],
        period: Period,
        surfaces: &[String],
    ) {
        let mut guard = self.inner.write().await;
        let ctx = guard
            .entry(session_id.to_string())
            .or_insert_with(|| SessionContext::new(session_id));

        if !entities.is_empty() {
            ctx.last_entities = entities.to_vec();
        }
        if !period.is_empty() {
            ctx.last_period = period;
        }
        for surface in surfaces {
            ctx.visited_surfaces.insert(surface.clone());
        }
        ctx.query_count += 1;
        ctx.updated_at = Utc::now();
    }

    /// Explicit deletion; the only way a session ever goes away short
    /// of process restart.
    pub async fn delete(&self, session_id: &str) -> bool {
        self.inner.write().await.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
