//! Process-wide alias/schema cache.
//!
//! Maps entity aliases to canonical identifiers and surfaces to their
//! column lists. Read-mostly: loaded once from an [`AliasStore`] on
//! first use, refreshed only by explicit invalidation. The loaded
//! snapshot is immutable and shared by `Arc`, so the cache-hit path
//! never suspends and resolution inside one turn is self-consistent
//! even if another turn invalidates concurrently.
//!
//! Synonym collapsing lives here and only here: every alias record —
//! including a secondary ticker for the same issuer — maps directly to
//! the group's primary canonical id, so no downstream component ever
//! re-implements the merge rule.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::normalize::{cleaned_key, literal_key};
use crate::ports::AliasStore;

/// One alias record as loaded from the store. `canonical_id` is the
/// primary id of the synonym group the alias belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasRecord {
    pub alias: String,
    pub canonical_id: String,
    /// Display name of the issuer, used for cleaned-name matching.
    pub company_name: String,
}

/// Column list for one allow-listed surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceColumns {
    pub surface: String,
    pub columns: Vec<String>,
}

/// Everything the cache is built from, in store-neutral form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceData {
    pub aliases: Vec<AliasRecord>,
    pub surfaces: Vec<SurfaceColumns>,
    /// Most recent fiscal year present in the datastore; the planner's
    /// default when a question names no year.
    pub latest_fiscal_year: i32,
}

/// Immutable loaded view of the reference data.
#[derive(Debug)]
pub struct AliasSnapshot {
    by_literal: HashMap<String, String>,
    by_cleaned: HashMap<String, String>,
    surface_columns: HashMap<String, Vec<String>>,
    latest_fiscal_year: i32,
    /// (alias display form, canonical id), for suggestions and literal
    /// scanning. Sorted longest-alias-first so multi-word company names
    /// match before their one-word prefixes.
    aliases: Vec<(String, String)>,
}

impl AliasSnapshot {
    fn build(data: ReferenceData) -> Self {
        let mut by_literal: HashMap<String, String> = HashMap::new();
        let mut by_cleaned: HashMap<String, String> = HashMap::new();
        let mut aliases: Vec<(String, String)> = Vec::new();

        for record in &data.aliases {
            let literal = literal_key(&record.alias);
            if let Some(existing) = by_literal.get(&literal) {
                if existing != &record.canonical_id {
                    // Divergent synonym data is flagged, never merged
                    // silently; first record wins.
                    warn!(
                        alias = %record.alias,
                        kept = %existing,
                        dropped = %record.canonical_id,
                        "alias maps to two canonical ids; keeping first"
                    );
                    continue;
                }
            } else {
                by_literal.insert(literal, record.canonical_id.clone());
            }
            let cleaned = cleaned_key(&record.company_name);
            if !cleaned.is_empty() {
                by_cleaned
                    .entry(cleaned)
                    .or_insert_with(|| record.canonical_id.clone());
            }
            let cleaned_alias = cleaned_key(&record.alias);
            if !cleaned_alias.is_empty() {
                by_cleaned
                    .entry(cleaned_alias)
                    .or_insert_with(|| record.canonical_id.clone());
            }
            aliases.push((record.alias.clone(), record.canonical_id.clone()));
        }

        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        let surface_columns = data
            .surfaces
            .into_iter()
            .map(|s| (s.surface, s.columns))
            .collect();

        Self {
            by_literal,
            by_cleaned,
            surface_columns,
            latest_fiscal_year: data.latest_fiscal_year,
            aliases,
        }
    }

    /// Resolve one raw entity string: uppercased literal first, then
    /// cleaned literal. `None` means unresolved — not an error.
    pub fn resolve(&self, raw: &str) -> Option<String> {
        let literal = literal_key(raw);
        if let Some(id) = self.by_literal.get(&literal) {
            return Some(id.clone());
        }
        let cleaned = cleaned_key(raw);
        if cleaned.is_empty() {
            return None;
        }
        self.by_cleaned.get(&cleaned).cloned()
    }

    /// All alias display forms with their canonical ids, longest first.
    pub fn aliases(&self) -> &[(String, String)] {
        &self.aliases
    }

    pub fn columns_for(&self, surface: &str) -> Option<&[String]> {
        self.surface_columns.get(surface).map(|v| v.as_slice())
    }

    pub fn latest_fiscal_year(&self) -> i32 {
        self.latest_fiscal_year
    }
}

/// The cache itself: an injected store with an explicit lifecycle, not
/// ambient module state.
#[derive(Default)]
pub struct AliasCache {
    inner: RwLock<Option<Arc<AliasSnapshot>>>,
}

impl AliasCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, if loaded. Synchronous — the resolver's
    /// cache-hit path never suspends.
    pub fn snapshot(&self) -> Option<Arc<AliasSnapshot>> {
        self.inner.read().expect("alias cache lock poisoned").clone()
    }

    /// Load from the store if not already loaded. Concurrent callers
    /// may race the load; the first installed snapshot wins and the
    /// others are dropped, which is harmless because loads are
    /// idempotent reads.
    pub async fn ensure_loaded(&self, store: &dyn AliasStore) -> Result<Arc<AliasSnapshot>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot);
        }
        let data = store.load_reference().await?;
        let mut guard = self.inner.write().expect("alias cache lock poisoned");
        if let Some(existing) = guard.as_ref() {
            return Ok(existing.clone());
        }
        let snapshot = Arc::new(AliasSnapshot::build(data));
        *guard = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Drop the loaded snapshot; the next `ensure_loaded` reloads.
    pub fn invalidate(&self) {
        *self.inner.write().expect("alias cache lock poisoned") = None;
    }

    /// Install reference data directly, bypassing the store. Used by
    /// tests and seed bootstrapping.
    pub fn install(&self, data: ReferenceData) -> Arc<AliasSnapshot> {
        let snapshot = Arc::new(AliasSnapshot::build(data));
        *self.inner.write().expect("alias cache lock poisoned") = Some(snapshot.clone());
        snapshot
    }
}
