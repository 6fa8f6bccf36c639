//! Entity resolution.
//!
//! Thin pure layer over the alias cache snapshot: raw mention in,
//! canonical id or `None` out. Synonym collapsing already happened in
//! the cache, so two tickers for one issuer arrive here as the same
//! canonical id and deduplicate naturally.

use finsight_core::alias_cache::AliasSnapshot;

/// Resolution result for one task's entity list.
#[derive(Debug, Clone, Default)]
pub struct ResolvedEntities {
    /// Raw mention → canonical id (or `None` when unresolved), one
    /// entry per input in input order.
    pub mappings: Vec<(String, Option<String>)>,
    /// Distinct canonical ids, first-seen order preserved.
    pub canonical: Vec<String>,
}

impl ResolvedEntities {
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.mappings
            .iter()
            .filter(|(_, id)| id.is_none())
            .map(|(raw, _)| raw.as_str())
    }
}

/// Resolve a task's raw entity strings. Unresolved names map to `None`
/// — never an error; downstream stages report "no data" instead.
pub fn resolve(snapshot: &AliasSnapshot, raw_entities: &[String]) -> ResolvedEntities {
    let mut mappings = Vec::with_capacity(raw_entities.len());
    let mut canonical = Vec::new();

    for raw in raw_entities {
        let id = snapshot.resolve(raw);
        if let Some(id) = &id {
            if !canonical.contains(id) {
                canonical.push(id.clone());
            }
        }
        mappings.push((raw.clone(), id));
    }

    ResolvedEntities {
        mappings,
        canonical,
    }
}

/// Closest known alias for an unresolved mention, for a "did you mean"
/// note. Jaro-Winkler over the cleaned forms; only confident matches
/// are suggested.
pub fn suggest(snapshot: &AliasSnapshot, raw: &str) -> Option<String> {
    const MIN_CONFIDENCE: f64 = 0.85;

    let needle = finsight_core::normalize::cleaned_key(raw);
    if needle.is_empty() {
        return None;
    }

    let mut best: Option<(f64, &str)> = None;
    for (alias, _) in snapshot.aliases() {
        let candidate = finsight_core::normalize::cleaned_key(alias);
        if candidate.is_empty() {
            continue;
        }
        let score = strsim::jaro_winkler(&needle, &candidate);
        if score >= MIN_CONFIDENCE && best.map(|(s, _)| score > s).unwrap_or(true) {
            best = Some((score, alias));
        }
    }
    best.map(|(_, alias)| alias.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::alias_cache::AliasCache;
    use finsight_core::seeds;
    use std::sync::Arc;

    fn snapshot() -> Arc<AliasSnapshot> {
        AliasCache::new().install(seeds::reference_data())
    }

    #[test]
    fn resolves_in_order_with_dedup() {
        let snap = snapshot();
        let r = resolve(
            &snap,
            &[
                "Google".to_string(),
                "Apple".to_string(),
                "GOOG".to_string(),
            ],
        );
        // GOOG collapses into the GOOGL group already seen first.
        assert_eq!(r.canonical, vec!["GOOGL".to_string(), "AAPL".to_string()]);
        assert_eq!(r.mappings.len(), 3);
        assert_eq!(r.mappings[2].1.as_deref(), Some("GOOGL"));
    }

    #[test]
    fn synonym_pair_resolves_identically() {
        let snap = snapshot();
        let a = resolve(&snap, &["GOOG".to_string()]);
        let b = resolve(&snap, &["GOOGL".to_string()]);
        assert_eq!(a.canonical, b.canonical);
    }

    #[test]
    fn unresolved_maps_to_none() {
        let snap = snapshot();
        let r = resolve(&snap, &["Enron".to_string(), "Apple".to_string()]);
        assert_eq!(r.mappings[0].1, None);
        assert_eq!(r.canonical, vec!["AAPL".to_string()]);
        assert_eq!(r.unresolved().collect::<Vec<_>>(), vec!["Enron"]);
    }

    #[test]
    fn suggests_close_misspelling() {
        let snap = snapshot();
        assert_eq!(suggest(&snap, "Microsofy").as_deref(), Some("Microsoft"));
    }

    #[test]
    fn no_suggestion_for_distant_names() {
        let snap = snapshot();
        assert_eq!(suggest(&snap, "Consolidated Widget Co"), None);
    }
}
