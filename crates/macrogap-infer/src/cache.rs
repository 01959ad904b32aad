//! Persistent per-recipe embedding cache.
//!
//! Vectors are computed only for recipes that have none (unless a refresh is
//! forced) and upserted by recipe id. Service failures degrade to "no new
//! vectors"; a rejected batch writes nothing.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::embedder::{validate_vectors, EmbeddingService};
use crate::query_cache::QueryVectorCache;
use macrogap_core::{Error, Result};
use macrogap_store::embedding::document_hash;
use macrogap_store::{EmbeddingEntry, Recipe, SqliteStore};

pub struct EmbeddingCache {
    store: Arc<SqliteStore>,
    service: Arc<dyn EmbeddingService>,
    queries: QueryVectorCache,
}

impl EmbeddingCache {
    /// Recipe vectors persist in `store`; query vectors stay in memory.
    pub fn new(store: Arc<SqliteStore>, service: Arc<dyn EmbeddingService>) -> Self {
        Self {
            store,
            service,
            queries: QueryVectorCache::default_cache(),
        }
    }

    /// Whether an embedding service is configured.
    pub fn is_available(&self) -> bool {
        self.service.is_available()
    }

    pub fn model_id(&self) -> &str {
        self.service.model_id()
    }

    /// Cached vector of one recipe.
    pub fn get(&self, recipe_id: i64) -> Result<Option<Vec<f32>>> {
        Ok(self.store.get_embedding(recipe_id)?.map(|e| e.vector))
    }

    /// Cached vectors for many recipes; ids without a vector are absent from the map.
    pub fn get_batch(&self, recipe_ids: &[i64]) -> Result<HashMap<i64, Vec<f32>>> {
        Ok(self
            .store
            .get_embeddings(recipe_ids)?
            .into_iter()
            .map(|(id, e)| (id, e.vector))
            .collect())
    }

    /// Vector for one recipe, computing and storing it when missing or forced.
    ///
    /// Returns `Ok(None)` when the service produced nothing usable.
    pub fn index(
        &self,
        recipe: &Recipe,
        document: &str,
        force_refresh: bool,
    ) -> Result<Option<Vec<f32>>> {
        let mut vectors = self.batch_index(
            std::slice::from_ref(recipe),
            &[document.to_string()],
            force_refresh,
        )?;
        Ok(vectors.remove(&recipe.id))
    }

    /// Recompute one recipe's vector regardless of the cache.
    pub fn refresh(&self, recipe: &Recipe, document: &str) -> Result<Option<Vec<f32>>> {
        self.index(recipe, document, true)
    }

    /// Vectors for every given recipe that has (or now gets) one.
    ///
    /// Only recipes without a cached vector are sent to the service unless
    /// `force_refresh` is set. If the service fails or the response does not
    /// carry exactly one valid vector per document, no vector of this batch is
    /// written and only previously cached vectors are returned.
    pub fn batch_index(
        &self,
        recipes: &[Recipe],
        documents: &[String],
        force_refresh: bool,
    ) -> Result<HashMap<i64, Vec<f32>>> {
        if recipes.len() != documents.len() {
            return Err(Error::Validation(format!(
                "{} recipes but {} documents",
                recipes.len(),
                documents.len()
            )));
        }

        let ids: Vec<i64> = recipes.iter().map(|r| r.id).collect();
        let mut vectors = if force_refresh {
            HashMap::new()
        } else {
            self.get_batch(&ids)?
        };

        // First occurrence of a repeated id wins.
        let mut pending_ids: Vec<i64> = Vec::new();
        let mut pending_docs: Vec<String> = Vec::new();
        for (recipe, document) in recipes.iter().zip(documents) {
            if vectors.contains_key(&recipe.id) || pending_ids.contains(&recipe.id) {
                continue;
            }
            pending_ids.push(recipe.id);
            pending_docs.push(document.clone());
        }

        if pending_ids.is_empty() {
            debug!("All {} recipe vectors served from cache", vectors.len());
            return Ok(vectors);
        }
        if !self.service.is_available() {
            debug!("{} recipes lack vectors; no embedding service configured", pending_ids.len());
            return Ok(vectors);
        }

        let computed = match self
            .service
            .embed(&pending_docs)
            .and_then(|v| validate_vectors(v, pending_docs.len()))
        {
            Ok(v) => v,
            Err(e) => {
                warn!("Embedding batch of {} discarded: {}", pending_docs.len(), e);
                return Ok(vectors);
            }
        };

        let now = chrono::Utc::now().timestamp_millis();
        let entries: Vec<EmbeddingEntry> = pending_ids
            .iter()
            .zip(pending_docs)
            .zip(computed)
            .map(|((&recipe_id, document_text), vector)| EmbeddingEntry {
                recipe_id,
                document_hash: document_hash(&document_text),
                document_text,
                vector,
                model_id: self.service.model_id().to_string(),
                updated_at: now,
            })
            .collect();

        match self.store.upsert_embeddings(&entries) {
            Ok(n) => info!("Indexed {} recipe vectors (model={})", n, self.service.model_id()),
            Err(e) => warn!("Failed to persist {} recipe vectors: {}", entries.len(), e),
        }

        for entry in entries {
            vectors.insert(entry.recipe_id, entry.vector);
        }
        Ok(vectors)
    }

    /// Vector for free query text. Served from the in-memory query cache when possible.
    pub fn embed_query(&self, text: &str) -> Option<Vec<f32>> {
        if !self.service.is_available() || text.trim().is_empty() {
            return None;
        }
        if let Some(vector) = self.queries.get(text) {
            return Some(vector);
        }
        let result = self
            .service
            .embed(&[text.to_string()])
            .and_then(|v| validate_vectors(v, 1));
        match result {
            Ok(mut v) => {
                let vector = v.pop()?;
                self.queries.put(text.to_string(), vector.clone());
                Some(vector)
            }
            Err(e) => {
                warn!("Query embedding unavailable: {}", e);
                None
            }
        }
    }

    /// Whether the cached vector was computed from a different document or model.
    ///
    /// `None` when the recipe has no cached vector. Nothing is recomputed here.
    pub fn is_stale(&self, recipe_id: i64, document: &str) -> Result<Option<bool>> {
        Ok(self.store.get_embedding(recipe_id)?.map(|entry| {
            entry.document_hash != document_hash(document)
                || entry.model_id != self.service.model_id()
        }))
    }

    /// Number of persisted recipe vectors.
    pub fn cached_count(&self) -> Result<i64> {
        self.store.count_embeddings()
    }

    /// Drop all persisted and in-memory vectors.
    pub fn clear(&self) -> Result<usize> {
        self.queries.clear();
        let removed = self.store.clear_embeddings()?;
        info!("Cleared {} cached recipe vectors", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrogap_core::Provenance;
    use macrogap_store::NewRecipe;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    /// Deterministic service: vector = [len, first byte, call index].
    struct CountingEmbedder {
        calls: Mutex<usize>,
        texts_seen: Mutex<usize>,
        mode: Mode,
    }

    #[derive(Clone, Copy)]
    enum Mode {
        Ok,
        Short,
        Down,
    }

    impl CountingEmbedder {
        fn new(mode: Mode) -> Self {
            Self {
                calls: Mutex::new(0),
                texts_seen: Mutex::new(0),
                mode,
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    impl EmbeddingService for CountingEmbedder {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            *self.calls.lock() += 1;
            *self.texts_seen.lock() += texts.len();
            match self.mode {
                Mode::Down => Err(Error::ExternalServiceUnavailable("down".into())),
                Mode::Short => Ok(vec![vec![1.0, 0.0]]),
                Mode::Ok => Ok(texts
                    .iter()
                    .map(|t| vec![t.len() as f32, t.bytes().next().unwrap_or(0) as f32, 1.0])
                    .collect()),
            }
        }

        fn model_id(&self) -> &str {
            "counting"
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn setup(mode: Mode) -> (EmbeddingCache, Arc<CountingEmbedder>, Arc<SqliteStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path()).unwrap());
        let service = Arc::new(CountingEmbedder::new(mode));
        let cache = EmbeddingCache::new(store.clone(), service.clone());
        (cache, service, store, dir)
    }

    fn recipe(store: &SqliteStore, title: &str) -> Recipe {
        let id = store
            .insert_recipe(&NewRecipe::new(title, Provenance::Catalog))
            .unwrap();
        store.get_recipe(id).unwrap().unwrap()
    }

    #[test]
    fn test_index_twice_calls_service_once() {
        let (cache, service, store, _dir) = setup(Mode::Ok);
        let r = recipe(&store, "Oatmeal");

        let first = cache.index(&r, "oatmeal document", false).unwrap().unwrap();
        let second = cache.index(&r, "oatmeal document", false).unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(service.calls(), 1);
        assert_eq!(cache.cached_count().unwrap(), 1);
    }

    #[test]
    fn test_force_refresh_recomputes() {
        let (cache, service, store, _dir) = setup(Mode::Ok);
        let r = recipe(&store, "Oatmeal");

        cache.index(&r, "short", false).unwrap();
        let refreshed = cache.refresh(&r, "a much longer document").unwrap().unwrap();

        assert_eq!(service.calls(), 2);
        assert_eq!(refreshed[0], "a much longer document".len() as f32);
        assert_eq!(cache.get(r.id).unwrap().unwrap(), refreshed);
        assert_eq!(cache.cached_count().unwrap(), 1);
    }

    #[test]
    fn test_batch_index_only_embeds_missing() {
        let (cache, service, store, _dir) = setup(Mode::Ok);
        let a = recipe(&store, "A");
        let b = recipe(&store, "B");
        let c = recipe(&store, "C");

        cache.index(&a, "doc a", false).unwrap();
        let vectors = cache
            .batch_index(
                &[a.clone(), b.clone(), c.clone()],
                &["doc a".into(), "doc b".into(), "doc c".into()],
                false,
            )
            .unwrap();

        assert_eq!(vectors.len(), 3);
        assert_eq!(service.calls(), 2);
        assert_eq!(*service.texts_seen.lock(), 3);
    }

    #[test]
    fn test_length_mismatch_writes_nothing() {
        let (cache, _service, store, _dir) = setup(Mode::Short);
        let a = recipe(&store, "A");
        let b = recipe(&store, "B");

        let vectors = cache
            .batch_index(&[a, b], &["doc a".into(), "doc b".into()], false)
            .unwrap();

        assert!(vectors.is_empty());
        assert_eq!(cache.cached_count().unwrap(), 0);
    }

    #[test]
    fn test_service_down_degrades() {
        let (cache, _service, store, _dir) = setup(Mode::Down);
        let a = recipe(&store, "A");

        assert!(cache.index(&a, "doc a", false).unwrap().is_none());
        assert!(cache.embed_query("oats").is_none());
        assert_eq!(cache.cached_count().unwrap(), 0);
    }

    #[test]
    fn test_mismatched_inputs_rejected() {
        let (cache, _service, store, _dir) = setup(Mode::Ok);
        let a = recipe(&store, "A");
        let err = cache.batch_index(&[a], &[], false).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_query_vectors_cached_in_memory() {
        let (cache, service, _store, _dir) = setup(Mode::Ok);
        let a = cache.embed_query("protein breakfast").unwrap();
        let b = cache.embed_query("protein breakfast").unwrap();
        assert_eq!(a, b);
        assert_eq!(service.calls(), 1);
        // Query vectors are never persisted.
        assert_eq!(cache.cached_count().unwrap(), 0);
    }

    #[test]
    fn test_staleness_is_reported_not_fixed() {
        let (cache, service, store, _dir) = setup(Mode::Ok);
        let r = recipe(&store, "Oatmeal");
        assert_eq!(cache.is_stale(r.id, "v1").unwrap(), None);

        cache.index(&r, "v1", false).unwrap();
        assert_eq!(cache.is_stale(r.id, "v1").unwrap(), Some(false));
        assert_eq!(cache.is_stale(r.id, "v2").unwrap(), Some(true));

        cache.index(&r, "v2", false).unwrap();
        assert_eq!(service.calls(), 1);
    }

    #[test]
    fn test_clear() {
        let (cache, _service, store, _dir) = setup(Mode::Ok);
        let r = recipe(&store, "Oatmeal");
        cache.index(&r, "doc", false).unwrap();
        assert_eq!(cache.clear().unwrap(), 1);
        assert!(cache.get(r.id).unwrap().is_none());
    }
}
