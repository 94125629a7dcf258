//! Instrumented second-level cache decorating the relational store.
//!
//! # Responsibility
//! - Keep an entity identity cache (`(kind, id) -> snapshot`) and a
//!   query-result cache (`signature -> key rows`).
//! - Serve both read-through: a miss fetches from the store and populates.
//! - Report every lookup, store query and entity load to `Statistics`.
//!
//! # Invariants
//! - The query cache stores primary keys only. A hit re-resolves each distinct
//!   key through the entity cache, so hits and misses compound per layer.
//! - Lookup, store fetch and populate of one region happen under that
//!   region's lock. Lock order is query region, then entity region.
//! - Disabled regions are bypassed without recording hits or misses.
//! - There is no eviction policy; only `evict_all` empties the caches.

mod signature;

pub use signature::{normalize_query_text, QuerySignature};

use crate::config::CacheConfig;
use crate::model::{Author, Book, Category, Entity, EntityKey, EntityKind};
use crate::stats::{CacheRegion, Statistics};
use crate::store::rows::{decode_author, decode_book, decode_category, decode_entity};
use crate::store::{RelationalStore, StoreError, StoreRow};
use log::{debug, info};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

pub type AccessResult<T> = Result<T, AccessError>;

/// Errors surfaced by the cache layer and the fetch engine.
#[derive(Debug)]
pub enum AccessError {
    /// Requested primary key is absent. Not retried.
    NotFound { kind: EntityKind, id: i64 },
    /// A relationship (or cached key) points at a record that does not exist.
    Integrity { referrer: String, target: EntityKey },
    /// Prefetch specification does not fit the requested root.
    InvalidPrefetch(String),
    /// Store transport or data failure.
    Store(StoreError),
}

impl AccessError {
    /// Re-labels a `NotFound` reached through a reference as an integrity
    /// failure of that reference.
    pub fn into_dangling(self, referrer: impl Into<String>) -> Self {
        match self {
            Self::NotFound { kind, id } => Self::Integrity {
                referrer: referrer.into(),
                target: EntityKey::new(kind, id),
            },
            other => other,
        }
    }
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Integrity { referrer, target } => {
                write!(f, "integrity violation: {referrer} references missing {target}")
            }
            Self::InvalidPrefetch(message) => write!(f, "invalid prefetch: {message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for AccessError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// One decoded result row; which slots are filled depends on the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    pub author: Option<Author>,
    pub book: Option<Book>,
    pub category: Option<Category>,
}

impl ResultRow {
    fn keys(&self) -> KeyRow {
        KeyRow {
            author: self.author.as_ref().map(|author| author.id),
            book: self.book.as_ref().map(|book| book.id),
            category: self.category.as_ref().map(|category| category.id),
        }
    }

    fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        let author = self.author.clone().map(Entity::Author);
        let book = self.book.clone().map(Entity::Book);
        let category = self.category.clone().map(Entity::Category);
        author.into_iter().chain(book).chain(category)
    }
}

/// Primary keys a cached result row referenced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct KeyRow {
    author: Option<i64>,
    book: Option<i64>,
    category: Option<i64>,
}

/// Process-lived cache storage, shared by every unit of work.
#[derive(Debug)]
pub struct SecondLevelCache {
    config: CacheConfig,
    entities: Mutex<HashMap<EntityKey, Entity>>,
    queries: Mutex<HashMap<QuerySignature, Vec<KeyRow>>>,
}

impl SecondLevelCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entities: Mutex::new(HashMap::new()),
            queries: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Clears both regions, producing a cold-cache baseline.
    pub fn evict_all(&self) {
        let mut queries = self.lock_queries();
        let mut entities = self.lock_entities();
        let evicted_queries = queries.len();
        let evicted_entities = entities.len();
        queries.clear();
        entities.clear();
        info!(
            "event=cache_evict module=cache status=ok entities={} queries={}",
            evicted_entities, evicted_queries
        );
    }

    pub fn entity_count(&self) -> usize {
        self.lock_entities().len()
    }

    pub fn query_count(&self) -> usize {
        self.lock_queries().len()
    }

    pub fn contains_entity(&self, kind: EntityKind, id: i64) -> bool {
        self.lock_entities().contains_key(&EntityKey::new(kind, id))
    }

    fn lock_entities(&self) -> MutexGuard<'_, HashMap<EntityKey, Entity>> {
        self.entities.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queries(&self) -> MutexGuard<'_, HashMap<QuerySignature, Vec<KeyRow>>> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SecondLevelCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Read-through decorator over a `RelationalStore`.
///
/// Fetch strategies only talk to this type; whether a region is enabled is
/// decided here, never by the caller.
pub struct CacheLayer<'c, S> {
    store: S,
    cache: &'c SecondLevelCache,
    stats: &'c Statistics,
}

impl<'c, S: RelationalStore> CacheLayer<'c, S> {
    pub fn new(store: S, cache: &'c SecondLevelCache, stats: &'c Statistics) -> Self {
        Self {
            store,
            cache,
            stats,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn statistics(&self) -> &Statistics {
        self.stats
    }

    pub fn cache(&self) -> &SecondLevelCache {
        self.cache
    }

    pub fn evict_all(&self) {
        self.cache.evict_all();
    }

    /// Looks up one entity through the entity cache.
    ///
    /// # Errors
    /// - `NotFound` when the store has no such record.
    pub fn get_entity(&self, kind: EntityKind, id: i64) -> AccessResult<Entity> {
        if !self.cache.config.entity_cache {
            return self.load_entity(kind, id);
        }

        let key = EntityKey::new(kind, id);
        let mut entities = self.cache.lock_entities();
        if let Some(entity) = entities.get(&key) {
            self.stats.record_cache_hit(CacheRegion::Entity);
            debug!("event=cache_lookup module=cache region=entity status=hit key={key}");
            return Ok(entity.clone());
        }

        self.stats.record_cache_miss(CacheRegion::Entity);
        debug!("event=cache_lookup module=cache region=entity status=miss key={key}");
        let entity = self.load_entity(kind, id)?;
        entities.insert(key, entity.clone());
        Ok(entity)
    }

    pub fn get_author(&self, id: i64) -> AccessResult<Author> {
        let entity = self.get_entity(EntityKind::Author, id)?;
        entity.into_author().ok_or_else(|| wrong_kind(EntityKind::Author, id))
    }

    pub fn get_book(&self, id: i64) -> AccessResult<Book> {
        let entity = self.get_entity(EntityKind::Book, id)?;
        entity.into_book().ok_or_else(|| wrong_kind(EntityKind::Book, id))
    }

    pub fn get_category(&self, id: i64) -> AccessResult<Category> {
        let entity = self.get_entity(EntityKind::Category, id)?;
        entity
            .into_category()
            .ok_or_else(|| wrong_kind(EntityKind::Category, id))
    }

    /// Runs `signature` through the query cache.
    ///
    /// A miss costs one store query; a hit costs zero queries plus one entity
    /// lookup per distinct key in the cached result.
    pub fn get_query_result(&self, signature: &QuerySignature) -> AccessResult<Vec<ResultRow>> {
        if !self.cache.config.query_cache {
            let (rows, _) = self.run_query(signature)?;
            return Ok(rows);
        }

        let mut queries = self.cache.lock_queries();
        let cached = queries.get(signature).cloned();
        if let Some(keys) = cached {
            drop(queries);
            self.stats.record_cache_hit(CacheRegion::Query);
            debug!(
                "event=cache_lookup module=cache region=query status=hit rows={} signature={}",
                keys.len(),
                signature
            );
            return self.resolve_keys(&keys);
        }

        self.stats.record_cache_miss(CacheRegion::Query);
        debug!("event=cache_lookup module=cache region=query status=miss signature={signature}");
        let (rows, keys) = self.run_query(signature)?;
        queries.insert(signature.clone(), keys);
        Ok(rows)
    }

    fn load_entity(&self, kind: EntityKind, id: i64) -> AccessResult<Entity> {
        let row = self
            .store
            .fetch_by_id(kind, id)?
            .ok_or(AccessError::NotFound { kind, id })?;
        let entity = decode_entity(kind, &row)?;
        self.stats.record_entity_load(1);
        Ok(entity)
    }

    fn run_query(&self, signature: &QuerySignature) -> AccessResult<(Vec<ResultRow>, Vec<KeyRow>)> {
        let started_at = Instant::now();
        let rows = self.store.execute_query(signature.sql(), signature.params())?;
        self.stats.record_query(started_at.elapsed());

        let mut results = Vec::with_capacity(rows.len());
        let mut keys = Vec::with_capacity(rows.len());
        let mut loaded: HashMap<EntityKey, Entity> = HashMap::new();
        for row in &rows {
            let result = decode_result_row(row)?;
            for entity in result.entities() {
                loaded.entry(entity.key()).or_insert(entity);
            }
            keys.push(result.keys());
            results.push(result);
        }

        self.stats.record_entity_load(loaded.len() as u64);
        if self.cache.config.entity_cache {
            self.cache.lock_entities().extend(loaded);
        }
        Ok((results, keys))
    }

    fn resolve_keys(&self, keys: &[KeyRow]) -> AccessResult<Vec<ResultRow>> {
        let mut memo: HashMap<EntityKey, Entity> = HashMap::new();
        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            let author =
                self.resolve_key(&mut memo, EntityKind::Author, key.author, Entity::into_author)?;
            let book = self.resolve_key(&mut memo, EntityKind::Book, key.book, Entity::into_book)?;
            let category = self.resolve_key(
                &mut memo,
                EntityKind::Category,
                key.category,
                Entity::into_category,
            )?;
            rows.push(ResultRow {
                author,
                book,
                category,
            });
        }
        Ok(rows)
    }

    fn resolve_key<T>(
        &self,
        memo: &mut HashMap<EntityKey, Entity>,
        kind: EntityKind,
        id: Option<i64>,
        pick: fn(Entity) -> Option<T>,
    ) -> AccessResult<Option<T>> {
        let Some(id) = id else {
            return Ok(None);
        };

        let key = EntityKey::new(kind, id);
        let entity = match memo.get(&key) {
            Some(entity) => entity.clone(),
            None => {
                let entity = self
                    .get_entity(kind, id)
                    .map_err(|err| err.into_dangling("cached query result"))?;
                memo.insert(key, entity.clone());
                entity
            }
        };
        pick(entity).map(Some).ok_or_else(|| wrong_kind(kind, id))
    }
}

fn decode_result_row(row: &StoreRow) -> AccessResult<ResultRow> {
    let author = decode_author(row)?;
    let book = decode_book(row)?;
    let category = decode_category(row)?;

    if row.contains("link_category_id") {
        if let (Some(link), None) = (row.opt_i64("link_category_id")?, &category) {
            let referrer = match &book {
                Some(book) => format!("book {} categories", book.id),
                None => "book categories membership".to_string(),
            };
            return Err(AccessError::Integrity {
                referrer,
                target: EntityKey::new(EntityKind::Category, link),
            });
        }
    }

    if let Some(book) = &book {
        if row.contains("author_id") {
            if let Some(author_id) = book.author_id {
                if author.as_ref().map(|author| author.id) != Some(author_id) {
                    return Err(AccessError::Integrity {
                        referrer: format!("book {} author", book.id),
                        target: EntityKey::new(EntityKind::Author, author_id),
                    });
                }
            }
        }
    }

    Ok(ResultRow {
        author,
        book,
        category,
    })
}

fn wrong_kind(kind: EntityKind, id: i64) -> AccessError {
    AccessError::Store(StoreError::InvalidData(format!(
        "entity cache returned a different kind for {kind} {id}"
    )))
}
