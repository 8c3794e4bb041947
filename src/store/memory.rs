//! In-process store backend.
//!
//! Mirrors the reply semantics of Redis with the JSON module closely enough
//! for local development and for exercising the HTTP layer without a
//! running server. Data is held in a `DashMap` and lost on exit.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value as JsonValue;

use super::path::{JsonPath, PathSegment};
use super::{DocumentStore, KvStore, StoreError, StoreResult};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const MISSING_KEY: &str = "ERR could not perform this operation on a key that doesn't exist";
const NEW_OBJECT_NOT_AT_ROOT: &str = "ERR new objects must be created at the root";
const INVALID_EXPIRE: &str = "ERR invalid expire time in 'set' command";

#[derive(Clone)]
enum StoredValue {
    Raw(Bytes),
    Document(JsonValue),
}

#[derive(Clone)]
struct MemoryEntry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn raw(value: Bytes, ttl: Option<Duration>) -> StoreResult<Self> {
        let expires_at = match ttl {
            Some(d) => Some(
                Instant::now()
                    .checked_add(d)
                    .ok_or_else(|| StoreError::command(INVALID_EXPIRE))?,
            ),
            None => None,
        };
        Ok(Self {
            value: StoredValue::Raw(value),
            expires_at,
        })
    }

    fn document(value: JsonValue) -> Self {
        Self {
            value: StoredValue::Document(value),
            expires_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// In-memory implementation of both [`KvStore`] and [`DocumentStore`].
///
/// Clones share the same underlying map, so one instance can back the
/// store client and the document client at once.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops `key` if its TTL has elapsed. Expiry is lazy, checked on access.
    fn purge_if_expired(&self, key: &str) {
        self.data.remove_if(key, |_, entry| entry.is_expired());
    }

    /// Removes every entry whose TTL has elapsed, returning how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.data.len())
    }

    /// Spawns a task that sweeps expired entries every `period`.
    ///
    /// The task holds only a weak reference and exits once every clone of
    /// the store has been dropped.
    pub fn spawn_sweeper(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let data: Weak<DashMap<String, MemoryEntry>> = Arc::downgrade(&self.data);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(data) = data.upgrade() else {
                    break;
                };
                let store = MemoryStore { data };
                let swept = store.sweep_expired();
                if swept > 0 {
                    tracing::debug!("Swept {} expired keys", swept);
                }
            }
        })
    }

    fn with_array<T>(
        &self,
        key: &str,
        path: &str,
        op: impl FnOnce(&mut Vec<JsonValue>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let path = parse_path(path)?;
        self.purge_if_expired(key);

        let mut entry = self
            .data
            .get_mut(key)
            .ok_or_else(|| StoreError::command(MISSING_KEY))?;
        let StoredValue::Document(doc) = &mut entry.value else {
            return Err(StoreError::command(WRONG_TYPE));
        };

        match resolve_mut(doc, &path) {
            Some(JsonValue::Array(items)) => op(items),
            Some(other) => Err(StoreError::command(format!(
                "ERR wrong type of path value - expected array but found {}",
                type_name(other)
            ))),
            None => Err(path_missing(&path)),
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.purge_if_expired(key);
        match self.data.get(key) {
            Some(entry) => match &entry.value {
                StoredValue::Raw(bytes) => Ok(Some(bytes.clone())),
                StoredValue::Document(_) => Err(StoreError::command(WRONG_TYPE)),
            },
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<()> {
        let entry = MemoryEntry::raw(value, ttl)?;
        self.data.insert(key.to_string(), entry);
        tracing::debug!("Stored raw value for key: {}", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let removed = self.data.remove(key).is_some();
        tracing::debug!("Deleted key {} (existed: {})", key, removed);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn json_get(&self, key: &str, path: &str) -> StoreResult<Option<Bytes>> {
        let path = parse_path(path)?;
        self.purge_if_expired(key);

        let Some(entry) = self.data.get(key) else {
            return Ok(None);
        };
        let StoredValue::Document(doc) = &entry.value else {
            return Err(StoreError::command(WRONG_TYPE));
        };
        let value = resolve(doc, &path).ok_or_else(|| path_missing(&path))?;
        Ok(Some(Bytes::from(serde_json::to_vec(value)?)))
    }

    async fn json_set(&self, key: &str, path: &str, value: &JsonValue) -> StoreResult<bool> {
        let path = parse_path(path)?;
        self.purge_if_expired(key);

        let Some((parent_path, last)) = path.split_last() else {
            match self.data.entry(key.to_string()) {
                Entry::Occupied(mut occupied) => match &mut occupied.get_mut().value {
                    StoredValue::Document(doc) => *doc = value.clone(),
                    StoredValue::Raw(_) => return Err(StoreError::command(WRONG_TYPE)),
                },
                Entry::Vacant(vacant) => {
                    vacant.insert(MemoryEntry::document(value.clone()));
                }
            }
            return Ok(true);
        };

        let mut entry = self
            .data
            .get_mut(key)
            .ok_or_else(|| StoreError::command(NEW_OBJECT_NOT_AT_ROOT))?;
        let StoredValue::Document(doc) = &mut entry.value else {
            return Err(StoreError::command(WRONG_TYPE));
        };

        // Writes only ever create the final segment; a missing or scalar parent is a nil reply.
        let written = match (resolve_mut(doc, &parent_path), last) {
            (Some(JsonValue::Object(map)), PathSegment::Key(k)) => {
                map.insert(k.clone(), value.clone());
                true
            }
            (Some(JsonValue::Array(items)), PathSegment::Index(i)) => {
                match element_index(*i, items.len()) {
                    Some(idx) => {
                        items[idx] = value.clone();
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        };
        Ok(written)
    }

    async fn json_arr_append(&self, key: &str, path: &str, value: &JsonValue) -> StoreResult<()> {
        self.with_array(key, path, |items| {
            items.push(value.clone());
            Ok(())
        })
    }

    async fn json_arr_insert(
        &self,
        key: &str,
        path: &str,
        index: i64,
        value: &JsonValue,
    ) -> StoreResult<()> {
        self.with_array(key, path, |items| {
            let len = items.len() as i64;
            let position = if index < 0 { index + len } else { index };
            if !(0..=len).contains(&position) {
                return Err(StoreError::command("ERR index out of bounds"));
            }
            items.insert(position as usize, value.clone());
            Ok(())
        })
    }

    async fn json_arr_pop(&self, key: &str, path: &str, index: i64) -> StoreResult<Option<Bytes>> {
        self.with_array(key, path, |items| {
            if items.is_empty() {
                return Ok(None);
            }
            // Out-of-range indexes round to the nearest end
            let len = items.len() as i64;
            let position = (if index < 0 { index + len } else { index }).clamp(0, len - 1);
            let popped = items.remove(position as usize);
            Ok(Some(Bytes::from(serde_json::to_vec(&popped)?)))
        })
    }
}

fn parse_path(raw: &str) -> StoreResult<JsonPath> {
    raw.parse()
        .map_err(|e| StoreError::command(format!("ERR invalid path '{}': {}", raw, e)))
}

fn path_missing(path: &JsonPath) -> StoreError {
    StoreError::command(format!("ERR Path '{}' does not exist", path))
}

/// Maps a possibly negative index onto `0..len`.
fn element_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let position = if index < 0 { index + len } else { index };
    (0..len).contains(&position).then_some(position as usize)
}

fn resolve<'a>(doc: &'a JsonValue, path: &JsonPath) -> Option<&'a JsonValue> {
    path.segments()
        .iter()
        .try_fold(doc, |current, seg| match (current, seg) {
            (JsonValue::Object(map), PathSegment::Key(k)) => map.get(k),
            (JsonValue::Array(items), PathSegment::Index(i)) => {
                element_index(*i, items.len()).and_then(|idx| items.get(idx))
            }
            _ => None,
        })
}

fn resolve_mut<'a>(doc: &'a mut JsonValue, path: &JsonPath) -> Option<&'a mut JsonValue> {
    let mut current = doc;
    for seg in path.segments() {
        current = match (current, seg) {
            (JsonValue::Object(map), PathSegment::Key(k)) => map.get_mut(k)?,
            (JsonValue::Array(items), PathSegment::Index(i)) => {
                let idx = element_index(*i, items.len())?;
                items.get_mut(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_f64() => "number",
        JsonValue::Number(_) => "integer",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
