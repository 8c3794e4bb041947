use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, Value};
use serde_json::Value as JsonValue;

use super::{DocumentStore, KvStore, StoreError, StoreResult};
use crate::config::Config;

/// Bound on a single connection attempt
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Reconnect attempts before giving up, both at startup and after a drop
const CONNECT_RETRIES: usize = 2;
/// Longest pause between reconnect attempts, in milliseconds
const MAX_RETRY_DELAY_MS: u64 = 500;
/// Bound on the whole startup handshake, PING included
const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Shareable Redis client for use across async handlers
///
/// Wraps a [`ConnectionManager`], which multiplexes commands from every
/// handler over one connection and reconnects transparently. JSON commands
/// are issued against the RedisJSON module.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis using the provided config
    ///
    /// Sends a PING before returning so that an unreachable server fails
    /// startup instead of the first request.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let url = config.redis_url();
        tracing::info!("Connecting to Redis at: {}", url);

        let client = Client::open(url.as_str()).context("Invalid Redis connection URL")?;
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(CONNECT_TIMEOUT)
            .set_number_of_retries(CONNECT_RETRIES)
            .set_max_delay(MAX_RETRY_DELAY_MS);

        let handshake = async {
            let conn = ConnectionManager::new_with_config(client, manager_config)
                .await
                .context("Failed to create Redis connection")?;
            let store = Self { conn };
            store
                .ping()
                .await
                .context("Failed to reach Redis with PING")?;
            anyhow::Ok(store)
        };
        let store = tokio::time::timeout(STARTUP_TIMEOUT, handshake)
            .await
            .with_context(|| format!("Redis did not answer within {:?}", STARTUP_TIMEOUT))??;

        tracing::info!("Successfully connected to Redis: {}", url);
        Ok(store)
    }

    async fn query<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> StoreResult<T> {
        // ConnectionManager clones share the underlying multiplexed connection
        let mut conn = self.conn.clone();
        Ok(cmd.query_async(&mut conn).await?)
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let value: Option<Vec<u8>> = self.query(redis::cmd("GET").arg(key)).await?;
        tracing::debug!("GET {} (found: {})", key, value.is_some());
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> StoreResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value.as_ref());
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs());
        }
        let _: () = self.query(&cmd).await?;
        tracing::debug!("SET {} (ttl: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let removed: i64 = self.query(redis::cmd("DEL").arg(key)).await?;
        tracing::debug!("DEL {} (removed: {})", key, removed);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let reply: String = self.query(&redis::cmd("PING")).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::command(format!("unexpected PING reply: {}", reply)))
        }
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn json_get(&self, key: &str, path: &str) -> StoreResult<Option<Bytes>> {
        let value: Option<Vec<u8>> = self
            .query(redis::cmd("JSON.GET").arg(key).arg(path))
            .await?;
        tracing::debug!("JSON.GET {} {} (found: {})", key, path, value.is_some());
        Ok(value.map(Bytes::from))
    }

    async fn json_set(&self, key: &str, path: &str, value: &JsonValue) -> StoreResult<bool> {
        let encoded = serde_json::to_string(value)?;
        // OK on success, nil when the path's parent does not exist
        let reply: Option<String> = self
            .query(redis::cmd("JSON.SET").arg(key).arg(path).arg(encoded))
            .await?;
        tracing::debug!("JSON.SET {} {} (reply: {:?})", key, path, reply);
        Ok(reply.is_some())
    }

    async fn json_arr_append(&self, key: &str, path: &str, value: &JsonValue) -> StoreResult<()> {
        let encoded = serde_json::to_string(value)?;
        let reply: Value = self
            .query(redis::cmd("JSON.ARRAPPEND").arg(key).arg(path).arg(encoded))
            .await?;
        tracing::debug!("JSON.ARRAPPEND {} {} (reply: {:?})", key, path, reply);
        Ok(())
    }

    async fn json_arr_insert(
        &self,
        key: &str,
        path: &str,
        index: i64,
        value: &JsonValue,
    ) -> StoreResult<()> {
        let encoded = serde_json::to_string(value)?;
        let reply: Value = self
            .query(
                redis::cmd("JSON.ARRINSERT")
                    .arg(key)
                    .arg(path)
                    .arg(index)
                    .arg(encoded),
            )
            .await?;
        tracing::debug!("JSON.ARRINSERT {} {} {} (reply: {:?})", key, path, index, reply);
        Ok(())
    }

    async fn json_arr_pop(&self, key: &str, path: &str, index: i64) -> StoreResult<Option<Bytes>> {
        let reply: Value = self
            .query(redis::cmd("JSON.ARRPOP").arg(key).arg(path).arg(index))
            .await?;
        tracing::debug!("JSON.ARRPOP {} {} {}", key, path, index);
        popped_element(reply)
    }
}

/// Normalizes an ARRPOP reply to the popped element's JSON bytes.
///
/// Legacy paths reply with a single bulk string. `$` paths reply with one
/// entry per match, which is re-assembled into a JSON array.
fn popped_element(reply: Value) -> StoreResult<Option<Bytes>> {
    match reply {
        Value::Nil => Ok(None),
        Value::BulkString(bytes) => Ok(Some(Bytes::from(bytes))),
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Nil => parts.push("null".to_string()),
                    Value::BulkString(bytes) => parts.push(
                        String::from_utf8(bytes)
                            .map_err(|e| StoreError::command(e.to_string()))?,
                    ),
                    other => {
                        return Err(StoreError::command(format!(
                            "unexpected JSON.ARRPOP element: {:?}",
                            other
                        )));
                    }
                }
            }
            Ok(Some(Bytes::from(format!("[{}]", parts.join(",")))))
        }
        other => Err(StoreError::command(format!(
            "unexpected JSON.ARRPOP reply: {:?}",
            other
        ))),
    }
}
