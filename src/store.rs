use crate::error::StoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

/// Write-through topic register: an in-memory cache backed by a durable
/// SQLite table. `topics(topic PRIMARY KEY, latest_message)` is the whole
/// schema — each topic holds exactly one payload, never a log.
#[derive(Debug)]
pub struct TopicStore {
    pool: SqlitePool,
    cache: Mutex<HashMap<String, String>>,
}

impl TopicStore {
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS topics (
                topic TEXT PRIMARY KEY,
                latest_message TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn normalize(topic: &str) -> String {
        topic.to_lowercase()
    }

    /// Upsert `(topic, payload)`, updating the in-memory cache first so
    /// readers never observe the durable write lagging the live value.
    pub async fn put(&self, topic: &str, payload: &str) -> Result<(), StoreError> {
        let topic = Self::normalize(topic);
        {
            let mut cache = self.cache.lock().expect("topic store mutex poisoned");
            cache.insert(topic.clone(), payload.to_string());
        }

        sqlx::query(
            "INSERT INTO topics (topic, latest_message) VALUES (?1, ?2)
             ON CONFLICT(topic) DO UPDATE SET latest_message = excluded.latest_message",
        )
        .bind(&topic)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Current in-memory payload for `topic`, if any.
    pub fn get(&self, topic: &str) -> Option<String> {
        let topic = Self::normalize(topic);
        self.cache.lock().expect("topic store mutex poisoned").get(&topic).cloned()
    }

    /// True iff the durable store currently holds exactly `(topic, payload)`.
    /// This is the dedup oracle gossip fan-out consults before re-flooding.
    pub async fn seen(&self, topic: &str, payload: &str) -> Result<bool, StoreError> {
        let topic = Self::normalize(topic);
        let row = sqlx::query("SELECT latest_message FROM topics WHERE topic = ?1")
            .bind(&topic)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => row.get::<String, _>("latest_message") == payload,
            None => false,
        })
    }
}
