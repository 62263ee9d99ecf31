//! Player State Persistence
//!
//! The player record is one JSON document stored under a fixed key. Stores
//! only move that document around; decoding is lenient so a damaged field
//! costs that field, not the whole save.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::quest::reward::QuestReward;

/// Key the player record is stored under
pub const PLAYER_STATE_KEY: &str = "wss_sprout_player_state";

/// Progress shared across sessions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerState {
    pub coins: u32,
    pub xp: u32,
    pub streak: u32,
    pub reputation: u32,
    pub quest1_complete: bool,
    pub completed_levels: BTreeSet<u32>,
}

impl PlayerState {
    /// Decode a stored record. Unparseable input yields the default record;
    /// a field with the wrong type or a negative number is defaulted alone.
    pub fn from_json(json: &str) -> Self {
        let value: Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => {
                warn!("Player state is not valid JSON, using defaults: {}", e);
                return Self::default();
            }
        };
        let Some(fields) = value.as_object() else {
            warn!("Player state is not a JSON object, using defaults");
            return Self::default();
        };

        let count = |name: &str| -> u32 {
            match fields.get(name) {
                None => 0,
                Some(v) => v
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or_else(|| {
                        warn!("Defaulting malformed player field '{}': {}", name, v);
                        0
                    }),
            }
        };

        let quest1_complete = fields
            .get("quest1Complete")
            .or_else(|| fields.get("quest1_complete"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let completed_levels = fields
            .get("completedLevels")
            .or_else(|| fields.get("completed_levels"))
            .and_then(Value::as_array)
            .map(|levels| {
                levels
                    .iter()
                    .filter_map(|v| v.as_u64().and_then(|n| u32::try_from(n).ok()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            coins: count("coins"),
            xp: count("xp"),
            streak: count("streak"),
            reputation: count("reputation"),
            quest1_complete,
            completed_levels,
        }
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&serde_json::json!({
            "coins": self.coins,
            "xp": self.xp,
            "streak": self.streak,
            "reputation": self.reputation,
            "quest1Complete": self.quest1_complete,
            "completedLevels": self.completed_levels,
        }))?)
    }

    /// Credit a finished quest for a level
    pub fn apply_reward(&mut self, level_id: u32, reward: &QuestReward) {
        self.coins = self.coins.saturating_add(reward.coins_earned);
        self.xp = self.xp.saturating_add(reward.xp_gained);
        self.completed_levels.insert(level_id);
        if level_id == 1 {
            self.quest1_complete = true;
        }
    }

    /// Credit a correct quiz answer
    pub fn apply_story_reward(&mut self, xp: u32, coins: u32) {
        self.xp = self.xp.saturating_add(xp);
        self.coins = self.coins.saturating_add(coins);
    }
}

// ============================================================================
// Stores
// ============================================================================

/// Key/value store for serialized records
#[async_trait]
pub trait PlayerStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One JSON document per key in a directory, or a single file for the
/// player key
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn file_for(&self, key: &str) -> PathBuf {
        if key == PLAYER_STATE_KEY {
            self.path.clone()
        } else {
            self.path.with_file_name(format!("{}.json", key))
        }
    }
}

#[async_trait]
impl PlayerStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.file_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.file_for(key);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&path, value).await?;
        Ok(())
    }
}

/// SQLite-backed store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS player_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        info!("Player state database ready");
        Ok(())
    }
}

#[async_trait]
impl PlayerStore for SqliteStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM player_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO player_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlayerStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Loads and saves the player record over any store. Neither direction
/// fails for the caller.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn PlayerStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn PlayerStore>) -> Self {
        Self { store }
    }

    /// Stored record, or the default record when absent or unreadable
    pub async fn load(&self) -> PlayerState {
        match self.store.load(PLAYER_STATE_KEY).await {
            Ok(Some(json)) => PlayerState::from_json(&json),
            Ok(None) => {
                debug!("No saved player state, starting fresh");
                PlayerState::default()
            }
            Err(e) => {
                error!("Failed to load player state: {}", e);
                PlayerState::default()
            }
        }
    }

    /// Best-effort write. Returns whether it landed; failures are logged.
    pub async fn save(&self, state: &PlayerState) -> bool {
        let result = match state.to_json() {
            Ok(json) => self.store.save(PLAYER_STATE_KEY, &json).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                debug!("Saved player state: {} coins, {} xp", state.coins, state.xp);
                true
            }
            Err(e) => {
                error!("Failed to save player state: {}", e);
                false
            }
        }
    }

    /// Start the single background writer. Records are written one at a
    /// time in the order they were queued.
    pub fn spawn_writer(&self) -> (SaveQueue, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<SaveRequest>();
        let persistence = self.clone();
        let handle = tokio::spawn(async move {
            let mut landed = true;
            while let Some(request) = rx.recv().await {
                match request {
                    SaveRequest::Write(state) => landed = persistence.save(&state).await,
                    SaveRequest::Flush(done) => {
                        // Caller may have stopped waiting
                        let _ = done.send(landed);
                    }
                }
            }
            debug!("Save writer stopped");
        });
        (SaveQueue { tx }, handle)
    }
}

enum SaveRequest {
    Write(PlayerState),
    Flush(oneshot::Sender<bool>),
}

/// Sending side of the save writer
#[derive(Clone)]
pub struct SaveQueue {
    tx: mpsc::UnboundedSender<SaveRequest>,
}

impl SaveQueue {
    /// Queue a write behind every earlier one
    pub fn queue(&self, state: PlayerState) {
        if self.tx.send(SaveRequest::Write(state)).is_err() {
            warn!("Save writer is gone; dropping player state");
        }
    }

    /// Wait for every write queued so far. Returns whether the last one landed.
    pub async fn flush(&self) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(SaveRequest::Flush(done_tx)).is_err() {
            warn!("Save writer is gone; nothing to flush");
            return false;
        }
        done_rx.await.unwrap_or(false)
    }
}
