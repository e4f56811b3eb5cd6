//! Player persistence.
//!
//! The core only needs `load` and `save`; [`MemoryStore`] backs tests and
//! [`JsonStore`] writes one pretty-printed file per player.

use crate::player::{Player, PlayerId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Errors from player stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No player with id {0}")]
    NotFound(PlayerId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Short description of a stored player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
    pub class_key: String,
    pub level: u32,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            class_key: player.class_key.clone(),
            level: player.level,
        }
    }
}

/// Keyed player storage.
#[async_trait]
pub trait PlayerStore: Send + Sync {
    async fn load(&self, id: PlayerId) -> Result<Player, StoreError>;

    async fn save(&self, player: &Player) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<PlayerSummary>, StoreError>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    players: RwLock<HashMap<PlayerId, Player>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlayerStore for MemoryStore {
    async fn load(&self, id: PlayerId) -> Result<Player, StoreError> {
        self.players
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn save(&self, player: &Player) -> Result<(), StoreError> {
        self.players
            .write()
            .await
            .insert(player.id, player.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PlayerSummary>, StoreError> {
        let mut players: Vec<PlayerSummary> = self
            .players
            .read()
            .await
            .values()
            .map(PlayerSummary::from)
            .collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(players)
    }
}

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// On-disk envelope around a player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPlayer {
    pub version: u32,
    /// RFC 3339 timestamp of the write.
    pub saved_at: String,
    pub player: Player,
}

impl SavedPlayer {
    pub fn new(player: Player) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            player,
        }
    }
}

/// One JSON file per player under a directory.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: PlayerId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read(path: &Path) -> Result<SavedPlayer, StoreError> {
        let content = fs::read_to_string(path).await?;
        let saved: SavedPlayer = serde_json::from_str(&content)?;
        if saved.version != SAVE_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }
        Ok(saved)
    }
}

#[async_trait]
impl PlayerStore for JsonStore {
    async fn load(&self, id: PlayerId) -> Result<Player, StoreError> {
        match Self::read(&self.path_for(id)).await {
            Ok(saved) => Ok(saved.player),
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id))
            }
            Err(e) => Err(e),
        }
    }

    async fn save(&self, player: &Player) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        let content = serde_json::to_string_pretty(&SavedPlayer::new(player.clone()))?;
        fs::write(self.path_for(player.id), content).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PlayerSummary>, StoreError> {
        let mut players = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(players),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Ok(saved) = Self::read(&path).await {
                    players.push(PlayerSummary::from(&saved.player));
                }
            }
        }

        players.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(players)
    }
}

/// One async mutex per key, created on first use.
///
/// Holding the guard serializes every action for that key; other keys are
/// unaffected. Entries nobody holds or waits on are dropped on the next
/// `lock` call, so the map tracks active keys rather than every key seen.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|k, lock| k == key || Arc::strong_count(lock) > 1);
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Keys currently tracked.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
