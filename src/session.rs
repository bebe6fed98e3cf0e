//! Process-wide store of signed-in browser sessions.
//!
//! Each browser holds an opaque cookie id; the store maps it to the backend record
//! returned at login (user + bearer token). The map is persisted as one JSON document
//! under `userData` and restored once at startup. Until the restore finishes every
//! lookup answers [`SessionLookup::Pending`].

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::LoginRecord;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Value,
}

impl Session {
    /// Builds a session from a login response. Returns `None` when the record carries no
    /// usable user identity or token.
    pub fn from_login(record: LoginRecord, default_ttl_days: i64) -> Option<Self> {
        if record.token.trim().is_empty() {
            return None;
        }
        let user_id = record.user_id()?;
        let display_name = record.display_name();
        let expires_at = record
            .expires_at
            .or_else(|| Some(Utc::now() + ChronoDuration::days(default_ttl_days)));

        Some(Self {
            user_id,
            display_name,
            token: record.token,
            expires_at,
            user: record.user,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// The only kinds of write the store accepts.
#[derive(Debug)]
pub enum SessionUpdate {
    Establish { id: Uuid, session: Session },
    Destroy { id: Uuid },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionLookup {
    /// Persisted state has not been restored yet.
    Pending,
    Missing,
    Active(Session),
}

#[derive(Default, Serialize, Deserialize)]
struct PersistedSessions {
    #[serde(rename = "userData", default)]
    user_data: HashMap<Uuid, Session>,
}

enum StoreState {
    Restoring,
    Ready(HashMap<Uuid, Session>),
}

#[derive(Clone)]
pub struct SessionStore {
    state: Arc<RwLock<StoreState>>,
    path: Option<PathBuf>,
}

impl SessionStore {
    /// A store that stays pending until [`SessionStore::restore`] runs. With no path the
    /// store is memory-only.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::Restoring)),
            path,
        }
    }

    /// Loads the persisted document and marks the store ready. An unreadable document is
    /// logged and replaced by an empty map so the store never stays pending.
    pub async fn restore(&self) -> usize {
        let mut sessions = match &self.path {
            Some(path) => match tokio::fs::read(path).await {
                Ok(bytes) => match serde_json::from_slice::<PersistedSessions>(&bytes) {
                    Ok(persisted) => persisted.user_data,
                    Err(err) => {
                        warn!(?err, path = %path.display(), "discarding unreadable session file");
                        HashMap::new()
                    }
                },
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
                Err(err) => {
                    warn!(?err, path = %path.display(), "failed to read session file");
                    HashMap::new()
                }
            },
            None => HashMap::new(),
        };

        let now = Utc::now();
        sessions.retain(|_, session| !session.is_expired(now));
        let restored = sessions.len();

        let mut guard = self.state.write().await;
        *guard = StoreState::Ready(sessions);
        info!(restored, "session store ready");
        restored
    }

    pub async fn is_ready(&self) -> bool {
        matches!(*self.state.read().await, StoreState::Ready(_))
    }

    pub async fn lookup(&self, id: Option<Uuid>) -> SessionLookup {
        let guard = self.state.read().await;
        let StoreState::Ready(sessions) = &*guard else {
            return SessionLookup::Pending;
        };

        match id.and_then(|id| sessions.get(&id)) {
            Some(session) if !session.is_expired(Utc::now()) => {
                SessionLookup::Active(session.clone())
            }
            _ => SessionLookup::Missing,
        }
    }

    /// Applies `update` and rewrites the persisted document while still holding the lock,
    /// so the file always reflects the latest in-memory map. Returns the ids of every
    /// session that ended with this write: the destroyed one and any that had expired.
    pub async fn apply(&self, update: SessionUpdate) -> Result<Vec<Uuid>> {
        let mut guard = self.state.write().await;
        let StoreState::Ready(sessions) = &mut *guard else {
            bail!("session store is still restoring");
        };

        let mut ended = Vec::new();
        match update {
            SessionUpdate::Establish { id, session } => {
                sessions.insert(id, session);
            }
            SessionUpdate::Destroy { id } => {
                ended.push(id);
                if sessions.remove(&id).is_none() {
                    return Ok(ended);
                }
            }
        }

        let now = Utc::now();
        sessions.retain(|id, session| {
            let live = !session.is_expired(now);
            if !live {
                ended.push(*id);
            }
            live
        });

        if let Some(path) = &self.path {
            let snapshot = PersistedSessions {
                user_data: sessions.clone(),
            };
            persist(path, &snapshot).await?;
        }

        Ok(ended)
    }
}

async fn persist(path: &Path, snapshot: &PersistedSessions) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let bytes = serde_json::to_vec_pretty(snapshot).context("failed to encode sessions")?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
