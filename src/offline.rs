//! Writes buffered while offline, replayed once connectivity returns.

use crate::store::{KvStore, StoreResult};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const QUEUE_KEY: &str = "offlineQueue";
pub const DEFAULT_COLLECTION: &str = "offline_sync";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedItem {
    pub id: String,
    pub collection: String,
    pub payload: serde_json::Value,
    pub queued_at: DateTime<Utc>,
}

/// Destination for replayed items (the remote document database, or a stand-in).
pub trait SyncSink {
    fn deliver(&mut self, item: &QueuedItem, synced_at: DateTime<Utc>) -> anyhow::Result<()>;
}

/// Appends each delivered item as one JSON line for an external uploader.
pub struct JsonlOutbox {
    path: PathBuf,
}

impl JsonlOutbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SyncSink for JsonlOutbox {
    fn deliver(&mut self, item: &QueuedItem, synced_at: DateTime<Utc>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open outbox {}", self.path.display()))?;
        let line = json!({
            "id": item.id,
            "collection": item.collection,
            "payload": item.payload,
            "queuedAt": item.queued_at,
            "syncedAt": synced_at,
        });
        writeln!(f, "{}", line).context("failed to append outbox line")?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainSummary {
    pub synced: usize,
    pub remaining: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn enqueue(
    store: &KvStore,
    collection: &str,
    payload: serde_json::Value,
    now: DateTime<Utc>,
) -> StoreResult<QueuedItem> {
    let item = QueuedItem {
        id: Uuid::new_v4().to_string(),
        collection: collection.to_string(),
        payload,
        queued_at: now,
    };
    store.transaction(|tx| {
        let mut queue: Vec<QueuedItem> = tx.get(QUEUE_KEY)?.unwrap_or_default();
        queue.push(item.clone());
        tx.set(QUEUE_KEY, &queue)
    })?;
    debug!(id = %item.id, collection, "queued offline write");
    Ok(item)
}

pub fn pending(store: &KvStore) -> StoreResult<Vec<QueuedItem>> {
    Ok(store.get(QUEUE_KEY)?.unwrap_or_default())
}

/// Delivers queued items in order. The first failure ends the pass; that item
/// and everything after it stay queued. Items enqueued while the pass runs are
/// kept.
pub fn drain(
    store: &KvStore,
    sink: &mut dyn SyncSink,
    now: DateTime<Utc>,
) -> StoreResult<DrainSummary> {
    let queue = pending(store)?;
    if queue.is_empty() {
        return Ok(DrainSummary {
            synced: 0,
            remaining: 0,
            error: None,
        });
    }

    let mut delivered = HashSet::new();
    let mut error = None;
    for item in &queue {
        match sink.deliver(item, now) {
            Ok(()) => {
                delivered.insert(item.id.clone());
            }
            Err(e) => {
                warn!(id = %item.id, error = %format!("{e:#}"), "offline sync stopped");
                error = Some(format!("{e:#}"));
                break;
            }
        }
    }

    let remaining = store.transaction(|tx| {
        let mut current: Vec<QueuedItem> = tx.get(QUEUE_KEY)?.unwrap_or_default();
        current.retain(|item| !delivered.contains(&item.id));
        if current.is_empty() {
            tx.remove(QUEUE_KEY)?;
        } else {
            tx.set(QUEUE_KEY, &current)?;
        }
        Ok(current.len())
    })?;

    info!(synced = delivered.len(), remaining, "offline sync pass finished");
    Ok(DrainSummary {
        synced: delivered.len(),
        remaining,
        error,
    })
}
