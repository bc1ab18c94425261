use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::ChatMessage;
use crate::session::FileRef;
use crate::storage::KeyValueStore;

/// Storage key holding the whole serialized history list.
pub const HISTORY_KEY: &str = "chatHistory";

/// Archived snapshot of a session. Never mutated after it is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub files: Vec<FileRef>,
    pub timestamp: DateTime<Utc>,
}

/// Archived sessions, most recent first, mirrored to durable storage on every change.
pub struct HistoryStore {
    storage: Arc<dyn KeyValueStore>,
    entries: Vec<HistoryEntry>,
    /// The stored list could not be read; it must not be overwritten blindly.
    unread: bool,
}

fn decode(raw: Option<String>) -> Vec<HistoryEntry> {
    let Some(raw) = raw else { return Vec::new() };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "stored history is corrupt, starting empty");
        Vec::new()
    })
}

impl HistoryStore {
    /// Missing or corrupt history loads as empty. A failed read also loads as
    /// empty, but the stored copy is re-read before the next write.
    pub async fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let (entries, unread) = match storage.get(HISTORY_KEY).await {
            Ok(raw) => (decode(raw), false),
            Err(e) => {
                tracing::warn!(error = %e, "could not read stored history, starting empty");
                (Vec::new(), true)
            }
        };
        tracing::debug!(count = entries.len(), "history loaded");
        Self { storage, entries, unread }
    }

    pub fn entries(&self) -> &[HistoryEntry] { &self.entries }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub async fn archive(&mut self, entry: HistoryEntry) -> anyhow::Result<()> {
        self.entries.insert(0, entry);
        self.persist().await
    }

    pub async fn remove(&mut self, id: Uuid) -> anyhow::Result<bool> {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        let removed = self.entries.len() != before;
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Removes every entry carrying `title`; titles are not unique.
    pub async fn remove_by_title(&mut self, title: &str) -> anyhow::Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|e| e.title != title);
        let removed = before - self.entries.len();
        if removed > 0 {
            self.persist().await?;
        }
        Ok(removed)
    }

    pub async fn take(&mut self, id: Uuid) -> anyhow::Result<Option<HistoryEntry>> {
        let Some(pos) = self.entries.iter().position(|e| e.id == id) else { return Ok(None) };
        let entry = self.entries.remove(pos);
        self.persist().await?;
        Ok(Some(entry))
    }

    pub async fn clear_all(&mut self) -> anyhow::Result<()> {
        self.entries.clear();
        self.storage.remove(HISTORY_KEY).await?;
        self.unread = false;
        Ok(())
    }

    async fn persist(&mut self) -> anyhow::Result<()> {
        if self.unread {
            // entries archived since the failed read are newer than anything stored
            let stored = self.storage.get(HISTORY_KEY).await.map_err(|e| {
                tracing::warn!(error = %e, "stored history still unreadable, not overwriting it");
                e
            })?;
            self.entries.extend(decode(stored));
            self.unread = false;
        }
        let raw = serde_json::to_string(&self.entries)?;
        self.storage.set(HISTORY_KEY, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;
    use crate::storage::{temp_store, SqliteKeyValueStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Counts writes and can be told to fail reads.
    struct FlakyStore {
        inner: SqliteKeyValueStore,
        fail_reads: AtomicBool,
        writes: AtomicUsize,
    }

    impl FlakyStore {
        fn new(inner: SqliteKeyValueStore) -> Self {
            Self { inner, fail_reads: AtomicBool::new(false), writes: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                anyhow::bail!("disk unavailable");
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> anyhow::Result<bool> {
            self.inner.remove(key).await
        }
    }

    fn entry(title: &str) -> HistoryEntry {
        let mut s = SessionStore::new();
        s.set_title(title);
        s.submit_user_message(format!("about {title}"));
        s.resolve_assistant_message("sure");
        s.snapshot()
    }

    #[tokio::test]
    async fn archive_survives_reload() {
        let (kv, _dir) = temp_store().await;
        let storage: Arc<dyn KeyValueStore> = Arc::new(kv);
        let mut history = HistoryStore::load(storage.clone()).await;
        assert!(history.is_empty());

        let older = entry("older");
        let newer = entry("newer");
        history.archive(older.clone()).await.unwrap();
        history.archive(newer.clone()).await.unwrap();

        let reloaded = HistoryStore::load(storage).await;
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.entries()[0], newer);
        assert_eq!(reloaded.entries()[1], older);
    }

    #[tokio::test]
    async fn corrupt_record_loads_empty() {
        let (kv, _dir) = temp_store().await;
        kv.set(HISTORY_KEY, "{not json").await.unwrap();
        let history = HistoryStore::load(Arc::new(kv)).await;
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn remove_by_title_drops_every_match() {
        let (kv, _dir) = temp_store().await;
        let storage: Arc<dyn KeyValueStore> = Arc::new(kv);
        let mut history = HistoryStore::load(storage.clone()).await;
        history.archive(entry("dup")).await.unwrap();
        history.archive(entry("keep")).await.unwrap();
        history.archive(entry("dup")).await.unwrap();

        assert_eq!(history.remove_by_title("dup").await.unwrap(), 2);
        let reloaded = HistoryStore::load(storage).await;
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.entries()[0].title, "keep");
    }

    #[tokio::test]
    async fn remove_and_take_by_id_leave_namesakes() {
        let (kv, _dir) = temp_store().await;
        let mut history = HistoryStore::load(Arc::new(kv)).await;
        let a = entry("same");
        let b = entry("same");
        history.archive(a.clone()).await.unwrap();
        history.archive(b.clone()).await.unwrap();

        assert!(history.remove(a.id).await.unwrap());
        assert!(!history.remove(a.id).await.unwrap());
        assert_eq!(history.take(b.id).await.unwrap(), Some(b));
        assert!(history.is_empty());
        assert_eq!(history.take(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_all_deletes_record() {
        let (kv, _dir) = temp_store().await;
        let storage: Arc<dyn KeyValueStore> = Arc::new(kv);
        let mut history = HistoryStore::load(storage.clone()).await;
        history.archive(entry("x")).await.unwrap();
        history.clear_all().await.unwrap();
        assert!(history.is_empty());
        assert_eq!(storage.get(HISTORY_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_read_does_not_clobber_stored_history() {
        let (kv, _dir) = temp_store().await;
        let flaky = Arc::new(FlakyStore::new(kv));
        let storage: Arc<dyn KeyValueStore> = flaky.clone();
        let kept = entry("kept");
        HistoryStore::load(storage.clone()).await.archive(kept.clone()).await.unwrap();

        flaky.fail_reads.store(true, Ordering::SeqCst);
        let mut history = HistoryStore::load(storage.clone()).await;
        assert!(history.is_empty());
        let writes = flaky.writes.load(Ordering::SeqCst);
        assert!(history.archive(entry("while down")).await.is_err());
        assert_eq!(flaky.writes.load(Ordering::SeqCst), writes);

        flaky.fail_reads.store(false, Ordering::SeqCst);
        let fresh = entry("fresh");
        history.archive(fresh.clone()).await.unwrap();
        let titles: Vec<&str> = history.entries().iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["fresh", "while down", "kept"]);

        let reloaded = HistoryStore::load(storage).await;
        assert_eq!(reloaded.entries()[0], fresh);
        assert_eq!(reloaded.entries()[2], kept);
    }

    #[tokio::test]
    async fn remove_by_title_without_match_skips_write() {
        let (kv, _dir) = temp_store().await;
        let flaky = Arc::new(FlakyStore::new(kv));
        let mut history = HistoryStore::load(flaky.clone()).await;
        history.archive(entry("only")).await.unwrap();
        assert_eq!(flaky.writes.load(Ordering::SeqCst), 1);

        assert_eq!(history.remove_by_title("missing").await.unwrap(), 0);
        assert_eq!(flaky.writes.load(Ordering::SeqCst), 1);
        assert_eq!(history.len(), 1);
    }
}
