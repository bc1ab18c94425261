use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::history::{HistoryEntry, HistoryStore};
use crate::provider::{ErrorKind, ResponseProvider, GENERIC_ERROR_TEXT};
use crate::session::{FileRef, SessionStore};
use crate::settings::{Settings, SettingsStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Another submission was still outstanding; nothing was recorded.
    Dropped,
    Replied(String),
    Failed { kind: ErrorKind, shown: String },
}

/// Everything a chat front end needs, wired together by the caller.
#[derive(Clone)]
pub struct ChatState {
    pub session: Arc<Mutex<SessionStore>>,
    pub history: Arc<Mutex<HistoryStore>>,
    pub settings: Arc<RwLock<SettingsStore>>,
    provider: Arc<dyn ResponseProvider>,
}

impl ChatState {
    pub fn new(history: HistoryStore, settings: SettingsStore, provider: Arc<dyn ResponseProvider>) -> Self {
        Self {
            session: Arc::new(Mutex::new(SessionStore::new())),
            history: Arc::new(Mutex::new(history)),
            settings: Arc::new(RwLock::new(settings)),
            provider,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Sends `text` unless a previous submission is still waiting on the provider.
    pub async fn send(&self, text: &str) -> SendOutcome {
        {
            let mut session = self.session.lock().await;
            if !session.submit_user_message(text) {
                tracing::debug!("submission dropped, reply still pending");
                metrics::counter!("chat_submissions_dropped_total").increment(1);
                return SendOutcome::Dropped;
            }
        }
        let mut pending = PendingReply::new(self.session.clone());
        metrics::counter!("chat_submissions_total").increment(1);
        let settings = self.settings.read().await.settings().clone();

        let result = self.provider.respond(text, &settings).await;

        let mut session = self.session.lock().await;
        let outcome = match result {
            Ok(reply) => {
                session.resolve_assistant_message(reply.clone());
                SendOutcome::Replied(reply)
            }
            Err(e) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "provider call failed");
                metrics::counter!("chat_provider_failures_total").increment(1);
                let shown = e.user_message().to_string();
                session.resolve_assistant_message(shown.clone());
                SendOutcome::Failed { kind: e.kind(), shown }
            }
        };
        session.release_lock();
        pending.disarm();
        outcome
    }

    /// Archives the current session (even an empty one) and starts a fresh one.
    pub async fn new_chat(&self) -> anyhow::Result<HistoryEntry> {
        let snapshot = {
            let mut session = self.session.lock().await;
            let snapshot = session.snapshot();
            session.reset_session();
            snapshot
        };
        tracing::info!(id = %snapshot.id, title = %snapshot.title, messages = snapshot.messages.len(), "session archived");
        self.history.lock().await.archive(snapshot.clone()).await?;
        Ok(snapshot)
    }

    /// Moves an archived session out of history and into the active session.
    pub async fn open_history(&self, id: Uuid) -> anyhow::Result<bool> {
        let Some(entry) = self.history.lock().await.take(id).await? else { return Ok(false) };
        self.session.lock().await.load_session(&entry);
        tracing::info!(%id, title = %entry.title, "session restored from history");
        Ok(true)
    }

    pub async fn rename(&self, title: &str) {
        self.session.lock().await.set_title(title);
    }

    pub async fn attach(&self, files: Vec<FileRef>) {
        self.session.lock().await.attach_files(files);
    }

    pub async fn save_settings(&self, settings: Settings) {
        self.settings.write().await.save(settings);
    }

    pub async fn toggle_settings(&self) -> bool {
        self.settings.write().await.toggle_visibility()
    }
}

/// Releases the send lock of a submission that never settled normally
/// (provider panic, or the `send` future dropped mid-flight).
struct PendingReply {
    session: Arc<Mutex<SessionStore>>,
    armed: bool,
}

impl PendingReply {
    fn new(session: Arc<Mutex<SessionStore>>) -> Self {
        Self { session, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn abandon(session: &mut SessionStore) {
        session.resolve_assistant_message(GENERIC_ERROR_TEXT);
        session.release_lock();
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("submission abandoned before the provider settled, releasing lock");
        if let Ok(mut session) = self.session.try_lock() {
            Self::abandon(&mut session);
            return;
        }
        let session = self.session.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    Self::abandon(&mut *session.lock().await);
                });
            }
            Err(_) => tracing::error!("no runtime to release the send lock"),
        }
    }
}
