use crate::history::HistoryEntry;
use crate::message::ChatMessage;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRef {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: Option<u64>,
}

impl FileRef {
    /// Builds a reference from a path, reading the size if the file is there.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let size_bytes = std::fs::metadata(&path).ok().map(|m| m.len());
        Self { name, path, size_bytes }
    }
}

/// The in-progress conversation.
///
/// `send_lock` is the single-flight guard: it is taken by an accepted
/// submission and must be released exactly once when the provider call
/// settles, whatever the outcome.
#[derive(Debug, Clone)]
pub struct SessionStore {
    messages: Vec<ChatMessage>,
    files: Vec<FileRef>,
    title: String,
    send_lock: bool,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            files: Vec::new(),
            title: DEFAULT_TITLE.into(),
            send_lock: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] { &self.messages }
    pub fn files(&self) -> &[FileRef] { &self.files }
    pub fn title(&self) -> &str { &self.title }
    pub fn is_locked(&self) -> bool { self.send_lock }

    /// Returns false, changing nothing, while another submission is outstanding.
    pub fn submit_user_message(&mut self, text: impl Into<String>) -> bool {
        if self.send_lock {
            return false;
        }
        self.send_lock = true;
        self.messages.push(ChatMessage::user(text));
        self.messages.push(ChatMessage::pending());
        true
    }

    pub fn resolve_assistant_message(&mut self, text: impl Into<String>) {
        match self.messages.last_mut() {
            Some(last) if last.is_pending() => *last = ChatMessage::assistant(text),
            // placeholder already gone (reset or reloaded mid-flight)
            _ => self.messages.push(ChatMessage::assistant(text)),
        }
    }

    pub fn release_lock(&mut self) {
        self.send_lock = false;
    }

    pub fn attach_files(&mut self, files: impl IntoIterator<Item = FileRef>) {
        self.files.extend(files);
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn reset_session(&mut self) {
        self.messages.clear();
        self.files.clear();
        self.title = DEFAULT_TITLE.into();
    }

    pub fn load_session(&mut self, entry: &HistoryEntry) {
        self.messages = entry.messages.clone();
        self.files = entry.files.clone();
        self.title = entry.title.clone();
    }

    /// Copies the session for archiving. A reply still in flight is left out;
    /// it will land in whatever session is active when it settles.
    pub fn snapshot(&self) -> HistoryEntry {
        HistoryEntry {
            id: Uuid::new_v4(),
            title: self.title.clone(),
            messages: self.messages.iter().filter(|m| !m.is_pending()).cloned().collect(),
            files: self.files.clone(),
            timestamp: Utc::now(),
        }
    }
}
