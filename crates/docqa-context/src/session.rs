//! Chat sessions and their persistence.
//!
//! A session owns one conversation memory. Stores hand out sessions by id so
//! a chat can be resumed with its history intact.

use chrono::{DateTime, Utc};
use docqa_core::{ConversationMemory, Error, Result, Role};
use serde::{Deserialize, Serialize};
use serde_json::{from_str, to_string_pretty};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// One user's conversation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Session identifier
    pub id: Uuid,
    /// Conversation memory for this session
    pub memory: ConversationMemory,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session was last saved
    pub updated_at: DateTime<Utc>,
}

impl SessionContext {
    /// New session with empty memory of `window` exchanges.
    #[must_use]
    pub fn new(window: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            memory: ConversationMemory::new(window),
            created_at: now,
            updated_at: now,
        }
    }

    /// Short label: the first question still in memory, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.memory
            .turns()
            .iter()
            .find(|turn| turn.role == Role::User)
            .map(|turn| turn.text.as_str())
    }
}

/// Storage for chat sessions.
pub trait SessionStore: Send {
    /// Starts a new session and stores it.
    ///
    /// # Errors
    /// Returns an error if the session cannot be persisted
    fn create(&mut self, window: usize) -> Result<SessionContext>;

    /// Loads a stored session.
    ///
    /// # Errors
    /// Returns `Error::FileNotFound` if no session has this id
    fn resume(&self, id: Uuid) -> Result<SessionContext>;

    /// Stores `session`, stamping its update time.
    ///
    /// # Errors
    /// Returns an error if the session cannot be persisted
    fn save(&mut self, session: &mut SessionContext) -> Result<()>;

    /// Deletes a session. Deleting an unknown id is not an error.
    ///
    /// # Errors
    /// Returns an error if stored data cannot be removed
    fn destroy(&mut self, id: Uuid) -> Result<()>;

    /// All stored sessions, most recently updated first.
    ///
    /// # Errors
    /// Returns an error if stored sessions cannot be read
    fn list(&self) -> Result<Vec<SessionContext>>;
}

fn not_found(id: Uuid) -> Error {
    Error::FileNotFound(format!("Session {id} not found"))
}

fn newest_first(sessions: &mut [SessionContext]) {
    sessions.sort_by(|first, second| second.updated_at.cmp(&first.updated_at));
}

/// Sessions kept in process memory.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: HashMap<Uuid, SessionContext>,
}

impl InMemorySessionStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&mut self, window: usize) -> Result<SessionContext> {
        let session = SessionContext::new(window);
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    fn resume(&self, id: Uuid) -> Result<SessionContext> {
        self.sessions.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    fn save(&mut self, session: &mut SessionContext) -> Result<()> {
        session.updated_at = Utc::now();
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }

    fn destroy(&mut self, id: Uuid) -> Result<()> {
        self.sessions.remove(&id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionContext>> {
        let mut sessions: Vec<_> = self.sessions.values().cloned().collect();
        newest_first(&mut sessions);
        Ok(sessions)
    }
}

/// Sessions stored as one JSON file per id.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    storage_path: PathBuf,
}

impl FileSessionStore {
    /// Store rooted at `storage_path`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created
    pub fn new(storage_path: impl Into<PathBuf>) -> Result<Self> {
        let storage_path = storage_path.into();
        if !storage_path.exists() {
            fs::create_dir_all(&storage_path).map_err(|err| {
                Error::Other(format!("Failed to create session storage directory: {err}"))
            })?;
        }
        Ok(Self { storage_path })
    }

    /// Directory holding the session files.
    #[must_use]
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    fn session_path(&self, id: Uuid) -> PathBuf {
        self.storage_path.join(format!("{id}.json"))
    }

    fn write(&self, session: &SessionContext) -> Result<()> {
        let json = to_string_pretty(session)?;
        fs::write(self.session_path(session.id), json)
            .map_err(|err| Error::Other(format!("Failed to write session file: {err}")))
    }
}

impl SessionStore for FileSessionStore {
    fn create(&mut self, window: usize) -> Result<SessionContext> {
        let session = SessionContext::new(window);
        self.write(&session)?;
        debug!("Created session {}", session.id);
        Ok(session)
    }

    fn resume(&self, id: Uuid) -> Result<SessionContext> {
        let path = self.session_path(id);
        if !path.exists() {
            return Err(not_found(id));
        }
        let contents = fs::read_to_string(&path)?;
        from_str(&contents)
            .map_err(|err| Error::Other(format!("Failed to parse session {id}: {err}")))
    }

    fn save(&mut self, session: &mut SessionContext) -> Result<()> {
        session.updated_at = Utc::now();
        self.write(session)
    }

    fn destroy(&mut self, id: Uuid) -> Result<()> {
        let path = self.session_path(id);
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|err| Error::Other(format!("Failed to delete session file: {err}")))?;
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionContext>> {
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.storage_path)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            match from_str::<SessionContext>(&contents) {
                Ok(session) => sessions.push(session),
                Err(err) => debug!("Ignoring unreadable session {}: {err}", path.display()),
            }
        }
        newest_first(&mut sessions);
        Ok(sessions)
    }
}
