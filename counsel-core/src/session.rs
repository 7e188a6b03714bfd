//! Bounded per-session conversation history.
//!
//! Each session holds an ordered list of turns, appended two at a time
//! (user, assistant) and trimmed from the oldest end in whole pairs.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

use crate::error::SessionError;
use crate::types::Turn;

/// Storage for conversation history keyed by session id.
///
/// Implementations must keep sessions independent: operations on one id never
/// observe or reorder another id's turns.
pub trait SessionStore: Send + Sync {
    /// Append one completed exchange, then trim to the configured bound.
    fn append(&self, session_id: &str, user: Turn, assistant: Turn) -> Result<(), SessionError>;

    /// Turns for a session in original order. Unknown ids read as empty.
    fn read(&self, session_id: &str) -> Result<Vec<Turn>, SessionError>;
}

#[derive(Debug, Clone, Default)]
pub struct SessionRecord {
    pub session_id: String,
    pub turns: VecDeque<Turn>,
}

/// Process-local store with one lock per session.
///
/// The outer map lock is held only to find or create a record; appends and
/// reads then synchronize on that session's own mutex.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionRecord>>>>,
    max_turns: usize,
}

impl InMemorySessionStore {
    /// `max_turns` is rounded down to an even number, minimum 2.
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns: (max_turns - max_turns % 2).max(2),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Number of sessions created so far.
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop a session entirely. Returns whether it existed.
    pub fn remove(&self, session_id: &str) -> Result<bool, SessionError> {
        let mut sessions = self.sessions.write().map_err(|_| SessionError::Poisoned {
            session_id: session_id.to_string(),
        })?;
        Ok(sessions.remove(session_id).is_some())
    }

    fn record(&self, session_id: &str) -> Result<Arc<Mutex<SessionRecord>>, SessionError> {
        let poisoned = || SessionError::Poisoned {
            session_id: session_id.to_string(),
        };

        if let Some(record) = self.sessions.read().map_err(|_| poisoned())?.get(session_id) {
            return Ok(record.clone());
        }

        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let record = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session = %session_id, "Creating session record");
                Arc::new(Mutex::new(SessionRecord {
                    session_id: session_id.to_string(),
                    turns: VecDeque::new(),
                }))
            })
            .clone();
        Ok(record)
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(10)
    }
}

impl SessionStore for InMemorySessionStore {
    fn append(&self, session_id: &str, user: Turn, assistant: Turn) -> Result<(), SessionError> {
        let record = self.record(session_id)?;
        let mut record = record.lock().map_err(|_| SessionError::Poisoned {
            session_id: session_id.to_string(),
        })?;

        record.turns.push_back(user);
        record.turns.push_back(assistant);
        while record.turns.len() > self.max_turns {
            record.turns.pop_front();
            record.turns.pop_front();
        }
        debug!(session = %session_id, turns = record.turns.len(), "Session updated");
        Ok(())
    }

    fn read(&self, session_id: &str) -> Result<Vec<Turn>, SessionError> {
        let record = self.record(session_id)?;
        let record = record.lock().map_err(|_| SessionError::Poisoned {
            session_id: session_id.to_string(),
        })?;
        Ok(record.turns.iter().cloned().collect())
    }
}
