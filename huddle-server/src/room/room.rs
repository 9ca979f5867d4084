use chrono::{DateTime, Utc};
use huddle_core::{RoomCode, SessionId};
use std::collections::HashSet;

/// Membership record of one active room. Only the registry mutates it, and
/// only while holding the room's map entry.
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    members: HashSet<SessionId>,
    created_at: DateTime<Utc>,
}

impl Room {
    pub(crate) fn new(code: RoomCode) -> Self {
        Self {
            code,
            members: HashSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn members(&self) -> Vec<SessionId> {
        self.members.iter().copied().collect()
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.members.contains(session_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn insert(&mut self, session_id: SessionId) -> bool {
        self.members.insert(session_id)
    }

    pub(crate) fn remove(&mut self, session_id: &SessionId) -> bool {
        self.members.remove(session_id)
    }
}
