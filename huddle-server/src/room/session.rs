use chrono::{DateTime, Utc};
use huddle_core::{Presence, Role, RoomCode, SessionId};

/// One participant's identity on the relay. Lives from transport connect to
/// transport disconnect; `room` is bound by `join` and cleared by `leave`.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub display_name: String,
    pub room: Option<RoomCode>,
    pub role: Role,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            display_name: id.default_display_name(),
            room: None,
            role: Role::default(),
            connected_at: Utc::now(),
        }
    }

    pub fn presence(&self) -> Presence {
        Presence {
            session_id: self.id,
            display_name: self.display_name.clone(),
        }
    }
}
