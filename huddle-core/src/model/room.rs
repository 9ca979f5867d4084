use crate::error::RoomCodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Normalized room code: 4 to 8 ASCII letters or digits, stored uppercased.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct RoomCode(String);

impl RoomCode {
    pub const MIN_LEN: usize = 4;
    pub const MAX_LEN: usize = 8;
    const GENERATED_LEN: usize = 6;

    /// Validates a user-typed code. Surrounding whitespace is ignored and
    /// letters are uppercased, so `" ab12 "` and `"AB12"` name the same room.
    pub fn parse(raw: &str) -> Result<Self, RoomCodeError> {
        let code = raw.trim();
        let len = code.chars().count();

        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&len) {
            return Err(RoomCodeError::Length(len));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RoomCodeError::Charset);
        }

        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Fresh six-character code for a newly created meeting.
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(simple[..Self::GENERATED_LEN].to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = RoomCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl std::str::FromStr for RoomCode {
    type Err = RoomCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
