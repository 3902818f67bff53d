use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, non-empty player identity, 1-64 bytes, restricted to
/// `[A-Za-z0-9_.-]`.
///
/// A conservative character set for an identity field meant to appear in
/// log lines and file paths unescaped. `PlayerId` is the registry's primary
/// key and is only ever constructed through [`PlayerId::parse`], so a value in
/// hand is already known-valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(String);

const MAX_LEN: usize = 64;

impl PlayerId {
    pub fn parse(raw: &str) -> Result<Self, PlayerIdError> {
        if raw.is_empty() {
            return Err(PlayerIdError::Empty);
        }
        if raw.len() > MAX_LEN {
            return Err(PlayerIdError::TooLong(raw.len()));
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
        {
            return Err(PlayerIdError::InvalidCharacters);
        }
        Ok(PlayerId(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PlayerId {
    type Error = PlayerIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PlayerId::parse(&value)
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlayerIdError {
    #[error("player_id must not be empty")]
    Empty,
    #[error("player_id length {0} exceeds the 64 byte maximum")]
    TooLong(usize),
    #[error("player_id must match [A-Za-z0-9_.-]+")]
    InvalidCharacters,
}
