//! Rooms are not stored entities, just a join key derived from the two
//! participants: the pair sorted lexicographically and glued with a
//! separator that identifiers may not contain.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const ROOM_SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("participant identifier is empty")]
    EmptyParticipant,
    #[error("participant identifier contains the reserved separator {ROOM_SEPARATOR:?}")]
    ReservedSeparator,
}

/// Derive the shared room id for an unordered pair of users.
///
/// `resolve_room(a, b) == resolve_room(b, a)` for all a, b, and
/// `resolve_room(a, a)` is well-defined (self-chat).
pub fn resolve_room(a: &str, b: &str) -> Result<RoomId, RoomError> {
    for id in [a, b] {
        if id.is_empty() {
            return Err(RoomError::EmptyParticipant);
        }
        if id.contains(ROOM_SEPARATOR) {
            return Err(RoomError::ReservedSeparator);
        }
    }

    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    Ok(RoomId(format!("{lo}{ROOM_SEPARATOR}{hi}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_independent() {
        let ab = resolve_room("alice@x.com", "bob@x.com").unwrap();
        let ba = resolve_room("bob@x.com", "alice@x.com").unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.as_str(), "alice@x.com|bob@x.com");
    }

    #[test]
    fn self_chat_is_defined_and_stable() {
        let a = resolve_room("alice@x.com", "alice@x.com").unwrap();
        let b = resolve_room("alice@x.com", "alice@x.com").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "alice@x.com|alice@x.com");
    }

    #[test]
    fn empty_identifier_is_rejected() {
        assert_eq!(resolve_room("", "bob@x.com"), Err(RoomError::EmptyParticipant));
        assert_eq!(resolve_room("alice@x.com", ""), Err(RoomError::EmptyParticipant));
    }

    #[test]
    fn separator_inside_identifier_is_rejected() {
        assert_eq!(
            resolve_room("a|b@x.com", "bob@x.com"),
            Err(RoomError::ReservedSeparator)
        );
    }
}
