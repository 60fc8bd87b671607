//! Server-side presence: a user is online while at least one announced
//! connection remains, and goes offline only when the last one drops.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::protocol::Presence;

#[derive(Clone, Default)]
pub struct PresenceRegistry {
    sessions: Arc<DashMap<String, HashSet<Uuid>>>,
}

impl PresenceRegistry {
    /// Bind a connection to an identity. Returns true only when this is the
    /// user's first live session, i.e. the user just came online.
    pub fn announce(&self, email: &str, conn: Uuid) -> bool {
        let mut sessions = self.sessions.entry(email.to_owned()).or_default();
        let came_online = sessions.is_empty();
        sessions.insert(conn);
        came_online
    }

    /// Unbind a connection. Returns true only when it was the user's last
    /// live session, i.e. the user just went offline.
    pub fn release(&self, email: &str, conn: Uuid) -> bool {
        let Some(mut sessions) = self.sessions.get_mut(email) else {
            return false;
        };
        sessions.remove(&conn);
        let went_offline = sessions.is_empty();
        drop(sessions);
        if went_offline {
            self.sessions.remove_if(email, |_, sessions| sessions.is_empty());
        }
        went_offline
    }

    pub fn is_online(&self, email: &str) -> bool {
        self.sessions
            .get(email)
            .is_some_and(|sessions| !sessions.is_empty())
    }

    pub fn status(&self, email: &str) -> Presence {
        if self.is_online(email) {
            Presence::Online
        } else {
            Presence::Offline
        }
    }

    /// Emails of everyone currently online, sorted for stable output.
    pub fn snapshot(&self) -> Vec<String> {
        let mut online: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        online.sort();
        online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_session_brings_user_online() {
        let presence = PresenceRegistry::default();
        assert!(presence.announce("a@x.com", Uuid::now_v7()));
        assert!(presence.is_online("a@x.com"));
        assert!(!presence.announce("a@x.com", Uuid::now_v7()));
    }

    #[test]
    fn online_until_last_session_disconnects() {
        let presence = PresenceRegistry::default();
        let (c1, c2) = (Uuid::now_v7(), Uuid::now_v7());
        presence.announce("a@x.com", c1);
        presence.announce("a@x.com", c2);

        assert!(!presence.release("a@x.com", c1));
        assert!(presence.is_online("a@x.com"));

        assert!(presence.release("a@x.com", c2));
        assert!(!presence.is_online("a@x.com"));
        assert_eq!(presence.status("a@x.com"), Presence::Offline);
    }

    #[test]
    fn release_of_unknown_user_is_a_noop() {
        let presence = PresenceRegistry::default();
        assert!(!presence.release("ghost@x.com", Uuid::now_v7()));
    }

    #[test]
    fn snapshot_lists_online_users_sorted() {
        let presence = PresenceRegistry::default();
        presence.announce("b@x.com", Uuid::now_v7());
        presence.announce("a@x.com", Uuid::now_v7());
        assert_eq!(presence.snapshot(), vec!["a@x.com", "b@x.com"]);
    }
}
