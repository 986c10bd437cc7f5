//! Roster of the other participants on a document.
//!
//! There is no central membership list. A newcomer announces itself with
//! `join`; every participant already present answers with a `sync` carrying
//! its own identity, which is how the newcomer learns about them. A `sync`
//! never triggers another `sync`.

use tracing::{debug, info};

use crate::models::{CollabMessage, Participant, PresenceAction};

pub struct PresenceTracker {
    local: Participant,
    roster: Vec<Participant>,
}

impl PresenceTracker {
    pub fn new(local: Participant) -> Self {
        Self {
            local,
            roster: Vec::new(),
        }
    }

    /// Apply a presence announcement. Returns the reply to send, if any.
    pub fn handle(
        &mut self,
        action: PresenceAction,
        participant: &Participant,
    ) -> Option<CollabMessage> {
        if participant.is_named(&self.local.name) {
            return None;
        }

        match action {
            PresenceAction::Join => {
                self.insert(participant);
                Some(CollabMessage::sync(&self.local))
            }
            PresenceAction::Sync => {
                self.insert(participant);
                None
            }
            PresenceAction::Leave => {
                self.remove(&participant.name);
                None
            }
        }
    }

    fn insert(&mut self, participant: &Participant) {
        if self.contains(&participant.name) {
            debug!("{} already in roster", participant.name);
            return;
        }
        info!("{} is now viewing the document", participant.name);
        self.roster.push(participant.clone());
    }

    /// Drop a participant. Unknown names are ignored.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.roster.len();
        self.roster.retain(|p| p.name != name);
        let removed = self.roster.len() != before;
        if removed {
            info!("{} left the document", name);
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roster.iter().any(|p| p.name == name)
    }

    /// Remote participants in arrival order.
    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    pub fn names(&self) -> Vec<&str> {
        self.roster.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn local(&self) -> &Participant {
        &self.local
    }

    /// Everyone working on the document, self included.
    pub fn head_count(&self) -> usize {
        self.roster.len() + 1
    }
}
