use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

/// A text frame on its way to every other connection of a room.
#[derive(Debug, Clone)]
pub struct RelayFrame {
    pub sender_id: Uuid,
    pub payload: String,
}

struct Room {
    sender: broadcast::Sender<RelayFrame>,
    connections: usize,
}

/// Document rooms of the relay, keyed by document id.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Room>>,
    capacity: usize,
}

impl RoomRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<String, Room>> {
        self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enter a room, creating it on first use.
    pub fn join(
        &self,
        document_id: &str,
    ) -> (broadcast::Sender<RelayFrame>, broadcast::Receiver<RelayFrame>) {
        let mut rooms = self.rooms();
        let room = rooms.entry(document_id.to_string()).or_insert_with(|| {
            info!("Opening room for document {}", document_id);
            let (sender, _rx) = broadcast::channel::<RelayFrame>(self.capacity);
            Room { sender, connections: 0 }
        });
        room.connections += 1;
        debug!("Document {} now has {} connection(s)", document_id, room.connections);
        (room.sender.clone(), room.sender.subscribe())
    }

    /// Leave a room; the room goes away with its last connection.
    pub fn release(&self, document_id: &str) {
        let mut rooms = self.rooms();
        let empty = match rooms.get_mut(document_id) {
            Some(room) => {
                room.connections = room.connections.saturating_sub(1);
                room.connections == 0
            }
            None => false,
        };
        if empty {
            rooms.remove(document_id);
            info!("Closed room for document {}", document_id);
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms().len()
    }

    pub fn connection_count(&self) -> usize {
        self.rooms().values().map(|room| room.connections).sum()
    }

    pub fn connections_in(&self, document_id: &str) -> usize {
        self.rooms().get(document_id).map_or(0, |room| room.connections)
    }
}
