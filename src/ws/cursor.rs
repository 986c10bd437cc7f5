//! Live pointer sharing.
//!
//! Outbound samples pass a plain timestamp gate: a sample inside the window
//! of the last one sent is dropped, never delayed. Inbound samples overwrite
//! the peer's last position unconditionally.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::{CollabMessage, CursorMessage, CursorPosition, Participant, SurfaceBounds};

pub const DEFAULT_CURSOR_INTERVAL: Duration = Duration::from_millis(50);

pub struct CursorBroadcaster {
    local: Participant,
    min_interval: Duration,
    last_sent: Option<Instant>,
    remote: HashMap<String, CursorPosition>,
}

impl CursorBroadcaster {
    pub fn new(local: Participant) -> Self {
        Self::with_interval(local, DEFAULT_CURSOR_INTERVAL)
    }

    pub fn with_interval(local: Participant, min_interval: Duration) -> Self {
        Self {
            local,
            min_interval,
            last_sent: None,
            remote: HashMap::new(),
        }
    }

    /// Turn a pointer move into a cursor message, or `None` when throttled or
    /// when the surface has no area.
    pub fn sample_at(
        &mut self,
        x: f64,
        y: f64,
        bounds: SurfaceBounds,
        now: Instant,
    ) -> Option<CollabMessage> {
        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) < self.min_interval {
                return None;
            }
        }

        let (x_percent, y_percent) = bounds.to_percent(x, y)?;
        self.last_sent = Some(now);
        Some(CollabMessage::cursor(x_percent, y_percent, &self.local))
    }

    pub fn sample(&mut self, x: f64, y: f64, bounds: SurfaceBounds) -> Option<CollabMessage> {
        self.sample_at(x, y, bounds, Instant::now())
    }

    /// Record a peer's position. Our own echoes are ignored.
    pub fn apply_remote(&mut self, message: &CursorMessage) {
        if message.user.is_named(&self.local.name) {
            return;
        }
        let position = CursorPosition::new(
            message.user.name.clone(),
            message.x,
            message.y,
            message.user.color.clone(),
        );
        self.remote.insert(message.user.name.clone(), position);
    }

    pub fn remove(&mut self, name: &str) -> Option<CursorPosition> {
        self.remote.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&CursorPosition> {
        self.remote.get(name)
    }

    /// Remote cursors, ordered by owner name so rendering is stable.
    pub fn positions(&self) -> Vec<&CursorPosition> {
        let mut positions: Vec<&CursorPosition> = self.remote.values().collect();
        positions.sort_by(|a, b| a.owner_name.cmp(&b.owner_name));
        positions
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> SurfaceBounds {
        SurfaceBounds::new(0.0, 0.0, 200.0, 100.0)
    }

    fn cursor_from(name: &str, x: f64, y: f64) -> CursorMessage {
        CursorMessage {
            x,
            y,
            user: Participant::with_color(name, "#abc"),
        }
    }

    #[test]
    fn test_burst_inside_window_sends_once() {
        let mut cursors = CursorBroadcaster::new(Participant::new("Alice"));
        let start = Instant::now();

        let sent = (0..100)
            .filter_map(|i| {
                let now = start + Duration::from_micros(i * 490);
                cursors.sample_at(i as f64, 10.0, bounds(), now)
            })
            .count();

        assert_eq!(sent, 1);
    }

    #[test]
    fn test_sample_after_window_is_sent() {
        let mut cursors = CursorBroadcaster::new(Participant::new("Alice"));
        let start = Instant::now();
        assert!(cursors.sample_at(10.0, 10.0, bounds(), start).is_some());
        let early = start + Duration::from_millis(49);
        assert!(cursors.sample_at(20.0, 10.0, bounds(), early).is_none());
        let due = start + Duration::from_millis(50);
        assert!(cursors.sample_at(30.0, 10.0, bounds(), due).is_some());
    }

    #[test]
    fn test_sample_converts_to_percent() {
        let mut cursors = CursorBroadcaster::new(Participant::new("Alice"));
        match cursors.sample_at(50.0, 25.0, bounds(), Instant::now()) {
            Some(CollabMessage::Cursor(msg)) => {
                assert_eq!(msg.x, 25.0);
                assert_eq!(msg.y, 25.0);
                assert_eq!(msg.user.name, "Alice");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_collapsed_surface_does_not_consume_window() {
        let mut cursors = CursorBroadcaster::new(Participant::new("Alice"));
        let now = Instant::now();
        assert!(cursors.sample_at(1.0, 1.0, SurfaceBounds::new(0.0, 0.0, 0.0, 0.0), now).is_none());
        assert!(cursors.sample_at(1.0, 1.0, bounds(), now).is_some());
    }

    #[test]
    fn test_remote_last_sample_wins() {
        let mut cursors = CursorBroadcaster::new(Participant::new("Alice"));
        cursors.apply_remote(&cursor_from("Bob", 10.0, 10.0));
        cursors.apply_remote(&cursor_from("Bob", 70.0, 130.0));

        let bob = cursors.get("Bob").unwrap();
        assert_eq!(bob.x_percent, 70.0);
        assert_eq!(bob.y_percent, 100.0);
        assert_eq!(cursors.positions().len(), 1);
    }

    #[test]
    fn test_own_echo_ignored_and_remove() {
        let mut cursors = CursorBroadcaster::new(Participant::new("Alice"));
        cursors.apply_remote(&cursor_from("Alice", 10.0, 10.0));
        cursors.apply_remote(&cursor_from("Carol", 1.0, 1.0));
        cursors.apply_remote(&cursor_from("Bob", 2.0, 2.0));

        assert!(cursors.get("Alice").is_none());
        let names: Vec<&str> = cursors.positions().iter().map(|p| p.owner_name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Carol"]);

        assert!(cursors.remove("Bob").is_some());
        assert!(cursors.remove("Bob").is_none());
    }
}
