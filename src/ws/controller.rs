//! Content reconciliation and message dispatch for one document session.
//!
//! Content is last-write-wins: whichever `content` message arrives last
//! replaces the local document wholesale. There is no versioning and no
//! merge, so two edits racing within one round trip lose one of them.

use tracing::{debug, info, warn};

use crate::models::{CollabMessage, CursorPosition, Participant, PresenceAction, SurfaceBounds};
use crate::ws::channel::MessageSink;
use crate::ws::cursor::CursorBroadcaster;
use crate::ws::editor::{DocumentEditor, SetContentOptions};
use crate::ws::presence::PresenceTracker;

/// Called with the new content on every local or remote change, so the
/// hosting page can persist it.
pub type ContentCallback = Box<dyn FnMut(&str) + Send>;

/// What a session is bound to. A change to either part means a new session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity {
    pub document_id: String,
    pub participant_name: String,
}

impl SessionIdentity {
    pub fn new(document_id: impl Into<String>, participant_name: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            participant_name: participant_name.into(),
        }
    }
}

pub struct CollabController<E, S> {
    identity: SessionIdentity,
    local: Participant,
    editor: E,
    sink: S,
    content: String,
    presence: PresenceTracker,
    cursors: CursorBroadcaster,
    on_content_change: Option<ContentCallback>,
}

impl<E: DocumentEditor, S: MessageSink> CollabController<E, S> {
    pub fn new(
        document_id: impl Into<String>,
        local: Participant,
        mut editor: E,
        sink: S,
        initial_content: impl Into<String>,
    ) -> Self {
        let identity = SessionIdentity::new(document_id, local.name.clone());
        let content = initial_content.into();
        editor.set_content(&content, SetContentOptions::default());

        Self {
            identity,
            presence: PresenceTracker::new(local.clone()),
            cursors: CursorBroadcaster::new(local.clone()),
            local,
            editor,
            sink,
            content,
            on_content_change: None,
        }
    }

    /// Replace the cursor broadcaster's sampling window.
    pub fn with_cursor_interval(mut self, interval: std::time::Duration) -> Self {
        self.cursors = CursorBroadcaster::with_interval(self.local.clone(), interval);
        self
    }

    pub fn on_content_change(&mut self, callback: ContentCallback) {
        self.on_content_change = Some(callback);
    }

    /// The hosting page loaded or generated new content. It becomes the local
    /// content but is neither broadcast nor reported back.
    pub fn set_external_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.editor.set_content(&self.content, SetContentOptions::default());
    }

    /// The user edited the document. Returns whether the update went out.
    pub fn local_edit(&mut self, content: impl Into<String>) -> bool {
        self.content = content.into();
        self.notify_content_change();

        let sent = self.sink.send(&CollabMessage::content(self.content.clone(), &self.local));
        if !sent {
            debug!("Local edit on {} not broadcast: channel not open", self.identity.document_id);
        }
        sent
    }

    /// Decode and dispatch one text frame. Malformed frames are dropped.
    pub fn handle_frame(&mut self, frame: &str) {
        match CollabMessage::decode(frame) {
            Ok(message) => self.handle_message(message),
            Err(e) => warn!("Ignoring malformed message on {}: {}", self.identity.document_id, e),
        }
    }

    pub fn handle_message(&mut self, message: CollabMessage) {
        match message {
            CollabMessage::Presence(presence) => {
                if let Some(reply) = self.presence.handle(presence.action, &presence.user) {
                    self.sink.send(&reply);
                }
                if presence.action == PresenceAction::Leave {
                    self.cursors.remove(&presence.user.name);
                }
            }
            CollabMessage::Content(update) => {
                if update.user.is_named(&self.local.name) {
                    return;
                }
                info!(
                    "Applying content from {} to {}",
                    update.user.name, self.identity.document_id
                );
                self.content = update.content;
                self.editor.set_content(&self.content, SetContentOptions::preserving_selection());
                self.notify_content_change();
            }
            CollabMessage::Cursor(cursor) => self.cursors.apply_remote(&cursor),
        }
    }

    /// Pointer moved over the editor surface. Returns whether a cursor
    /// message was sent.
    pub fn pointer_moved(&mut self, x: f64, y: f64, bounds: SurfaceBounds) -> bool {
        if !self.sink.is_open() {
            return false;
        }
        match self.cursors.sample(x, y, bounds) {
            Some(message) => self.sink.send(&message),
            None => false,
        }
    }

    fn notify_content_change(&mut self) {
        if let Some(callback) = self.on_content_change.as_mut() {
            callback(&self.content);
        }
    }

    pub fn close(&self) {
        self.sink.close();
    }

    /// Tear down, handing back what outlives the session: the editor and
    /// the hosting page's change callback.
    pub fn into_parts(self) -> (E, Option<ContentCallback>) {
        self.sink.close();
        (self.editor, self.on_content_change)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn roster(&self) -> &[Participant] {
        self.presence.roster()
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn cursors(&self) -> Vec<&CursorPosition> {
        self.cursors.positions()
    }

    pub fn cursor_of(&self, name: &str) -> Option<&CursorPosition> {
        self.cursors.get(name)
    }

    pub fn cursor_interval(&self) -> std::time::Duration {
        self.cursors.min_interval()
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn local(&self) -> &Participant {
        &self.local
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::editor::{BufferEditor, Selection};
    use std::cell::{Cell, RefCell};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSink {
        sent: RefCell<Vec<CollabMessage>>,
        closed: Cell<u32>,
        offline: Cell<bool>,
    }

    impl MessageSink for RecordingSink {
        fn send(&self, message: &CollabMessage) -> bool {
            if self.offline.get() {
                return false;
            }
            self.sent.borrow_mut().push(message.clone());
            true
        }

        fn is_open(&self) -> bool {
            !self.offline.get()
        }

        fn close(&self) {
            self.closed.set(self.closed.get() + 1);
        }
    }

    fn alice() -> Participant {
        Participant::with_color("Alice", "#f00")
    }

    fn bob() -> Participant {
        Participant::with_color("Bob", "#abc")
    }

    fn controller() -> CollabController<BufferEditor, RecordingSink> {
        seeded("")
    }

    fn seeded(content: &str) -> CollabController<BufferEditor, RecordingSink> {
        CollabController::new(
            "doc-1",
            alice(),
            BufferEditor::default(),
            RecordingSink::default(),
            content,
        )
    }

    fn saved(
        controller: &mut CollabController<BufferEditor, RecordingSink>,
    ) -> Arc<Mutex<Vec<String>>> {
        let saves = Arc::new(Mutex::new(Vec::new()));
        let sink = saves.clone();
        controller.on_content_change(Box::new(move |content| {
            sink.lock().unwrap().push(content.to_string())
        }));
        saves
    }

    #[test]
    fn test_initial_content_is_pushed_to_editor() {
        let c = seeded("<p>seed</p>");
        assert_eq!(c.content(), "<p>seed</p>");
        assert_eq!(c.editor().get_content(), "<p>seed</p>");
        assert_eq!(c.identity(), &SessionIdentity::new("doc-1", "Alice"));
    }

    #[test]
    fn test_local_edit_saves_and_broadcasts() {
        let mut c = controller();
        let saves = saved(&mut c);

        assert!(c.local_edit("<p>draft</p>"));
        assert_eq!(c.content(), "<p>draft</p>");
        assert_eq!(saves.lock().unwrap().as_slice(), ["<p>draft</p>".to_string()]);
        assert_eq!(
            c.sink().sent.borrow().as_slice(),
            [CollabMessage::content("<p>draft</p>", &alice())]
        );
    }

    #[test]
    fn test_local_edit_offline_is_dropped_but_kept_locally() {
        let mut c = controller();
        c.sink().offline.set(true);
        assert!(!c.local_edit("<p>offline</p>"));
        assert_eq!(c.content(), "<p>offline</p>");
        assert!(c.sink().sent.borrow().is_empty());
    }

    #[test]
    fn test_remote_content_replaces_and_preserves_selection() {
        let mut c = seeded("0123456789");
        let saves = saved(&mut c);
        c.editor_mut().select(5, 8);

        c.handle_message(CollabMessage::content("abc", &bob()));

        assert_eq!(c.content(), "abc");
        assert_eq!(c.editor().get_content(), "abc");
        assert_eq!(c.editor().selection(), Some(Selection { anchor: 3, head: 3 }));
        assert_eq!(saves.lock().unwrap().as_slice(), ["abc".to_string()]);
        assert!(c.sink().sent.borrow().is_empty());
    }

    #[test]
    fn test_own_content_echo_ignored() {
        let mut c = controller();
        c.local_edit("<p>mine</p>");
        c.handle_message(CollabMessage::content("<p>stale echo</p>", &alice()));
        assert_eq!(c.content(), "<p>mine</p>");
    }

    #[test]
    fn test_last_write_wins() {
        let mut c = controller();
        c.handle_message(CollabMessage::content("<p>from bob</p>", &bob()));
        c.handle_message(CollabMessage::content("<p>from carol</p>", &Participant::new("Carol")));
        assert_eq!(c.content(), "<p>from carol</p>");
    }

    #[test]
    fn test_external_content_is_not_broadcast() {
        let mut c = controller();
        let saves = saved(&mut c);
        c.set_external_content("<h2>Generated proposal</h2>");
        assert_eq!(c.content(), "<h2>Generated proposal</h2>");
        assert_eq!(c.editor().get_content(), "<h2>Generated proposal</h2>");
        assert!(saves.lock().unwrap().is_empty());
        assert!(c.sink().sent.borrow().is_empty());
    }

    #[test]
    fn test_join_gets_sync_reply() {
        let mut c = controller();
        c.handle_message(CollabMessage::join(&bob()));
        assert_eq!(c.roster(), [bob()].as_slice());
        assert_eq!(c.sink().sent.borrow().as_slice(), [CollabMessage::sync(&alice())]);
    }

    #[test]
    fn test_syncs_never_produce_messages() {
        let mut c = controller();
        for i in 0..25 {
            c.handle_message(CollabMessage::sync(&Participant::new(format!("Peer{}", i % 5))));
        }
        assert_eq!(c.roster().len(), 5);
        assert_eq!(c.sink().sent.borrow().len(), 0);
    }

    #[test]
    fn test_self_never_in_roster() {
        let mut c = controller();
        c.handle_message(CollabMessage::join(&alice()));
        c.handle_message(CollabMessage::sync(&alice()));
        c.handle_message(CollabMessage::join(&bob()));
        assert!(c.roster().iter().all(|p| p.name != "Alice"));
        // Only the reply to Bob went out
        assert_eq!(c.sink().sent.borrow().len(), 1);
    }

    #[test]
    fn test_leave_drops_roster_entry_and_cursor() {
        let mut c = controller();
        c.handle_message(CollabMessage::join(&bob()));
        c.handle_message(CollabMessage::cursor(40.0, 60.0, &bob()));
        assert!(c.cursor_of("Bob").is_some());

        c.handle_message(CollabMessage::leave(&bob()));
        assert!(c.roster().is_empty());
        assert!(c.cursor_of("Bob").is_none());

        // A second leave changes nothing
        c.handle_message(CollabMessage::leave(&bob()));
        assert!(c.roster().is_empty());
    }

    #[test]
    fn test_pointer_moves_are_throttled() {
        let mut c = controller();
        let bounds = SurfaceBounds::new(0.0, 0.0, 100.0, 100.0);
        let sent = (0..100).filter(|i| c.pointer_moved(*i as f64, 5.0, bounds)).count();
        assert!(sent <= 1);
        assert_eq!(c.sink().sent.borrow().len(), sent);
    }

    #[test]
    fn test_pointer_moves_need_open_channel() {
        let mut c = controller();
        c.sink().offline.set(true);
        assert!(!c.pointer_moved(5.0, 5.0, SurfaceBounds::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let mut c = controller();
        c.handle_frame("{not json");
        c.handle_frame(r#"{"kind":"telepathy","user":{"name":"Bob"}}"#);
        c.handle_frame(r#"{"kind":"presence","action":"join","user":{"name":"Bob"}}"#);
        assert_eq!(c.roster().len(), 1);
        assert_eq!(c.roster()[0].color, crate::models::DEFAULT_COLOR);
    }

    #[test]
    fn test_null_color_peer_still_lands() {
        let mut c = controller();
        c.handle_frame(r#"{"kind":"presence","action":"join","user":{"name":"Bob","color":null}}"#);
        c.handle_frame(
            r#"{"kind":"content","content":"<p>Hi</p>","user":{"name":"Bob","color":null}}"#,
        );

        assert_eq!(c.presence().names(), vec!["Bob"]);
        assert_eq!(c.roster()[0].color, crate::models::DEFAULT_COLOR);
        assert_eq!(c.content(), "<p>Hi</p>");
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut c = controller();

        c.handle_frame(
            r##"{"kind":"presence","action":"join","user":{"name":"Bob","color":"#abc"}}"##,
        );
        let names: Vec<&str> = c.roster().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Bob"]);
        assert_eq!(c.sink().sent.borrow().last(), Some(&CollabMessage::sync(&alice())));

        c.handle_frame(r##"{"kind":"cursor","x":10,"y":20,"user":{"name":"Bob","color":"#abc"}}"##);
        c.handle_frame(
            r##"{"kind":"content","content":"<p>Hi</p>","user":{"name":"Bob","color":"#abc"}}"##,
        );
        assert_eq!(c.content(), "<p>Hi</p>");

        c.handle_frame(
            r##"{"kind":"presence","action":"leave","user":{"name":"Bob","color":"#abc"}}"##,
        );
        assert!(c.roster().is_empty());
        assert!(c.cursors().is_empty());
        assert_eq!(c.presence().head_count(), 1);
    }

    #[test]
    fn test_into_parts_keeps_editor_and_callback() {
        let mut c = controller();
        let saves = saved(&mut c);
        c.local_edit("<p>kept</p>");
        c.close();
        assert_eq!(c.sink().closed.get(), 1);

        let (editor, callback) = c.into_parts();
        assert_eq!(editor.get_content(), "");
        let mut callback = callback.unwrap();
        callback("<p>next session</p>");
        assert_eq!(saves.lock().unwrap().len(), 2);
    }
}
