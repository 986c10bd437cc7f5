//! A mounted collaborative editor: controller + live channel + editor wiring.
//!
//! The session is driven by calling [`EditorSession::pump`] from the owner's
//! event loop. Each call handles exactly one channel event or one local edit.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{get_config, Config};
use crate::models::{Participant, SurfaceBounds};
use crate::ws::channel::{ChannelEndpoint, ChannelEvent, ChannelState, MessageSink, SessionChannel};
use crate::ws::controller::{CollabController, ContentCallback, SessionIdentity};
use crate::ws::editor::DocumentEditor;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub endpoint: ChannelEndpoint,
    pub cursor_interval: Duration,
}

impl SessionOptions {
    /// Options from the process-wide configuration.
    pub fn new(endpoint: ChannelEndpoint) -> Self {
        Self::from_config(get_config(), endpoint)
    }

    pub fn from_config(config: &Config, endpoint: ChannelEndpoint) -> Self {
        Self {
            endpoint,
            cursor_interval: config.cursor_interval(),
        }
    }
}

/// What one [`EditorSession::pump`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Opened,
    /// A remote message of the given kind was dispatched.
    Received(&'static str),
    /// A local edit was applied; `broadcast` tells whether it left the client.
    LocalEdit { broadcast: bool },
    Error(String),
    Closed,
}

pub struct EditorSession<E> {
    options: SessionOptions,
    controller: CollabController<E, SessionChannel>,
    events: mpsc::Receiver<ChannelEvent>,
    local_edits: mpsc::UnboundedReceiver<String>,
    channel_closed: bool,
}

impl<E: DocumentEditor> EditorSession<E> {
    /// Wire the editor's change notifications and open the channel.
    pub fn mount(
        options: SessionOptions,
        document_id: &str,
        local: Participant,
        mut editor: E,
        initial_content: &str,
    ) -> Self {
        let (edits_tx, local_edits) = mpsc::unbounded_channel();
        editor.on_change(Box::new(move |content| {
            let _ = edits_tx.send(content.to_string());
        }));
        Self::attach(options, document_id, local, editor, initial_content, local_edits, None)
    }

    fn attach(
        options: SessionOptions,
        document_id: &str,
        local: Participant,
        editor: E,
        initial_content: &str,
        local_edits: mpsc::UnboundedReceiver<String>,
        callback: Option<ContentCallback>,
    ) -> Self {
        let (channel, events) = SessionChannel::open(&options.endpoint, document_id, &local);
        let mut controller =
            CollabController::new(document_id, local, editor, channel, initial_content)
                .with_cursor_interval(options.cursor_interval);
        if let Some(callback) = callback {
            controller.on_content_change(callback);
        }

        Self {
            options,
            controller,
            events,
            local_edits,
            channel_closed: false,
        }
    }

    /// Rebind to a new document or identity. Nothing but the editor and the
    /// change callback survives; an unchanged identity keeps the session.
    pub fn remount(self, document_id: &str, local: Participant, initial_content: &str) -> Self {
        let next = SessionIdentity::new(document_id, local.name.clone());
        if &next == self.controller.identity() {
            return self;
        }
        info!(
            "Remounting session from {:?} to {:?}",
            self.controller.identity(),
            next
        );

        let Self { options, controller, mut local_edits, .. } = self;
        let (editor, callback) = controller.into_parts();

        // Edits typed against the old document must not leak into the new one
        while local_edits.try_recv().is_ok() {}

        Self::attach(options, document_id, local, editor, initial_content, local_edits, callback)
    }

    /// Wait for and handle the next channel event or local edit.
    ///
    /// Once the channel has closed only local edits are left to wait for.
    pub async fn pump(&mut self) -> SessionEvent {
        tokio::select! {
            event = self.events.recv(), if !self.channel_closed => self.handle_channel_event(event),
            Some(content) = self.local_edits.recv() => {
                let broadcast = self.controller.local_edit(content);
                SessionEvent::LocalEdit { broadcast }
            }
        }
    }

    fn handle_channel_event(&mut self, event: Option<ChannelEvent>) -> SessionEvent {
        match event {
            Some(ChannelEvent::Open) => SessionEvent::Opened,
            Some(ChannelEvent::Message(message)) => {
                let kind = message.kind();
                self.controller.handle_message(message);
                SessionEvent::Received(kind)
            }
            Some(ChannelEvent::Error(e)) => {
                warn!("Session on {} degraded: {}", self.controller.identity().document_id, e);
                SessionEvent::Error(e)
            }
            Some(ChannelEvent::Closed) | None => {
                self.channel_closed = true;
                SessionEvent::Closed
            }
        }
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64, bounds: SurfaceBounds) -> bool {
        self.controller.pointer_moved(x, y, bounds)
    }

    pub fn on_content_change(&mut self, callback: ContentCallback) {
        self.controller.on_content_change(callback);
    }

    pub fn is_open(&self) -> bool {
        self.controller.sink().is_open()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.controller.sink().state()
    }

    pub fn identity(&self) -> &SessionIdentity {
        self.controller.identity()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn controller(&self) -> &CollabController<E, SessionChannel> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut CollabController<E, SessionChannel> {
        &mut self.controller
    }

    /// Close the channel and give the editor back.
    pub fn unmount(self) -> E {
        self.controller.into_parts().0
    }
}
