//! Client side of a collaborative document session.

pub mod editor;
pub mod channel;
pub mod presence;
pub mod cursor;
pub mod controller;
pub mod session;

pub use editor::{BufferEditor, ChangeListener, DocumentEditor, Selection, SetContentOptions};
pub use channel::{
    ChannelEndpoint, ChannelError, ChannelEvent, ChannelState, MessageSink, SessionChannel,
};
pub use presence::PresenceTracker;
pub use cursor::CursorBroadcaster;
pub use controller::{CollabController, ContentCallback, SessionIdentity};
pub use session::{EditorSession, SessionEvent, SessionOptions};
