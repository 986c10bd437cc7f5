use serde::{Deserialize, Serialize};
use crate::models::Participant;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenceAction {
    Join,
    Leave,
    Sync,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PresenceMessage {
    pub action: PresenceAction,
    pub user: Participant,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContentMessage {
    pub content: String,
    pub user: Participant,
}

/// Pointer position in percent of the editor surface.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CursorMessage {
    pub x: f64,
    pub y: f64,
    pub user: Participant,
}

/// Every frame exchanged on a document session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind")]
pub enum CollabMessage {
    #[serde(rename = "presence")]
    Presence(PresenceMessage),
    #[serde(rename = "content")]
    Content(ContentMessage),
    #[serde(rename = "cursor")]
    Cursor(CursorMessage),
}

impl CollabMessage {
    pub fn presence(action: PresenceAction, user: &Participant) -> Self {
        CollabMessage::Presence(PresenceMessage {
            action,
            user: user.clone(),
        })
    }

    pub fn join(user: &Participant) -> Self {
        Self::presence(PresenceAction::Join, user)
    }

    pub fn sync(user: &Participant) -> Self {
        Self::presence(PresenceAction::Sync, user)
    }

    pub fn leave(user: &Participant) -> Self {
        Self::presence(PresenceAction::Leave, user)
    }

    pub fn content(content: impl Into<String>, user: &Participant) -> Self {
        CollabMessage::Content(ContentMessage {
            content: content.into(),
            user: user.clone(),
        })
    }

    pub fn cursor(x: f64, y: f64, user: &Participant) -> Self {
        CollabMessage::Cursor(CursorMessage {
            x,
            y,
            user: user.clone(),
        })
    }

    /// The participant stamped on the message.
    pub fn user(&self) -> &Participant {
        match self {
            CollabMessage::Presence(msg) => &msg.user,
            CollabMessage::Content(msg) => &msg.user,
            CollabMessage::Cursor(msg) => &msg.user,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CollabMessage::Presence(_) => "presence",
            CollabMessage::Content(_) => "content",
            CollabMessage::Cursor(_) => "cursor",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a text frame. Fails on malformed JSON and on unknown kinds.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_presence_wire_shape() {
        let msg = CollabMessage::join(&Participant::with_color("Alice", "#123456"));
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "presence",
                "action": "join",
                "user": {"name": "Alice", "color": "#123456"}
            })
        );
    }

    #[test]
    fn test_content_wire_shape() {
        let msg = CollabMessage::content("<p>Hi</p>", &Participant::with_color("Bob", "#abc"));
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "content",
                "content": "<p>Hi</p>",
                "user": {"name": "Bob", "color": "#abc"}
            })
        );
    }

    #[test]
    fn test_decode_cursor() {
        let msg = CollabMessage::decode(
            r##"{"kind":"cursor","x":12.5,"y":80,"user":{"name":"Bob","color":"#abc"}}"##,
        )
        .unwrap();
        match msg {
            CollabMessage::Cursor(cursor) => {
                assert_eq!(cursor.x, 12.5);
                assert_eq!(cursor.y, 80.0);
                assert_eq!(cursor.user.name, "Bob");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        assert!(CollabMessage::decode(r#"{"kind":"selection","user":{"name":"Bob"}}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(CollabMessage::decode("not json").is_err());
        let wave = r#"{"kind":"presence","action":"wave","user":{"name":"Bob"}}"#;
        assert!(CollabMessage::decode(wave).is_err());
    }

    #[test]
    fn test_user_and_kind_accessors() {
        let bob = Participant::new("Bob");
        let msg = CollabMessage::cursor(1.0, 2.0, &bob);
        assert_eq!(msg.user(), &bob);
        assert_eq!(msg.kind(), "cursor");
    }
}
