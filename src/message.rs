//! Line-delimited protocol messages exchanged with player processes.
//!
//! Every message is a single JSON object transmitted as one line of text.
//! Manager-to-player messages carry a `type` discriminator (`game_start`,
//! `your_turn`, `game_over`, `error`); the first player-to-manager message
//! must be `{"status": "ready"}` and every move reply is `{"move": <value>}`.
//! There are no multi-line messages and no binary payloads.

use serde_json::{Map, Value};

use crate::error::RefereeError;

/// A single protocol message: one JSON object, sent or received as one line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message(Map<String, Value>);

impl Message {
    /// Creates a message with the given `type` discriminator.
    pub fn of_type(msg_type: &str) -> Self {
        let mut map = Map::new();
        map.insert("type".to_owned(), Value::String(msg_type.to_owned()));
        Message(map)
    }

    /// The `{"status": "ready"}` handshake message.
    pub fn ready() -> Self {
        let mut map = Map::new();
        map.insert("status".to_owned(), Value::String("ready".to_owned()));
        Message(map)
    }

    /// A `{"move": <value>}` reply.
    pub fn player_move(value: impl Into<Value>) -> Self {
        let mut map = Map::new();
        map.insert("move".to_owned(), value.into());
        Message(map)
    }

    /// An error notice sent to a player.
    pub fn error(text: &str) -> Self {
        Message::of_type("error").with("message", text)
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_owned(), value.into());
        self
    }

    /// The `type` discriminator, if present.
    pub fn msg_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Looks up an arbitrary payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// True for the `{"status": "ready"}` handshake.
    pub fn is_ready(&self) -> bool {
        self.0.get("status").and_then(Value::as_str) == Some("ready")
    }

    /// The `move` payload of a reply, if present.
    pub fn move_value(&self) -> Option<&Value> {
        self.0.get("move")
    }

    /// Serializes to a single line of text (no trailing newline).
    pub fn to_line(&self) -> String {
        serde_json::to_string(&self.0).expect("a JSON object always serializes")
    }

    /// Parses one received line. Anything but a JSON object is malformed.
    pub fn from_line(line: &str) -> Result<Self, RefereeError> {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => Ok(Message(map)),
            Ok(_) | Err(_) => Err(RefereeError::Malformed {
                line: line.to_owned(),
            }),
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn line_round_trip() {
        let sent = Message::of_type("your_turn")
            .with("round", 3)
            .with("cells", json!([0, 4, 8]));
        let received = Message::from_line(&sent.to_line()).unwrap();
        assert_eq!(sent, received);
    }

    #[test]
    fn non_objects_are_malformed() {
        for line in ["", "42", "[1, 2]", "\"ready\"", "{not json"] {
            let err = Message::from_line(line).unwrap_err();
            assert!(matches!(err, RefereeError::Malformed { .. }), "{line:?}");
        }
    }

    #[test]
    fn ready_detection() {
        assert!(Message::from_line(r#"{"status": "ready"}"#).unwrap().is_ready());
        assert!(!Message::from_line(r#"{"status": "busy"}"#).unwrap().is_ready());
        assert!(!Message::player_move("C").is_ready());
    }

    #[test]
    fn move_payload() {
        let reply = Message::from_line(r#"{"move": 4}"#).unwrap();
        assert_eq!(reply.move_value(), Some(&json!(4)));
        assert_eq!(reply.msg_type(), None);
    }
}
