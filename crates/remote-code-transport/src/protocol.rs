//! Wire protocol for the session channel.
//!
//! Every frame in both directions is a JSON object `{type, data, session?}`.
//! Inbound frames are decoded in two steps: [`Frame::parse`] checks the
//! envelope, [`ServerEvent::from_frame`] maps known types to events. Frames
//! with an unknown type are dropped by the router.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw frame envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl Frame {
    /// Parse a text frame.
    ///
    /// # Errors
    /// Returns error if the text is not a JSON object with a string `type`.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Message from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A command line, submitted with Enter by the backend.
    Command(String),
    /// Raw keystrokes, sent without Enter.
    Keys(String),
    /// Terminal resize.
    Resize { cols: u16, rows: u16 },
    /// Keepalive.
    Ping,
}

impl OutboundMessage {
    /// Encode as a text frame.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Event pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Terminal output snapshot. Opaque text.
    Output {
        text: String,
        timestamp: Option<i64>,
    },
    /// Informational status, e.g. "Command sent".
    Status(String),
    /// Server-side failure report.
    Error(String),
    /// Keepalive reply.
    Pong,
    /// This connection was replaced by another client for the same session.
    Kicked(String),
}

impl ServerEvent {
    /// Map a frame to a known event. `None` for unknown types or payloads
    /// that do not fit the type.
    #[must_use]
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        match frame.kind.as_str() {
            "output" => match &frame.data {
                Value::String(text) => Some(Self::Output {
                    text: text.clone(),
                    timestamp: None,
                }),
                Value::Object(map) => Some(Self::Output {
                    text: map.get("text")?.as_str()?.to_owned(),
                    timestamp: map.get("timestamp").and_then(Value::as_i64),
                }),
                _ => None,
            },
            "status" => Some(Self::Status(text_of(&frame.data))),
            "error" => Some(Self::Error(text_of(&frame.data))),
            "pong" => Some(Self::Pong),
            "kicked" => Some(Self::Kicked(text_of(&frame.data))),
            _ => None,
        }
    }

    /// The discriminator this event was decoded from.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Output { .. } => "output",
            Self::Status(_) => "status",
            Self::Error(_) => "error",
            Self::Pong => "pong",
            Self::Kicked(_) => "kicked",
        }
    }
}

fn text_of(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A decoded inbound message, as handed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub event: ServerEvent,
    /// Session tag, when the server sets one.
    pub session: Option<String>,
}
