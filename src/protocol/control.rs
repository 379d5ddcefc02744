use serde::{Deserialize, Serialize};

/// Structured (JSON text) control messages. The relay sends exactly one,
/// `welcome`, right after the WebSocket upgrade.
///
/// Wire form: `{"type":"welcome","peer_id":"peer_1700000000000000000"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Welcome { peer_id: String },
}

impl ControlMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
