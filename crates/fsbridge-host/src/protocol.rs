//! Line protocol spoken on stdin/stdout
//!
//! Each input line is either a call or an out-of-band event:
//!
//! ```text
//! {"id": 1, "method": "list-native-directory", "args": {"path": "/sdcard"}}
//! {"event": "pickerResult", "uri": "content://.../tree/primary%3A"}
//! {"event": "brokerPermission", "requestCode": 0, "granted": true}
//! ```
//!
//! Every call produces exactly one output line tagged with the call's `id`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fsbridge_core::{Outcome, Payload, PickerOutcome};
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum InputLine {
    Call {
        id: Value,
        method: String,
        #[serde(default)]
        args: Map<String, Value>,
    },
    Event(HostEvent),
}

/// Results the platform would deliver outside of any call
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    PickerResult {
        #[serde(default)]
        uri: Option<String>,
    },
    PickerCancelled,
    PickerFailed {
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    BrokerPermission {
        request_code: i32,
        granted: bool,
    },
}

impl HostEvent {
    /// Picker outcome carried by this event, if it is a picker event
    pub fn picker_outcome(self) -> Option<PickerOutcome> {
        match self {
            HostEvent::PickerResult { uri } => Some(PickerOutcome::Selected(uri)),
            HostEvent::PickerCancelled => Some(PickerOutcome::Cancelled),
            HostEvent::PickerFailed { reason } => Some(PickerOutcome::Failed(reason)),
            HostEvent::BrokerPermission { .. } => None,
        }
    }
}

pub fn parse_line(line: &str) -> serde_json::Result<InputLine> {
    serde_json::from_str(line)
}

/// JSON form of a success payload. Bytes go out as base64.
pub fn render_payload(payload: &Payload) -> Value {
    match payload {
        Payload::Null => Value::Null,
        Payload::Bool(b) => Value::Bool(*b),
        Payload::Text(s) => Value::String(s.clone()),
        Payload::Bytes(bytes) => Value::String(STANDARD.encode(bytes)),
        Payload::Entries(entries) => serde_json::to_value(entries).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize entries: {}", e);
            Value::Array(Vec::new())
        }),
        Payload::BrokerStatus(status) => Value::String(status.as_str().to_string()),
    }
}

pub fn render_response(id: Value, outcome: &Outcome) -> Value {
    match outcome {
        Outcome::Success(payload) => json!({ "id": id, "result": render_payload(payload) }),
        Outcome::Error { code, message } => json!({
            "id": id,
            "error": { "code": code, "message": message },
        }),
        Outcome::NotImplemented => json!({ "id": id, "notImplemented": true }),
    }
}

/// Response to a line that could not be parsed at all
pub fn render_parse_error(err: &serde_json::Error) -> Value {
    json!({
        "id": Value::Null,
        "error": { "code": "PARSE_ERROR", "message": err.to_string() },
    })
}
