//! Inbound command envelopes and control-frame parsing.
//!
//! Each text frame on the control channel is a JSON object with a `type`
//! tag. The payload is either the `data` field or, failing that, the
//! remaining top-level fields. Controllers are loose about numeric types
//! (voice pipelines emit `"3"` as readily as `3`), so every numeric field
//! accepts both JSON numbers and numeric strings.

pub mod dispatcher;

use serde_json::{Map, Value};

/// One decoded control frame. Consumed immediately by the dispatcher,
/// never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEnvelope {
    Navigate {
        page: Option<u32>,
    },
    Color(RegionPayload),
    Highlight(RegionPayload),
    Zoom {
        value: Option<f32>,
        delta: Option<f32>,
    },
    Inspect {
        page: Option<u32>,
        /// Kept signed so a negative ordinal range-checks like any other
        /// out-of-bounds index.
        image_index: Option<i64>,
    },
    Clear,
    Speech {
        text: Option<String>,
    },
    Unknown {
        tag: String,
    },
}

/// Payload shared by the `color` and `highlight` commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPayload {
    pub page: Option<u32>,
    pub start: u32,
    pub end: u32,
    pub color: Option<String>,
}

impl RegionPayload {
    fn from_value(data: &Value) -> Self {
        Self {
            page: read_page(data, "page"),
            start: read_page(data, "start").unwrap_or(0),
            end: read_page(data, "end").unwrap_or(0),
            color: data
                .get("color")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// Parse one inbound text frame. `None` means the frame is not a command
/// and should be dropped (the caller logs it).
pub fn parse_frame(raw: &str) -> Option<CommandEnvelope> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let obj = value.as_object()?;
    let tag = obj.get("type")?.as_str()?;
    let data = payload(obj);

    Some(match tag {
        "navigate" => CommandEnvelope::Navigate {
            page: read_page(&data, "page"),
        },
        "color" => CommandEnvelope::Color(RegionPayload::from_value(&data)),
        "highlight" => CommandEnvelope::Highlight(RegionPayload::from_value(&data)),
        "zoom" => CommandEnvelope::Zoom {
            value: read_float(&data, "value"),
            delta: read_float(&data, "delta"),
        },
        "inspect" => CommandEnvelope::Inspect {
            page: read_page(&data, "page"),
            image_index: read_int(&data, "imageInd"),
        },
        "clear" => CommandEnvelope::Clear,
        "speech" => CommandEnvelope::Speech {
            text: read_speech_text(&data),
        },
        other => CommandEnvelope::Unknown {
            tag: other.to_string(),
        },
    })
}

/// The `data` field when present, otherwise everything but the tag.
fn payload(obj: &Map<String, Value>) -> Value {
    match obj.get("data") {
        Some(data) => data.clone(),
        None => {
            let mut rest = obj.clone();
            rest.remove("type");
            Value::Object(rest)
        }
    }
}

/// Integer field arriving as a JSON number or a numeric string.
fn read_int(data: &Value, key: &str) -> Option<i64> {
    match data.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

/// Page-like field: negative values floor to 0 and are clamped later.
fn read_page(data: &Value, key: &str) -> Option<u32> {
    read_int(data, key).map(|v| v.max(0).min(u32::MAX as i64) as u32)
}

/// Float field arriving as a JSON number or a numeric string.
fn read_float(data: &Value, key: &str) -> Option<f32> {
    match data.get(key)? {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
}

/// Speech payloads are either `{"text": "..."}` or a bare string.
fn read_speech_text(data: &Value) -> Option<String> {
    match data {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => data
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
