use anyhow::{Context, anyhow};
use serde_json::Value;

const UNKNOWN_ERROR: &str = "Erreur inconnue";

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Delta { content: String },
    Action { kind: String, payload: Option<Value> },
    Error { content: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Classifies one record of the chat stream.
///
/// `Err` means the record is not a JSON object; the caller skips it and keeps
/// reading. `Ok(None)` is a well-formed record this client does not act on.
pub fn parse_stream_event(record: &str) -> anyhow::Result<Option<StreamEvent>> {
    let v: Value = serde_json::from_str(record).context("decode stream record")?;
    let obj = v
        .as_object()
        .ok_or_else(|| anyhow!("stream record is not an object"))?;

    let Some(t) = obj.get("type").and_then(|t| t.as_str()) else {
        log::debug!("stream record without type ignored");
        return Ok(None);
    };

    match t {
        "delta" => {
            let content = obj
                .get("content")
                .and_then(|c| c.as_str())
                .unwrap_or("")
                .to_string();
            Ok(Some(StreamEvent::Delta { content }))
        }
        "action" => {
            let kind = obj
                .get("action")
                .or_else(|| obj.get("action_required"))
                .and_then(|k| k.as_str());
            let Some(kind) = kind else {
                log::warn!("action record without kind ignored");
                return Ok(None);
            };
            let payload = obj
                .get("data")
                .or_else(|| obj.get("payload"))
                .filter(|p| p.is_object())
                .cloned();
            Ok(Some(StreamEvent::Action {
                kind: kind.to_string(),
                payload,
            }))
        }
        "error" => {
            let content = obj
                .get("content")
                .and_then(|c| c.as_str())
                .unwrap_or(UNKNOWN_ERROR)
                .to_string();
            Ok(Some(StreamEvent::Error { content }))
        }
        other => {
            log::debug!("stream record of unknown type {other:?} ignored");
            Ok(None)
        }
    }
}
