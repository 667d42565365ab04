use anyhow::{Context, anyhow};
use roombot_core::types::BookingRecord;
use serde::Deserialize;

pub fn parse_booking_record(body: &[u8]) -> anyhow::Result<BookingRecord> {
    serde_json::from_slice(body).context("decode booking JSON")
}

pub fn parse_booking_list(body: &[u8]) -> anyhow::Result<Vec<BookingRecord>> {
    serde_json::from_slice(body).context("decode booking list JSON")
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Optional summary of a successful acknowledgement (`{"message": ...}`).
pub fn parse_ack_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<MessageBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
}

/// Human-readable text of an error response.
///
/// Prefers `error`, then `message`, then the raw body, then the status line.
pub fn parse_error_message(status: u16, body: &[u8]) -> String {
    if let Ok(b) = serde_json::from_slice::<MessageBody>(body) {
        if let Some(e) = b.error.or(b.message).filter(|m| !m.trim().is_empty()) {
            return e;
        }
    }
    let raw = String::from_utf8_lossy(body);
    let raw = raw.trim();
    if !raw.is_empty() && !raw.starts_with('{') && !raw.starts_with('<') {
        return raw.to_string();
    }
    format!("HTTP {status}")
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl std::fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginResponse")
            .field("token", &"[REDACTED]")
            .field("role", &self.role)
            .field("username", &self.username)
            .finish()
    }
}

pub fn parse_login(body: &[u8]) -> anyhow::Result<LoginResponse> {
    let resp: LoginResponse = serde_json::from_slice(body).context("decode login JSON")?;
    if resp.token.trim().is_empty() {
        return Err(anyhow!("login response carried an empty token"));
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roombot_core::types::BookingId;

    #[test]
    fn parses_booking_record() {
        let body = br#"{"id":12,"user_id":1,"room_id":3,"start_time":"2025-01-06T10:00:00","end_time":"2025-01-06T11:00:00","title":"Meeting","attendees_count":4,"status":"confirmed"}"#;
        let b = parse_booking_record(body).unwrap();
        assert_eq!(b.id, BookingId(12));
        assert_eq!(b.attendees_count, Some(4));
        assert_eq!(b.room_label(), "Salle 3");
    }

    #[test]
    fn parses_booking_list() {
        let body = br#"[{"id":1,"room_name":"Atlas","start_time":"a","end_time":"b","attendees_count":2}]"#;
        let list = parse_booking_list(body).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].room_label(), "Atlas");
    }

    #[test]
    fn error_message_prefers_error_field() {
        assert_eq!(
            parse_error_message(400, r#"{"error":"Salle occupée","message":"x"}"#.as_bytes()),
            "Salle occupée"
        );
        assert_eq!(
            parse_error_message(401, br#"{"message":"Token is invalid!"}"#),
            "Token is invalid!"
        );
        assert_eq!(parse_error_message(502, b"Bad Gateway"), "Bad Gateway");
        assert_eq!(parse_error_message(500, b"<html></html>"), "HTTP 500");
        assert_eq!(parse_error_message(500, b""), "HTTP 500");
    }

    #[test]
    fn ack_message_is_optional() {
        assert_eq!(
            parse_ack_message(r#"{"message":"3 réservations annulées."}"#.as_bytes()).as_deref(),
            Some("3 réservations annulées.")
        );
        assert_eq!(parse_ack_message(b"{}"), None);
        assert_eq!(parse_ack_message(b""), None);
    }

    #[test]
    fn login_requires_token() {
        let ok = parse_login(br#"{"token":"t","role":"user","username":"ana"}"#).unwrap();
        assert_eq!(ok.role.as_deref(), Some("user"));
        assert!(!format!("{ok:?}").contains("\"t\""));
        assert!(parse_login(br#"{"token":""}"#).is_err());
        assert!(parse_login(br#"{"message":"bad"}"#).is_err());
    }
}
