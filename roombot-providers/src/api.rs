use crate::request::{HttpRequest, Method};
use anyhow::{Context, anyhow};
use roombot_core::types::{BookingDraft, BookingId};
use serde_json::json;

#[derive(Clone, PartialEq, Eq)]
pub struct ApiEndpoint {
    pub base_url: String,
    pub token: String,
}

impl std::fmt::Debug for ApiEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiEndpoint")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl ApiEndpoint {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> anyhow::Result<Self> {
        let base_url = base_url.into();
        let parsed = url::Url::parse(&base_url)
            .with_context(|| format!("invalid api base url: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!("unsupported api scheme: {}", parsed.scheme()));
        }
        Ok(Self {
            base_url,
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn authorized(&self, method: Method, path: &str) -> HttpRequest {
        HttpRequest::new(method, self.url(path)).bearer(&self.token)
    }
}

pub fn build_chat_message_request(api: &ApiEndpoint, message: &str) -> HttpRequest {
    let payload = json!({ "message": message });
    api.authorized(Method::Post, "/api/chat/message")
        .json(payload.to_string())
        .with_header("Accept", "application/x-ndjson")
}

pub fn build_create_booking_request(
    api: &ApiEndpoint,
    draft: &BookingDraft,
) -> anyhow::Result<HttpRequest> {
    let body = serde_json::to_string(draft).context("encode booking draft")?;
    Ok(api.authorized(Method::Post, "/api/bookings/").json(body))
}

pub fn build_update_booking_request(
    api: &ApiEndpoint,
    booking_id: BookingId,
    draft: &BookingDraft,
) -> anyhow::Result<HttpRequest> {
    let body = serde_json::to_string(draft).context("encode booking draft")?;
    Ok(api
        .authorized(Method::Put, &format!("/api/bookings/{booking_id}"))
        .json(body))
}

pub fn build_delete_booking_request(api: &ApiEndpoint, booking_id: BookingId) -> HttpRequest {
    api.authorized(Method::Delete, &format!("/api/bookings/{booking_id}"))
}

pub fn build_delete_all_bookings_request(api: &ApiEndpoint) -> HttpRequest {
    api.authorized(Method::Delete, "/api/bookings/batch")
}

pub fn build_list_bookings_request(api: &ApiEndpoint) -> HttpRequest {
    api.authorized(Method::Get, "/api/bookings/my_bookings")
}

pub fn build_set_context_request(api: &ApiEndpoint, booking_id: BookingId) -> HttpRequest {
    let payload = json!({ "last_booking_id": booking_id });
    api.authorized(Method::Put, "/api/chat/context")
        .json(payload.to_string())
}

pub fn build_clear_context_request(api: &ApiEndpoint) -> HttpRequest {
    api.authorized(Method::Delete, "/api/chat/context")
}

/// Login is the only unauthenticated call.
pub fn build_login_request(base_url: &str, username: &str, password: &str) -> HttpRequest {
    let payload = json!({ "username": username, "password": password });
    HttpRequest::new(Method::Post, join_url(base_url, "/api/auth/login")).json(payload.to_string())
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}
