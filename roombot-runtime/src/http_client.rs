use async_trait::async_trait;
use roombot_core::config::ClientConfig;
use roombot_core::types::{BookingDraft, BookingId, BookingRecord};
use roombot_engine::traits::{BookingApi, ChatTransport, ChunkStream, CommandError};
use roombot_providers::api::{self, ApiEndpoint};
use roombot_providers::parse::{self, LoginResponse};
use roombot_providers::request::HttpRequest;
use roombot_providers::runtime::{self, HttpResponse, Timeouts};
use std::time::Duration;
use thiserror::Error;

const LOGIN_FALLBACK: &str = "Erreur de connexion.";

#[derive(Debug, Error)]
pub enum LoginError {
    /// Credentials refused; carries the server's message.
    #[error("{0}")]
    Rejected(String),
    #[error("Erreur de connexion.")]
    Transport(#[source] anyhow::Error),
}

pub fn timeouts_from_config(cfg: &ClientConfig) -> Timeouts {
    Timeouts {
        connect: Duration::from_secs(cfg.connect_timeout_secs),
        request: Duration::from_secs(cfg.request_timeout_secs),
    }
}

/// Booking service client over HTTP. Implements both engine collaborators.
#[derive(Clone)]
pub struct HttpBookingClient {
    api: ApiEndpoint,
    timeouts: Timeouts,
}

impl std::fmt::Debug for HttpBookingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBookingClient")
            .field("api", &self.api)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl HttpBookingClient {
    pub fn new(api: ApiEndpoint, timeouts: Timeouts) -> Self {
        Self { api, timeouts }
    }

    pub fn from_config(cfg: &ClientConfig, token: impl Into<String>) -> anyhow::Result<Self> {
        let api = ApiEndpoint::new(cfg.api_base_url.clone(), token)?;
        Ok(Self::new(api, timeouts_from_config(cfg)))
    }

    async fn send(&self, req: HttpRequest) -> Result<HttpResponse, CommandError> {
        let resp = runtime::execute(&req, self.timeouts).await?;
        if !resp.is_success() {
            let message = parse::parse_error_message(resp.status, &resp.body);
            log::warn!("{} {} -> {}: {message}", req.method, req.url, resp.status);
            return Err(CommandError::Rejected {
                status: resp.status,
                message,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ChatTransport for HttpBookingClient {
    async fn open_chat(&self, message: &str) -> Result<ChunkStream, CommandError> {
        let req = api::build_chat_message_request(&self.api, message);
        let resp = runtime::open_stream(&req, self.timeouts.connect).await?;
        if !resp.is_success() {
            let status = resp.status;
            let body = resp.collect_body().await.unwrap_or_default();
            return Err(CommandError::Rejected {
                status,
                message: parse::parse_error_message(status, &body),
            });
        }
        Ok(resp.chunks)
    }
}

#[async_trait]
impl BookingApi for HttpBookingClient {
    async fn create_booking(&self, draft: &BookingDraft) -> Result<BookingRecord, CommandError> {
        let req = api::build_create_booking_request(&self.api, draft)?;
        let resp = self.send(req).await?;
        Ok(parse::parse_booking_record(&resp.body)?)
    }

    async fn update_booking(
        &self,
        booking_id: BookingId,
        draft: &BookingDraft,
    ) -> Result<BookingRecord, CommandError> {
        let req = api::build_update_booking_request(&self.api, booking_id, draft)?;
        let resp = self.send(req).await?;
        Ok(parse::parse_booking_record(&resp.body)?)
    }

    async fn delete_booking(&self, booking_id: BookingId) -> Result<Option<String>, CommandError> {
        let req = api::build_delete_booking_request(&self.api, booking_id);
        let resp = self.send(req).await?;
        Ok(parse::parse_ack_message(&resp.body))
    }

    async fn delete_all_bookings(&self) -> Result<Option<String>, CommandError> {
        let req = api::build_delete_all_bookings_request(&self.api);
        let resp = self.send(req).await?;
        Ok(parse::parse_ack_message(&resp.body))
    }

    async fn set_context(&self, booking_id: BookingId) -> anyhow::Result<()> {
        let req = api::build_set_context_request(&self.api, booking_id);
        self.send(req).await?;
        Ok(())
    }

    async fn clear_context(&self) -> anyhow::Result<()> {
        let req = api::build_clear_context_request(&self.api);
        self.send(req).await?;
        Ok(())
    }

    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, CommandError> {
        let req = api::build_list_bookings_request(&self.api);
        let resp = self.send(req).await?;
        Ok(parse::parse_booking_list(&resp.body)?)
    }
}

/// Exchanges credentials for a bearer token.
pub async fn login(
    cfg: &ClientConfig,
    username: &str,
    password: &str,
) -> Result<LoginResponse, LoginError> {
    let req = api::build_login_request(&cfg.api_base_url, username, password);
    let resp = runtime::execute(&req, timeouts_from_config(cfg))
        .await
        .map_err(LoginError::Transport)?;

    if !resp.is_success() {
        let message = serde_json::from_slice::<serde_json::Value>(&resp.body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| LOGIN_FALLBACK.to_string());
        return Err(LoginError::Rejected(message));
    }

    parse::parse_login(&resp.body).map_err(LoginError::Transport)
}
