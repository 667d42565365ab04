use std::sync::Arc;

use roombot_core::config::ClientConfig;
use roombot_engine::composer::Composer;
use roombot_engine::dictation::{DictationConfig, DictationController};
use roombot_engine::engine::{EngineHandle, spawn_engine};
use roombot_engine::session::SessionEvent;
use roombot_engine::traits::{BookingApi, ChatTransport, SpeechRecognizer};
use tokio::sync::mpsc;

use crate::http_client::HttpBookingClient;

/// A running conversation wired to the booking service.
pub struct ClientRuntime {
    pub engine: EngineHandle,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub bookings: Arc<HttpBookingClient>,
    pub composer: Composer,
    // `None` when this platform has no speech recognition.
    pub dictation: Option<DictationController>,
}

/// Build a runnable conversation from config, a bearer token and the
/// platform's recognizer, if any.
///
/// Must be called from within a tokio runtime.
pub fn build_runtime_from_config(
    cfg: &ClientConfig,
    token: impl Into<String>,
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
) -> anyhow::Result<ClientRuntime> {
    let bookings = Arc::new(HttpBookingClient::from_config(cfg, token)?);

    let api: Arc<dyn BookingApi> = bookings.clone();
    let chat: Arc<dyn ChatTransport> = bookings.clone();
    let (engine, events) = spawn_engine(api, chat);

    let composer = Composer::new(Arc::new(engine.clone()));
    let dictation = DictationController::detect(
        recognizer,
        composer.clone(),
        DictationConfig::from_client_config(cfg),
    );
    log::info!(
        "conversation ready against {} (dictation {})",
        cfg.api_base_url,
        if dictation.is_some() { "available" } else { "unavailable" }
    );

    Ok(ClientRuntime {
        engine,
        events,
        bookings,
        composer,
        dictation,
    })
}
