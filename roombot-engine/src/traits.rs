use crate::engine::EngineError;
use crate::turn::TurnSummary;
use async_trait::async_trait;
use roombot_core::types::{BookingDraft, BookingId, BookingRecord};
use thiserror::Error;
use tokio::sync::mpsc;

pub use roombot_providers::runtime::ChunkStream;

/// Failure of a single server command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The server answered with a non-success status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl CommandError {
    /// Text shown to the user after `❌ Erreur: `.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            Self::Transport(_) => "connexion au serveur impossible".into(),
        }
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Opens the response stream for one user message.
    async fn open_chat(&self, message: &str) -> Result<ChunkStream, CommandError>;
}

#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn create_booking(&self, draft: &BookingDraft) -> Result<BookingRecord, CommandError>;

    async fn update_booking(
        &self,
        booking_id: BookingId,
        draft: &BookingDraft,
    ) -> Result<BookingRecord, CommandError>;

    /// Returns the server's acknowledgement text, if any.
    async fn delete_booking(&self, booking_id: BookingId) -> Result<Option<String>, CommandError>;

    async fn delete_all_bookings(&self) -> Result<Option<String>, CommandError>;

    async fn set_context(&self, booking_id: BookingId) -> anyhow::Result<()>;

    async fn clear_context(&self) -> anyhow::Result<()>;

    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, CommandError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub continuous: bool,
    pub interim_results: bool,
    // BCP-47 tag, e.g. "fr-FR".
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Interim(String),
    Final(String),
    Error(String),
    End,
}

/// Platform speech recognition. Events arrive on the returned channel until
/// `End`, `Error`, or the channel closes.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn start(
        &self,
        options: RecognitionOptions,
    ) -> anyhow::Result<mpsc::Receiver<RecognitionEvent>>;

    async fn stop(&self);
}

/// The single entry point for user messages, shared by typed and dictated input.
#[async_trait]
pub trait MessageSubmitter: Send + Sync {
    async fn submit(&self, text: String) -> Result<TurnSummary, EngineError>;

    /// `true` while a response is streaming and new messages would be refused.
    fn in_flight(&self) -> bool {
        false
    }
}
