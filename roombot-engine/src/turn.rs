use crate::render::RenderAccumulator;
use crate::session::{EntryBody, EntryId};
use roombot_core::types::{ActionKind, BookingId, PendingAction, TurnId};
use roombot_providers::events::{StreamEvent, parse_stream_event};
use serde::{Deserialize, Serialize};

pub const CONNECTION_ERROR: &str = "Erreur de connexion...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnEnd {
    Completed,
    /// The server sent a terminal `error` record.
    ServerError(String),
    /// The stream could not be opened or broke off.
    TransportError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSummary {
    pub turn_id: TurnId,
    pub text: String,
    pub pending: Option<ActionKind>,
    pub end: TurnEnd,
    pub skipped_frames: usize,
}

/// What the session must change after one record.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnUpdate {
    Render(EntryBody),
    Action(PendingAction),
    /// Terminal server error; the turn is sealed.
    Failed(String),
}

/// One submission and the events of its response stream.
#[derive(Debug)]
pub struct Turn {
    id: TurnId,
    input: String,
    events: Vec<StreamEvent>,
    render: RenderAccumulator,
    pending: Option<ActionKind>,
    skipped_frames: usize,
    end: Option<TurnEnd>,
}

impl Turn {
    pub fn new(input: impl Into<String>, entry: EntryId) -> Self {
        Self {
            id: TurnId::new(),
            input: input.into(),
            events: Vec::new(),
            render: RenderAccumulator::new(entry),
            pending: None,
            skipped_frames: 0,
            end: None,
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// The bot entry this turn renders into.
    pub fn entry(&self) -> EntryId {
        self.render.entry()
    }

    pub fn events(&self) -> &[StreamEvent] {
        &self.events
    }

    pub fn has_text(&self) -> bool {
        self.render.has_started()
    }

    pub fn is_sealed(&self) -> bool {
        self.end.is_some()
    }

    /// Interprets one complete record of the response stream.
    ///
    /// `last_booking` resolves actions that refer to "the" booking without an id.
    pub fn apply_record(
        &mut self,
        record: &str,
        last_booking: Option<BookingId>,
    ) -> Option<TurnUpdate> {
        if self.is_sealed() {
            return None;
        }

        let event = match parse_stream_event(record) {
            Ok(Some(event)) => event,
            Ok(None) => return None,
            Err(e) => {
                self.skipped_frames += 1;
                log::warn!("turn {}: skipping corrupt frame: {e:#}", self.id.0);
                return None;
            }
        };
        self.events.push(event.clone());

        match event {
            StreamEvent::Delta { content } => Some(TurnUpdate::Render(self.render.push(&content))),
            StreamEvent::Action { kind, payload } => {
                if let Some(existing) = self.pending {
                    log::warn!(
                        "turn {}: ignoring {kind} action, {} already pending",
                        self.id.0,
                        existing.as_str()
                    );
                    return None;
                }
                let Some(action) = PendingAction::from_signal(&kind, payload.as_ref(), last_booking)
                else {
                    log::info!("turn {}: no confirmation for action {kind}", self.id.0);
                    return None;
                };
                self.pending = Some(action.kind());
                Some(TurnUpdate::Action(action))
            }
            StreamEvent::Error { content } => {
                self.pending = None;
                self.end = Some(TurnEnd::ServerError(content.clone()));
                Some(TurnUpdate::Failed(content))
            }
        }
    }

    /// Seals a stream that ended normally. Returns the body to show when no
    /// text ever arrived.
    pub fn complete(&mut self) -> Option<EntryBody> {
        if self.is_sealed() {
            return None;
        }
        self.end = Some(TurnEnd::Completed);
        self.render.finish()
    }

    pub fn fail_transport(&mut self, reason: impl Into<String>) {
        if self.is_sealed() {
            return;
        }
        self.end = Some(TurnEnd::TransportError(reason.into()));
    }

    pub fn summary(&self) -> TurnSummary {
        TurnSummary {
            turn_id: self.id,
            text: self.render.text().to_string(),
            pending: self.pending,
            end: self.end.clone().unwrap_or(TurnEnd::Completed),
            skipped_frames: self.skipped_frames,
        }
    }
}
