use crate::session::{ChatSession, EntryBody, EntryId, Role, SessionEvent, TranscriptEntry};
use crate::traits::{BookingApi, ChatTransport, ChunkStream, MessageSubmitter};
use crate::turn::{CONNECTION_ERROR, Turn, TurnSummary, TurnUpdate};
use crate::workflow::{ConfirmOutcome, run_confirmation};
use async_trait::async_trait;
use futures_util::StreamExt;
use roombot_core::types::BookingId;
use roombot_providers::ndjson::FrameReader;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("a response is still streaming")]
    TurnInFlight,
    #[error("nothing to confirm")]
    NoPendingAction,
    #[error("chat session closed")]
    SessionClosed,
}

#[derive(Debug)]
enum EngineCmd {
    Submit {
        text: String,
        respond_to: oneshot::Sender<Result<TurnSummary, EngineError>>,
    },
    Confirm {
        // `None` confirms whichever control is active.
        entry: Option<EntryId>,
        respond_to: oneshot::Sender<Result<ConfirmOutcome, EngineError>>,
    },
    Transcript {
        respond_to: oneshot::Sender<Vec<TranscriptEntry>>,
    },
    LastBooking {
        respond_to: oneshot::Sender<Option<BookingId>>,
    },
    Shutdown,
}

#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCmd>,
    in_flight: watch::Receiver<bool>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle").finish_non_exhaustive()
    }
}

impl EngineHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineCmd,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .await
            .map_err(|_| EngineError::SessionClosed)?;
        rx.await.map_err(|_| EngineError::SessionClosed)
    }

    /// Sends one user message and waits until its response stream is finished.
    pub async fn submit(&self, text: impl Into<String>) -> Result<TurnSummary, EngineError> {
        let text = text.into();
        self.request(|respond_to| EngineCmd::Submit { text, respond_to })
            .await?
    }

    /// Confirms the action attached to `entry`.
    pub async fn confirm(&self, entry: EntryId) -> Result<ConfirmOutcome, EngineError> {
        self.request(|respond_to| EngineCmd::Confirm {
            entry: Some(entry),
            respond_to,
        })
        .await?
    }

    /// Confirms the currently active control, if any.
    pub async fn confirm_pending(&self) -> Result<ConfirmOutcome, EngineError> {
        self.request(|respond_to| EngineCmd::Confirm {
            entry: None,
            respond_to,
        })
        .await?
    }

    pub async fn transcript(&self) -> Result<Vec<TranscriptEntry>, EngineError> {
        self.request(|respond_to| EngineCmd::Transcript { respond_to })
            .await
    }

    pub async fn last_booking(&self) -> Result<Option<BookingId>, EngineError> {
        self.request(|respond_to| EngineCmd::LastBooking { respond_to })
            .await
    }

    /// `true` from the start of a turn until its summary is delivered.
    pub fn is_in_flight(&self) -> bool {
        *self.in_flight.borrow()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(EngineCmd::Shutdown).await;
    }
}

#[async_trait]
impl MessageSubmitter for EngineHandle {
    async fn submit(&self, text: String) -> Result<TurnSummary, EngineError> {
        EngineHandle::submit(self, text).await
    }

    fn in_flight(&self) -> bool {
        self.is_in_flight()
    }
}

struct OpenTurn {
    turn: Turn,
    reader: FrameReader,
    chunks: ChunkStream,
    respond_to: oneshot::Sender<Result<TurnSummary, EngineError>>,
}

struct EngineState {
    session: ChatSession,
    api: Arc<dyn BookingApi>,
    chat: Arc<dyn ChatTransport>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl EngineState {
    fn emit_appended(&self, entry: &TranscriptEntry) {
        let _ = self.events.send(SessionEvent::EntryAppended(entry.clone()));
    }

    fn emit_updated(&self, id: EntryId) {
        if let Some(entry) = self.session.entry(id) {
            let _ = self.events.send(SessionEvent::EntryUpdated(entry.clone()));
        }
    }

    fn append(&mut self, role: Role, body: EntryBody) -> EntryId {
        let entry = self.session.push(role, body).clone();
        self.emit_appended(&entry);
        entry.id
    }

    fn set_body(&mut self, id: EntryId, body: EntryBody) {
        if self.session.set_body(id, body).is_some() {
            self.emit_updated(id);
        }
    }

    /// Starts a turn: user entry, loading bot entry, then the response stream.
    ///
    /// Returns `Err` with the finished summary when the stream cannot be opened.
    async fn begin_turn(&mut self, text: String) -> Result<(Turn, ChunkStream), TurnSummary> {
        if let Some(expired) = self.session.expire_pending() {
            self.emit_updated(expired);
        }

        self.append(Role::User, EntryBody::Plain(text.clone()));
        let bot = self.append(Role::Bot, EntryBody::Loading);
        let mut turn = Turn::new(text, bot);
        log::debug!("turn {} opened", turn.id().0);

        match self.chat.open_chat(turn.input()).await {
            Ok(chunks) => Ok((turn, chunks)),
            Err(e) => {
                log::warn!("turn {}: chat stream failed to open: {e:#}", turn.id().0);
                self.fail_transport(&mut turn, e.to_string());
                Err(turn.summary())
            }
        }
    }

    /// Applies every complete record; returns `true` once the turn is sealed.
    fn apply_records(&mut self, turn: &mut Turn, records: Vec<String>) -> bool {
        for record in records {
            match turn.apply_record(&record, self.session.last_booking()) {
                None => {}
                Some(TurnUpdate::Render(body)) => self.set_body(turn.entry(), body),
                Some(TurnUpdate::Action(action)) => {
                    let expired = self.session.pending_entry();
                    if self.session.attach_control(turn.entry(), action).is_some() {
                        if let Some(old) = expired.filter(|old| *old != turn.entry()) {
                            self.emit_updated(old);
                        }
                        self.emit_updated(turn.entry());
                    }
                }
                Some(TurnUpdate::Failed(content)) => {
                    self.session.remove_control(turn.entry());
                    self.set_body(turn.entry(), EntryBody::Plain(content));
                }
            }
            if turn.is_sealed() {
                return true;
            }
        }
        false
    }

    fn complete(&mut self, turn: &mut Turn) {
        if let Some(body) = turn.complete() {
            self.set_body(turn.entry(), body);
        }
    }

    fn fail_transport(&mut self, turn: &mut Turn, reason: String) {
        turn.fail_transport(reason);
        let body = EntryBody::Plain(CONNECTION_ERROR.into());
        if turn.has_text() {
            self.append(Role::Bot, body);
        } else {
            self.set_body(turn.entry(), body);
        }
    }
}

fn finish(open: OpenTurn, in_flight: &watch::Sender<bool>) {
    in_flight.send_replace(false);
    let summary = open.turn.summary();
    log::debug!(
        "turn {} closed: {:?}, {} event(s), {} skipped frame(s)",
        summary.turn_id.0,
        summary.end,
        open.turn.events().len(),
        summary.skipped_frames
    );
    let _ = open.respond_to.send(Ok(summary));
}

/// Spawns the conversation actor.
///
/// The returned receiver carries every change to the transcript in order.
pub fn spawn_engine(
    api: Arc<dyn BookingApi>,
    chat: Arc<dyn ChatTransport>,
) -> (EngineHandle, mpsc::UnboundedReceiver<SessionEvent>) {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<EngineCmd>(32);
    let (evt_tx, evt_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (in_flight_tx, in_flight_rx) = watch::channel(false);

    let mut state = EngineState {
        session: ChatSession::new(),
        api,
        chat,
        events: evt_tx,
    };

    tokio::spawn(async move {
        let mut open: Option<OpenTurn> = None;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    match cmd {
                        EngineCmd::Submit { text, respond_to } => {
                            if open.is_some() {
                                let _ = respond_to.send(Err(EngineError::TurnInFlight));
                                continue;
                            }
                            let text = text.trim().to_string();
                            if text.is_empty() {
                                let _ = respond_to.send(Err(EngineError::EmptyMessage));
                                continue;
                            }

                            in_flight_tx.send_replace(true);
                            match state.begin_turn(text).await {
                                Ok((turn, chunks)) => {
                                    open = Some(OpenTurn {
                                        turn,
                                        reader: FrameReader::new(),
                                        chunks,
                                        respond_to,
                                    });
                                }
                                Err(summary) => {
                                    in_flight_tx.send_replace(false);
                                    let _ = respond_to.send(Ok(summary));
                                }
                            }
                        }
                        EngineCmd::Confirm { entry, respond_to } => {
                            let target = entry.or(state.session.pending_entry());
                            let action = target.and_then(|id| state.session.take_pending(id));
                            let (Some(id), Some(action)) = (target, action) else {
                                let _ = respond_to.send(Err(EngineError::NoPendingAction));
                                continue;
                            };
                            state.emit_updated(id);

                            let outcome = run_confirmation(
                                state.api.as_ref(),
                                &mut state.session,
                                &state.events,
                                action,
                            )
                            .await;
                            let _ = respond_to.send(Ok(outcome));
                        }
                        EngineCmd::Transcript { respond_to } => {
                            let _ = respond_to.send(state.session.entries().to_vec());
                        }
                        EngineCmd::LastBooking { respond_to } => {
                            let _ = respond_to.send(state.session.last_booking());
                        }
                        EngineCmd::Shutdown => break,
                    }
                }

                chunk = async {
                    match open.as_mut() {
                        Some(o) => o.chunks.next().await,
                        None => std::future::pending().await,
                    }
                } => {
                    let Some(mut o) = open.take() else { continue; };
                    match chunk {
                        Some(Ok(bytes)) => {
                            let records = o.reader.push(&bytes);
                            if state.apply_records(&mut o.turn, records) {
                                finish(o, &in_flight_tx);
                            } else {
                                open = Some(o);
                            }
                        }
                        Some(Err(e)) => {
                            log::warn!("turn {}: stream broke off: {e:#}", o.turn.id().0);
                            state.fail_transport(&mut o.turn, e.to_string());
                            finish(o, &in_flight_tx);
                        }
                        None => {
                            if o.reader.has_pending() {
                                log::debug!("turn {}: stream ended mid-record", o.turn.id().0);
                            }
                            let last = o.reader.finish().into_iter().collect();
                            if !state.apply_records(&mut o.turn, last) {
                                state.complete(&mut o.turn);
                            }
                            finish(o, &in_flight_tx);
                        }
                    }
                }
            }
        }

        // Dropping `open` abandons the stream; its submitter sees `SessionClosed`.
        if let Some(o) = open {
            log::debug!("turn {} abandoned at shutdown", o.turn.id().0);
        }
        in_flight_tx.send_replace(false);
    });

    (
        EngineHandle {
            tx: cmd_tx,
            in_flight: in_flight_rx,
        },
        evt_rx,
    )
}
