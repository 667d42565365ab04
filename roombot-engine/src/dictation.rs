//! Voice dictation into the composer.
//!
//! One recognition session at a time. Results overwrite the input field with
//! `committed + " " + interim`; a quiet period of `silence_timeout` after the
//! last result ends the session and sends the field like a manual send.

use crate::composer::Composer;
use crate::traits::{RecognitionEvent, RecognitionOptions, SpeechRecognizer};
use roombot_core::config::ClientConfig;
use roombot_core::text::join_committed_and_partial;
use std::future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictationState {
    Idle,
    Listening,
}

#[derive(Debug, Error)]
pub enum DictationError {
    #[error("speech recognition failed to start: {0:#}")]
    Start(anyhow::Error),
    #[error("dictation controller closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictationConfig {
    pub language: String,
    pub silence_timeout: Duration,
}

impl DictationConfig {
    pub fn from_client_config(cfg: &ClientConfig) -> Self {
        Self {
            language: cfg.language.clone(),
            silence_timeout: Duration::from_millis(cfg.silence_timeout_ms),
        }
    }
}

#[derive(Debug)]
enum DictationCmd {
    Toggle {
        respond_to: oneshot::Sender<Result<DictationState, DictationError>>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Toggle,
    Silence,
    Ended,
    Failed,
}

impl StopReason {
    fn submits(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct DictationController {
    tx: mpsc::Sender<DictationCmd>,
    state: watch::Receiver<DictationState>,
}

impl DictationController {
    /// Builds the controller when speech recognition is available.
    ///
    /// `None` means the front-end should hide the dictation affordance.
    pub fn detect(
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
        composer: Composer,
        cfg: DictationConfig,
    ) -> Option<Self> {
        let recognizer = recognizer?;
        Some(spawn_controller(recognizer, composer, cfg))
    }

    /// Starts listening when idle, stops (and sends) when listening.
    pub async fn toggle(&self) -> Result<DictationState, DictationError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(DictationCmd::Toggle { respond_to: tx })
            .await
            .map_err(|_| DictationError::Closed)?;
        rx.await.map_err(|_| DictationError::Closed)?
    }

    pub fn state(&self) -> DictationState {
        *self.state.borrow()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(DictationCmd::Shutdown).await;
    }
}

struct Listening {
    events: mpsc::Receiver<RecognitionEvent>,
    committed: String,
    interim: String,
}

fn spawn_controller(
    recognizer: Arc<dyn SpeechRecognizer>,
    composer: Composer,
    cfg: DictationConfig,
) -> DictationController {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<DictationCmd>(16);
    let (state_tx, state_rx) = watch::channel(DictationState::Idle);

    tokio::spawn(async move {
        let mut session: Option<Listening> = None;
        // Kept apart from `session` so both can be awaited in the same `select!`.
        let mut silence: Option<Pin<Box<Sleep>>> = None;

        let stop = |session: &mut Option<Listening>,
                    silence: &mut Option<Pin<Box<Sleep>>>,
                    reason: StopReason| {
            *silence = None;
            if session.take().is_none() {
                return;
            }
            state_tx.send_replace(DictationState::Idle);
            log::debug!("dictation stopped: {reason:?}");
            if reason.submits() {
                let _ = composer.spawn_send();
            }
        };

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(DictationCmd::Toggle { respond_to }) => {
                            if session.is_some() {
                                recognizer.stop().await;
                                stop(&mut session, &mut silence, StopReason::Toggle);
                                let _ = respond_to.send(Ok(DictationState::Idle));
                                continue;
                            }

                            composer.clear();
                            silence = None;
                            let options = RecognitionOptions {
                                continuous: true,
                                interim_results: true,
                                language: cfg.language.clone(),
                            };
                            match recognizer.start(options).await {
                                Ok(events) => {
                                    session = Some(Listening {
                                        events,
                                        committed: String::new(),
                                        interim: String::new(),
                                    });
                                    state_tx.send_replace(DictationState::Listening);
                                    let _ = respond_to.send(Ok(DictationState::Listening));
                                }
                                Err(e) => {
                                    log::warn!("speech recognition failed to start: {e:#}");
                                    let _ = respond_to.send(Err(DictationError::Start(e)));
                                }
                            }
                        }
                        Some(DictationCmd::Shutdown) | None => {
                            silence = None;
                            if session.take().is_some() {
                                recognizer.stop().await;
                                state_tx.send_replace(DictationState::Idle);
                            }
                            break;
                        }
                    }
                }

                ev = async {
                    match session.as_mut() {
                        Some(s) => s.events.recv().await,
                        None => future::pending().await,
                    }
                } => {
                    let Some(s) = session.as_mut() else { continue; };
                    match ev {
                        Some(RecognitionEvent::Interim(text)) => {
                            s.interim = text;
                        }
                        Some(RecognitionEvent::Final(text)) => {
                            if !s.committed.is_empty() && !s.committed.ends_with(' ') {
                                s.committed.push(' ');
                            }
                            s.committed.push_str(text.trim());
                            s.interim.clear();
                        }
                        Some(RecognitionEvent::Error(e)) => {
                            log::warn!("speech recognition error: {e}");
                            stop(&mut session, &mut silence, StopReason::Failed);
                            continue;
                        }
                        Some(RecognitionEvent::End) | None => {
                            stop(&mut session, &mut silence, StopReason::Ended);
                            continue;
                        }
                    }
                    composer.set_input(join_committed_and_partial(&s.committed, &s.interim));
                    silence = Some(Box::pin(tokio::time::sleep(cfg.silence_timeout)));
                }

                _ = async {
                    match silence.as_mut() {
                        Some(sleep) => sleep.as_mut().await,
                        None => future::pending::<()>().await,
                    }
                } => {
                    recognizer.stop().await;
                    stop(&mut session, &mut silence, StopReason::Silence);
                }
            }
        }
    });

    DictationController {
        tx: cmd_tx,
        state: state_rx,
    }
}
