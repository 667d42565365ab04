use crate::engine::EngineError;
use crate::traits::MessageSubmitter;
use crate::turn::TurnSummary;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The message input field and its send action.
#[derive(Clone)]
pub struct Composer {
    input: Arc<watch::Sender<String>>,
    submitter: Arc<dyn MessageSubmitter>,
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composer")
            .field("input", &*self.input.borrow())
            .finish_non_exhaustive()
    }
}

impl Composer {
    pub fn new(submitter: Arc<dyn MessageSubmitter>) -> Self {
        let (input, _) = watch::channel(String::new());
        Self {
            input: Arc::new(input),
            submitter,
        }
    }

    pub fn input(&self) -> String {
        self.input.borrow().clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.input.send_replace(text.into());
    }

    pub fn clear(&self) {
        self.input.send_replace(String::new());
    }

    /// Takes the trimmed message out of the field, leaving it empty.
    ///
    /// A blank field is left untouched.
    pub fn take_message(&self) -> Option<String> {
        let message = self.input.borrow().trim().to_string();
        if message.is_empty() {
            return None;
        }
        self.clear();
        Some(message)
    }

    /// Submits the field's content. `Ok(None)` when there was nothing to send.
    ///
    /// A refused message goes back into the field.
    pub async fn send(&self) -> Result<Option<TurnSummary>, EngineError> {
        let Some(message) = self.take_message() else {
            return Ok(None);
        };
        match self.submitter.submit(message.clone()).await {
            Ok(summary) => Ok(Some(summary)),
            Err(e) => {
                restore(&self.input, message);
                Err(e)
            }
        }
    }

    /// Like `send`, but the field is read now and the submission runs on its own task.
    ///
    /// While a response is streaming nothing is sent and the field keeps its text.
    pub fn spawn_send(&self) -> Option<JoinHandle<Result<TurnSummary, EngineError>>> {
        if self.submitter.in_flight() {
            log::info!("response still streaming; message kept in the input field");
            return None;
        }
        let message = self.take_message()?;
        let submitter = self.submitter.clone();
        let input = self.input.clone();
        Some(tokio::spawn(async move {
            let res = submitter.submit(message.clone()).await;
            if let Err(e) = &res {
                log::warn!("submission failed: {e}");
                restore(&input, message);
            }
            res
        }))
    }
}

/// Puts a refused message back unless the user has typed something since.
fn restore(input: &watch::Sender<String>, message: String) {
    input.send_if_modified(|current| {
        if !current.trim().is_empty() {
            return false;
        }
        *current = message;
        true
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::TurnEnd;
    use async_trait::async_trait;
    use roombot_core::types::TurnId;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSubmitter {
        sent: Mutex<Vec<String>>,
        busy: bool,
    }

    #[async_trait]
    impl MessageSubmitter for RecordingSubmitter {
        async fn submit(&self, text: String) -> Result<TurnSummary, EngineError> {
            if self.busy {
                return Err(EngineError::TurnInFlight);
            }
            self.sent.lock().unwrap().push(text.clone());
            Ok(TurnSummary {
                turn_id: TurnId::new(),
                text,
                pending: None,
                end: TurnEnd::Completed,
                skipped_frames: 0,
            })
        }
    }

    fn busy() -> Arc<RecordingSubmitter> {
        Arc::new(RecordingSubmitter {
            busy: true,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn send_trims_and_clears() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let composer = Composer::new(submitter.clone());
        composer.set_input("  réserve la salle 2  ");

        let summary = composer.send().await.unwrap().unwrap();
        assert_eq!(summary.text, "réserve la salle 2");
        assert_eq!(composer.input(), "");
        assert_eq!(*submitter.sent.lock().unwrap(), vec!["réserve la salle 2"]);
    }

    #[tokio::test]
    async fn blank_input_sends_nothing() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let composer = Composer::new(submitter.clone());
        composer.set_input("   ");

        assert_eq!(composer.send().await.unwrap(), None);
        assert!(composer.spawn_send().is_none());
        assert!(submitter.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn refused_message_returns_to_the_field() {
        let composer = Composer::new(busy());
        composer.set_input("  annule ma réservation ");

        assert_eq!(composer.send().await, Err(EngineError::TurnInFlight));
        assert_eq!(composer.input(), "annule ma réservation");

        let task = composer.spawn_send().unwrap();
        assert_eq!(task.await.unwrap(), Err(EngineError::TurnInFlight));
        assert_eq!(composer.input(), "annule ma réservation");
    }

    #[tokio::test]
    async fn newer_text_is_not_overwritten_by_a_refused_message() {
        let composer = Composer::new(busy());
        composer.set_input("première");
        let task = composer.spawn_send().unwrap();
        composer.set_input("seconde");

        task.await.unwrap().unwrap_err();
        assert_eq!(composer.input(), "seconde");
    }
}
