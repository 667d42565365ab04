//! Executes a confirmed action against the booking service.
//!
//! Every confirmation appends a progress entry for the user, runs exactly one
//! mutation command and appends its outcome. On success the bookings list is
//! signalled to refresh and the server's conversational context is synced so a
//! later "cancel it" resolves to the right booking.

use crate::session::{ChatSession, EntryBody, Role, SessionEvent};
use crate::traits::{BookingApi, CommandError};
use roombot_core::types::{ActionKind, BookingId, PendingAction};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

const CANCEL_ALL_FALLBACK: &str = "Toutes vos réservations ont été annulées.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmOutcome {
    Succeeded {
        kind: ActionKind,
        booking_id: Option<BookingId>,
    },
    Failed {
        kind: ActionKind,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextSync {
    Set(BookingId),
    Clear,
}

struct Success {
    text: String,
    sync: ContextSync,
}

pub(crate) async fn run_confirmation(
    api: &dyn BookingApi,
    session: &mut ChatSession,
    events: &UnboundedSender<SessionEvent>,
    action: PendingAction,
) -> ConfirmOutcome {
    let kind = action.kind();
    append(session, events, Role::User, kind.progress_text().to_string());

    match execute(api, &action).await {
        Ok(Success { text, sync }) => {
            append(session, events, Role::Bot, text);
            let _ = events.send(SessionEvent::BookingsChanged);

            let booking_id = match sync {
                ContextSync::Set(id) => Some(id),
                ContextSync::Clear => None,
            };
            session.set_last_booking(booking_id);
            sync_context(api, sync).await;

            ConfirmOutcome::Succeeded { kind, booking_id }
        }
        Err(e) => {
            log::warn!("{} failed: {e:#}", kind.as_str());
            let message = e.user_message();
            append(session, events, Role::Bot, format!("❌ Erreur: {message}"));
            ConfirmOutcome::Failed { kind, message }
        }
    }
}

async fn execute(api: &dyn BookingApi, action: &PendingAction) -> Result<Success, CommandError> {
    match action {
        PendingAction::ConfirmBooking(draft) => {
            let record = api.create_booking(draft).await?;
            Ok(Success {
                text: format!("✅ Réservation confirmée ! ID: {}", record.id),
                sync: ContextSync::Set(record.id),
            })
        }
        PendingAction::ConfirmModification { booking_id, draft } => {
            let record = api.update_booking(*booking_id, draft).await?;
            Ok(Success {
                text: format!("✅ Réservation modifiée ! ID: {}", record.id),
                sync: ContextSync::Set(record.id),
            })
        }
        PendingAction::ConfirmCancel { booking_id } => {
            api.delete_booking(*booking_id).await?;
            Ok(Success {
                text: "✅ Réservation annulée.".into(),
                sync: ContextSync::Clear,
            })
        }
        PendingAction::ConfirmCancelAll => {
            let message = api.delete_all_bookings().await?;
            Ok(Success {
                text: format!(
                    "✅ {}",
                    message.as_deref().unwrap_or(CANCEL_ALL_FALLBACK)
                ),
                sync: ContextSync::Clear,
            })
        }
    }
}

async fn sync_context(api: &dyn BookingApi, sync: ContextSync) {
    let res = match sync {
        ContextSync::Set(id) => api.set_context(id).await,
        ContextSync::Clear => api.clear_context().await,
    };
    if let Err(e) = res {
        log::warn!("context sync failed: {e:#}");
    }
}

fn append(
    session: &mut ChatSession,
    events: &UnboundedSender<SessionEvent>,
    role: Role,
    text: String,
) {
    let entry = session.push(role, EntryBody::Plain(text)).clone();
    let _ = events.send(SessionEvent::EntryAppended(entry));
}
