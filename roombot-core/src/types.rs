use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub i64);

impl std::fmt::Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Booking fields proposed by the assistant for a create or update.
///
/// Unknown fields are kept in `extra` so the body sent back to the server
/// is the payload the server produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: BookingId,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub room_name: Option<String>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub attendees_count: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl BookingRecord {
    pub fn room_label(&self) -> String {
        match (&self.room_name, self.room_id) {
            (Some(name), _) if !name.trim().is_empty() => name.clone(),
            (_, Some(id)) => format!("Salle {}", id.0),
            _ => "Salle ?".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ConfirmBooking,
    ConfirmModification,
    ConfirmCancel,
    ConfirmCancelAll,
}

impl ActionKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "confirm_booking" => Some(Self::ConfirmBooking),
            "confirm_modification" => Some(Self::ConfirmModification),
            "confirm_cancel" => Some(Self::ConfirmCancel),
            "confirm_cancel_all" => Some(Self::ConfirmCancelAll),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfirmBooking => "confirm_booking",
            Self::ConfirmModification => "confirm_modification",
            Self::ConfirmCancel => "confirm_cancel",
            Self::ConfirmCancelAll => "confirm_cancel_all",
        }
    }

    /// Label shown on the confirmation control.
    pub fn label(self) -> &'static str {
        match self {
            Self::ConfirmBooking => "Confirmer",
            Self::ConfirmModification => "Confirmer Modification",
            Self::ConfirmCancel => "Confirmer Annulation",
            Self::ConfirmCancelAll => "Tout Annuler",
        }
    }

    /// User-side entry appended when the control is clicked.
    pub fn progress_text(self) -> &'static str {
        match self {
            Self::ConfirmBooking => "Confirmation en cours...",
            Self::ConfirmModification => "Modification en cours...",
            Self::ConfirmCancel => "Annulation en cours...",
            Self::ConfirmCancelAll => "Annulation de toutes les réservations...",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PendingAction {
    ConfirmBooking(BookingDraft),
    ConfirmModification {
        booking_id: BookingId,
        draft: BookingDraft,
    },
    ConfirmCancel {
        booking_id: BookingId,
    },
    ConfirmCancelAll,
}

impl PendingAction {
    /// Builds a typed action from a server signal.
    ///
    /// Returns `None` for unknown kinds and for payloads missing what the kind needs.
    /// `last_booking` resolves follow-up references ("cancel it") when the payload
    /// carries no booking id.
    pub fn from_signal(
        kind: &str,
        payload: Option<&Value>,
        last_booking: Option<BookingId>,
    ) -> Option<Self> {
        let kind = ActionKind::parse(kind)?;
        match kind {
            ActionKind::ConfirmBooking => {
                let draft = parse_draft(payload?)?;
                Some(Self::ConfirmBooking(draft))
            }
            ActionKind::ConfirmModification => {
                let draft = parse_draft(payload?)?;
                let booking_id = draft.booking_id.or(last_booking)?;
                Some(Self::ConfirmModification { booking_id, draft })
            }
            ActionKind::ConfirmCancel => {
                let booking_id = payload
                    .and_then(|p| p.get("booking_id"))
                    .and_then(|v| serde_json::from_value::<BookingId>(v.clone()).ok())
                    .or(last_booking)?;
                Some(Self::ConfirmCancel { booking_id })
            }
            ActionKind::ConfirmCancelAll => Some(Self::ConfirmCancelAll),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::ConfirmBooking(_) => ActionKind::ConfirmBooking,
            Self::ConfirmModification { .. } => ActionKind::ConfirmModification,
            Self::ConfirmCancel { .. } => ActionKind::ConfirmCancel,
            Self::ConfirmCancelAll => ActionKind::ConfirmCancelAll,
        }
    }
}

fn parse_draft(payload: &Value) -> Option<BookingDraft> {
    if !payload.is_object() {
        return None;
    }
    serde_json::from_value(payload.clone()).ok()
}
