use roombot_core::types::{ActionKind, BookingId, PendingAction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryBody {
    Loading,
    Plain(String),
    Markdown { source: String, html: String },
}

impl EntryBody {
    /// Raw text of the entry, without markup.
    pub fn text(&self) -> &str {
        match self {
            Self::Loading => "",
            Self::Plain(s) => s,
            Self::Markdown { source, .. } => source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlState {
    Active,
    Used,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmControl {
    pub label: String,
    pub kind: ActionKind,
    pub state: ControlState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: EntryId,
    pub role: Role,
    pub body: EntryBody,
    pub control: Option<ConfirmControl>,
}

/// Notifications for front-ends, in the order the session changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    EntryAppended(TranscriptEntry),
    EntryUpdated(TranscriptEntry),
    /// The user's bookings changed server-side; lists should refresh.
    BookingsChanged,
}

/// Conversation state owned by the engine actor.
///
/// At most one pending action exists at a time, and it belongs to the entry
/// whose control is `Active`.
#[derive(Debug, Default)]
pub struct ChatSession {
    entries: Vec<TranscriptEntry>,
    next_id: u64,
    pending: Option<(EntryId, PendingAction)>,
    last_booking: Option<BookingId>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&TranscriptEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut TranscriptEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub fn push(&mut self, role: Role, body: EntryBody) -> &TranscriptEntry {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(TranscriptEntry {
            id,
            role,
            body,
            control: None,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn set_body(&mut self, id: EntryId, body: EntryBody) -> Option<&TranscriptEntry> {
        let entry = self.entry_mut(id)?;
        entry.body = body;
        Some(entry)
    }

    /// Attaches the confirmation control for `action` to `id`.
    ///
    /// Any earlier pending action is expired first.
    pub fn attach_control(&mut self, id: EntryId, action: PendingAction) -> Option<&TranscriptEntry> {
        self.entry(id)?;
        self.expire_pending();
        let kind = action.kind();
        self.pending = Some((id, action));
        let entry = self.entry_mut(id)?;
        entry.control = Some(ConfirmControl {
            label: kind.label().to_string(),
            kind,
            state: ControlState::Active,
        });
        Some(entry)
    }

    /// Consumes the pending action if it belongs to `id`; the control becomes `Used`.
    pub fn take_pending(&mut self, id: EntryId) -> Option<PendingAction> {
        match &self.pending {
            Some((owner, _)) if *owner == id => {}
            _ => return None,
        }
        let (owner, action) = self.pending.take()?;
        self.set_control_state(owner, ControlState::Used);
        Some(action)
    }

    pub fn pending_entry(&self) -> Option<EntryId> {
        self.pending.as_ref().map(|(id, _)| *id)
    }

    /// Invalidates the pending action; returns the entry whose control expired.
    pub fn expire_pending(&mut self) -> Option<EntryId> {
        let (id, _) = self.pending.take()?;
        self.set_control_state(id, ControlState::Expired);
        Some(id)
    }

    /// Removes an active control from `id` together with its pending action.
    pub fn remove_control(&mut self, id: EntryId) -> bool {
        if self.pending_entry() != Some(id) {
            return false;
        }
        self.pending = None;
        match self.entry_mut(id) {
            Some(entry) => entry.control.take().is_some(),
            None => false,
        }
    }

    fn set_control_state(&mut self, id: EntryId, state: ControlState) {
        if let Some(control) = self.entry_mut(id).and_then(|e| e.control.as_mut()) {
            control.state = state;
        }
    }

    pub fn last_booking(&self) -> Option<BookingId> {
        self.last_booking
    }

    pub fn set_last_booking(&mut self, booking: Option<BookingId>) {
        self.last_booking = booking;
    }
}
