use roombot_core::types::BookingRecord;
use roombot_engine::session::{
    ControlState, EntryBody, EntryId, Role, SessionEvent, TranscriptEntry,
};
use std::collections::HashSet;
use tokio::sync::mpsc;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Turns the rendered HTML fragment of a bot entry into terminal text.
pub fn html_to_terminal(html: &str, ansi: bool) -> String {
    let (on, off) = if ansi { (BOLD, RESET) } else { ("", "") };
    html.replace("<br>", "\n")
        .replace("<strong>", on)
        .replace("</strong>", off)
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

pub fn entry_text(entry: &TranscriptEntry, ansi: bool) -> Option<String> {
    match &entry.body {
        EntryBody::Loading => None,
        EntryBody::Plain(s) => Some(s.clone()),
        EntryBody::Markdown { html, .. } => Some(html_to_terminal(html, ansi)),
    }
}

pub fn booking_line(b: &BookingRecord) -> String {
    let mut line = format!("#{} {} → {}  {}", b.id, b.start_time, b.end_time, b.room_label());
    if let Some(n) = b.attendees_count {
        line.push_str(&format!(" ({n}p)"));
    }
    if let Some(title) = b.title.as_deref().filter(|t| !t.trim().is_empty()) {
        line.push_str(&format!("  {title}"));
    }
    line
}

pub fn booking_list(list: &[BookingRecord]) -> Vec<String> {
    if list.is_empty() {
        return vec!["Aucune réservation.".into()];
    }
    list.iter().map(booking_line).collect()
}

#[derive(Debug, Default)]
pub struct Drained {
    pub lines: Vec<String>,
    pub bookings_changed: bool,
}

/// Prints each transcript entry once, in its final state.
#[derive(Debug)]
pub struct Printer {
    printed: HashSet<EntryId>,
    ansi: bool,
}

impl Printer {
    pub fn new(ansi: bool) -> Self {
        Self {
            printed: HashSet::new(),
            ansi,
        }
    }

    /// Consumes the queued events. `echo` is the line the user just typed;
    /// its entry is not repeated.
    pub fn drain(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<SessionEvent>,
        echo: Option<&str>,
    ) -> Drained {
        let mut latest: Vec<TranscriptEntry> = Vec::new();
        let mut out = Drained::default();

        while let Ok(ev) = events.try_recv() {
            match ev {
                SessionEvent::EntryAppended(e) | SessionEvent::EntryUpdated(e) => {
                    if self.printed.contains(&e.id) {
                        continue;
                    }
                    match latest.iter_mut().find(|l| l.id == e.id) {
                        Some(slot) => *slot = e,
                        None => latest.push(e),
                    }
                }
                SessionEvent::BookingsChanged => out.bookings_changed = true,
            }
        }

        for entry in latest {
            self.printed.insert(entry.id);
            let Some(text) = entry_text(&entry, self.ansi) else {
                continue;
            };
            match entry.role {
                Role::User if Some(text.as_str()) == echo => {}
                Role::User => out.lines.push(format!("· {text}")),
                Role::Bot => {
                    out.lines.push(format!("roombot> {text}"));
                    if let Some(c) = entry.control.as_ref() {
                        if c.state == ControlState::Active {
                            out.lines.push(format!("  [{}] tapez /confirm", c.label));
                        }
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roombot_core::types::{ActionKind, BookingId, RoomId};
    use roombot_engine::session::ConfirmControl;

    fn entry(id: u64, role: Role, body: EntryBody) -> TranscriptEntry {
        TranscriptEntry {
            id: EntryId(id),
            role,
            body,
            control: None,
        }
    }

    #[test]
    fn converts_rendered_markup() {
        let html = "<strong>Atlas</strong> &lt;6p&gt;<br>• R&amp;D";
        assert_eq!(html_to_terminal(html, false), "Atlas <6p>\n• R&D");
        assert_eq!(
            html_to_terminal("<strong>A</strong>", true),
            "\x1b[1mA\x1b[0m"
        );
    }

    #[test]
    fn formats_bookings() {
        let b = BookingRecord {
            id: BookingId(3),
            room_id: Some(RoomId(2)),
            room_name: None,
            start_time: "2025-01-06T10:00".into(),
            end_time: "2025-01-06T11:00".into(),
            attendees_count: Some(4),
            title: None,
            status: None,
        };
        assert_eq!(
            booking_line(&b),
            "#3 2025-01-06T10:00 → 2025-01-06T11:00  Salle 2 (4p)"
        );
        assert_eq!(booking_list(&[]), vec!["Aucune réservation."]);
    }

    #[test]
    fn prints_final_state_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(SessionEvent::EntryAppended(entry(
            0,
            Role::User,
            EntryBody::Plain("annule tout".into()),
        )))
        .unwrap();
        tx.send(SessionEvent::EntryAppended(entry(1, Role::Bot, EntryBody::Loading)))
            .unwrap();
        let mut bot = entry(
            1,
            Role::Bot,
            EntryBody::Markdown {
                source: "**Sûr** ?".into(),
                html: "<strong>Sûr</strong> ?".into(),
            },
        );
        bot.control = Some(ConfirmControl {
            label: "Tout Annuler".into(),
            kind: ActionKind::ConfirmCancelAll,
            state: ControlState::Active,
        });
        tx.send(SessionEvent::EntryUpdated(bot.clone())).unwrap();

        let mut p = Printer::new(false);
        let out = p.drain(&mut rx, Some("annule tout"));
        assert_eq!(
            out.lines,
            vec!["roombot> Sûr ?", "  [Tout Annuler] tapez /confirm"]
        );

        // Control state changes on printed entries are not repeated.
        bot.control.as_mut().unwrap().state = ControlState::Used;
        tx.send(SessionEvent::EntryUpdated(bot)).unwrap();
        tx.send(SessionEvent::BookingsChanged).unwrap();
        let out = p.drain(&mut rx, None);
        assert!(out.lines.is_empty());
        assert!(out.bookings_changed);
    }
}
