use crate::session::{EntryBody, EntryId};
use roombot_core::text::render_markdown;

/// Builds the displayed body of one bot entry from ordered text fragments.
///
/// The whole buffer is re-rendered on every fragment so that markup split
/// across fragments (`**Sal` + `le**`) renders correctly.
#[derive(Debug)]
pub struct RenderAccumulator {
    entry: EntryId,
    buffer: String,
    started: bool,
}

impl RenderAccumulator {
    pub fn new(entry: EntryId) -> Self {
        Self {
            entry,
            buffer: String::new(),
            started: false,
        }
    }

    pub fn entry(&self) -> EntryId {
        self.entry
    }

    /// True once the loading placeholder has been replaced.
    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn push(&mut self, fragment: &str) -> EntryBody {
        self.started = true;
        self.buffer.push_str(fragment);
        self.body()
    }

    pub fn body(&self) -> EntryBody {
        EntryBody::Markdown {
            source: self.buffer.clone(),
            html: render_markdown(&self.buffer),
        }
    }

    /// Body for a stream that ended normally.
    ///
    /// Only needed when no fragment ever arrived; the placeholder is cleared to an
    /// empty body.
    pub fn finish(&mut self) -> Option<EntryBody> {
        if self.started {
            return None;
        }
        self.started = true;
        Some(self.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_bold_renders_once_complete() {
        let mut acc = RenderAccumulator::new(EntryId(1));
        let first = acc.push("**Sal");
        assert_eq!(
            first,
            EntryBody::Markdown {
                source: "**Sal".into(),
                html: "**Sal".into()
            }
        );

        let second = acc.push("le** réservée");
        let EntryBody::Markdown { html, .. } = second else {
            panic!("expected markdown");
        };
        assert_eq!(html, "<strong>Salle</strong> réservée");
    }

    #[test]
    fn incremental_render_matches_single_pass() {
        let fragments = ["Voici ", "vos **réser", "vations** :\n- ", "Salle A", "\n- Salle <B>"];
        let mut acc = RenderAccumulator::new(EntryId(1));
        let mut last = EntryBody::Loading;
        for f in fragments {
            last = acc.push(f);
        }
        let whole = fragments.concat();
        assert_eq!(
            last,
            EntryBody::Markdown {
                html: render_markdown(&whole),
                source: whole,
            }
        );
    }

    #[test]
    fn first_fragment_clears_placeholder_once() {
        let mut acc = RenderAccumulator::new(EntryId(4));
        assert!(!acc.has_started());
        acc.push("");
        assert!(acc.has_started());
        assert_eq!(acc.finish(), None);
    }

    #[test]
    fn empty_stream_finishes_with_empty_body() {
        let mut acc = RenderAccumulator::new(EntryId(4));
        assert_eq!(
            acc.finish(),
            Some(EntryBody::Markdown {
                source: String::new(),
                html: String::new()
            })
        );
    }
}
