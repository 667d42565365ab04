use regex::Regex;
use std::sync::OnceLock;

pub const LINE_BREAK: &str = "<br>";
pub const BULLET: &str = "• ";

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Non-greedy and non-empty: each `**` pairs with the nearest following `**`.
        Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex")
    })
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// Renders bot text into an HTML fragment.
///
/// Only three rules exist, applied in this order: newline to `<br>`,
/// `**text**` to `<strong>text</strong>`, and `- ` to a bullet glyph.
/// Always call this on the whole accumulated buffer; bold pairs may straddle
/// fragment boundaries.
pub fn render_markdown(text: &str) -> String {
    let mut out = escape_html(text);
    out = out.replace("\r\n", "\n").replace('\n', LINE_BREAK);
    out = bold_re()
        .replace_all(&out, "<strong>$1</strong>")
        .to_string();
    out.replace("- ", BULLET)
}

/// Joins the committed and in-progress parts of a dictation transcript.
pub fn join_committed_and_partial(committed: &str, partial: &str) -> String {
    let c = committed.trim();
    let p = partial.trim();

    if c.is_empty() {
        return p.to_string();
    }
    if p.is_empty() {
        return c.to_string();
    }
    format!("{c} {p}")
}
