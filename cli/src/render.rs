//! Terminal rendering for the conversation.
//!
//! Everything here is presentation. `StreamView` is the only stateful piece:
//! it remembers how much of the current assistant message has been written so
//! each update prints just the appended suffix.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use wire::Citation;

use crate::session::{Conversation, TurnState};
use crate::transcript::{Role, Transcript};

const BUSY_INDICATOR: &str = "Asking Exa...";
const META_SEPARATOR: &str = " \u{2022} ";
const SNIPPET_WIDTH: usize = 96;
const SNIPPET_LINES: usize = 2;
const EMPTY_TRANSCRIPT: &str = "(no messages yet)";
const ELLIPSIS: &str = "...";
const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// INLINE LINKS
// =============================================================================

/// `[label](url)` with a non-empty label and url.
static LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("link pattern should compile"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Link { label: &'a str, url: &'a str },
}

/// Split `text` into plain runs and `[label](url)` links.
#[must_use]
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut plain_start = 0;

    for caps in LINK_REGEX.captures_iter(text) {
        let (Some(whole), Some(label), Some(url)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if whole.start() > plain_start {
            out.push(Segment::Text(&text[plain_start..whole.start()]));
        }
        out.push(Segment::Link { label: label.as_str(), url: url.as_str() });
        plain_start = whole.end();
    }
    if plain_start < text.len() {
        out.push(Segment::Text(&text[plain_start..]));
    }
    out
}

/// Render finished content with links shown as `label (url)`.
#[must_use]
pub fn format_content(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in segments(text) {
        match segment {
            Segment::Text(t) => out.push_str(t),
            Segment::Link { label, url } => {
                out.push_str(label);
                out.push_str(" (");
                out.push_str(url);
                out.push(')');
            }
        }
    }
    out
}

// =============================================================================
// CITATIONS
// =============================================================================

/// Title line, `author • date • url` line, then at most two snippet lines.
#[must_use]
pub fn format_citation(citation: &Citation) -> Vec<String> {
    let title = if citation.title.trim().is_empty() { &citation.url } else { &citation.title };
    let mut lines = vec![title.clone()];

    let mut meta: Vec<Cow<'_, str>> = Vec::new();
    if let Some(author) = citation.author.as_deref().filter(|a| !a.is_empty()) {
        meta.push(Cow::Borrowed(author));
    }
    if let Some(date) = citation.published_date.as_deref().filter(|d| !d.is_empty()) {
        meta.push(display_date(date));
    }
    meta.push(Cow::Borrowed(citation.url.as_str()));
    lines.push(meta.join(META_SEPARATOR));

    lines.extend(clamp_snippet(&citation.snippet, SNIPPET_WIDTH, SNIPPET_LINES));
    lines
}

/// `YYYY-MM-DD` from an RFC 3339 timestamp or a bare date; anything else is
/// shown as-is.
fn display_date(raw: &str) -> Cow<'_, str> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Cow::Owned(timestamp.format(DATE_FORMAT).to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Cow::Owned(date.format(DATE_FORMAT).to_string());
    }
    Cow::Borrowed(raw)
}

/// Word-wrap `text` to `width` terminal columns and keep at most `max_lines`,
/// marking truncation with an ellipsis. Words wider than a line are broken.
fn clamp_snippet(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut truncated = false;

    'words: for word in text.split_whitespace() {
        for piece in break_to_width(word, width) {
            let separator = usize::from(!current.is_empty());
            if !current.is_empty() && current.width() + separator + piece.width() > width {
                if lines.len() + 1 == max_lines {
                    truncated = true;
                    break 'words;
                }
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(piece);
        }
    }
    if truncated {
        while current.width() + ELLIPSIS.width() > width && current.pop().is_some() {}
        current.truncate(current.trim_end().len());
        current.push_str(ELLIPSIS);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Split a single word into pieces no wider than `width` columns.
fn break_to_width(word: &str, width: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut columns = 0;
    for (index, ch) in word.char_indices() {
        let w = ch.width().unwrap_or(0);
        if columns + w > width && index > start {
            pieces.push(&word[start..index]);
            start = index;
            columns = 0;
        }
        columns += w;
    }
    pieces.push(&word[start..]);
    pieces
}

// =============================================================================
// STREAM VIEW
// =============================================================================

/// Incremental printer for the current assistant message.
pub struct StreamView<W: Write> {
    out: W,
    message_id: Option<String>,
    printed: usize,
    state: TurnState,
    line_open: bool,
}

impl<W: Write> StreamView<W> {
    pub fn new(out: W) -> Self {
        Self { out, message_id: None, printed: 0, state: TurnState::Idle, line_open: false }
    }

    /// Bring the terminal up to date with `conversation`.
    ///
    /// # Errors
    ///
    /// Propagates write errors from the underlying writer.
    pub fn update(&mut self, conversation: &Conversation) -> io::Result<()> {
        let Some(message) = conversation.current_assistant() else {
            return Ok(());
        };
        if self.message_id.as_deref() != Some(message.id.as_str()) {
            self.close_line()?;
            self.message_id = Some(message.id.clone());
            self.printed = 0;
            self.state = TurnState::Idle;
        }

        let state = conversation.state();
        if state == self.state && message.content.len() == self.printed {
            return Ok(());
        }

        match state {
            TurnState::Idle => {}
            TurnState::AwaitingFirstByte => {
                if self.state != TurnState::AwaitingFirstByte {
                    writeln!(self.out, "{BUSY_INDICATOR}")?;
                }
            }
            TurnState::Streaming => self.write_suffix(&message.content)?,
            TurnState::Complete => {
                self.write_suffix(&message.content)?;
                self.close_line()?;
                if let Some(citations) = message.citations.as_deref().filter(|c| !c.is_empty()) {
                    write_sources(&mut self.out, citations)?;
                }
            }
            TurnState::Errored => {
                self.close_line()?;
                writeln!(self.out, "{}", message.content)?;
                self.printed = message.content.len();
            }
            TurnState::Cancelled => self.close_line()?,
        }
        self.state = state;
        self.out.flush()
    }

    fn write_suffix(&mut self, content: &str) -> io::Result<()> {
        let Some(suffix) = content.get(self.printed..) else {
            return Ok(());
        };
        if suffix.is_empty() {
            return Ok(());
        }
        self.out.write_all(suffix.as_bytes())?;
        self.printed = content.len();
        self.line_open = !suffix.ends_with('\n');
        Ok(())
    }

    fn close_line(&mut self) -> io::Result<()> {
        if self.line_open {
            writeln!(self.out)?;
            self.line_open = false;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

fn write_sources<W: Write>(out: &mut W, citations: &[Citation]) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Sources:")?;
    for (index, citation) in citations.iter().enumerate() {
        let mut lines = format_citation(citation).into_iter();
        if let Some(title) = lines.next() {
            writeln!(out, "  [{}] {title}", index + 1)?;
        }
        for line in lines {
            writeln!(out, "      {line}")?;
        }
    }
    Ok(())
}

/// Print the whole transcript with links and citations formatted.
///
/// # Errors
///
/// Propagates write errors from `out`.
pub fn print_transcript<W: Write>(out: &mut W, transcript: &Transcript) -> io::Result<()> {
    if transcript.is_empty() {
        writeln!(out, "{EMPTY_TRANSCRIPT}")?;
        return out.flush();
    }
    for message in transcript.messages() {
        writeln!(out, "{}: {}", message.role.label(), format_content(&message.content))?;
        if message.role == Role::Assistant {
            if let Some(citations) = message.citations.as_deref().filter(|c| !c.is_empty()) {
                write_sources(out, citations)?;
            }
        }
    }
    out.flush()
}
