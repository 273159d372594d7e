//! Shared wire model and line codec for the answer relay.
//!
//! This crate owns the newline-delimited JSON representation used by both
//! `server` (encoder) and `cli` (decoder). Every line on the wire carries
//! exactly one [`WireRecord`]; a record never spans lines and a line never
//! carries more than one record.

use serde::{Deserialize, Serialize, Serializer};

/// Error returned by [`decode_record`] and [`RecordDecoder`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The line is not valid JSON, or matches neither record shape.
    #[error("invalid wire record: {0}")]
    Json(#[from] serde_json::Error),
    /// A content record arrived with an empty `choices` array.
    #[error("content record has no choices")]
    EmptyChoices,
    /// The line contained only whitespace.
    #[error("blank line")]
    Blank,
    /// The line was not valid UTF-8.
    #[error("line is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

// =============================================================================
// CITATION
// =============================================================================

/// A source reference supporting part of an answer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// ISO-8601 date string as reported by the upstream.
    #[serde(rename = "publishedDate", default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

// =============================================================================
// WIRE RECORD
// =============================================================================

/// One line of the relay protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireRecord {
    /// Replaces the full citation list of the current answer.
    CitationUpdate(Vec<Citation>),
    /// Text fragment to append to the current answer. May be empty.
    ContentDelta(String),
}

impl Serialize for WireRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::CitationUpdate(citations) => CitationsRef { citations }.serialize(serializer),
            Self::ContentDelta(content) => ChoicesRef { choices: [ChoiceRef { delta: DeltaRef { content } }] }
                .serialize(serializer),
        }
    }
}

#[derive(Serialize)]
struct CitationsRef<'a> {
    citations: &'a [Citation],
}

#[derive(Serialize)]
struct ChoicesRef<'a> {
    choices: [ChoiceRef<'a>; 1],
}

#[derive(Serialize)]
struct ChoiceRef<'a> {
    delta: DeltaRef<'a>,
}

#[derive(Serialize)]
struct DeltaRef<'a> {
    content: &'a str,
}

/// Decode-side mirror of the two record shapes. `deny_unknown_fields` makes an
/// object carrying both `citations` and `choices` match neither variant.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRecord {
    Citations(RawCitations),
    Choices(RawChoices),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCitations {
    citations: Vec<Citation>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChoices {
    choices: Vec<RawChoice>,
}

#[derive(Deserialize)]
struct RawChoice {
    #[serde(default)]
    delta: RawDelta,
}

#[derive(Default, Deserialize)]
struct RawDelta {
    #[serde(default)]
    content: Option<String>,
}

impl TryFrom<RawRecord> for WireRecord {
    type Error = CodecError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        match raw {
            RawRecord::Citations(c) => Ok(Self::CitationUpdate(c.citations)),
            RawRecord::Choices(c) => {
                let choice = c
                    .choices
                    .into_iter()
                    .next()
                    .ok_or(CodecError::EmptyChoices)?;
                Ok(Self::ContentDelta(choice.delta.content.unwrap_or_default()))
            }
        }
    }
}

// =============================================================================
// LINE CODEC
// =============================================================================

/// Encode a record as one JSON object followed by a single `\n`.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_record(record: &WireRecord) -> Result<String, CodecError> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

/// Decode one line into a record.
///
/// # Errors
///
/// Returns [`CodecError::Blank`] for whitespace-only input, and
/// [`CodecError::Json`] / [`CodecError::EmptyChoices`] when the line does not
/// hold exactly one of the two record shapes.
pub fn decode_record(line: &str) -> Result<WireRecord, CodecError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(CodecError::Blank);
    }
    let raw: RawRecord = serde_json::from_str(trimmed)?;
    WireRecord::try_from(raw)
}

// =============================================================================
// INCREMENTAL DECODER
// =============================================================================

/// Splits an arbitrarily chunked byte stream into records.
///
/// Bytes are buffered until a newline arrives, so a line (or a multi-byte
/// UTF-8 sequence) split across transport chunks decodes exactly once.
/// Blank lines produce nothing.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    buffer: Vec<u8>,
}

impl RecordDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes and decode every line they complete, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<WireRecord, CodecError>> {
        self.buffer.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(result) = decode_line_bytes(&line[..pos]) {
                out.push(result);
            }
        }
        out
    }

    /// Decode whatever is left in the buffer as a final, unterminated line.
    pub fn finish(&mut self) -> Option<Result<WireRecord, CodecError>> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line_bytes(&rest)
    }

    /// Number of bytes held waiting for a newline.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line_bytes(bytes: &[u8]) -> Option<Result<WireRecord, CodecError>> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return Some(Err(CodecError::Utf8(e))),
    };
    if text.trim().is_empty() {
        return None;
    }
    Some(decode_record(text))
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
