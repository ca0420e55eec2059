//! Payload and line encoding.
//!
//! Two escaping layers are nested:
//! 1. `encode_payload` builds `{"k1":"v1",...}` in call order and backslash-escapes
//!    quotes inside values. Keys are written verbatim and must not contain `"`.
//! 2. `quote_for_line` wraps that blob in double quotes and doubles every quote
//!    inside it, CSV style.
//!
//! Existing consumers read exactly this shape, so both layers stay. They are
//! only ever combined through `encode_payload_for_line`.

use std::borrow::Cow;

use crate::error::EncodingError;

pub fn encode_payload<K, V>(fields: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut blob = String::with_capacity(2 + fields.len() * 24);
    blob.push('{');
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            blob.push(',');
        }
        blob.push('"');
        blob.push_str(key.as_ref());
        blob.push_str("\":\"");
        blob.push_str(&value.as_ref().replace('"', "\\\""));
        blob.push('"');
    }
    blob.push('}');
    blob
}

pub fn quote_for_line(blob: &str) -> String {
    format!("\"{}\"", blob.replace('"', "\"\""))
}

/// The one place where the payload is prepared for a delimited line.
pub fn encode_payload_for_line<K, V>(fields: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    quote_for_line(&encode_payload(fields))
}

/// Minimal CSV quoting for plain columns.
pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(quote_for_line(value))
    } else {
        Cow::Borrowed(value)
    }
}

/// Flattens line breaks to spaces. Every written row is one physical line.
pub fn single_line(line: String) -> String {
    if line.contains(['\n', '\r']) {
        line.replace(['\n', '\r'], " ")
    } else {
        line
    }
}

/// Splits one CSV record, undoing quote doubling inside quoted fields.
pub fn split_csv_record(line: &str) -> Result<Vec<String>, EncodingError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => current.push(c),
            }
        } else {
            match c {
                ',' => fields.push(std::mem::take(&mut current)),
                '"' if current.is_empty() => in_quotes = true,
                _ => current.push(c),
            }
        }
    }

    if in_quotes {
        return Err(EncodingError::UnterminatedQuote);
    }
    fields.push(current);
    Ok(fields)
}

/// Inverse of `encode_payload`.
///
/// Values never contain a bare quote, but a value ending in a backslash makes
/// its terminator look escaped. A `\"` is read as backslash + terminator only
/// when what follows is the end of the blob or the start of the next key.
pub fn decode_payload(blob: &str) -> Result<Vec<(String, String)>, EncodingError> {
    let malformed = |offset: usize, reason: &'static str| EncodingError::Malformed { offset, reason };

    let bytes = blob.as_bytes();
    if bytes.first() != Some(&b'{') || bytes.last() != Some(&b'}') {
        return Err(malformed(0, "payload must be wrapped in braces"));
    }
    if blob.len() == 2 {
        return Ok(Vec::new());
    }

    let mut fields = Vec::new();
    let mut pos = 1;

    loop {
        if bytes.get(pos) != Some(&b'"') {
            return Err(malformed(pos, "expected key"));
        }
        let key_start = pos + 1;
        let key_end = blob[key_start..]
            .find('"')
            .map(|i| key_start + i)
            .ok_or(malformed(key_start, "unterminated key"))?;
        let key = blob[key_start..key_end].to_string();

        pos = key_end + 1;
        if !blob[pos..].starts_with(":\"") {
            return Err(malformed(pos, "expected :\""));
        }
        pos += 2;

        let mut value = String::new();
        loop {
            let rest = &blob[pos..];
            let mut chars = rest.chars();
            let c = chars.next().ok_or(malformed(pos, "unterminated value"))?;
            match c {
                '\\' if rest[1..].starts_with('"') => {
                    let after = &rest[2..];
                    if after == "}" || starts_next_field(after) {
                        value.push('\\');
                        pos += 2;
                        break;
                    }
                    value.push('"');
                    pos += 2;
                }
                '"' => {
                    pos += 1;
                    break;
                }
                _ => {
                    value.push(c);
                    pos += c.len_utf8();
                }
            }
        }
        fields.push((key, value));

        match bytes.get(pos) {
            Some(b',') => pos += 1,
            Some(b'}') if pos == blob.len() - 1 => return Ok(fields),
            _ => return Err(malformed(pos, "expected , or }")),
        }
    }
}

fn starts_next_field(after: &str) -> bool {
    let Some(rest) = after.strip_prefix(",\"") else {
        return false;
    };
    match rest.find('"') {
        Some(end) if end > 0 => rest[end..].starts_with("\":\""),
        _ => false,
    }
}

/// A unified-layout line taken apart again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub sim_time: String,
    pub wall_time: String,
    pub tag: String,
    pub payload: Vec<(String, String)>,
}

impl LogLine {
    pub fn parse(line: &str) -> Result<Self, EncodingError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut columns = split_csv_record(line)?;
        if columns.len() != 4 {
            return Err(EncodingError::Malformed {
                offset: 0,
                reason: "expected exactly 4 columns",
            });
        }
        let payload = decode_payload(&columns[3])?;
        columns.truncate(3);
        let tag = columns.pop().unwrap_or_default();
        let wall_time = columns.pop().unwrap_or_default();
        let sim_time = columns.pop().unwrap_or_default();
        Ok(Self {
            sim_time,
            wall_time,
            tag,
            payload,
        })
    }
}
