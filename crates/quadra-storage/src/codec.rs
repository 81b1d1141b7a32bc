//! Line codec for Record Log entries.
//!
//! A record is a sequence of fields joined by `|`. Inside a field, the
//! characters `\`, `|`, `,` and newline are backslash-escaped. A list field is
//! its elements, each escaped, joined by `,`. Nested records (a list whose
//! elements are themselves lists) escape the inner encoding once more as an
//! ordinary element, so any depth decodes unambiguously.
//!
//! An empty list encodes as an empty field.

use quadra_common::{QuadraError, Result};
use std::fmt::Display;
use std::str::FromStr;

/// Field delimiter.
pub const FIELD_DELIM: char = '|';

/// List element delimiter.
pub const LIST_DELIM: char = ',';

const ESCAPE: char = '\\';

/// Escapes every structural character in `s`.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// Reverses [`escape`]. A trailing lone backslash is kept literally.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push(ESCAPE),
        }
    }
    out
}

/// Splits `s` on every `delim` not preceded by an escape. Tokens keep their
/// escape sequences.
pub fn split_unescaped(s: &str, delim: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else if c == delim {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Encodes a list as a single field value.
pub fn join_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| escape(item.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Decodes a field value produced by [`join_list`].
pub fn split_list(s: &str) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    split_unescaped(s, LIST_DELIM)
        .into_iter()
        .map(unescape)
        .collect()
}

/// Builds one record line field by field.
#[derive(Debug, Default)]
pub struct RecordWriter {
    fields: Vec<String>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an escaped string field.
    pub fn str(&mut self, value: &str) -> &mut Self {
        self.fields.push(escape(value));
        self
    }

    /// Appends a numeric field.
    pub fn num<T: Display>(&mut self, value: T) -> &mut Self {
        self.fields.push(value.to_string());
        self
    }

    /// Appends a boolean as `1` or `0`.
    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.fields.push(if value { "1" } else { "0" }.to_string());
        self
    }

    /// Appends a list field.
    pub fn list<S: AsRef<str>>(&mut self, items: &[S]) -> &mut Self {
        self.fields.push(join_list(items));
        self
    }

    /// Appends a field that is already encoded, such as a nested record
    /// built with [`join_list`].
    pub fn raw(&mut self, encoded: String) -> &mut Self {
        self.fields.push(encoded);
        self
    }

    /// Consumes the writer into a record line (without trailing newline).
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.fields).join("|")
    }
}

/// Reads the fields of one record line in order.
#[derive(Debug)]
pub struct RecordReader<'a> {
    kind: &'static str,
    fields: Vec<&'a str>,
    pos: usize,
}

impl<'a> RecordReader<'a> {
    /// Splits `line` and checks that it has at least `min_fields` fields.
    pub fn new(kind: &'static str, line: &'a str, min_fields: usize) -> Result<Self> {
        let fields = split_unescaped(line, FIELD_DELIM);
        if fields.len() < min_fields {
            return Err(QuadraError::codec(
                kind,
                format!("expected {} fields, got {}", min_fields, fields.len()),
            ));
        }
        Ok(Self {
            kind,
            fields,
            pos: 0,
        })
    }

    /// Fields not yet read.
    pub fn remaining(&self) -> usize {
        self.fields.len() - self.pos
    }

    fn next_raw(&mut self) -> Result<&'a str> {
        let field = self
            .fields
            .get(self.pos)
            .copied()
            .ok_or_else(|| QuadraError::codec(self.kind, format!("missing field {}", self.pos)))?;
        self.pos += 1;
        Ok(field)
    }

    /// Reads an escaped string field.
    pub fn str(&mut self) -> Result<String> {
        Ok(unescape(self.next_raw()?))
    }

    /// Reads a non-empty string field.
    pub fn key(&mut self) -> Result<String> {
        let pos = self.pos;
        let value = self.str()?;
        if value.is_empty() {
            return Err(QuadraError::codec(self.kind, format!("field {} is an empty key", pos)));
        }
        Ok(value)
    }

    /// Reads a numeric field.
    pub fn num<T: FromStr>(&mut self) -> Result<T> {
        let pos = self.pos;
        let raw = self.next_raw()?;
        raw.trim().parse().map_err(|_| {
            QuadraError::codec(self.kind, format!("field {} is not a number: {:?}", pos, raw))
        })
    }

    /// Reads a `1`/`0` boolean field.
    pub fn bool(&mut self) -> Result<bool> {
        let pos = self.pos;
        match self.next_raw()? {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(QuadraError::codec(
                self.kind,
                format!("field {} is not a boolean: {:?}", pos, other),
            )),
        }
    }

    /// Reads a list field.
    pub fn list(&mut self) -> Result<Vec<String>> {
        Ok(split_list(self.next_raw()?))
    }

    /// Reads a field without unescaping it.
    pub fn raw(&mut self) -> Result<&'a str> {
        self.next_raw()
    }

    /// Builds a codec error for this record kind.
    pub fn error(&self, reason: impl Into<String>) -> QuadraError {
        QuadraError::codec(self.kind, reason)
    }
}
