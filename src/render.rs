//! Rendering of caller-selected records
//!
//! Two pure renderers over a [`SelectionSet`]: an HTML reference list and a
//! numbered plain-text context block for the language-model window. The
//! selection is rendered in the order the caller supplied it.

use serde_json::{Map, Value};

use crate::errors::{AppError, AppResult};

/// Line closing every numbered block of the context text
pub const CONTEXT_DELIMITER: &str = "-----------------------------------";

/// Reference fragment for an empty selection
pub const NO_SELECTION_HTML: &str = "<em>No emails selected.</em>";

/// One selected record as re-supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedEmail {
    pub from: String,
    pub subject: String,
    pub date: String,
    pub body: String,
    pub full_body: Option<String>,
}

impl SelectedEmail {
    /// Body used for model context: `full_body` when present, else `body`
    pub fn context_body(&self) -> &str {
        self.full_body.as_deref().unwrap_or(&self.body)
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            from: string_field(obj, "from").unwrap_or_default(),
            subject: string_field(obj, "subject").unwrap_or_default(),
            date: string_field(obj, "date").unwrap_or_default(),
            body: string_field(obj, "body").unwrap_or_default(),
            full_body: string_field(obj, "full_body"),
        }
    }
}

/// Ordered selection of previously consolidated records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    pub emails: Vec<SelectedEmail>,
    /// Entries dropped during decoding
    pub skipped: usize,
}

impl SelectionSet {
    /// Decode a caller payload: a JSON array, or a string holding one
    ///
    /// Non-object entries are dropped and counted; missing fields default to
    /// empty strings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the payload is not JSON or not an array.
    pub fn decode(payload: &Value) -> AppResult<Self> {
        let parsed;
        let value = match payload {
            Value::String(text) if text.trim().is_empty() => return Ok(Self::default()),
            Value::String(text) => {
                parsed = serde_json::from_str::<Value>(text).map_err(|e| {
                    AppError::InvalidInput(format!("selected_emails is not valid JSON: {e}"))
                })?;
                &parsed
            }
            Value::Null => return Ok(Self::default()),
            other => other,
        };

        let Value::Array(entries) = value else {
            return Err(AppError::invalid("selected_emails must be a JSON array"));
        };

        let mut set = Self::default();
        for (idx, entry) in entries.iter().enumerate() {
            match entry {
                Value::Object(obj) => set.emails.push(SelectedEmail::from_object(obj)),
                _ => {
                    tracing::warn!(index = idx, "dropping non-object selection entry");
                    set.skipped += 1;
                }
            }
        }
        Ok(set)
    }
}

/// Render the escaped HTML reference list
pub fn render_reference_list(emails: &[SelectedEmail]) -> String {
    if emails.is_empty() {
        return NO_SELECTION_HTML.to_owned();
    }
    emails
        .iter()
        .map(|email| {
            format!(
                "<div class=\"email-ref\"><strong>From:</strong> {}<br><strong>Subject:</strong> {}<br><strong>Date:</strong> {}</div>",
                html_escape(&email.from),
                html_escape(&email.subject),
                html_escape(&email.date)
            )
        })
        .collect()
}

/// Render the numbered plain-text context block (unescaped)
pub fn render_context_text(emails: &[SelectedEmail]) -> String {
    let mut text = String::new();
    for (i, email) in emails.iter().enumerate() {
        text.push_str(&format!(
            "Email #{}:\nFrom: {}\nSubject: {}\nDate: {}\nBody: {}\n{CONTEXT_DELIMITER}\n",
            i + 1,
            email.from,
            email.subject,
            email.date,
            email.context_body()
        ));
    }
    text
}

/// Render the context block escaped once for embedding in markup
pub fn render_context_html(emails: &[SelectedEmail]) -> String {
    html_escape(&render_context_text(emails))
}

/// Minimal HTML escaping for untrusted text
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// String view of an object field; other scalars are stringified
fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
