//! Input/output DTOs and schema-bearing types
//!
//! Defines all data structures used in MCP tool contracts. Each type is
//! annotated with `JsonSchema` for automatic schema generation.

use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Metadata included in all tool responses
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Meta {
    /// Current UTC timestamp in RFC 3339 format with milliseconds
    pub now_utc: String,
    /// Tool execution duration in milliseconds
    pub duration_ms: u64,
}

impl Meta {
    /// Create metadata populated with current time and elapsed duration
    pub fn now(duration_ms: u64) -> Self {
        Self {
            now_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            duration_ms,
        }
    }
}

/// Standard response envelope for all tools
///
/// Wraps tool-specific data with human-readable summary and execution metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolEnvelope<T>
where
    T: JsonSchema,
{
    /// Human-readable summary of the operation outcome
    pub summary: String,
    /// Tool-specific data payload
    pub data: T,
    /// Execution metadata (timestamp, duration)
    pub meta: Meta,
}

/// Account metadata (no credentials)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountInfo {
    pub account_id: String,
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

/// Mailbox/folder metadata
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MailboxInfo {
    /// Mailbox name, decoded from IMAP modified UTF-7
    pub name: String,
    /// Hierarchy delimiter if supported by server (e.g., `/`, `.`)
    pub delimiter: Option<String>,
}

/// One message merged into bounded text for downstream model context
///
/// Built once per message and never mutated. `body` is always a prefix of
/// the body portion of `full_body`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedRecord {
    /// Subject header, or `(No Subject)`
    pub subject: String,
    /// Sender display name, address, or `Unknown`
    pub from: String,
    /// Formatted date, verbatim header text, or `Unknown Date`
    pub date: String,
    /// First 200 characters of the plain-text body
    pub body: String,
    /// First 10000 characters of the plain-text body plus attachment section
    pub full_body: String,
    /// Whether the message has at least one attachment
    pub has_attachments: bool,
}

/// Input: account_id only
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AccountOnlyInput {
    /// Account identifier (defaults to `"default"`)
    #[serde(default = "default_account_id")]
    pub account_id: String,
}

/// Input: query a mailbox and consolidate the newest matches
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConsolidateInput {
    /// Account identifier (defaults to `"default"`)
    #[serde(default = "default_account_id")]
    pub account_id: String,
    /// Mailbox to query (defaults to the configured mailbox, usually `INBOX`)
    pub mailbox: Option<String>,
    /// Sort key: `date` (default), `subject`, or `from`; always descending
    pub sort_by: Option<String>,
    /// Case-insensitive subject substring
    pub filter_subject: Option<String>,
    /// Case-insensitive sender substring
    pub filter_from: Option<String>,
}

/// Output of `mail_consolidate`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidateData {
    pub account_id: String,
    pub mailbox: String,
    /// Effective sort key after defaulting
    pub sort_by: String,
    /// Messages matched by the search before capping
    pub total_matched: usize,
    pub records: Vec<ConsolidatedRecord>,
}

/// Input: render previously consolidated records for the model window
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RenderContextInput {
    /// Selected records: a JSON array, or a string holding one
    pub selected_emails: serde_json::Value,
}

/// Output of `mail_render_context`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderContextData {
    /// Records rendered
    pub selected: usize,
    /// Entries dropped because they were not objects
    pub skipped: usize,
    /// Escaped HTML reference list
    pub reference_html: String,
    /// Escaped plain-text context block
    pub context_html: String,
}

/// Default value for `account_id` field
pub fn default_account_id() -> String {
    "default".to_owned()
}
