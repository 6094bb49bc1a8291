//! Per-message consolidation
//!
//! Builds one bounded [`ConsolidatedRecord`] from a message view. Every
//! missing field degrades to a fixed default; nothing here fails.

use crate::attachments::{AttachmentPart, extract_attachments};
use crate::dates::resolve_date;
use crate::mime::{TextBody, truncate_chars};
use crate::models::ConsolidatedRecord;

/// Characters of plain text kept in `body`
pub const BODY_PREVIEW_CHARS: usize = 200;
/// Characters of plain text kept at the start of `full_body`
pub const BODY_MAX_CHARS: usize = 10_000;
/// Delimiter line opening the attachment section of `full_body`
pub const ATTACHMENTS_HEADING: &str = "--- ATTACHMENTS ---";

const UNKNOWN_SENDER: &str = "Unknown";
const NO_SUBJECT: &str = "(No Subject)";

/// Sender information as reported by the message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    /// Display name of the first `From` address
    pub name: Option<String>,
    /// Bare address of the first `From` address
    pub address: Option<String>,
    /// Decoded `From` header text
    pub raw: Option<String>,
}

impl Sender {
    /// Name to show: display name, else address, else raw header text
    pub fn display_name(&self) -> String {
        [&self.name, &self.address, &self.raw]
            .into_iter()
            .flatten()
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
            .unwrap_or(UNKNOWN_SENDER)
            .to_owned()
    }
}

/// Read access to one fetched message
pub trait MessageView {
    type Attachment: AttachmentPart;

    /// Decoded value of the first header named `name`
    fn header(&self, name: &str) -> Option<String>;

    /// Undecoded value of the first header named `name`
    fn raw_header(&self, name: &str) -> Option<String>;

    /// Store-side arrival date, if known
    fn internal_date(&self) -> Option<&str>;

    fn sender(&self) -> Sender;

    /// Primary text body
    fn text_body(&self) -> Option<TextBody>;

    fn attachments(&self) -> &[Self::Attachment];
}

/// Consolidate one message into a bounded record
///
/// `date_format` is the `strftime` pattern used when a timestamp resolves.
pub fn summarize<M: MessageView + ?Sized>(message: &M, date_format: &str) -> ConsolidatedRecord {
    let subject = message
        .header("Subject")
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NO_SUBJECT.to_owned());

    let from = message.sender().display_name();

    let date = resolve_date(
        message.header("Date").as_deref(),
        message.internal_date(),
        message.raw_header("Date").as_deref(),
    )
    .display(date_format);

    let plain = message
        .text_body()
        .map(TextBody::into_plain)
        .unwrap_or_default();
    let body = plain.chars().take(BODY_PREVIEW_CHARS).collect::<String>();
    let mut full_body = truncate_chars(plain, BODY_MAX_CHARS);

    let attachments = message.attachments();
    let attachment_text = extract_attachments(attachments);
    if !attachment_text.is_empty() {
        full_body.push_str("\n\n");
        full_body.push_str(ATTACHMENTS_HEADING);
        full_body.push('\n');
        full_body.push_str(&attachment_text);
    }

    ConsolidatedRecord {
        subject,
        from,
        date,
        body,
        full_body,
        has_attachments: !attachments.is_empty(),
    }
}
