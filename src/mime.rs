//! Message parsing and MIME handling
//!
//! Wraps a `mailparse` tree in a [`MessageView`]: picks the primary text body,
//! classifies attachment leaves, and decodes attachment content only on
//! demand. HTML bodies are sanitized with `ammonia` before `html2text`
//! flattens them.

use std::collections::{BTreeMap, HashSet};

use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};

use crate::attachments::AttachmentPart;
use crate::errors::{AppError, AppResult};
use crate::summarize::{MessageView, Sender};

/// Wrap width for HTML bodies flattened to text
const HTML_TEXT_WIDTH: usize = 120;

/// Primary text body of a message, before markup stripping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextBody {
    Plain(String),
    Html(String),
}

impl TextBody {
    /// Plain-text rendering of the body
    ///
    /// Plain parts are tag-stripped too; some mailers put markup in them.
    pub fn into_plain(self) -> String {
        match self {
            Self::Plain(text) => strip_tags(&text),
            Self::Html(html) => html_to_text(&html),
        }
    }
}

/// Parsed message borrowed from a `mailparse` tree
pub struct MimeMessage<'a> {
    mail: &'a ParsedMail<'a>,
    internal_date: Option<&'a str>,
    plain: Option<&'a ParsedMail<'a>>,
    html: Option<&'a ParsedMail<'a>>,
    attachments: Vec<MimeAttachment<'a>>,
}

impl<'a> MimeMessage<'a> {
    /// Index the MIME tree of `mail`
    ///
    /// `internal_date` is the store's arrival timestamp, if it reported one.
    pub fn new(mail: &'a ParsedMail<'a>, internal_date: Option<&'a str>) -> Self {
        let mut message = Self {
            mail,
            internal_date,
            plain: None,
            html: None,
            attachments: Vec::new(),
        };
        message.walk_parts(mail, "1".to_owned());
        message
    }

    /// Walk the MIME tree, recording body candidates and attachment leaves
    fn walk_parts(&mut self, part: &'a ParsedMail<'a>, part_id: String) {
        if part.subparts.is_empty() {
            let ctype = part.ctype.mimetype.to_ascii_lowercase();
            let disp = part.get_content_disposition();
            let filename = attachment_filename(part, &disp.params);
            let is_attachment =
                disp.disposition == DispositionType::Attachment || filename.is_some();

            if is_attachment {
                self.attachments.push(MimeAttachment {
                    part,
                    part_id,
                    media_type: ctype,
                    filename,
                });
            } else if ctype == "text/plain" && self.plain.is_none() {
                self.plain = Some(part);
            } else if ctype == "text/html" && self.html.is_none() {
                self.html = Some(part);
            }
            return;
        }

        for (idx, sub) in part.subparts.iter().enumerate() {
            self.walk_parts(sub, format!("{part_id}.{}", idx + 1));
        }
    }
}

impl<'a> MessageView for MimeMessage<'a> {
    type Attachment = MimeAttachment<'a>;

    fn header(&self, name: &str) -> Option<String> {
        self.mail.headers.get_first_value(name)
    }

    fn raw_header(&self, name: &str) -> Option<String> {
        self.mail
            .headers
            .get_first_header(name)
            .map(|h| String::from_utf8_lossy(h.get_value_raw()).trim().to_owned())
    }

    fn internal_date(&self) -> Option<&str> {
        self.internal_date
    }

    fn sender(&self) -> Sender {
        let raw = self.header("From");
        let first = self
            .mail
            .headers
            .get_first_header("From")
            .and_then(|h| mailparse::addrparse_header(h).ok())
            .and_then(|list| {
                list.iter().find_map(|addr| match addr {
                    MailAddr::Single(info) => Some(info.clone()),
                    MailAddr::Group(group) => group.addrs.first().cloned(),
                })
            });

        Sender {
            name: first.as_ref().and_then(|info| info.display_name.clone()),
            address: first.map(|info| info.addr),
            raw,
        }
    }

    fn text_body(&self) -> Option<TextBody> {
        if let Some(text) = self.plain.and_then(|p| p.get_body().ok()) {
            return Some(TextBody::Plain(text));
        }
        self.html
            .and_then(|p| p.get_body().ok())
            .map(TextBody::Html)
    }

    fn attachments(&self) -> &[Self::Attachment] {
        &self.attachments
    }
}

/// Attachment leaf of a parsed message
pub struct MimeAttachment<'a> {
    part: &'a ParsedMail<'a>,
    part_id: String,
    media_type: String,
    filename: Option<String>,
}

impl AttachmentPart for MimeAttachment<'_> {
    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn part_id(&self) -> Option<&str> {
        Some(&self.part_id)
    }

    fn fetch_content(&self) -> AppResult<String> {
        self.part.get_body().map_err(|e| {
            AppError::Internal(format!("failed decoding attachment part {}: {e}", self.part_id))
        })
    }
}

/// Extract attachment filename from part
///
/// Checks Content-Disposition parameter first, falls back to Content-Type
/// name parameter.
fn attachment_filename(
    part: &ParsedMail<'_>,
    disp_params: &BTreeMap<String, String>,
) -> Option<String> {
    disp_params
        .get("filename")
        .cloned()
        .or_else(|| part.ctype.params.get("name").cloned())
        .filter(|name| !name.trim().is_empty())
}

/// Flatten an HTML body to plain text
///
/// Script and style content is removed by `ammonia` first. If `html2text`
/// rejects the input, every tag is stripped instead.
pub fn html_to_text(html: &str) -> String {
    let sanitized = ammonia::clean(html);
    match html2text::from_read(sanitized.as_bytes(), HTML_TEXT_WIDTH) {
        Ok(text) => text.trim_end().to_owned(),
        Err(e) => {
            tracing::debug!(error = %e, "html2text failed; stripping tags");
            strip_tags(html)
        }
    }
}

/// Remove every tag, keeping text content
///
/// Script and style content is dropped. Text is returned unescaped, so
/// `&` and `<` written in the source survive as themselves.
pub fn strip_tags(text: &str) -> String {
    let cleaned = ammonia::Builder::default()
        .tags(HashSet::new())
        .clean(text)
        .to_string();
    cleaned
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Truncate string to maximum characters (Unicode-aware)
///
/// Preserves complete characters, never splitting multi-byte sequences.
pub fn truncate_chars(input: String, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut input = input;
            input.truncate(byte_idx);
            input
        }
        None => input,
    }
}
