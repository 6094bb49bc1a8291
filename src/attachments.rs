//! Attachment classification and text extraction
//!
//! Text-like attachments are inlined (bounded) into the consolidated body;
//! everything else gets a one-line placeholder. Content is only fetched for
//! the text branch.

use crate::errors::AppResult;
use crate::mime::truncate_chars;

/// Maximum characters of one attachment's text kept in the consolidated body
pub const ATTACHMENT_TEXT_MAX_CHARS: usize = 10_000;

/// Media types inlined besides `text/*`
const EXTRACTABLE_TYPES: [&str; 2] = ["application/json", "application/csv"];

/// One attachment of a message, with lazily fetched content
pub trait AttachmentPart {
    /// Declared media type (lowercase, without parameters)
    fn media_type(&self) -> &str;

    fn filename(&self) -> Option<&str>;

    /// MIME part address; `None` when the part cannot be fetched
    fn part_id(&self) -> Option<&str>;

    /// Fetch and decode the part's content as text
    fn fetch_content(&self) -> AppResult<String>;
}

/// Whether an attachment's content is inlined rather than summarized
pub fn is_text_extractable(media_type: &str) -> bool {
    let media_type = media_type.trim().to_ascii_lowercase();
    media_type.starts_with("text/") || EXTRACTABLE_TYPES.contains(&media_type.as_str())
}

/// Build the text fragment for one attachment
///
/// Returns an empty string when there is nothing to append: no addressable
/// part, or a text attachment whose content is empty or failed to decode.
pub fn extract_attachment<A: AttachmentPart + ?Sized>(attachment: &A) -> String {
    let Some(part_id) = attachment.part_id() else {
        return String::new();
    };
    let name = attachment.filename().unwrap_or("unnamed");

    if !is_text_extractable(attachment.media_type()) {
        return format!(
            "\n[Attachment: {name} - Type: {} (content not extracted)]\n",
            attachment.media_type()
        );
    }

    match attachment.fetch_content() {
        Ok(content) if !content.is_empty() => {
            let content = truncate_chars(content, ATTACHMENT_TEXT_MAX_CHARS);
            format!("\n[Attachment: {name}]\n{content}\n")
        }
        Ok(_) => String::new(),
        Err(e) => {
            tracing::warn!(part_id, error = %e, "skipping undecodable attachment");
            String::new()
        }
    }
}

/// Concatenate fragments for all attachments in their original order
pub fn extract_attachments<A: AttachmentPart>(attachments: &[A]) -> String {
    attachments.iter().map(extract_attachment).collect()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::{AttachmentPart, extract_attachment, extract_attachments, is_text_extractable};
    use crate::errors::{AppError, AppResult};

    struct FakeAttachment {
        media_type: &'static str,
        filename: Option<&'static str>,
        part_id: Option<&'static str>,
        content: Result<String, &'static str>,
        fetches: Cell<usize>,
    }

    impl FakeAttachment {
        fn new(media_type: &'static str, filename: Option<&'static str>, content: &str) -> Self {
            Self {
                media_type,
                filename,
                part_id: Some("2"),
                content: Ok(content.to_owned()),
                fetches: Cell::new(0),
            }
        }
    }

    impl AttachmentPart for FakeAttachment {
        fn media_type(&self) -> &str {
            self.media_type
        }

        fn filename(&self) -> Option<&str> {
            self.filename
        }

        fn part_id(&self) -> Option<&str> {
            self.part_id
        }

        fn fetch_content(&self) -> AppResult<String> {
            self.fetches.set(self.fetches.get() + 1);
            self.content
                .clone()
                .map_err(|e| AppError::StoreUnavailable(e.to_owned()))
        }
    }

    #[test]
    fn classifies_text_like_media_types() {
        let extractable = [
            "text/plain",
            "text/csv",
            "TEXT/HTML",
            "application/json",
            "application/csv",
        ];
        for ok in extractable {
            assert!(is_text_extractable(ok), "{ok}");
        }
        let binary = ["application/pdf", "application/octet-stream", "image/png", "textual/x"];
        for no in binary {
            assert!(!is_text_extractable(no), "{no}");
        }
    }

    #[test]
    fn text_attachment_is_truncated_to_limit() {
        let long = "é".repeat(12_000);
        let att = FakeAttachment::new("text/plain", Some("notes.txt"), &long);
        let out = extract_attachment(&att);

        let header = "\n[Attachment: notes.txt]\n";
        assert!(out.starts_with(header));
        let body = &out[header.len()..];
        assert_eq!(body.trim_end_matches('\n').chars().count(), 10_000);
        assert_eq!(att.fetches.get(), 1);
    }

    #[test]
    fn binary_attachment_gets_placeholder_without_fetch() {
        let att = FakeAttachment::new("application/octet-stream", Some("blob.bin"), "ignored");
        let out = extract_attachment(&att);
        assert_eq!(
            out,
            "\n[Attachment: blob.bin - Type: application/octet-stream (content not extracted)]\n"
        );
        assert_eq!(att.fetches.get(), 0);
    }

    #[test]
    fn missing_filename_is_unnamed() {
        let att = FakeAttachment::new("application/json", None, "{\"a\":1}");
        assert_eq!(extract_attachment(&att), "\n[Attachment: unnamed]\n{\"a\":1}\n");
    }

    #[test]
    fn skips_parts_without_address_or_content() {
        let mut no_part = FakeAttachment::new("text/plain", Some("a.txt"), "hello");
        no_part.part_id = None;
        assert_eq!(extract_attachment(&no_part), "");
        assert_eq!(no_part.fetches.get(), 0);

        let empty = FakeAttachment::new("text/plain", Some("b.txt"), "");
        assert_eq!(extract_attachment(&empty), "");

        let mut broken = FakeAttachment::new("text/plain", Some("c.txt"), "");
        broken.content = Err("decode failed");
        assert_eq!(extract_attachment(&broken), "");
    }

    #[test]
    fn concatenates_in_original_order() {
        let parts = vec![
            FakeAttachment::new("text/plain", Some("first.txt"), "one"),
            FakeAttachment::new("image/png", Some("pic.png"), ""),
            FakeAttachment::new("text/csv", Some("last.csv"), "a,b"),
        ];
        let out = extract_attachments(&parts);
        let first = out.find("first.txt").expect("first present");
        let pic = out.find("pic.png").expect("pic present");
        let last = out.find("last.csv").expect("last present");
        assert!(first < pic && pic < last);
    }
}
