//! Extraction of export fields from raw Gmail messages.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use google_gmail1::api::{Message, MessagePart};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::models::{FilterReason, MessageRecord};
use crate::truncate::truncate;

/// Placeholder values landing in the sheet when a field is absent.
/// `UNKNOWN` covers both the sender and the date.
pub const UNKNOWN: &str = "Unknown";
pub const NO_SUBJECT: &str = "(No Subject)";
pub const NO_CONTENT: &str = "(No content)";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Extract a [`MessageRecord`] from a full-format Gmail message.
///
/// Missing headers become placeholders rather than errors; only a message
/// with no id at all is rejected, since without an id it cannot enter the
/// processed ledger.
pub fn parse_message(msg: &Message, max_field_chars: usize) -> Result<MessageRecord> {
    let message_id = msg
        .id
        .clone()
        .ok_or_else(|| SyncError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let from = header_value(msg, "From").unwrap_or_else(|| UNKNOWN.to_string());
    let subject = header_value(msg, "Subject").unwrap_or_else(|| NO_SUBJECT.to_string());
    let date = extract_date(msg);
    let content = extract_body(msg);

    Ok(MessageRecord {
        message_id,
        from: truncate(&from, max_field_chars, "from"),
        subject: truncate(&subject, max_field_chars, "subject"),
        date: truncate(&date, max_field_chars, "date"),
        content: truncate(&content, max_field_chars, "content"),
    })
}

fn header_value(msg: &Message, name: &str) -> Option<String> {
    let headers = msg.payload.as_ref()?.headers.as_ref()?;
    headers
        .iter()
        .find(|h| {
            h.name
                .as_deref()
                .map(|n| n.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
        .and_then(|h| h.value.clone())
        .filter(|v| !v.is_empty())
}

/// Date header parsed as RFC 2822 and re-emitted as ISO-8601. When the
/// header is absent or malformed, Gmail's internalDate (epoch millis) is
/// used instead; the raw header text is a last resort.
fn extract_date(msg: &Message) -> String {
    if let Some(raw) = header_value(msg, "Date") {
        if let Ok(dt) = DateTime::parse_from_rfc2822(&raw) {
            return dt.to_rfc3339();
        }
        if let Some(iso) = internal_date(msg) {
            debug!(raw = %raw, "unparseable Date header, using internalDate");
            return iso;
        }
        return raw;
    }

    internal_date(msg).unwrap_or_else(|| UNKNOWN.to_string())
}

fn internal_date(msg: &Message) -> Option<String> {
    let millis = msg.internal_date?;
    match Utc.timestamp_millis_opt(millis) {
        chrono::LocalResult::Single(dt) => Some(dt.to_rfc3339()),
        _ => None,
    }
}

/// Walk the MIME tree and produce normalized plain text.
///
/// text/plain wins over text/html wherever both exist; HTML is converted
/// to text rather than exported raw.
fn extract_body(msg: &Message) -> String {
    let mut plain: Option<String> = None;
    let mut html: Option<String> = None;

    if let Some(payload) = &msg.payload {
        collect_bodies(payload, &mut plain, &mut html);
    }

    let text = match (plain, html) {
        (Some(p), _) if !p.trim().is_empty() => p,
        (_, Some(h)) if !h.trim().is_empty() => html_to_text(&h),
        _ => String::new(),
    };

    let normalized = WHITESPACE.replace_all(text.trim(), " ").into_owned();
    if normalized.is_empty() {
        NO_CONTENT.to_string()
    } else {
        normalized
    }
}

fn collect_bodies(part: &MessagePart, plain: &mut Option<String>, html: &mut Option<String>) {
    if let Some(mime_type) = &part.mime_type {
        if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_ref()) {
            let decoded = decode_body(data);
            match mime_type.as_str() {
                "text/plain" if plain.is_none() => *plain = Some(decoded),
                "text/html" if html.is_none() => *html = Some(decoded),
                _ => {}
            }
        }
    }

    if let Some(parts) = &part.parts {
        for child in parts {
            collect_bodies(child, plain, html);
        }
    }
}

/// Gmail serves body data base64url-encoded without padding. Some client
/// stacks hand the bytes through already decoded; when base64 decoding
/// fails the bytes are taken as UTF-8 directly.
fn decode_body(data: &[u8]) -> String {
    if let Ok(encoded) = std::str::from_utf8(data) {
        if let Ok(bytes) = URL_SAFE_NO_PAD.decode(encoded.trim()) {
            return String::from_utf8_lossy(&bytes).into_owned();
        }
    }
    String::from_utf8_lossy(data).into_owned()
}

fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 80) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to render HTML body as text");
            String::new()
        }
    }
}

/// Which fetched messages make it into the sheet.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    /// Case-insensitive substring the subject must contain
    pub subject_keyword: Option<String>,
    /// Skip "no-reply" / "noreply" senders
    pub exclude_no_reply: bool,
}

impl MessageFilter {
    /// Returns the reason a record is excluded, or None to keep it.
    pub fn evaluate(&self, record: &MessageRecord) -> Option<FilterReason> {
        if let Some(keyword) = &self.subject_keyword {
            if !keyword.is_empty()
                && !record
                    .subject
                    .to_lowercase()
                    .contains(&keyword.to_lowercase())
            {
                return Some(FilterReason::SubjectMismatch);
            }
        }

        if self.exclude_no_reply {
            let from = record.from.to_lowercase();
            if from.contains("no-reply") || from.contains("noreply") {
                return Some(FilterReason::NoReplySender);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_gmail1::api::{MessagePartBody, MessagePartHeader};

    fn header(name: &str, value: &str) -> MessagePartHeader {
        MessagePartHeader {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
        }
    }

    fn body_part(mime_type: &str, text: &str) -> MessagePart {
        MessagePart {
            mime_type: Some(mime_type.to_string()),
            body: Some(MessagePartBody {
                data: Some(URL_SAFE_NO_PAD.encode(text.as_bytes()).into_bytes()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn simple_message(id: &str, from: &str, subject: &str, date: &str, text: &str) -> Message {
        Message {
            id: Some(id.to_string()),
            payload: Some(MessagePart {
                mime_type: Some("text/plain".to_string()),
                headers: Some(vec![
                    header("From", from),
                    header("Subject", subject),
                    header("Date", date),
                ]),
                body: Some(MessagePartBody {
                    data: Some(URL_SAFE_NO_PAD.encode(text.as_bytes()).into_bytes()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_simple_message() {
        let msg = simple_message(
            "m1",
            "Alice <alice@example.com>",
            "Quarterly report",
            "Wed, 01 May 2024 10:00:00 +0000",
            "Report attached.",
        );

        let record = parse_message(&msg, 10_000).unwrap();
        assert_eq!(record.message_id, "m1");
        assert_eq!(record.from, "Alice <alice@example.com>");
        assert_eq!(record.subject, "Quarterly report");
        assert_eq!(record.date, "2024-05-01T10:00:00+00:00");
        assert_eq!(record.content, "Report attached.");
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let msg = Message::default();
        let err = parse_message(&msg, 10_000).unwrap_err();
        assert!(matches!(err, SyncError::InvalidMessageFormat(_)));
    }

    #[test]
    fn test_missing_headers_become_placeholders() {
        let msg = Message {
            id: Some("m2".to_string()),
            payload: Some(MessagePart::default()),
            ..Default::default()
        };

        let record = parse_message(&msg, 10_000).unwrap();
        assert_eq!(record.from, UNKNOWN);
        assert_eq!(record.subject, NO_SUBJECT);
        assert_eq!(record.content, NO_CONTENT);
    }

    #[test]
    fn test_bad_date_falls_back_to_internal_date() {
        let mut msg = simple_message("m3", "a@b.c", "s", "not a date", "x");
        // 2024-05-01T10:00:00Z in epoch millis
        msg.internal_date = Some(1_714_557_600_000);

        let record = parse_message(&msg, 10_000).unwrap();
        assert_eq!(record.date, "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_bad_date_without_internal_date_keeps_raw() {
        let msg = simple_message("m4", "a@b.c", "s", "garbled", "x");
        let record = parse_message(&msg, 10_000).unwrap();
        assert_eq!(record.date, "garbled");
    }

    #[test]
    fn test_multipart_prefers_plain_text() {
        let msg = Message {
            id: Some("m5".to_string()),
            payload: Some(MessagePart {
                mime_type: Some("multipart/alternative".to_string()),
                headers: Some(vec![header("From", "a@b.c"), header("Subject", "s")]),
                parts: Some(vec![
                    body_part("text/html", "<p>HTML version</p>"),
                    body_part("text/plain", "Plain version"),
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let record = parse_message(&msg, 10_000).unwrap();
        assert_eq!(record.content, "Plain version");
    }

    #[test]
    fn test_html_only_converted_to_text() {
        let msg = Message {
            id: Some("m6".to_string()),
            payload: Some(MessagePart {
                mime_type: Some("multipart/alternative".to_string()),
                parts: Some(vec![body_part(
                    "text/html",
                    "<html><body><p>Hello <b>world</b></p></body></html>",
                )]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let record = parse_message(&msg, 10_000).unwrap();
        assert!(record.content.contains("Hello"));
        assert!(record.content.contains("world"));
        assert!(!record.content.contains('<'));
    }

    #[test]
    fn test_nested_multipart_body_found() {
        let inner = MessagePart {
            mime_type: Some("multipart/alternative".to_string()),
            parts: Some(vec![body_part("text/plain", "Deeply nested")]),
            ..Default::default()
        };
        let msg = Message {
            id: Some("m7".to_string()),
            payload: Some(MessagePart {
                mime_type: Some("multipart/mixed".to_string()),
                parts: Some(vec![inner]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let record = parse_message(&msg, 10_000).unwrap();
        assert_eq!(record.content, "Deeply nested");
    }

    #[test]
    fn test_whitespace_normalized() {
        let msg = simple_message(
            "m8",
            "a@b.c",
            "s",
            "Wed, 01 May 2024 10:00:00 +0000",
            "Line one\r\n\r\nLine   two\n\ttabbed",
        );

        let record = parse_message(&msg, 10_000).unwrap();
        assert_eq!(record.content, "Line one Line two tabbed");
    }

    #[test]
    fn test_long_content_truncated() {
        let long_body = "word ".repeat(5_000);
        let msg = simple_message(
            "m9",
            "a@b.c",
            "s",
            "Wed, 01 May 2024 10:00:00 +0000",
            &long_body,
        );

        let record = parse_message(&msg, 10_000).unwrap();
        assert_eq!(record.content.chars().count(), 10_000);
        assert!(record.content.ends_with(crate::truncate::TRUNCATION_SUFFIX));
    }

    #[test]
    fn test_filter_subject_keyword() {
        let filter = MessageFilter {
            subject_keyword: Some("Invoice".to_string()),
            exclude_no_reply: false,
        };

        let mut record = MessageRecord {
            message_id: "m".to_string(),
            from: "a@b.c".to_string(),
            subject: "Your invoice for May".to_string(),
            date: String::new(),
            content: String::new(),
        };
        assert_eq!(filter.evaluate(&record), None);

        record.subject = "Weekly digest".to_string();
        assert_eq!(filter.evaluate(&record), Some(FilterReason::SubjectMismatch));
    }

    #[test]
    fn test_filter_no_reply_sender() {
        let filter = MessageFilter {
            subject_keyword: None,
            exclude_no_reply: true,
        };

        let mut record = MessageRecord {
            message_id: "m".to_string(),
            from: "No-Reply <no-reply@example.com>".to_string(),
            subject: "s".to_string(),
            date: String::new(),
            content: String::new(),
        };
        assert_eq!(filter.evaluate(&record), Some(FilterReason::NoReplySender));

        record.from = "noreply@example.com".to_string();
        assert_eq!(filter.evaluate(&record), Some(FilterReason::NoReplySender));

        record.from = "alice@example.com".to_string();
        assert_eq!(filter.evaluate(&record), None);
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let filter = MessageFilter::default();
        let record = MessageRecord {
            message_id: "m".to_string(),
            from: "noreply@example.com".to_string(),
            subject: "anything".to_string(),
            date: String::new(),
            content: String::new(),
        };
        assert_eq!(filter.evaluate(&record), None);
    }

    #[test]
    fn test_decode_body_raw_utf8_passthrough() {
        // Bytes that are not valid base64 come through as-is
        let raw = "plain text with spaces!".as_bytes();
        assert_eq!(decode_body(raw), "plain text with spaces!");
    }
}
