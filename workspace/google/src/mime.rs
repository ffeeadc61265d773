//! Raw RFC 2822 messages for `users.messages.send`.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

#[derive(Debug, Clone)]
pub struct MessageParts<'a> {
    pub from: Option<&'a str>,
    pub to: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
    pub html: bool,
}

fn header_value(value: &str) -> String {
    value.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// RFC 2047 encoded-word, so non-ASCII subjects survive transport.
fn encode_subject(subject: &str) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(header_value(subject)))
}

/// The full message text, CRLF separated.
pub fn build_message(parts: &MessageParts<'_>) -> String {
    let content_type = if parts.html { "text/html" } else { "text/plain" };
    let encoding = if parts.body.is_ascii() { "7bit" } else { "8bit" };

    let mut lines = vec![
        format!("Content-Type: {content_type}; charset=\"UTF-8\""),
        "MIME-Version: 1.0".to_string(),
        format!("Content-Transfer-Encoding: {encoding}"),
    ];
    if let Some(from) = parts.from {
        lines.push(format!("From: {}", header_value(from)));
    }
    lines.push(format!("To: {}", header_value(parts.to)));
    lines.push(format!("Subject: {}", encode_subject(parts.subject)));
    lines.push(String::new());
    lines.push(parts.body.to_string());
    lines.join("\r\n")
}

/// [`build_message`] encoded as base64url without padding.
pub fn build_raw_message(parts: &MessageParts<'_>) -> String {
    URL_SAFE_NO_PAD.encode(build_message(parts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts<'a>(subject: &'a str, body: &'a str) -> MessageParts<'a> {
        MessageParts {
            from: Some("scout@gmail.com"),
            to: "talent@example.com",
            subject,
            body,
            html: true,
        }
    }

    #[test]
    fn test_headers_and_body() {
        let message = build_message(&parts("Audition", "<p>Hi</p>"));
        let (headers, body) = message.split_once("\r\n\r\n").unwrap();
        assert_eq!(body, "<p>Hi</p>");
        assert!(headers.contains("Content-Type: text/html; charset=\"UTF-8\""));
        assert!(headers.contains("MIME-Version: 1.0"));
        assert!(headers.contains("Content-Transfer-Encoding: 7bit"));
        assert!(headers.contains("From: scout@gmail.com"));
        assert!(headers.contains("To: talent@example.com"));
        assert!(headers.contains("Subject: =?UTF-8?B?QXVkaXRpb24=?="));
    }

    #[test]
    fn test_raw_is_unpadded_base64url() {
        let raw = build_raw_message(&parts("캐스팅 제안?", "본문 >>> ???"));
        assert!(!raw.contains('='));
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));

        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&raw).unwrap()).unwrap();
        assert!(decoded.ends_with("본문 >>> ???"));
        assert!(decoded.contains("Content-Transfer-Encoding: 8bit"));
    }

    #[test]
    fn test_header_injection_is_stripped() {
        let mut p = parts("Hi", "body");
        p.to = "victim@example.com\r\nBcc: everyone@example.com";
        let message = build_message(&p);
        assert!(!message.contains("\r\nBcc:"));
    }
}
