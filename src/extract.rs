//! Pull verification codes and links out of message bodies.

use crate::Message;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

// Tried one pattern at a time, in this order, before any unlabeled rule.
static LABELED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)security code(?: is)?:\s*([0-9]{6})",
        r"(?i)código de seguridad:\s*([0-9]{6})",
        r"(?i)código de verificación:\s*([0-9]{6})",
        r"(?i)verification code(?: is)?:\s*([0-9]{6})",
        r"(?i)code:\s*([0-9]{6})",
        r"(?i)código:\s*([0-9]{6})",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static SIX_DIGIT_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[0-9]{6}\b").unwrap());
static SPLIT_SIX_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-9]{3})[ -]([0-9]{3})\b").unwrap());
static SIX_DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{6}").unwrap());
static FOUR_DIGIT_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[0-9]{4}\b").unwrap());
static ALNUM_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z0-9]{6,8}\b").unwrap());

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'{}|\\^`\[\]]+"#).unwrap());

/// Extract a verification code from a message body.
///
/// The plain-text body is searched when present, otherwise the HTML body
/// with tags stripped. Rules are tried from most to least specific and the
/// first rule that matches wins, taking its first occurrence:
///
/// 1. a labeled code such as `security code: 123456` or
///    `código de verificación: 123456`
/// 2. a standalone 6-digit number
/// 3. a 6-digit number split as `123 456` or `123-456`
/// 4. any run of 6 digits
/// 5. a standalone 4-digit number
/// 6. a standalone 6 to 8 character uppercase alphanumeric token
///
/// # Examples
/// ```
/// # use mailtm_client::{extract_code, Message};
/// let message = Message {
///     id: "1".into(),
///     subject: "Verify".into(),
///     sender: "noreply@example.com".into(),
///     body_text: Some("Your security code: 482913".into()),
///     body_html: None,
///     received_marker: None,
/// };
/// assert_eq!(extract_code(&message).as_deref(), Some("482913"));
/// ```
pub fn extract_code(message: &Message) -> Option<String> {
    let text = searchable_text(message);
    let code = find_code(&text);

    match &code {
        Some(code) => debug!(message_id = %message.id, %code, "verification code found"),
        None => debug!(
            message_id = %message.id,
            text_len = text.len(),
            "no verification code in message"
        ),
    }
    code
}

/// Every `http(s)` URL in the text and HTML bodies, in body order.
pub fn extract_links(message: &Message) -> Vec<String> {
    let bodies = [message.body_text.as_deref(), message.body_html.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n");

    URL.find_iter(&bodies)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn find_code(text: &str) -> Option<String> {
    LABELED
        .iter()
        .find_map(|re| re.captures(text).map(|c| c[1].to_string()))
        .or_else(|| first_match(&SIX_DIGIT_WORD, text))
        .or_else(|| {
            SPLIT_SIX_DIGIT
                .captures(text)
                .map(|c| format!("{}{}", &c[1], &c[2]))
        })
        .or_else(|| first_match(&SIX_DIGIT_RUN, text))
        .or_else(|| first_match(&FOUR_DIGIT_WORD, text))
        .or_else(|| first_match(&ALNUM_TOKEN, text))
}

fn first_match(re: &Regex, text: &str) -> Option<String> {
    re.find(text).map(|m| m.as_str().to_string())
}

fn searchable_text(message: &Message) -> String {
    let raw = match (&message.body_text, &message.body_html) {
        (Some(text), _) if !text.trim().is_empty() => text.as_str(),
        (_, Some(html)) => html.as_str(),
        (Some(text), None) => text.as_str(),
        (None, None) => "",
    };

    let stripped = TAG.replace_all(raw, " ").replace("&nbsp;", " ");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}
