//! Mailbox, message and domain models, plus the adapter that turns the
//! provider's varying JSON shapes into them.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// A disposable inbox and the credentials that unlock it.
///
/// The address is fixed at construction. The session token is owned here
/// rather than by the [`Client`](crate::Client), so two mailboxes never share
/// credentials and the client can refresh a stale token in place.
#[derive(Clone, PartialEq, Eq)]
pub struct Mailbox {
    address: String,
    password: String,
    pub(crate) token: Option<String>,
}

impl Mailbox {
    /// Wrap existing credentials. No request is made; the mailbox starts
    /// without a token and authenticates on first use.
    pub fn new(address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: password.into(),
            token: None,
        }
    }

    /// Full email address, as assigned by the provider.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Secret used to obtain session tokens.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Current bearer token, if authentication has succeeded.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Whether a session token is held.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Local part of the address (before `@`).
    pub fn login(&self) -> &str {
        self.address
            .split_once('@')
            .map_or(self.address.as_str(), |(login, _)| login)
    }

    /// Domain part of the address (after `@`), empty if there is none.
    pub fn domain(&self) -> &str {
        self.address
            .split_once('@')
            .map_or("", |(_, domain)| domain)
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A message in a mailbox, in canonical form.
///
/// Listing returns summaries whose bodies are usually `None`; fetching by id
/// fills them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Provider message identifier.
    pub id: String,
    /// Subject line, empty when the provider omitted it.
    pub subject: String,
    /// Sender address, empty when unknown.
    pub sender: String,
    /// Plain-text body.
    pub body_text: Option<String>,
    /// HTML body.
    pub body_html: Option<String>,
    /// Provider timestamp (`createdAt`); opaque, only used for ordering.
    pub received_marker: Option<String>,
}

impl Message {
    /// Whether either body field is present.
    pub fn has_body(&self) -> bool {
        self.body_text.is_some() || self.body_html.is_some()
    }

    /// Build a message from one provider JSON object.
    ///
    /// Accepts every field-name variant the provider has been seen to use.
    /// Returns `None` when no usable id is present.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let id = ["id", "@id", "message_id"]
            .iter()
            .find_map(|key| object.get(*key).and_then(scalar_string))?;

        Some(Self {
            id,
            subject: first_string(object, &["subject", "Subject"]).unwrap_or_default(),
            sender: object
                .get("from")
                .and_then(sender_address)
                .unwrap_or_default(),
            body_text: first_string(object, &["text", "body", "body_text"]),
            body_html: ["html", "htmlBody", "body_html"]
                .iter()
                .find_map(|key| object.get(*key).and_then(html_string)),
            received_marker: first_string(object, &["createdAt", "created_at"]),
        })
    }
}

/// A mail domain published by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Domain {
    /// Domain name, e.g. `example.com`.
    pub domain: String,
    /// Whether new accounts may be created on it.
    #[serde(rename = "isActive", default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Body of a successful `POST /accounts`.
#[derive(Debug, Deserialize)]
pub(crate) struct AccountResponse {
    pub address: Option<String>,
}

/// Body of a successful `POST /token`.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: Option<String>,
}

/// Unwrap a list response into its items.
///
/// The provider has returned bare arrays, `hydra:member` collections and
/// `messages` objects across API versions. Anything else is empty.
pub(crate) fn collection_members(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in ["hydra:member", "messages"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return items;
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Normalize a message list response, skipping items without an id.
pub(crate) fn messages_from_value(value: Value) -> Vec<Message> {
    collection_members(value)
        .iter()
        .filter_map(Message::from_value)
        .collect()
}

/// Normalize a domain list response, keeping only active, well-formed domains.
pub(crate) fn domains_from_value(value: Value) -> Vec<Domain> {
    collection_members(value)
        .into_iter()
        .filter_map(|v| serde_json::from_value::<Domain>(v).ok())
        .filter(|d| d.is_active && !d.domain.is_empty() && !d.domain.contains('@'))
        .collect()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        object
            .get(*key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

// Mail.tm sends `html` as an array of parts; older payloads use a string.
fn html_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(parts) => {
            let joined = parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn sender_address(value: &Value) -> Option<String> {
    match value {
        Value::Object(from) => first_string(from, &["address", "email"]),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
