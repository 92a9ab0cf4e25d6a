//! Mail.tm async client implementation.

use crate::models::{self, AccountResponse, TokenResponse};
use crate::{Domain, Error, Mailbox, Message, Result};
use rand::Rng;
use rand::distr::Alphanumeric;
use rand::seq::IndexedRandom;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Async client for Mail.tm-compatible disposable inboxes.
///
/// The client holds only connection settings. Credentials and session tokens
/// live on each [`Mailbox`], which is passed to every inbox operation.
///
/// Use [`Client::new`] for defaults or [`Client::builder`] for custom
/// settings like proxies, retry behavior, and the API base URL.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    proxy: Option<String>,
    default_domain: String,
    max_attempts: u32,
    retry_backoff: Duration,
    settle_delay: Duration,
}

impl Client {
    /// Create a builder for configuring the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client with default settings.
    ///
    /// No request is made until a mailbox operation is called.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// let client = Client::new()?;
    /// # Ok::<(), mailtm_client::Error>(())
    /// ```
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    /// Get the proxy URL if one was configured.
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// API base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the active domains new accounts can be created on.
    pub async fn domains(&self) -> Result<Vec<Domain>> {
        let body = self
            .http
            .get(self.url("/domains"))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let value: Value = serde_json::from_str(&body)?;

        Ok(models::domains_from_value(value))
    }

    /// Provision a new disposable mailbox with a random address and secret.
    ///
    /// A domain is picked at random from [`Client::domains`], falling back to
    /// the configured default domain when the list is unavailable. Creation
    /// is retried up to the configured attempt bound.
    ///
    /// The new mailbox is then authenticated. Failing that is not an error:
    /// the mailbox is returned without a token and later calls authenticate
    /// on first use.
    ///
    /// # Examples
    /// ```no_run
    /// # use mailtm_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// let mailbox = client.create_mailbox().await?;
    /// println!("{}", mailbox.address());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_mailbox(&self) -> Result<Mailbox> {
        let (address, password) = self.create_account().await?;
        info!(address = %address, "mailbox created");

        let mut mailbox = Mailbox::new(address, password);
        self.try_authenticate(&mut mailbox).await;
        Ok(mailbox)
    }

    /// Wrap existing credentials and try to authenticate them.
    ///
    /// Like [`Client::create_mailbox`], a failed authentication leaves the
    /// mailbox without a token instead of returning an error.
    pub async fn open_mailbox(
        &self,
        address: impl Into<String>,
        password: impl Into<String>,
    ) -> Mailbox {
        let mut mailbox = Mailbox::new(address, password);
        self.try_authenticate(&mut mailbox).await;
        mailbox
    }

    /// Exchange the mailbox credentials for a session token.
    ///
    /// The token is stored on the mailbox and also returned. Transient
    /// failures and `401` responses are retried; a `401` on the last attempt
    /// becomes [`Error::Auth`], which usually means the account is not fully
    /// provisioned yet. The mailbox holds no token after a failure.
    pub async fn authenticate(&self, mailbox: &mut Mailbox) -> Result<String> {
        mailbox.token = None;
        let attempts = self.max_attempts.max(1);
        let mut last_error = Error::Auth("no attempt made".to_string());

        for attempt in 1..=attempts {
            match self.request_token(mailbox).await {
                Ok(token) => {
                    debug!(address = mailbox.address(), attempt, "authenticated");
                    mailbox.token = Some(token.clone());
                    return Ok(token);
                }
                Err(Error::ResponseParse(field)) => {
                    warn!(address = mailbox.address(), "token response carried no {field}");
                    return Err(Error::Auth(format!("response carried no {field}")));
                }
                Err(err) => {
                    warn!(
                        address = mailbox.address(),
                        attempt,
                        attempts,
                        error = %err,
                        "authentication attempt failed"
                    );
                    last_error = err;
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.retry_backoff).await;
            }
        }

        Err(last_error)
    }

    /// List the messages currently in the mailbox.
    ///
    /// Returns summaries, usually without bodies. Never fails: a missing
    /// session, transport error, or unexpected response yields an empty list.
    /// A rejected token triggers one re-authentication and one retry.
    pub async fn list_messages(&self, mailbox: &mut Mailbox) -> Vec<Message> {
        match self.get_authorized(mailbox, "/messages").await {
            Ok(value) => models::messages_from_value(value),
            Err(err) => {
                warn!(address = mailbox.address(), error = %err, "listing messages failed");
                Vec::new()
            }
        }
    }

    /// Fetch one message with its text and HTML bodies.
    ///
    /// Returns `None` on any failure.
    pub async fn fetch_message(&self, mailbox: &mut Mailbox, id: &str) -> Option<Message> {
        let id = id.trim_start_matches("/messages/");
        if id.is_empty() {
            return None;
        }

        let path = format!("/messages/{id}");
        match self.get_authorized(mailbox, &path).await {
            Ok(value) => {
                let message = Message::from_value(&value);
                if message.is_none() {
                    warn!(address = mailbox.address(), message_id = id, "message response had no id");
                }
                message
            }
            Err(err) => {
                warn!(
                    address = mailbox.address(),
                    message_id = id,
                    error = %err,
                    "fetching message failed"
                );
                None
            }
        }
    }

    /// Wait for a message that was not in the mailbox when the call began.
    ///
    /// The inbox is listed once to record a baseline, then re-listed every
    /// `poll_interval` until a new id shows up or the accumulated wait
    /// reaches `max_wait`. The first new id in the provider's listing order
    /// wins. Its full body is fetched when the summary lacks one; if that
    /// fetch fails the summary is returned.
    ///
    /// Returns `None` on timeout.
    ///
    /// # Examples
    /// ```no_run
    /// # use std::time::Duration;
    /// # use mailtm_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mailtm_client::Error> {
    /// let client = Client::new()?;
    /// let mut mailbox = client.create_mailbox().await?;
    /// let message = client
    ///     .await_message(&mut mailbox, Duration::from_secs(60), Duration::from_secs(3))
    ///     .await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn await_message(
        &self,
        mailbox: &mut Mailbox,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Option<Message> {
        let interval = poll_interval.max(MIN_POLL_INTERVAL);
        info!(
            address = mailbox.address(),
            max_wait_secs = max_wait.as_secs_f64(),
            "waiting for a new message"
        );

        let baseline: HashSet<String> = self
            .list_messages(mailbox)
            .await
            .into_iter()
            .map(|m| m.id)
            .collect();

        let mut waited = Duration::ZERO;
        while waited < max_wait {
            tokio::time::sleep(interval).await;
            waited += interval;

            let arrived = self
                .list_messages(mailbox)
                .await
                .into_iter()
                .find(|m| !baseline.contains(&m.id));

            if let Some(summary) = arrived {
                info!(
                    address = mailbox.address(),
                    message_id = %summary.id,
                    subject = %summary.subject,
                    sender = %summary.sender,
                    "new message arrived"
                );

                if summary.has_body() {
                    return Some(summary);
                }
                let full = self.fetch_message(mailbox, &summary.id).await;
                return full.or(Some(summary));
            }

            debug!(
                address = mailbox.address(),
                waited_secs = waited.as_secs_f64(),
                "no new message yet"
            );
        }

        info!(address = mailbox.address(), "no new message before timeout");
        None
    }

    /// The most recently received message, with its body when obtainable.
    ///
    /// Ordering uses the provider timestamp; messages without one sort
    /// oldest. Ties keep the earliest-listed message.
    pub async fn latest_message(&self, mailbox: &mut Mailbox) -> Option<Message> {
        let summary = self
            .list_messages(mailbox)
            .await
            .into_iter()
            .reduce(|best, m| {
                if m.received_marker > best.received_marker {
                    m
                } else {
                    best
                }
            })?;

        if summary.has_body() {
            return Some(summary);
        }
        let full = self.fetch_message(mailbox, &summary.id).await;
        full.or(Some(summary))
    }

    async fn try_authenticate(&self, mailbox: &mut Mailbox) {
        if let Err(err) = self.authenticate(mailbox).await {
            warn!(
                address = mailbox.address(),
                error = %err,
                "mailbox has no session token; will authenticate on first use"
            );
        }
    }

    async fn create_account(&self) -> Result<(String, String)> {
        let attempts = self.max_attempts.max(1);
        let mut reason = String::new();

        for attempt in 1..=attempts {
            let domain = self.pick_domain().await;
            let (login, password) = random_credentials();
            let address = format!("{login}@{domain}");

            match self.post_account(&address, &password).await {
                Ok(assigned) => {
                    tokio::time::sleep(self.settle_delay).await;
                    return Ok((assigned, password));
                }
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "account creation failed");
                    reason = err.to_string();
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.retry_backoff).await;
            }
        }

        Err(Error::AccountCreation { attempts, reason })
    }

    async fn post_account(&self, address: &str, password: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("/accounts"))
            .json(&json!({ "address": address, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if !matches!(status, StatusCode::OK | StatusCode::CREATED) {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status,
                body: snippet(body),
            });
        }

        // The account exists now; a body we cannot read must not cause a retry.
        let assigned = response
            .json::<AccountResponse>()
            .await
            .ok()
            .and_then(|account| account.address)
            .filter(|assigned| !assigned.is_empty());

        Ok(assigned.unwrap_or_else(|| address.to_string()))
    }

    async fn pick_domain(&self) -> String {
        let domains = match self.domains().await {
            Ok(domains) => domains,
            Err(err) => {
                warn!(error = %err, fallback = %self.default_domain, "domain list unavailable");
                Vec::new()
            }
        };

        choose_domain(&domains).unwrap_or_else(|| self.default_domain.clone())
    }

    async fn request_token(&self, mailbox: &Mailbox) -> Result<String> {
        let response = self
            .http
            .post(self.url("/token"))
            .json(&json!({ "address": mailbox.address(), "password": mailbox.password() }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Auth(format!(
                "credentials rejected for {}",
                mailbox.address()
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status,
                body: snippet(body),
            });
        }

        let body: TokenResponse = response.json().await?;
        body.token
            .filter(|token| !token.is_empty())
            .ok_or(Error::ResponseParse("token"))
    }

    /// GET with the mailbox's bearer token, authenticating first when none is
    /// held and once more when the provider rejects it.
    async fn get_authorized(&self, mailbox: &mut Mailbox, path: &str) -> Result<Value> {
        let token = match mailbox.token.clone() {
            Some(token) => token,
            None => self.authenticate(mailbox).await?,
        };

        let mut response = self
            .http
            .get(self.url(path))
            .bearer_auth(&token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(address = mailbox.address(), path, "session token rejected; re-authenticating");
            let token = self.authenticate(mailbox).await?;
            response = self
                .http
                .get(self.url(path))
                .bearer_auth(&token)
                .send()
                .await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status,
                body: snippet(body),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn choose_domain(domains: &[Domain]) -> Option<String> {
    domains
        .choose(&mut rand::rng())
        .map(|domain| domain.domain.clone())
}

/// Random local part and secret for a new account.
fn random_credentials() -> (String, String) {
    let mut rng = rand::rng();
    let login = (0..LOGIN_LEN)
        .map(|_| LOGIN_CHARSET[rng.random_range(0..LOGIN_CHARSET.len())] as char)
        .collect();
    let password = (&mut rng)
        .sample_iter(Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect();
    (login, password)
}

fn snippet(body: String) -> String {
    if body.chars().count() <= ERROR_BODY_LIMIT {
        return body;
    }
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

const BASE_URL: &str = "https://api.mail.tm";
const DEFAULT_DOMAIN: &str = "mail.tm";
const USER_AGENT_VALUE: &str = concat!("mailtm-client/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
const LOGIN_LEN: usize = 12;
const PASSWORD_LEN: usize = 16;
const LOGIN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ERROR_BODY_LIMIT: usize = 200;

/// Builder for configuring a Mail.tm client.
///
/// Start with [`Client::builder`] to override defaults.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    base_url: String,
    proxy: Option<String>,
    danger_accept_invalid_certs: bool,
    user_agent: String,
    timeout: Duration,
    max_attempts: u32,
    retry_backoff: Duration,
    settle_delay: Duration,
    default_domain: String,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    ///
    /// Defaults:
    /// - `https://api.mail.tm` as base URL
    /// - No proxy
    /// - `danger_accept_invalid_certs = false`
    /// - 10 second request timeout
    /// - 3 attempts with a 1 second backoff for account creation and authentication
    /// - 500 ms settle delay after an account is created
    /// - `mail.tm` when the domain list is unavailable
    pub fn new() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            proxy: None,
            danger_accept_invalid_certs: false,
            user_agent: USER_AGENT_VALUE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            settle_delay: DEFAULT_SETTLE_DELAY,
            default_domain: DEFAULT_DOMAIN.to_string(),
        }
    }

    /// Override the API base URL.
    ///
    /// Useful for testing or for self-hosted Mail.tm-compatible services.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set a proxy URL (e.g., "http://127.0.0.1:8080" or "socks5://127.0.0.1:9050").
    ///
    /// This uses reqwest's proxy support for all requests.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Control whether to accept invalid TLS certificates (default: false).
    pub fn danger_accept_invalid_certs(mut self, value: bool) -> Self {
        self.danger_accept_invalid_certs = value;
        self
    }

    /// Override the default user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attempts for account creation and authentication (minimum 1).
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Pause between failed attempts.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Pause after an account is created, before the first authentication.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Domain used when the provider's domain list cannot be fetched.
    pub fn default_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_domain = domain.into();
        self
    }

    /// Build the client.
    ///
    /// # Examples
    /// ```no_run
    /// # use std::time::Duration;
    /// # use mailtm_client::Client;
    /// let client = Client::builder()
    ///     .user_agent("my-app/1.0")
    ///     .timeout(Duration::from_secs(5))
    ///     .build()?;
    /// # Ok::<(), mailtm_client::Error>(())
    /// ```
    pub fn build(self) -> Result<Client> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs)
            .timeout(self.timeout)
            .default_headers(self.headers());

        if let Some(proxy_url) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        let http = builder.build()?;

        Ok(Client {
            http,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            proxy: self.proxy,
            default_domain: self.default_domain,
            max_attempts: self.max_attempts,
            retry_backoff: self.retry_backoff,
            settle_delay: self.settle_delay,
        })
    }

    /// Headers sent with every request.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_have_expected_shape() {
        let (login, password) = random_credentials();

        assert_eq!(login.len(), LOGIN_LEN);
        assert!(login.bytes().all(|b| LOGIN_CHARSET.contains(&b)));
        assert_eq!(password.len(), PASSWORD_LEN);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn no_domains_means_no_choice() {
        assert_eq!(choose_domain(&[]), None);

        let only = [Domain {
            domain: "only.test".into(),
            is_active: true,
        }];
        assert_eq!(choose_domain(&only).as_deref(), Some("only.test"));
    }

    #[test]
    fn long_error_bodies_are_cut() {
        assert_eq!(snippet("short".into()), "short");
        assert_eq!(snippet("é".repeat(300)).chars().count(), ERROR_BODY_LIMIT);
    }

    #[test]
    fn builder_trims_base_url() {
        let client = Client::builder()
            .base_url("http://localhost:1234/")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234");
        assert_eq!(client.proxy(), None);
    }
}
