//! # Mail.tm Client
//! Asynchronous wrapper around Mail.tm-compatible disposable inbox HTTP APIs: provision a throwaway
//! [`Mailbox`], wait for a new [`Message`] to land in it, then pull a verification code out of the
//! body with [`extract_code`].
//!
//! ## Audience and uses
//! For Rust developers who need a real inbox for a single verification round-trip in integration
//! tests, demos, or automation scripts: configure with [`ClientBuilder`], create a mailbox, call
//! [`Client::await_message`], and feed the result to [`extract_code`] or [`extract_links`].
//!
//! ## Runtime requirements
//! Async-only; run inside a Tokio (v1) runtime. HTTP calls use `reqwest`. Diagnostics are emitted
//! through `tracing`; install a subscriber in your application to see them.
//!
//! ## Session tokens
//! The bearer token lives on the [`Mailbox`] value, not in the client. Every inbox operation takes
//! the mailbox by `&mut` so a missing or expired token can be refreshed in place.
//!
//! ## Errors
//! Provisioning and authentication return [`Result`]. Listing, fetching and polling never fail:
//! they log the problem and return an empty list or `None`, so a poll loop treats "nothing yet" and
//! "provider hiccup" the same way.
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use mailtm_client::{extract_code, Client};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mailtm_client::Error> {
//!     let client = Client::new()?;
//!     let mut mailbox = client.create_mailbox().await?;
//!     println!("Send the code to: {}", mailbox.address());
//!
//!     let message = client
//!         .await_message(&mut mailbox, Duration::from_secs(60), Duration::from_secs(3))
//!         .await;
//!     if let Some(code) = message.as_ref().and_then(extract_code) {
//!         println!("Code: {code}");
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod extract;
mod models;

pub use client::{Client, ClientBuilder};
pub use error::Error;
pub use extract::{extract_code, extract_links};
pub use models::{Domain, Mailbox, Message};

/// Result type alias for mailbox operations.
///
/// This is equivalent to `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
