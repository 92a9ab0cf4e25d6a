//! Demo for the Mail.tm Rust client: create an inbox, wait for a message,
//! and print the verification code and links found in it.
//!
//! Run with `RUST_LOG=mailtm_client=debug cargo run --example demo`.

use mailtm_client::{extract_code, extract_links, Client};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let client = Client::new()?;
    let domains = client.domains().await?;
    println!(
        "Available domains: {:?}",
        domains.iter().map(|d| d.domain.as_str()).collect::<Vec<_>>()
    );

    let mut mailbox = client.create_mailbox().await?;
    println!("Created temporary inbox: {}", mailbox.address());
    println!("Send a message to it within 2 minutes...");

    let Some(message) = client
        .await_message(&mut mailbox, Duration::from_secs(120), Duration::from_secs(3))
        .await
    else {
        println!("No message received.");
        return Ok(());
    };

    println!("From: {}", message.sender);
    println!("Subject: {}", message.subject);
    if let Some(text) = &message.body_text {
        println!("\n{text}\n");
    }

    match extract_code(&message) {
        Some(code) => println!("Verification code: {code}"),
        None => println!("No verification code found."),
    }
    for link in extract_links(&message).iter().take(5) {
        println!("Link: {link}");
    }

    Ok(())
}
