// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound mail.
//!
//! The core only needs "send this HTML to that address"; transport details
//! stay behind the [`Mailer`] trait.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

use crate::config::MailConfig;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Send a single HTML email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<()>;
}

// ─── Transactional email HTTP API ────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody<'a> {
    sender: EmailAddress<'a>,
    to: Vec<EmailAddress<'a>>,
    subject: &'a str,
    html_content: &'a str,
}

/// Mailer backed by a Brevo-compatible `POST /v3/smtp/email` endpoint.
pub struct HttpMailer {
    http_client: reqwest::Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building mail HTTP client")?;

        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<()> {
        let body = SendEmailBody {
            sender: EmailAddress {
                email: &self.config.sender_email,
                name: self.config.sender_name.as_deref(),
            },
            to: vec![EmailAddress {
                email: to,
                name: None,
            }],
            subject,
            html_content: html_body,
        };

        let response = self
            .http_client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .context("mail API request failed")?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(to, subject, "Email sent");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        anyhow::bail!("mail send failed (status={status}): {text}")
    }
}

// ─── Fallback ────────────────────────────────────────────────────

/// Writes mail to the log instead of sending it. Used when no mail API is
/// configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<()> {
        tracing::info!(to, subject, body = html_body, "Mail API not configured; email logged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_camel_case_and_omits_missing_names() {
        let body = SendEmailBody {
            sender: EmailAddress {
                email: "noreply@x.io",
                name: Some("Accounts"),
            },
            to: vec![EmailAddress {
                email: "ada@x.io",
                name: None,
            }],
            subject: "Reset password",
            html_content: "<h1>Reset password</h1>",
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["htmlContent"], "<h1>Reset password</h1>");
        assert_eq!(json["sender"]["name"], "Accounts");
        assert!(json["to"][0].get("name").is_none());
    }

    #[tokio::test]
    async fn log_mailer_never_fails() {
        LogMailer
            .send("ada@x.io", "Account verification", "<h1>hi</h1>")
            .await
            .unwrap();
    }
}
