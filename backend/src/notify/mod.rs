//! Outbound email
//!
//! OTP codes and welcome messages go out through an HTTP email provider.
//! Without an API key every send logs its content instead and reports
//! success; in that setup the operator reads codes off the console. Both
//! sends are best-effort: the auth service never fails an operation over
//! a delivery error.

use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::config::EmailConfig;

/// Email delivery gateway with a console-logging fallback.
pub struct Notifier {
    client: Client,
    config: EmailConfig,
}

impl Notifier {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Base URL of the web client, for links in outbound mail and
    /// social-login redirects.
    pub fn client_base_url(&self) -> &str {
        &self.config.client_base_url
    }

    /// Send a one-time login code. Returns whether delivery (or its
    /// console fallback) succeeded.
    pub async fn send_otp(&self, email: &str, code: &str) -> bool {
        let body = format!("Your verification code is {code}. It expires in 5 minutes.");
        let delivered = self
            .deliver(email, "Your AgriCarbon verification code", &body)
            .await;
        if !delivered {
            // Fallback channel: the operator can still read the code off
            // the log when the provider is down.
            warn!(%email, %code, "OTP email not delivered; code available in log");
        }
        delivered
    }

    /// Send a welcome message to a newly created farmer account.
    pub async fn send_welcome(&self, email: &str, name: &str, estimated_income: i64) -> bool {
        let greeting = if name.is_empty() {
            "Welcome to AgriCarbon!".to_string()
        } else {
            format!("Welcome to AgriCarbon, {name}!")
        };
        let body = format!(
            "{greeting} Based on your farm profile, your estimated seasonal income \
             from carbon projects is \u{20b9}{estimated_income}. Visit {}/dashboard \
             to explore projects.",
            self.config.client_base_url
        );
        self.deliver(email, "Welcome to AgriCarbon", &body).await
    }

    async fn deliver(&self, to: &str, subject: &str, body: &str) -> bool {
        let Some(api_key) = &self.config.api_key else {
            info!(%to, subject, body, "email provider not configured; logging message instead");
            return true;
        };

        let payload = json!({
            "from": self.config.from,
            "to": [to],
            "subject": subject,
            "text": body,
        });

        let result = self
            .client
            .post(format!("{}/emails", self.config.api_url))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(%to, status = %response.status(), "email provider rejected message");
                false
            }
            Err(e) => {
                warn!(%to, error = %e, "email provider request failed");
                false
            }
        }
    }
}
