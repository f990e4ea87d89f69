use crate::error::NotifyError;
use crate::plugin::{parse_config, SinkPlugin};
use crate::utils::{truncate_string, MAX_BODY_LENGTH};
use crate::AlertSink;
use anyhow::Result;
use async_trait::async_trait;
use delaymon_common::timespan;
use delaymon_common::types::DelayAlert;
use serde::Deserialize;
use serde_json::Value;

const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// POSTs alerts to an HTTP endpoint, retrying with exponential backoff.
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
    body_template: Option<String>,
}

impl WebhookSink {
    pub fn new(url: &str, body_template: Option<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self {
            url: url.to_string(),
            client,
            body_template,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fills `{{placeholders}}` of the template, or serializes the alert as JSON.
    pub fn render_body(&self, alert: &DelayAlert) -> String {
        if let Some(template) = &self.body_template {
            template
                .replace("{{rule_name}}", &alert.rule_name)
                .replace("{{entity_id}}", &alert.entity_id.to_string())
                .replace("{{direction}}", &alert.direction.to_string())
                .replace("{{label}}", &alert.label)
                .replace("{{age}}", &timespan::format(alert.age))
                .replace("{{threshold}}", &timespan::format(alert.threshold))
                .replace("{{flapping}}", &alert.flapping.to_string())
                .replace("{{timestamp}}", &alert.timestamp.to_rfc3339())
                .replace("{{summary}}", &alert.summary())
        } else {
            serde_json::to_string(alert).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to serialize alert, sending summary");
                serde_json::json!({ "summary": alert.summary() }).to_string()
            })
        }
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn emit(&self, alert: &DelayAlert) -> Result<()> {
        let body = self.render_body(alert);
        let mut last_err = None;

        for attempt in 0..MAX_ATTEMPTS {
            match self
                .client
                .post(self.url.as_str())
                .header("Content-Type", "application/json")
                .body(body.clone())
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    let resp_body = match resp.text().await {
                        Ok(text) => truncate_string(&text, MAX_BODY_LENGTH),
                        Err(e) => format!("[Failed to read response body: {e}]"),
                    };
                    tracing::warn!(
                        attempt = attempt + 1,
                        status = %status,
                        "Webhook returned non-success status, retrying"
                    );
                    last_err = Some(NotifyError::ApiError {
                        service: self.url.clone(),
                        status: status.as_u16(),
                        body: resp_body,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Webhook send failed, retrying"
                    );
                    last_err = Some(NotifyError::HttpError(e));
                }
            }
            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(std::time::Duration::from_millis(100 * 2u64.pow(attempt))).await;
            }
        }

        match last_err {
            Some(e) => {
                tracing::error!(url = %self.url, error = %e, "Webhook failed after {MAX_ATTEMPTS} attempts");
                Err(e.into())
            }
            None => Ok(()),
        }
    }

    fn sink_name(&self) -> &str {
        "webhook"
    }
}

// Plugin

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Deserialize)]
struct WebhookConfig {
    url: String,
    body_template: Option<String>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

pub struct WebhookPlugin;

impl SinkPlugin for WebhookPlugin {
    fn name(&self) -> &str {
        "webhook"
    }

    fn validate_config(&self, config: &Value) -> crate::error::Result<()> {
        let cfg: WebhookConfig = parse_config("webhook", config)?;
        if !(cfg.url.starts_with("http://") || cfg.url.starts_with("https://")) {
            return Err(NotifyError::InvalidConfig(format!(
                "webhook: url must be http(s), got '{}'",
                cfg.url
            )));
        }
        Ok(())
    }

    fn create_sink(&self, config: &Value) -> crate::error::Result<Box<dyn AlertSink>> {
        let cfg: WebhookConfig = parse_config("webhook", config)?;
        Ok(Box::new(WebhookSink::new(
            &cfg.url,
            cfg.body_template,
            cfg.timeout_secs,
        )))
    }
}
