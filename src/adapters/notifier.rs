use crate::config::toml_config::NotificationConfig;
use crate::domain::model::EnrollmentEvent;
use crate::domain::ports::{NotificationSink, ProviderResult};
use crate::utils::error::{EnrollError, ProviderError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// 以 HTTP POST 將報名事件送到下游 webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
    headers: HashMap<String, String>,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(endpoint: String, headers: HashMap<String, String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint,
            headers,
            timeout,
        })
    }

    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| EnrollError::MissingConfigError {
                field: "notification.endpoint".to_string(),
            })?;
        Self::new(
            endpoint,
            config.headers.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, event: &EnrollmentEvent) -> ProviderResult<()> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(event)
            .timeout(self.timeout);

        // 添加自定義標頭
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        tracing::debug!("📨 Posting {} to {}", event.event, self.endpoint);
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::Rejected {
                status: status.as_u16(),
                message: if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body.trim().to_string()
                },
            })
        }
    }
}
