use crate::config::toml_config::ProviderConfig;
use crate::domain::model::{AccountDraft, AccountRecord, SubscriptionDraft, SubscriptionRecord};
use crate::domain::ports::{BillingProvider, ProviderResult};
use crate::utils::error::{EnrollError, ProviderError, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Recurly v3 REST API 的最小 client，只實作報名需要的三個端點
#[derive(Debug, Clone)]
pub struct RecurlyClient {
    client: Client,
    base_url: Url,
    api_key: String,
    accept: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct AccountCreate<'a> {
    code: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    address: Address<'a>,
    billing_info: BillingInfo<'a>,
}

#[derive(Serialize)]
struct Address<'a> {
    country: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
}

#[derive(Serialize)]
struct BillingInfo<'a> {
    token_id: &'a str,
}

#[derive(Serialize)]
struct SubscriptionCreate<'a> {
    plan_code: &'a str,
    currency: &'a str,
    account: AccountReference<'a>,
}

#[derive(Serialize)]
struct AccountReference<'a> {
    code: &'a str,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

impl RecurlyClient {
    pub fn new(base_url: &str, api_key: &str, api_version: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| EnrollError::InvalidConfigValueError {
            field: "provider.base_url".to_string(),
            value: base_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(EnrollError::InvalidConfigValueError {
                field: "provider.base_url".to_string(),
                value: base_url.to_string(),
                reason: "URL cannot be used as an API base".to_string(),
            });
        }

        Ok(Self {
            client: Client::builder().build()?,
            base_url,
            api_key: api_key.to_string(),
            accept: format!("application/vnd.recurly.{}+json", api_version),
            timeout,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            &config.api_key,
            &config.api_version,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    fn endpoint(&self, segments: &[&str]) -> ProviderResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Network {
                message: format!("cannot build request path from {}", self.base_url),
                timed_out: false,
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        // Recurly 使用 API key 作為 Basic auth 的使用者名稱，密碼留空
        self.client
            .request(method, url)
            .basic_auth(&self.api_key, Some(""))
            .header(header::ACCEPT, &self.accept)
            .timeout(self.timeout)
    }

    /// 非 2xx 視為拒絕；回傳成功回應的狀態碼與內容
    async fn execute(&self, request: RequestBuilder) -> ProviderResult<(StatusCode, String)> {
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Recurly responded with {}", status);

        if !status.is_success() {
            return Err(rejection(response).await);
        }
        Ok((status, response.text().await?))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ProviderResult<T> {
        let (status, body) = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Rejected {
            status: status.as_u16(),
            message: format!("unexpected response body: {}", e),
        })
    }
}

/// 從 Recurly 錯誤格式 {"error":{"type","message"}} 取出訊息
async fn rejection(response: Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(ErrorEnvelope { error }) => match (error.kind, error.message) {
            (Some(kind), Some(message)) => format!("{} ({})", message, kind),
            (None, Some(message)) => message,
            (Some(kind), None) => kind,
            (None, None) => status.to_string(),
        },
        Err(_) if !body.trim().is_empty() => body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };

    ProviderError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl BillingProvider for RecurlyClient {
    async fn create_account(&self, draft: &AccountDraft) -> ProviderResult<AccountRecord> {
        let body = AccountCreate {
            code: &draft.code,
            email: &draft.email,
            first_name: &draft.first_name,
            last_name: &draft.last_name,
            address: Address {
                country: &draft.country,
                phone: draft.phone.as_deref(),
            },
            billing_info: BillingInfo {
                token_id: &draft.payment_token,
            },
        };

        let url = self.endpoint(&["accounts"])?;
        self.send(self.request(Method::POST, url).json(&body)).await
    }

    async fn create_subscription(
        &self,
        draft: &SubscriptionDraft,
    ) -> ProviderResult<SubscriptionRecord> {
        let body = SubscriptionCreate {
            plan_code: &draft.plan_code,
            currency: &draft.currency,
            account: AccountReference {
                code: &draft.account_code,
            },
        };

        let url = self.endpoint(&["subscriptions"])?;
        self.send(self.request(Method::POST, url).json(&body)).await
    }

    async fn update_billing_info(
        &self,
        account_code: &str,
        payment_token: &str,
    ) -> ProviderResult<()> {
        let account_segment = format!("code-{}", account_code);
        let url = self.endpoint(&["accounts", account_segment.as_str(), "billing_info"])?;
        let body = BillingInfo {
            token_id: payment_token,
        };

        self.execute(self.request(Method::PUT, url).json(&body)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RecurlyClient {
        RecurlyClient::new(base, "key", "v2021-02-25", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_accept_header_carries_api_version() {
        assert_eq!(
            client("https://v3.eu.recurly.com").accept,
            "application/vnd.recurly.v2021-02-25+json"
        );
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let c = client("https://v3.eu.recurly.com");
        assert_eq!(
            c.endpoint(&["accounts"]).unwrap().as_str(),
            "https://v3.eu.recurly.com/accounts"
        );

        let c = client("http://127.0.0.1:9000/recurly/");
        assert_eq!(
            c.endpoint(&["accounts", "code-jane@example.com", "billing_info"])
                .unwrap()
                .as_str(),
            "http://127.0.0.1:9000/recurly/accounts/code-jane@example.com/billing_info"
        );
    }

    #[test]
    fn test_endpoint_escapes_path_separators_in_codes() {
        let c = client("https://v3.eu.recurly.com");
        let url = c.endpoint(&["accounts", "code-a/b", "billing_info"]).unwrap();
        assert_eq!(url.path(), "/accounts/code-a%2Fb/billing_info");
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        assert!(RecurlyClient::new("not a url", "key", "v1", Duration::from_secs(1)).is_err());
        assert!(RecurlyClient::new("mailto:ops@example.com", "key", "v1", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_account_body_shape() {
        let body = AccountCreate {
            code: "jane@example.com",
            email: "jane@example.com",
            first_name: "Jane",
            last_name: "Doe",
            address: Address {
                country: "US",
                phone: None,
            },
            billing_info: BillingInfo { token_id: "tok_123" },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["billing_info"]["token_id"], "tok_123");
        assert_eq!(json["address"]["country"], "US");
        assert!(json["address"].get("phone").is_none());
    }
}
