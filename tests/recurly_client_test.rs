use enroll_bridge::adapters::{RecurlyClient, WebhookNotifier};
use enroll_bridge::domain::model::{AccountDraft, EnrollmentEvent, SubscriptionDraft};
use enroll_bridge::domain::ports::{BillingProvider, NotificationSink};
use enroll_bridge::utils::error::ProviderError;
use httpmock::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

const ACCEPT: &str = "application/vnd.recurly.v2021-02-25+json";
// base64("test-key:")
const AUTHORIZATION: &str = "Basic dGVzdC1rZXk6";

fn client(server: &MockServer) -> RecurlyClient {
    RecurlyClient::new(&server.base_url(), "test-key", "v2021-02-25", Duration::from_secs(5)).unwrap()
}

fn account_draft() -> AccountDraft {
    AccountDraft {
        code: "jane@example.com".to_string(),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        email: "jane@example.com".to_string(),
        country: "US".to_string(),
        phone: Some("+1 555 0100".to_string()),
        payment_token: "tok_123".to_string(),
    }
}

#[tokio::test]
async fn test_create_account_posts_expected_body() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/accounts")
                .header("Accept", ACCEPT)
                .header("Authorization", AUTHORIZATION)
                .json_body(serde_json::json!({
                    "code": "jane@example.com",
                    "email": "jane@example.com",
                    "first_name": "Jane",
                    "last_name": "Doe",
                    "address": {"country": "US", "phone": "+1 555 0100"},
                    "billing_info": {"token_id": "tok_123"}
                }));
            then.status(201).json_body(serde_json::json!({
                "id": "p4tj2v9p0nqo",
                "object": "account",
                "code": "jane@example.com",
                "state": "active"
            }));
        })
        .await;

    let account = client(&server).create_account(&account_draft()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(account.id, "p4tj2v9p0nqo");
    assert_eq!(account.code, "jane@example.com");
}

#[tokio::test]
async fn test_create_account_surfaces_recurly_error_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/accounts");
            then.status(422).json_body(serde_json::json!({
                "error": {
                    "type": "validation",
                    "message": "Code has already been taken",
                    "params": [{"param": "code", "message": "has already been taken"}]
                }
            }));
        })
        .await;

    let err = client(&server).create_account(&account_draft()).await.unwrap_err();

    assert_eq!(
        err,
        ProviderError::Rejected {
            status: 422,
            message: "Code has already been taken (validation)".to_string(),
        }
    );
}

#[tokio::test]
async fn test_plain_text_error_body_is_kept() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/accounts");
            then.status(502).body("upstream unavailable");
        })
        .await;

    let err = client(&server).create_account(&account_draft()).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::Rejected {
            status: 502,
            message: "upstream unavailable".to_string(),
        }
    );
}

#[tokio::test]
async fn test_create_account_without_id_deserializes_to_empty_id() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/accounts");
            then.status(200).json_body(serde_json::json!({"object": "account"}));
        })
        .await;

    let account = client(&server).create_account(&account_draft()).await.unwrap();
    assert!(account.id.is_empty());
}

#[tokio::test]
async fn test_create_subscription_posts_plan_and_account_code() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/subscriptions")
                .header("Authorization", AUTHORIZATION)
                .json_body(serde_json::json!({
                    "plan_code": "premium-monthly",
                    "currency": "USD",
                    "account": {"code": "jane@example.com"}
                }));
            then.status(201).json_body(serde_json::json!({
                "id": "sub_8x1",
                "uuid": "44f83d7cba354d5b84812419f923ea96",
                "state": "active"
            }));
        })
        .await;

    let draft = SubscriptionDraft {
        plan_code: "premium-monthly".to_string(),
        currency: "USD".to_string(),
        account_code: "jane@example.com".to_string(),
    };
    let subscription = client(&server).create_subscription(&draft).await.unwrap();

    mock.assert_async().await;
    assert_eq!(subscription.id, "sub_8x1");
    assert_eq!(subscription.state.as_deref(), Some("active"));
}

#[tokio::test]
async fn test_update_billing_info_puts_token_on_account() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/accounts/code-jane@example.com/billing_info")
                .json_body(serde_json::json!({"token_id": "tok_123"}));
            then.status(200)
                .json_body(serde_json::json!({"id": "bi_1", "object": "billing_info"}));
        })
        .await;

    client(&server)
        .update_billing_info("jane@example.com", "tok_123")
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_provider_is_network_failure() {
    // 保留的測試埠，不會有服務
    let client = RecurlyClient::new(
        "http://127.0.0.1:9",
        "test-key",
        "v2021-02-25",
        Duration::from_secs(2),
    )
    .unwrap();

    let err = client.create_account(&account_draft()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Network { .. }));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/subscriptions");
            then.status(201)
                .delay(Duration::from_secs(3))
                .json_body(serde_json::json!({"id": "sub_late"}));
        })
        .await;

    let client = RecurlyClient::new(
        &server.base_url(),
        "test-key",
        "v2021-02-25",
        Duration::from_millis(200),
    )
    .unwrap();
    let draft = SubscriptionDraft {
        plan_code: "premium-monthly".to_string(),
        currency: "USD".to_string(),
        account_code: "jane@example.com".to_string(),
    };

    let err = client.create_subscription(&draft).await.unwrap_err();
    assert!(matches!(err, ProviderError::Network { timed_out: true, .. }));
}

#[tokio::test]
async fn test_webhook_notifier_posts_event_with_headers() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/enrollments")
                .header("X-Source", "enroll-bridge")
                .json_body_partial(
                    r#"{"event": "subscription.created", "accountCode": "jane@example.com", "subscriptionId": "sub_1"}"#,
                );
            then.status(204);
        })
        .await;

    let mut headers = HashMap::new();
    headers.insert("X-Source".to_string(), "enroll-bridge".to_string());
    let notifier =
        WebhookNotifier::new(server.url("/enrollments"), headers, Duration::from_secs(2)).unwrap();

    let event = EnrollmentEvent {
        event: EnrollmentEvent::SUBSCRIPTION_CREATED.to_string(),
        account_code: "jane@example.com".to_string(),
        subscription_id: "sub_1".to_string(),
        plan: "monthly".to_string(),
        plan_code: "premium-monthly".to_string(),
        email: "jane@example.com".to_string(),
        occurred_at: chrono::Utc::now(),
    };
    notifier.notify(&event).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_webhook_notifier_reports_rejection() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/enrollments");
            then.status(500).body("listener crashed");
        })
        .await;

    let notifier =
        WebhookNotifier::new(server.url("/enrollments"), HashMap::new(), Duration::from_secs(2))
            .unwrap();
    let event = EnrollmentEvent {
        event: EnrollmentEvent::SUBSCRIPTION_CREATED.to_string(),
        account_code: "jane@example.com".to_string(),
        subscription_id: "sub_1".to_string(),
        plan: "monthly".to_string(),
        plan_code: "premium-monthly".to_string(),
        email: "jane@example.com".to_string(),
        occurred_at: chrono::Utc::now(),
    };

    let err = notifier.notify(&event).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::Rejected {
            status: 500,
            message: "listener crashed".to_string(),
        }
    );
}
