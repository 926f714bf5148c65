use crate::domain::model::{
    AccountDraft, AccountRecord, EnrollmentEvent, SubscriptionDraft, SubscriptionRecord,
};
use crate::utils::error::ProviderError;
use async_trait::async_trait;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// 計費供應商的三個 REST 操作
#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_account(&self, draft: &AccountDraft) -> ProviderResult<AccountRecord>;

    async fn create_subscription(
        &self,
        draft: &SubscriptionDraft,
    ) -> ProviderResult<SubscriptionRecord>;

    async fn update_billing_info(
        &self,
        account_code: &str,
        payment_token: &str,
    ) -> ProviderResult<()>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &EnrollmentEvent) -> ProviderResult<()>;
}

/// 未啟用通知時使用
#[derive(Debug, Clone, Default)]
pub struct DisabledNotifications;

#[async_trait]
impl NotificationSink for DisabledNotifications {
    async fn notify(&self, event: &EnrollmentEvent) -> ProviderResult<()> {
        tracing::debug!(
            "Notifications disabled, dropping {} for {}",
            event.event,
            event.account_code
        );
        Ok(())
    }
}
