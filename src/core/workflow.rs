use crate::config::{AccountCodePolicy, AppConfig, BillingInfoPolicy};
use crate::core::intake::validate_request;
use crate::domain::model::{
    AccountDraft, AccountRecord, EnrollmentEvent, EnrollmentOutcome, EnrollmentRequest,
    SubscriptionDraft, SubscriptionRecord, ValidatedEnrollment,
};
use crate::domain::plans::PlanTable;
use crate::domain::ports::{BillingProvider, NotificationSink, ProviderResult};
use crate::utils::error::{FailureStage, ProviderError, WorkflowError};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;

/// 報名流程的行為設定
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub currency: String,
    pub account_code: AccountCodePolicy,
    pub attach_billing_info: bool,
    pub billing_info_failure: BillingInfoPolicy,
    pub notify_in_background: bool,
    /// 每次供應商呼叫的上限時間
    pub provider_timeout: Option<Duration>,
    pub notification_timeout: Option<Duration>,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            account_code: AccountCodePolicy::Email,
            attach_billing_info: false,
            billing_info_failure: BillingInfoPolicy::Fail,
            notify_in_background: false,
            provider_timeout: None,
            notification_timeout: None,
        }
    }
}

impl WorkflowSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            currency: config.provider.currency.clone(),
            account_code: config.workflow.account_code,
            attach_billing_info: config.workflow.attach_billing_info,
            billing_info_failure: config.workflow.billing_info_failure,
            notify_in_background: config.notification.background,
            provider_timeout: Some(config.provider_timeout()),
            notification_timeout: Some(config.notification_timeout()),
        }
    }
}

/// 帳戶 → 訂閱 → 付款資訊 → 通知 的線性流程；任何一步失敗就停止並回報階段
pub struct EnrollmentWorkflow {
    provider: Arc<dyn BillingProvider>,
    notifier: Arc<dyn NotificationSink>,
    plans: PlanTable,
    settings: WorkflowSettings,
    /// 背景通知任務，結束前由 `drain` 等待完成
    background: Mutex<JoinSet<()>>,
}

impl EnrollmentWorkflow {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        notifier: Arc<dyn NotificationSink>,
        plans: PlanTable,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            provider,
            notifier,
            plans,
            settings,
            background: Mutex::new(JoinSet::new()),
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// 執行完整流程；不會回傳錯誤，所有失敗都轉成結果
    pub async fn enroll(&self, request: EnrollmentRequest) -> EnrollmentOutcome {
        let enrollment = match self.validate(&request) {
            Ok(enrollment) => enrollment,
            Err(err) => {
                tracing::warn!("⚠️ Enrollment rejected: {}", err);
                return EnrollmentOutcome::failed(&err, None, None);
            }
        };

        let draft = self.account_draft(&enrollment);
        tracing::info!(
            "📝 Enrolling {} on plan '{}' ({})",
            draft.code,
            enrollment.plan_selector,
            enrollment.plan_code
        );

        let account = match self.create_account(&draft).await {
            Ok(account) => account,
            Err(err) => {
                log_stage_failure(&err);
                return EnrollmentOutcome::failed(&err, Some(draft.code), None);
            }
        };

        let subscription = match self.create_subscription(&enrollment, &account).await {
            Ok(subscription) => subscription,
            Err(err) => {
                log_stage_failure(&err);
                tracing::error!(
                    "❗ Account {} exists without a subscription and needs manual follow-up",
                    account.code
                );
                return EnrollmentOutcome::failed(&err, Some(account.code), None);
            }
        };

        let mut outcome = EnrollmentOutcome::succeeded(account.code.clone(), subscription.id.clone());

        if self.settings.attach_billing_info {
            if let Err(err) = self.attach_billing_info(&enrollment, &account).await {
                log_stage_failure(&err);
                outcome = match self.settings.billing_info_failure {
                    BillingInfoPolicy::Fail => EnrollmentOutcome::failed(
                        &err,
                        Some(account.code.clone()),
                        Some(subscription.id.clone()),
                    ),
                    BillingInfoPolicy::Report => EnrollmentOutcome {
                        failure_stage: Some(FailureStage::BillingInfo),
                        message: format!("Subscription created, but {}", err.public_message()),
                        ..outcome
                    },
                };
            }
        }

        let event = EnrollmentEvent::subscription_created(&enrollment, &account, &subscription);
        self.dispatch_notification(event).await;

        if outcome.success {
            tracing::info!(
                "✅ Created subscription {} for {} on plan {}",
                subscription.id,
                account.code,
                enrollment.plan_code
            );
        }
        outcome
    }

    /// 第 1 步：驗證，不呼叫任何外部服務
    pub fn validate(&self, request: &EnrollmentRequest) -> Result<ValidatedEnrollment, WorkflowError> {
        validate_request(request, &self.plans)
    }

    pub fn account_code_for(&self, enrollment: &ValidatedEnrollment) -> String {
        match self.settings.account_code {
            AccountCodePolicy::Email => enrollment.email.to_lowercase(),
            AccountCodePolicy::Generated => uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn account_draft(&self, enrollment: &ValidatedEnrollment) -> AccountDraft {
        AccountDraft {
            code: self.account_code_for(enrollment),
            first_name: enrollment.first_name.clone(),
            last_name: enrollment.last_name.clone(),
            email: enrollment.email.clone(),
            country: enrollment.country.clone(),
            phone: enrollment.phone.clone(),
            payment_token: enrollment.payment_token.clone(),
        }
    }

    /// 第 2 步：建立帳戶
    pub async fn create_account(&self, draft: &AccountDraft) -> Result<AccountRecord, WorkflowError> {
        tracing::debug!("🏦 Creating account {}", draft.code);
        let mut account = with_timeout(
            FailureStage::Account,
            self.settings.provider_timeout,
            self.provider.create_account(draft),
        )
        .await?;

        if account.id.trim().is_empty() {
            return Err(WorkflowError::ProviderRejection {
                stage: FailureStage::Account,
                status: 200,
                message: "provider response did not include an account id".to_string(),
            });
        }
        if account.code.trim().is_empty() {
            account.code = draft.code.clone();
        }

        tracing::debug!("🏦 Account {} created with id {}", account.code, account.id);
        Ok(account)
    }

    /// 第 3 步：建立訂閱
    pub async fn create_subscription(
        &self,
        enrollment: &ValidatedEnrollment,
        account: &AccountRecord,
    ) -> Result<SubscriptionRecord, WorkflowError> {
        let draft = SubscriptionDraft {
            plan_code: enrollment.plan_code.clone(),
            currency: self.settings.currency.clone(),
            account_code: account.code.clone(),
        };

        tracing::debug!("📦 Creating subscription for {} on {}", draft.account_code, draft.plan_code);
        let subscription = with_timeout(
            FailureStage::Subscription,
            self.settings.provider_timeout,
            self.provider.create_subscription(&draft),
        )
        .await?;

        if subscription.id.trim().is_empty() {
            return Err(WorkflowError::ProviderRejection {
                stage: FailureStage::Subscription,
                status: 200,
                message: "provider response did not include a subscription id".to_string(),
            });
        }
        Ok(subscription)
    }

    /// 第 4 步：重新綁定付款 token 到帳戶
    pub async fn attach_billing_info(
        &self,
        enrollment: &ValidatedEnrollment,
        account: &AccountRecord,
    ) -> Result<(), WorkflowError> {
        tracing::debug!("💳 Updating billing info for {}", account.code);
        with_timeout(
            FailureStage::BillingInfo,
            self.settings.provider_timeout,
            self.provider
                .update_billing_info(&account.code, &enrollment.payment_token),
        )
        .await
    }

    /// 第 5 步：通知下游；失敗只記錄，不影響結果
    pub async fn notify(&self, event: &EnrollmentEvent) -> Result<(), WorkflowError> {
        deliver(self.notifier.as_ref(), event, self.settings.notification_timeout).await
    }

    async fn dispatch_notification(&self, event: EnrollmentEvent) {
        if self.settings.notify_in_background {
            self.spawn_notification(event);
        } else if let Err(err) = self.notify(&event).await {
            tracing::warn!("📭 Notification failed: {}", err);
        }
    }

    fn spawn_notification(&self, event: EnrollmentEvent) {
        let notifier = Arc::clone(&self.notifier);
        let timeout = self.settings.notification_timeout;
        let mut tasks = self.background_tasks();
        // 回收已完成的任務
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            if let Err(err) = deliver(notifier.as_ref(), &event, timeout).await {
                tracing::warn!("📭 Background notification failed: {}", err);
            }
        });
    }

    /// 等待所有背景通知送出；程序結束前呼叫，否則 runtime 關閉時任務會被丟棄
    pub async fn drain(&self) {
        let mut tasks = self.take_background_tasks();
        if tasks.is_empty() {
            return;
        }

        tracing::info!("⏳ Waiting for {} background notification(s)", tasks.len());
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                tracing::warn!("📭 Background notification task did not finish: {}", err);
            }
        }
    }

    fn take_background_tasks(&self) -> JoinSet<()> {
        std::mem::take(&mut *self.background_tasks())
    }

    fn background_tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.background.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn with_timeout<T, F>(
    stage: FailureStage,
    timeout: Option<Duration>,
    call: F,
) -> Result<T, WorkflowError>
where
    F: Future<Output = ProviderResult<T>>,
{
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Network {
                message: format!("no response within {:?}", limit),
                timed_out: true,
            }),
        },
        None => call.await,
    };
    result.map_err(|err| WorkflowError::at(stage, err))
}

async fn deliver(
    notifier: &dyn NotificationSink,
    event: &EnrollmentEvent,
    timeout: Option<Duration>,
) -> Result<(), WorkflowError> {
    with_timeout(FailureStage::Notification, timeout, notifier.notify(event)).await?;
    tracing::debug!("📬 Delivered {} for {}", event.event, event.account_code);
    Ok(())
}

fn log_stage_failure(err: &WorkflowError) {
    match err {
        WorkflowError::NetworkFailure {
            stage,
            message,
            timed_out,
        } => tracing::error!(
            "❌ {} stage network failure (timed out: {}): {}",
            stage,
            timed_out,
            message
        ),
        WorkflowError::ProviderRejection {
            stage,
            status,
            message,
        } => tracing::error!("❌ {} stage rejected with HTTP {}: {}", stage, status, message),
        WorkflowError::Validation(_) => tracing::warn!("⚠️ {}", err),
    }
}
