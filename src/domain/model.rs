use crate::utils::error::{FailureStage, FieldError, WorkflowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 客戶端送來的報名請求；欄位全部可缺，缺少與否交給驗證階段判斷
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    #[serde(default, rename = "firstName", alias = "first_name")]
    pub first_name: Option<String>,

    #[serde(default, rename = "lastName", alias = "last_name")]
    pub last_name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub country: Option<String>,

    #[serde(default, rename = "plan", alias = "planSelector", alias = "plan_selector")]
    pub plan_selector: Option<String>,

    #[serde(
        default,
        rename = "token",
        alias = "paymentToken",
        alias = "payment_token",
        alias = "token_id"
    )]
    pub payment_token: Option<String>,

    #[serde(default, rename = "phone", alias = "phoneContact", alias = "phone_contact")]
    pub phone: Option<String>,
}

/// 通過驗證後的請求，已經完成修剪與方案對應
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEnrollment {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
    pub plan_selector: String,
    pub plan_code: String,
    pub payment_token: String,
    pub phone: Option<String>,
}

/// 建立帳戶時送給供應商的資料
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDraft {
    pub code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub country: String,
    pub phone: Option<String>,
    pub payment_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDraft {
    pub plan_code: String,
    pub currency: String,
    pub account_code: String,
}

/// 供應商回應中缺少的欄位以空字串表示，由工作流程判定為失敗
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// 訂閱成功後送往下游的事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentEvent {
    pub event: String,
    pub account_code: String,
    pub subscription_id: String,
    pub plan: String,
    pub plan_code: String,
    pub email: String,
    pub occurred_at: DateTime<Utc>,
}

impl EnrollmentEvent {
    pub const SUBSCRIPTION_CREATED: &'static str = "subscription.created";

    pub fn subscription_created(
        enrollment: &ValidatedEnrollment,
        account: &AccountRecord,
        subscription: &SubscriptionRecord,
    ) -> Self {
        Self {
            event: Self::SUBSCRIPTION_CREATED.to_string(),
            account_code: account.code.clone(),
            subscription_id: subscription.id.clone(),
            plan: enrollment.plan_selector.clone(),
            plan_code: enrollment.plan_code.clone(),
            email: enrollment.email.clone(),
            occurred_at: Utc::now(),
        }
    }
}

/// 回傳給客戶端的結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentOutcome {
    pub success: bool,
    pub account_code: Option<String>,
    pub subscription_id: Option<String>,
    pub failure_stage: Option<FailureStage>,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl EnrollmentOutcome {
    pub fn succeeded(account_code: String, subscription_id: String) -> Self {
        Self {
            success: true,
            account_code: Some(account_code),
            subscription_id: Some(subscription_id),
            failure_stage: None,
            message: "Subscription created".to_string(),
            errors: Vec::new(),
        }
    }

    /// 由錯誤組成結果；已經建立的帳戶與訂閱仍然回報，方便人工處理
    pub fn failed(
        error: &WorkflowError,
        account_code: Option<String>,
        subscription_id: Option<String>,
    ) -> Self {
        let errors = match error {
            WorkflowError::Validation(errors) => errors.clone(),
            _ => Vec::new(),
        };
        Self {
            success: false,
            account_code,
            subscription_id,
            failure_stage: error.stage(),
            message: error.public_message(),
            errors,
        }
    }

    pub fn is_validation_failure(&self) -> bool {
        !self.success && self.failure_stage.is_none()
    }

    /// 200 成功、400 驗證失敗、500 外部呼叫失敗
    pub fn http_status(&self) -> u16 {
        if self.success {
            200
        } else if self.is_validation_failure() {
            400
        } else {
            500
        }
    }
}
