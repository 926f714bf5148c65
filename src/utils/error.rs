use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// 程序層級錯誤：只在啟動、載入配置或建立 HTTP client 時出現
#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': {reason} (got '{value}')")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

impl EnrollError {
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EnrollError::IoError(_) => "Check that the configuration file exists and is readable",
            EnrollError::HttpClientError(_) => "Check TLS support and proxy settings of this host",
            EnrollError::ConfigError { .. } => "Review the TOML file against enroll-config.example.toml",
            EnrollError::InvalidConfigValueError { .. } => "Fix the highlighted field and restart",
            EnrollError::MissingConfigError { .. } => {
                "Set the missing value in the TOML file or through its ${VAR} environment variable"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EnrollError>;

/// 工作流程中可能失敗的階段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Account,
    Subscription,
    BillingInfo,
    Notification,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Account => "account",
            FailureStage::Subscription => "subscription",
            FailureStage::BillingInfo => "billing_info",
            FailureStage::Notification => "notification",
        }
    }

    /// 給呼叫端看的動作描述
    pub fn action(&self) -> &'static str {
        match self {
            FailureStage::Account => "account creation",
            FailureStage::Subscription => "subscription creation",
            FailureStage::BillingInfo => "billing info update",
            FailureStage::Notification => "notification delivery",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 單一欄位的驗證錯誤
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// 外部服務（計費供應商、通知端點）呼叫失敗
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("network failure: {message}")]
    Network { message: String, timed_out: bool },
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network {
            timed_out: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

/// 報名流程的封閉錯誤集合，全部都會被轉成 EnrollmentOutcome
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("{stage} stage rejected by provider (HTTP {status}): {message}")]
    ProviderRejection {
        stage: FailureStage,
        status: u16,
        message: String,
    },

    #[error("{stage} stage network failure: {message}")]
    NetworkFailure {
        stage: FailureStage,
        message: String,
        timed_out: bool,
    },
}

impl WorkflowError {
    /// 將供應商錯誤綁定到發生的階段
    pub fn at(stage: FailureStage, err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected { status, message } => WorkflowError::ProviderRejection {
                stage,
                status,
                message,
            },
            ProviderError::Network { message, timed_out } => WorkflowError::NetworkFailure {
                stage,
                message,
                timed_out,
            },
        }
    }

    pub fn stage(&self) -> Option<FailureStage> {
        match self {
            WorkflowError::Validation(_) => None,
            WorkflowError::ProviderRejection { stage, .. }
            | WorkflowError::NetworkFailure { stage, .. } => Some(*stage),
        }
    }

    /// 對呼叫端而言網路失敗與供應商拒絕一視同仁，這裡只給出共用的說明
    pub fn public_message(&self) -> String {
        match self {
            WorkflowError::Validation(_) => "validation".to_string(),
            WorkflowError::ProviderRejection { stage, message, .. } => {
                format!("{} failed: {}", stage.action(), message)
            }
            WorkflowError::NetworkFailure { stage, .. } => {
                format!("{} failed: billing provider unavailable", stage.action())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_is_attached_to_provider_errors() {
        let err = WorkflowError::at(
            FailureStage::Subscription,
            ProviderError::Rejected {
                status: 422,
                message: "plan not found".to_string(),
            },
        );
        assert_eq!(err.stage(), Some(FailureStage::Subscription));
        assert_eq!(err.public_message(), "subscription creation failed: plan not found");

        let err = WorkflowError::at(
            FailureStage::Account,
            ProviderError::Network {
                message: "operation timed out".to_string(),
                timed_out: true,
            },
        );
        assert!(matches!(
            err,
            WorkflowError::NetworkFailure {
                stage: FailureStage::Account,
                timed_out: true,
                ..
            }
        ));
    }

    #[test]
    fn test_validation_error_display_lists_fields() {
        let err = WorkflowError::Validation(vec![
            FieldError::new("email", "is required"),
            FieldError::new("plan", "unknown plan 'weekly'"),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: email: is required; plan: unknown plan 'weekly'"
        );
        assert_eq!(err.stage(), None);
        assert_eq!(err.public_message(), "validation");
    }

    #[test]
    fn test_network_failure_hides_transport_details_from_callers() {
        let err = WorkflowError::NetworkFailure {
            stage: FailureStage::Account,
            message: "dns error: no such host".to_string(),
            timed_out: false,
        };
        assert_eq!(
            err.public_message(),
            "account creation failed: billing provider unavailable"
        );
    }

    #[test]
    fn test_billing_info_message_names_the_update() {
        let err = WorkflowError::at(
            FailureStage::BillingInfo,
            ProviderError::Rejected {
                status: 400,
                message: "Token expired".to_string(),
            },
        );
        assert_eq!(err.public_message(), "billing info update failed: Token expired");
    }

    #[test]
    fn test_http_client_errors_convert_with_suggestion() {
        let source = reqwest::Client::new().get("not a url").build().unwrap_err();
        let err = EnrollError::from(source);
        assert!(matches!(err, EnrollError::HttpClientError(_)));
        assert!(err.recovery_suggestion().contains("TLS"));
    }

    #[test]
    fn test_failure_stage_serializes_snake_case() {
        let json = serde_json::to_string(&FailureStage::BillingInfo).unwrap();
        assert_eq!(json, "\"billing_info\"");
        assert_eq!(FailureStage::Account.to_string(), "account");
    }
}
