use crate::domain::plans::PlanTable;
use crate::utils::error::{EnrollError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "enroll-config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub plans: BTreeMap<String, String>,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 空陣列或包含 "*" 代表允許所有來源
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountCodePolicy {
    /// 以小寫 email 當作帳戶代碼，同一 email 重複報名會被供應商拒絕
    #[default]
    Email,
    /// 每次報名產生新的 UUID
    Generated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInfoPolicy {
    /// 更新付款資訊失敗時整體視為失敗
    #[default]
    Fail,
    /// 訂閱仍算成功，只在結果中標註 billing_info 階段
    Report,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub account_code: AccountCodePolicy,
    #[serde(default)]
    pub attach_billing_info: bool,
    #[serde(default)]
    pub billing_info_failure: BillingInfoPolicy,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            account_code: AccountCodePolicy::Email,
            attach_billing_info: false,
            billing_info_failure: BillingInfoPolicy::Fail,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    pub endpoint: Option<String>,
    #[serde(default = "default_notification_timeout")]
    pub timeout_seconds: u64,
    /// 改由背景 task 發送，不等待結果
    #[serde(default)]
    pub background: bool,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            timeout_seconds: default_notification_timeout(),
            background: false,
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    pub level: Option<String>,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_api_version() -> String {
    "v2021-02-25".to_string()
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_notification_timeout() -> u64 {
    5
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EnrollError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EnrollError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${RECURLY_API_KEY})，未設定的保持原樣交給驗證處理
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let re = PLACEHOLDER
            .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is a valid regex"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    /// PORT 環境變數優先於檔案設定
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| EnrollError::InvalidConfigValueError {
                    field: "PORT".to_string(),
                    value: port.clone(),
                    reason: "Port must be a number between 0 and 65535".to_string(),
                })?;
        }
        Ok(())
    }

    pub fn plan_table(&self) -> Result<PlanTable> {
        PlanTable::new(self.plans.iter())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_seconds)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification.timeout_seconds)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.server.allowed_origins.is_empty()
            || self.server.allowed_origins.iter().any(|o| o == "*")
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("provider.base_url", &self.provider.base_url)?;
        validation::validate_non_empty_string("provider.api_key", &self.provider.api_key)?;
        validation::validate_resolved("provider.api_key", &self.provider.api_key)?;
        validation::validate_non_empty_string("provider.api_version", &self.provider.api_version)?;
        validation::validate_range("provider.timeout_seconds", self.provider.timeout_seconds, 1, 120)?;

        let currency = &self.provider.currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(EnrollError::InvalidConfigValueError {
                field: "provider.currency".to_string(),
                value: currency.clone(),
                reason: "Currency must be a three-letter ISO 4217 code such as USD".to_string(),
            });
        }

        self.plan_table()?;

        if let Some(level) = &self.logging.level {
            if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(EnrollError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.clone(),
                    reason: format!("Log level must be one of {}", LOG_LEVELS.join(", ")),
                });
            }
        }

        if self.notification.enabled {
            let endpoint =
                validation::validate_required_field("notification.endpoint", &self.notification.endpoint)?;
            validation::validate_url("notification.endpoint", endpoint)?;
            validation::validate_range(
                "notification.timeout_seconds",
                self.notification.timeout_seconds,
                1,
                60,
            )?;
            for (name, value) in &self.notification.headers {
                validation::validate_resolved(&format!("notification.headers.{}", name), value)?;
            }
        }

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
