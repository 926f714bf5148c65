pub mod toml_config;

pub use toml_config::{
    AccountCodePolicy, AppConfig, BillingInfoPolicy, LogFormat, DEFAULT_CONFIG_PATH,
};

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "enroll-bridge")]
#[command(about = "Subscription enrollment backend for the Recurly billing API")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Override the listening port (PORT environment variable also works)
    #[arg(long)]
    pub port: Option<u16>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 載入配置檔並套用環境變數與命令列覆蓋
    pub fn load_app_config(&self) -> crate::utils::error::Result<AppConfig> {
        let mut config = AppConfig::from_file(&self.config)?;
        config.apply_env_overrides()?;
        if let Some(port) = self.port {
            config.server.port = port;
        }
        Ok(config)
    }
}
