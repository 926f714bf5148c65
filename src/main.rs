use clap::Parser;
use enroll_bridge::config::LogFormat;
use enroll_bridge::utils::{logger, validation::Validate};
use enroll_bridge::{app, AppConfig, CliConfig};

fn init_logging(config: Option<&AppConfig>, verbose: bool) {
    let level = config.and_then(|c| c.logging.level.as_deref());
    match config.map(|c| c.logging.format) {
        Some(LogFormat::Json) => logger::init_json_logger(verbose, level),
        _ => logger::init_cli_logger(verbose, level),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // .env 只在存在時載入
    dotenvy::dotenv().ok();

    let config = match cli.load_app_config() {
        Ok(config) => config,
        Err(e) => {
            init_logging(None, cli.verbose);
            tracing::error!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    init_logging(Some(&config), cli.verbose);
    tracing::info!("Starting enroll-bridge");

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    tracing::info!(
        "✅ Configuration loaded: provider {}, {} plan(s), account codes from {:?}",
        config.provider.base_url,
        config.plans.len(),
        config.workflow.account_code
    );

    if cli.check {
        println!("✅ Configuration '{}' is valid", cli.config);
        return Ok(());
    }

    if let Err(e) = app::serve(&config).await {
        tracing::error!("❌ Server failed: {}", e);
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    Ok(())
}
