use clap::Parser;
use enroll_bridge::app::build_workflow;
use enroll_bridge::config::DEFAULT_CONFIG_PATH;
use enroll_bridge::utils::{logger, validation::Validate};
use enroll_bridge::{AppConfig, EnrollmentRequest};
use std::io::Read;

#[derive(Parser)]
#[command(name = "enroll-once")]
#[command(about = "Run a single subscription enrollment from a JSON request")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Path to the enrollment request JSON ("-" reads stdin)
    #[arg(short, long, default_value = "-")]
    request: String,

    /// Validate the request and show the derived account and plan codes only
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn read_request(path: &str) -> anyhow::Result<EnrollmentRequest> {
    let content = if path == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&content)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();
    logger::init_cli_logger(args.verbose, None);

    let mut config = AppConfig::from_file(&args.config)?;
    config.apply_env_overrides()?;
    if let Err(e) = config.validate() {
        eprintln!("❌ {}", e);
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let request = read_request(&args.request)?;
    let workflow = build_workflow(&config)?;

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no provider calls will be made");
        match workflow.validate(&request) {
            Ok(enrollment) => {
                let draft = workflow.account_draft(&enrollment);
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "valid": true,
                        "accountCode": draft.code,
                        "plan": enrollment.plan_selector,
                        "planCode": enrollment.plan_code,
                        "attachBillingInfo": workflow.settings().attach_billing_info,
                    }))?
                );
                return Ok(());
            }
            Err(e) => {
                eprintln!("❌ {}", e);
                std::process::exit(1);
            }
        }
    }

    let outcome = workflow.enroll(request).await;
    workflow.drain().await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    let exit_code = match outcome.http_status() {
        200 => 0,
        400 => 1,
        _ => 2,
    };
    if exit_code > 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
