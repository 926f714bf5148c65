pub mod server;

use crate::adapters::{RecurlyClient, WebhookNotifier};
use crate::config::AppConfig;
use crate::core::{EnrollmentWorkflow, WorkflowSettings};
use crate::domain::ports::{DisabledNotifications, NotificationSink};
use crate::utils::error::Result;
use std::sync::Arc;

pub use server::{app, cors_layer, AppState};

/// 依配置組裝 Recurly client、通知端點與工作流程
pub fn build_workflow(config: &AppConfig) -> Result<EnrollmentWorkflow> {
    let provider = Arc::new(RecurlyClient::from_config(&config.provider)?);

    let notifier: Arc<dyn NotificationSink> = if config.notification.enabled {
        let webhook = WebhookNotifier::from_config(&config.notification)?;
        tracing::info!("📬 Enrollment notifications go to {}", webhook.endpoint());
        Arc::new(webhook)
    } else {
        Arc::new(DisabledNotifications)
    };

    Ok(EnrollmentWorkflow::new(
        provider,
        notifier,
        config.plan_table()?,
        WorkflowSettings::from_config(config),
    ))
}

/// 啟動 HTTP 服務直到收到 Ctrl-C
pub async fn serve(config: &AppConfig) -> Result<()> {
    let state = AppState::new(build_workflow(config)?);
    let workflow = Arc::clone(&state.workflow);
    let router = app(state, cors_layer(&config.server)?);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(address.as_str()).await?;
    tracing::info!("🚀 Listening on {}", address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    workflow.drain().await;
    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
