pub mod api;
pub mod auth;
pub mod authorization;
pub mod config;
pub mod core_state;
pub mod db;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod reminder;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::core_state::CoreState;

pub fn run() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Medibook starting v{}", config::APP_VERSION);

    if let Err(e) = start(ServerConfig::from_env()) {
        tracing::error!("Medibook failed: {e}");
        std::process::exit(1);
    }
}

fn start(config: ServerConfig) -> Result<(), String> {
    let runtime = tokio::runtime::Runtime::new().map_err(|e| format!("tokio runtime: {e}"))?;

    let core = Arc::new(CoreState::from_config(&config).map_err(|e| e.to_string())?);
    tracing::info!(database = %core.db_path().display(), "Database ready");

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let conn = core.open_db().map_err(|e| e.to_string())?;
        auth::bootstrap_admin(&conn, email, password).map_err(|e| e.to_string())?;
    }

    match core.prune_audit() {
        Ok(0) => {}
        Ok(pruned) => tracing::info!(pruned, "Pruned old audit entries"),
        Err(e) => tracing::warn!(error = %e, "Audit pruning failed"),
    }

    // The reminder thread captures the runtime handle for async notifiers
    let reminder = {
        let _guard = runtime.enter();
        reminder::start_reminder_job(core.clone(), config.reminder_hour)
    };

    let result = runtime.block_on(serve(core, config));

    // Joins the reminder thread; outside the runtime so it never blocks a worker
    drop(reminder);
    result
}

async fn serve(core: Arc<CoreState>, config: ServerConfig) -> Result<(), String> {
    let mut server = api::start_api_server(core, config.bind).await?;
    tracing::info!(addr = %server.info.server_addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
    }

    server.shutdown();
    server.stopped().await;
    Ok(())
}
