//! Workout Session - guided training runtime
//!
//! This is the main entry point for the workout-session server.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use workout_session::{
    api::create_router,
    config::Config,
    services::{BackendReporter, LoggingReporter, ProgressReporter},
    state::AppState,
    tasks::progress_reporter_task,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("workout_session={},tower_http=info", config.log_level()))
        .init();

    info!("Starting workout-session server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, tick={}ms, backend={}",
        config.host,
        config.port,
        config.tick_ms,
        config.backend_url.as_deref().unwrap_or("none")
    );

    let reporter: Arc<dyn ProgressReporter> = match &config.backend_url {
        Some(url) => Arc::new(BackendReporter::new(url.clone())?),
        None => Arc::new(LoggingReporter),
    };

    // Create application state
    let state = Arc::new(AppState::new(
        config.port,
        config.host.clone(),
        config.plan_rules(),
        config.tick_interval(),
    ));

    // Start the progress reporter background task
    let reporter_state = Arc::clone(&state);
    tokio::spawn(async move {
        progress_reporter_task(reporter_state, reporter).await;
    });

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /session            - Load a workout");
    info!("  POST   /session/start      - Start the workout");
    info!("  POST   /session/pause      - Toggle pause");
    info!("  POST   /session/skip       - Skip the current rest");
    info!("  POST   /session/abort      - Abort the workout");
    info!("  POST   /session/background - App went to the background");
    info!("  POST   /session/foreground - App came back");
    info!("  GET    /session            - Current view");
    info!("  DELETE /session            - Leave the training screen");
    info!("  GET    /session/events     - Server-sent view updates");
    info!("  GET    /status             - Service status");
    info!("  GET    /health             - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            if state.current_session_id().is_some() {
                if let Err(e) = state.leave() {
                    tracing::warn!("Failed to close session on shutdown: {}", e);
                }
            }
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
