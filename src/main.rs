use grant_upload_gateway::config::Settings;
use grant_upload_gateway::create_app;
use grant_upload_gateway::services::spawn_session_sweeper;
use grant_upload_gateway::state::AppState;
use grant_upload_gateway::utils::{shutdown_signal, DRAIN_TIMEOUT};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "grant_upload_gateway=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load configuration, using defaults: {}", e);
        Settings::default()
    });

    tracing::info!("Starting grant upload gateway...");
    tracing::info!("Configuration: {:?}", settings);

    let app_state = AppState::from_settings(&settings)
        .map_err(|e| anyhow::anyhow!("Failed to initialize services: {}", e))?;
    tracing::info!("Relaying uploads to {}", app_state.backend.base_url());

    let ct = CancellationToken::new();
    let sweeper = spawn_session_sweeper(
        app_state.sessions.clone(),
        settings.sessions.sweep_interval(),
        ct.child_token(),
    );

    let app = create_app(app_state.clone());

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    let coordinator = app_state.shutdown_coordinator.clone();
    let shutdown_future = async move {
        shutdown_signal().await;
        // new requests get 503 from here on, in-flight uploads get the drain window
        coordinator.drain(DRAIN_TIMEOUT).await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_future)
        .await?;

    ct.cancel();
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "session sweeper ended with error");
    }
    let orphaned = app_state.sessions.active_count();
    if orphaned > 0 {
        tracing::warn!("{} chunked uploads were never finalized", orphaned);
    }
    tracing::info!("Server shutdown complete");
    Ok(())
}
