//! Chirpstream binary entry point

use chirpstream::service::{Notification, NotificationLevel};
use chirpstream::{AppState, config};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from the `logging` section
/// 3. Initialize metrics and AppState
/// 4. Connect the stream and start polling
/// 5. Serve metrics (optional)
/// 6. Run until Ctrl-C
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    init_tracing(&config.logging);
    tracing::info!("Starting Chirpstream...");
    tracing::info!(
        screen_name = %config.account.screen_name,
        base_url = %config.remote.base_url,
        "Configuration loaded"
    );

    // 3. Initialize metrics and application state
    chirpstream::metrics::init_metrics();

    let state = AppState::new(config.clone())?;

    if let Some(notifications) = state.notifier.take_receiver() {
        spawn_notification_drain(notifications);
    }

    // 4. Connect and start background tasks
    state.start();

    // 5. Serve metrics
    if config.metrics.enabled {
        let listener = tokio::net::TcpListener::bind(&config.metrics.bind).await?;
        tracing::info!("Metrics listening on {}", config.metrics.bind);

        let app = chirpstream::api::metrics_router(state.clone());
        tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, app).await {
                tracing::error!(%error, "Metrics server failed");
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    state.shutdown();

    Ok(())
}

fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter_directives().into());

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Log every queued notification
fn spawn_notification_drain(mut notifications: UnboundedReceiver<Notification>) {
    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            let time = notification.time.format("%H:%M:%S");
            match notification.level {
                NotificationLevel::Info => {
                    tracing::info!(%time, "{}", notification.message)
                }
                NotificationLevel::Warning => {
                    tracing::warn!(%time, "{}", notification.message)
                }
                NotificationLevel::Error => {
                    tracing::error!(%time, "{}", notification.message)
                }
            }
        }
    });

    tracing::info!("Notification task spawned");
}
