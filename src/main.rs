use std::sync::Arc;
use std::time::Duration;

use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aqualert_service::advisory::AdvisoryClient;
use aqualert_service::api::{create_router, AppState};
use aqualert_service::classifier::Classifier;
use aqualert_service::config::Config;
use aqualert_service::store::WaterPointStore;
use aqualert_service::summary::SummaryGenerator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with environment filter support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,aqualert_service=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    info!("Starting AquaLERT inference service with config: {:?}", config);

    // Fallible capabilities: a failed load is logged and leaves the
    // capability disabled for the life of the process, never a crash.
    let classifier = match Classifier::load(&config.model_path) {
        Ok(clf) => {
            info!(
                "Potability classifier loaded from {} ({} features)",
                config.model_path,
                clf.feature_names().len()
            );
            Some(Arc::new(clf))
        }
        Err(e) => {
            error!(
                "Failed to load classifier from {}: {} - /predict will answer 503",
                config.model_path, e
            );
            None
        }
    };

    let advisory = match &config.gemini_api_key {
        Some(key) => {
            let timeout = Duration::from_secs(config.advisory_timeout_secs);
            match AdvisoryClient::new(key.clone(), timeout) {
                Ok(client) => {
                    info!("Gemini advisory client configured ({}s timeout)", config.advisory_timeout_secs);
                    Some(Arc::new(client))
                }
                Err(e) => {
                    error!("Failed to build advisory client: {} - advisory features disabled", e);
                    None
                }
            }
        }
        None => {
            warn!("GEMINI_API_KEY not set. AI advisory features will be disabled.");
            None
        }
    };

    let state = AppState {
        classifier,
        advisory,
        store: WaterPointStore::with_sample_points(),
        summary: SummaryGenerator::new(config.summary_seed),
    };
    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr = config.server_addr();
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
