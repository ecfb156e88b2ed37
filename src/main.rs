use std::sync::Arc;

use pbis_collector::{
    email::{EmailSender, GraphqlEmailSender, LoggingEmailSender, WinnerNotifier},
    graphql::{GraphqlClient, GraphqlSettings},
    operator::TokenConfig,
    pbis::{self, BackendSeed, CollectionOrchestrator, GraphqlPbisBackend, InMemoryPbisBackend},
    shared::AppState,
    PbisBackend, PbisConfig,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pbis_collector=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting PBIS collection service");

    let config = PbisConfig::from_env()?;

    // The GraphQL backend wins when configured; otherwise serve an in-memory school
    let (backend, sender): (Arc<dyn PbisBackend>, Arc<dyn EmailSender>) =
        match GraphqlSettings::from_env() {
            Some(settings) => {
                info!(endpoint = %settings.endpoint, "Using GraphQL backend");
                let client = GraphqlClient::new(settings)?;
                (
                    Arc::new(GraphqlPbisBackend::new(client.clone())),
                    Arc::new(GraphqlEmailSender::new(client)),
                )
            }
            None => {
                let backend = match std::env::var("PBIS_SEED_FILE") {
                    Ok(path) => {
                        let raw = tokio::fs::read_to_string(&path).await?;
                        let seed: BackendSeed = serde_json::from_str(&raw)?;
                        info!(
                            %path,
                            teachers = seed.ta_teachers.len(),
                            collections = seed.pbis_collection_dates.len(),
                            "Loaded backend seed"
                        );
                        InMemoryPbisBackend::with_seed(seed)
                    }
                    Err(_) => InMemoryPbisBackend::new(),
                };
                info!("Using in-memory backend, emails are only logged");
                (Arc::new(backend), Arc::new(LoggingEmailSender::new()))
            }
        };

    let notifier = WinnerNotifier::new(sender, config.email_delay);
    let orchestrator = CollectionOrchestrator::builder(backend)
        .with_config(config)
        .with_notifier(Arc::new(notifier))
        .build()?;

    let app_state = AppState::new(Arc::new(orchestrator), TokenConfig::new());

    let app = pbis::handlers::routes(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let bind_addr = std::env::var("PBIS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server running on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
