use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use lead_scraper_api::api::handlers::{self, AppState};
use lead_scraper_api::config::Config;
use lead_scraper_api::core::orchestrator::Orchestrator;
use lead_scraper_api::integrations::places::PlacesService;
use lead_scraper_api::obs;

/// Main entry point for the application.
///
/// Initializes logging, loads configuration, builds the Places client and the
/// scrape orchestrator, then serves the HTTP API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    let config = Config::from_env()?;

    let places = PlacesService::new(&config)?;
    tracing::info!("✓ Places client initialized: {}", config.places_base_url);

    let orchestrator = Orchestrator::from_config(Arc::new(places), &config);
    tracing::info!(
        "Scrape orchestrator ready (timeout {}s, session TTL {}s)",
        config.scrape_timeout_secs,
        config.session_ttl_secs
    );

    let app_state = Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = handlers::api_routes().layer(
        ServiceBuilder::new()
            // Request size limit: 5MB max payload
            .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
            // Rate limiting: 10 req/sec per IP, burst of 20
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
