use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use url::Url;

use shipment_tracker::api;
use shipment_tracker::auth::SharedSecretIdentity;
use shipment_tracker::config::{Config, GeocoderKind, LogFormat};
use shipment_tracker::directory::{InMemoryUserDirectory, PgUserDirectory, UserDirectory};
use shipment_tracker::engine::service::ShipmentService;
use shipment_tracker::error::AppError;
use shipment_tracker::geo::gazetteer::Gazetteer;
use shipment_tracker::geo::nominatim::NominatimGeocoder;
use shipment_tracker::geo::resolver::{AddressResolver, Geocoder};
use shipment_tracker::notify::BroadcastNotifier;
use shipment_tracker::observability::metrics::Metrics;
use shipment_tracker::repository::memory::InMemoryShipmentRepository;
use shipment_tracker::repository::postgres::{self, PgShipmentRepository};
use shipment_tracker::repository::ShipmentRepository;
use shipment_tracker::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let identity = SharedSecretIdentity::new(config.auth_secret.clone())
        .ok_or_else(|| AppError::Internal("AUTH_SECRET must not be blank".to_string()))?;
    let metrics = Metrics::new();

    let (repository, users): (Arc<dyn ShipmentRepository>, Arc<dyn UserDirectory>) =
        match &config.database_url {
            Some(url) => {
                let pool = postgres::connect(
                    url,
                    config.database_max_connections,
                    config.database_timeout,
                )
                .await?;
                (
                    Arc::new(PgShipmentRepository::new(pool.clone())),
                    Arc::new(PgUserDirectory::new(pool)),
                )
            }
            None => {
                tracing::warn!(
                    directory_users = config.directory_users.len(),
                    "DATABASE_URL not set, using in-memory storage; only couriers listed in \
                     DIRECTORY_USERS or created by POST /seed can be assigned shipments"
                );
                let directory = config
                    .directory_users
                    .iter()
                    .fold(InMemoryUserDirectory::new(), |directory, (role, id)| {
                        directory.with_user(*id, *role)
                    });
                (Arc::new(InMemoryShipmentRepository::new()), Arc::new(directory))
            }
        };

    let geocoder: Arc<dyn Geocoder> = match config.geocoder {
        GeocoderKind::Nominatim => {
            let base_url = Url::parse(&config.geocoder_url).map_err(|err| {
                AppError::Internal(format!("invalid GEOCODER_URL {}: {err}", config.geocoder_url))
            })?;
            let client = NominatimGeocoder::new(
                base_url,
                config.geocoder_timeout,
                &config.geocoder_user_agent,
            )
            .map_err(|err| AppError::Internal(format!("failed to build geocoder client: {err}")))?;
            Arc::new(client)
        }
        GeocoderKind::Gazetteer => Arc::new(Gazetteer::polish_cities()),
    };

    let resolver = AddressResolver::new(
        geocoder,
        config.geocoder_max_concurrency,
        config.geocoder_timeout,
        metrics.clone(),
    );
    let notifier = Arc::new(BroadcastNotifier::new(config.event_buffer_size));

    let service = ShipmentService::new(
        repository,
        Arc::new(resolver),
        users.clone(),
        notifier.clone(),
        metrics.clone(),
    );

    tracing::info!(
        storage = service.storage_backend(),
        geocoder = service.geocoder_kind(),
        geocoder_concurrency = config.geocoder_max_concurrency,
        "shipment service ready"
    );

    let state = Arc::new(AppState::new(
        service,
        users,
        Arc::new(identity),
        notifier,
        metrics,
    ));

    let app = api::rest::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::new(config.log_level.clone());

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
