use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use union_api::auth::jwks::JwksClient;
use union_api::config::Config;
use union_api::db::kv::{KeyValueStore, MemoryStore};
use union_api::rooms::{HttpRoomProvider, LocalRoomProvider, RoomProvider};
use union_api::storage::{MemoryStorage, PgStorage, Storage};
use union_api::AppState;
use unionvote_common::SnowflakeGenerator;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let snowflake = Arc::new(SnowflakeGenerator::new(0));

    // Storage backend is fixed at startup: Postgres when DATABASE_URL is
    // set, otherwise the in-memory store.
    let storage: Arc<dyn Storage> = match &config.database_url {
        Some(url) => {
            let pool = union_api::db::pool::connect(url).await;
            Arc::new(PgStorage::new(pool, snowflake))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory storage");
            Arc::new(MemoryStorage::new(snowflake))
        }
    };

    let rooms: Arc<dyn RoomProvider> = match (&config.room_api_url, &config.room_api_key) {
        (Some(url), Some(key)) => Arc::new(HttpRoomProvider::new(url, key)),
        _ => {
            tracing::warn!("ROOM_API_URL/ROOM_API_KEY not set; deriving room URLs locally");
            Arc::new(LocalRoomProvider::new(&config.room_domain))
        }
    };

    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    // JWKS client for validating Identity Gateway tokens.
    let jwks = JwksClient::new(&config.identity_url);

    tracing::info!(
        service_id = %config.service_id,
        identity_url = %config.identity_url,
        "union-api configured"
    );

    let state = AppState {
        storage,
        kv,
        jwks,
        rooms,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(union_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "union-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
