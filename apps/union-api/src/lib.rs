pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod permissions;
pub mod ranking;
pub mod rooms;
pub mod routes;
pub mod storage;

use std::sync::Arc;

use auth::jwks::JwksClient;
use config::Config;
use db::kv::KeyValueStore;
use rooms::RoomProvider;
use storage::Storage;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub kv: Arc<dyn KeyValueStore>,
    pub jwks: JwksClient,
    pub rooms: Arc<dyn RoomProvider>,
    pub config: Arc<Config>,
}
