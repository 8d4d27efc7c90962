/// Union API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. When unset, the in-memory storage
    /// backend is selected instead.
    pub database_url: Option<String>,
    /// The Identity Gateway origin (e.g. `http://localhost:4100`).
    pub identity_url: String,
    /// This service's registered ID at the Identity Gateway; used as the
    /// token audience.
    pub service_id: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Call-provider API origin. When unset (together with the key), rooms
    /// are derived locally from `room_domain` instead of allocated remotely.
    pub room_api_url: Option<String>,
    /// Call-provider API key.
    pub room_api_key: Option<String>,
    /// Domain rooms live under, used by the local room fallback.
    pub room_domain: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            database_url: optional_var("DATABASE_URL"),
            identity_url: required_var("IDENTITY_URL"),
            service_id: required_var("SERVICE_ID"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4200),
            room_api_url: optional_var("ROOM_API_URL"),
            room_api_key: optional_var("ROOM_API_KEY"),
            room_domain: optional_var("ROOM_DOMAIN")
                .unwrap_or_else(|| "rooms.unionvote.app".to_string()),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
