//! HTTP API for the notes store.
//!
//! Every `/api` route resolves the caller through [`AuthGate`] (the
//! `X-Init-Data` header) and passes the resulting [`ResolvedIdentity`] to the
//! store explicitly. `/health` is unauthenticated.
//!
//! [`ResolvedIdentity`]: crate::auth::ResolvedIdentity

pub mod error;
mod handlers;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{delete, get};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{AuthConfig, AuthGate};
use crate::error::{NotesError, Result};
use crate::runtime::shutdown_token;
use crate::storage::NoteStore;

pub use error::ApiError;
pub use handlers::{create_note, delete_all_notes, delete_note, health, list_notes};

/// Header carrying the raw launch data.
pub const INIT_DATA_HEADER: &str = "x-init-data";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub auth: AuthConfig,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            auth: AuthConfig::default(),
            cors_origins: Vec::new(),
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<NoteStore>,
    pub gate: Arc<AuthGate>,
}

impl AppState {
    pub fn new(store: NoteStore, gate: AuthGate) -> Self {
        Self {
            store: Arc::new(store),
            gate: Arc::new(gate),
        }
    }
}

pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(INIT_DATA_HEADER),
        ]);

    if origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin.trim())
                .map_err(|_| NotesError::Config(format!("invalid CORS origin: {origin}")))
        })
        .collect::<Result<Vec<_>>>()?;
    // Credentials are only allowed with an explicit origin list.
    Ok(layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true))
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route(
            "/notes",
            get(list_notes).post(create_note).delete(delete_all_notes),
        )
        .route("/notes/{id}", delete(delete_note));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the API until Ctrl-C.
pub async fn run(config: ServerConfig) -> Result<()> {
    let gate = AuthGate::from_config(&config.auth)?;
    let validators = gate.validator_names();
    if validators.is_empty() {
        warn!("No bot token or bot id configured: requests carrying launch data will be rejected");
    }
    if gate.allows_anonymous() {
        warn!(
            dev_user_id = config.auth.dev_user_id,
            "Anonymous access is enabled: requests without launch data are served as the development user"
        );
    }

    let app = router(
        AppState::new(NoteStore::new(), gate),
        cors_layer(&config.cors_origins)?,
    );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, validators = ?validators, "Notes API listening");

    let shutdown = shutdown_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Notes API stopped");
    Ok(())
}
