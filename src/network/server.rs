//! Verification Server
//!
//! HTTP front for third-party audits. One route:
//!
//! - `POST /verify {gameId}`: ciphertext handles and contract address
//! - `POST /verify {gameId, proofJson}`: HTML commitment report
//! - `POST /verify {gameId, authorization, cols?}`: HTML decrypted board report
//!
//! Malformed bodies are 400, unknown games 404, other methods 405 and
//! internal failures 500. Error bodies are plain text.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, instrument};

use crate::game::registry::{GameRegistry, RegistryError};
use crate::game::state::Identity;
use crate::network::protocol::{CiphertextsResponse, ProtocolError, VerifyRequest};
use crate::proof::journal::{JournalError, ReplayError};
use crate::proof::verify::{audit_commitment, VerificationFailure, VerificationPipeline, VerificationTarget};

/// Default port of the verification server.
pub const DEFAULT_PORT: u16 = 3001;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Registry contract identity.
    pub contract_address: Identity,
    /// Bincode journal to serve from. A demo game is seeded when absent.
    pub ledger_journal: Option<PathBuf>,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            contract_address: Identity::default(),
            ledger_journal: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Read `BIND_ADDR`, `CONTRACT_ADDRESS` (required) and `LEDGER_JOURNAL`.
    pub fn from_env() -> Result<Self, ServerError> {
        let defaults = Self::default();

        let bind_addr = match std::env::var("BIND_ADDR") {
            Ok(addr) => addr
                .parse()
                .map_err(|e| ServerError::Config(format!("BIND_ADDR {addr:?}: {e}")))?,
            Err(_) => defaults.bind_addr,
        };

        let contract = std::env::var("CONTRACT_ADDRESS")
            .map_err(|_| ServerError::Config("Missing CONTRACT_ADDRESS".into()))?;
        let contract_address = contract
            .parse()
            .map_err(|e| ServerError::Config(format!("CONTRACT_ADDRESS {contract:?}: {e}")))?;

        Ok(Self {
            bind_addr,
            contract_address,
            ledger_journal: std::env::var("LEDGER_JOURNAL").ok().map(PathBuf::from),
            ..defaults
        })
    }
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind or serve.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Journal could not be loaded.
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// Journal did not replay.
    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),

    /// Journal belongs to a different contract.
    #[error("Journal contract {journal} does not match configured {configured}")]
    ContractMismatch {
        /// Contract in the journal.
        journal: Identity,
        /// Contract from configuration.
        configured: Identity,
    },
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Registry being served.
    pub registry: Arc<RwLock<GameRegistry>>,
    /// Pipeline for decrypted board reports.
    pub pipeline: VerificationPipeline,
}

impl AppState {
    /// Wrap a registry and pipeline.
    pub fn new(registry: GameRegistry, pipeline: VerificationPipeline) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            pipeline,
        }
    }
}

/// Handler error, rendered as a plain-text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Invalid input (400).
    BadRequest(String),
    /// Unknown game (404).
    NotFound(String),
    /// Registry or pipeline failure (500).
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(m) | ApiError::NotFound(m) => m,
            ApiError::Internal(m) => format!("Server error: {m}"),
        };
        (status, message).into_response()
    }
}

impl From<ProtocolError> for ApiError {
    fn from(err: ProtocolError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::GameNotFound(_) => {
                ApiError::NotFound("No ciphertext found for this game".into())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/verify", post(verify_handler))
        .with_state(state)
}

/// `POST /verify`.
pub async fn verify_handler(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload
        .map_err(|rejection| ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text())))?;
    let game_id = request.game_id()?;
    debug!(game_id = %game_id, "Verify request");

    if let Some(proof) = &request.proof_json {
        let preimage = proof.to_preimage()?;
        let registry = state.registry.read().await;
        let audit = audit_commitment(&registry, game_id, &preimage)?;
        info!(game_id = %game_id, matched = audit.matched(), "Commitment audit");
        return Ok(Html(audit.render_html()).into_response());
    }

    if let Some(authorization) = &request.authorization {
        let target = {
            let registry = state.registry.read().await;
            VerificationTarget::fetch(&registry, game_id)
        };
        let target = target.map_err(|failure| match failure {
            VerificationFailure::GameNotFound(_) => {
                ApiError::NotFound("No ciphertext found for this game".into())
            }
            other => ApiError::Internal(other.to_string()),
        })?;

        // Oracle failures are rendered into the report, not raised
        let report = state.pipeline.verify_target(&target, authorization).await;
        return Ok(Html(report.render_html(request.cols)).into_response());
    }

    let registry = state.registry.read().await;
    let ciphertexts = registry.get_encoding(game_id)?.handles();
    debug!(game_id = %game_id, handles = ciphertexts.len(), "Serving ciphertexts");

    Ok(Json(CiphertextsResponse {
        ciphertexts,
        contract_address: registry.contract(),
    })
    .into_response())
}

// =============================================================================
// SERVER
// =============================================================================

/// The verification server.
pub struct VerifyServer {
    /// Server configuration.
    config: ServerConfig,
    /// Handler state.
    state: AppState,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl VerifyServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    /// Run until `shutdown` is called.
    #[instrument(skip(self), fields(bind_addr = %self.config.bind_addr))]
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!(
            version = %self.config.version,
            "Verify server listening on {}",
            listener.local_addr()?
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Shutdown signal received");
            })
            .await
            .map_err(|e| {
                error!("Server error: {}", e);
                ServerError::Io(e)
            })
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}
