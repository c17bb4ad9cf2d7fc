//! Network Layer
//!
//! HTTP verification endpoint and decrypt authorizations.
//! Registry state only changes through `game/`.

pub mod auth;
pub mod protocol;
pub mod server;

pub use auth::{
    sign_authorization, validate_authorization, AuthConfig, AuthError, AuthorizationClaims,
    DecryptAuthorization,
};
pub use protocol::{CiphertextsResponse, NumberOrString, ProofJson, ProtocolError, VerifyRequest};
pub use server::{router, ApiError, AppState, ServerConfig, ServerError, VerifyServer};
