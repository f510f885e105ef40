use axum::{extract::State, http::StatusCode, response::Json};
use meshlink_identity::{IdentityError, SignRequest, SignResponse, VerifyRequest, VerifyResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::state::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "meshlink-ca",
    }))
}

pub async fn sign(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignRequest>,
) -> Result<Json<SignResponse>, StatusCode> {
    let mut ca = state.ca.write().await;
    match ca.issue_certificate(&request.id, &request.public_key) {
        Ok(certificate) => {
            info!(subject = %request.id, "Signed certificate");
            Ok(Json(SignResponse {
                certificate,
                ca_public_key: ca.public_key_pem().to_string(),
            }))
        }
        Err(e @ (IdentityError::CertificateAuthority(_) | IdentityError::Crypto(_))) => {
            warn!(subject = %request.id, "Rejected signing request: {}", e);
            Err(StatusCode::BAD_REQUEST)
        }
        Err(e) => {
            error!(subject = %request.id, "Signing failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Json<VerifyResponse> {
    let valid = state.ca.read().await.verify_certificate(&request.certificate);
    Json(VerifyResponse { valid })
}
