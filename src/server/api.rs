//! HTTP routes of the remote document store.
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `GET /v1/tenants/{tenant}/collections/{name}`: Read a collection
//! - `PUT /v1/tenants/{tenant}/collections/{name}`: Replace a collection

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::auth::{ApiKeyStore, AuthTenant};
use super::storage::{ServerStorage, ServerStorageError};
use crate::models::Collection;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub api_keys: Arc<ApiKeyStore>,
    pub storage: ServerStorage,
}

/// Error response body
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    Unauthorized(&'static str, &'static str),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Unauthorized(error, message) => {
                (StatusCode::UNAUTHORIZED, error, message.to_string())
            }
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, "forbidden", message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            ApiError::Internal(message) => {
                tracing::error!("{}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "storage failure".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error, message })).into_response()
    }
}

impl From<ServerStorageError> for ApiError {
    fn from(e: ServerStorageError) -> Self {
        match e {
            ServerStorageError::InvalidTenantId(_) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Authentication middleware
async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        Some(_) => {
            return ApiError::Unauthorized(
                "invalid_auth",
                "Authorization header must use Bearer scheme",
            )
            .into_response();
        }
        None => {
            return ApiError::Unauthorized("missing_auth", "Authorization header required")
                .into_response();
        }
    };

    match state.api_keys.validate(api_key) {
        Some(tenant) => {
            request.extensions_mut().insert(tenant);
            next.run(request).await
        }
        None => ApiError::Unauthorized("invalid_key", "Invalid API key").into_response(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionBody {
    pub items: Vec<Value>,
}

#[derive(Clone, Copy)]
enum Access {
    Read,
    Write,
}

/// Resolves the collection and checks the caller may access it.
fn authorize(
    auth: &AuthTenant,
    tenant: &str,
    name: &str,
    access: Access,
) -> Result<Collection, ApiError> {
    let collection = Collection::parse(name)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown collection: {}", name)))?;

    if auth.tenant_id != tenant {
        return Err(ApiError::Forbidden(format!(
            "Key is not valid for tenant {}",
            tenant
        )));
    }

    let allowed = match access {
        Access::Read => auth.read.allows(collection),
        Access::Write => auth.write.allows(collection),
    };
    if !allowed {
        let verb = match access {
            Access::Read => "read",
            Access::Write => "write",
        };
        return Err(ApiError::Forbidden(format!(
            "Key has no {} access to {}",
            verb, collection
        )));
    }

    Ok(collection)
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn read_collection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTenant>,
    Path((tenant, name)): Path<(String, String)>,
) -> Result<Json<CollectionBody>, ApiError> {
    let collection = authorize(&auth, &tenant, &name, Access::Read)?;
    let items = state.storage.load(&tenant, collection)?;
    Ok(Json(CollectionBody { items }))
}

async fn write_collection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTenant>,
    Path((tenant, name)): Path<(String, String)>,
    Json(body): Json<CollectionBody>,
) -> Result<StatusCode, ApiError> {
    let collection = authorize(&auth, &tenant, &name, Access::Write)?;
    state.storage.save(&tenant, collection, &body.items)?;
    tracing::info!(
        "Tenant {} replaced {} ({} items)",
        tenant,
        collection,
        body.items.len()
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/v1/tenants/{tenant}/collections/{name}",
            get(read_collection).put(write_collection),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
