use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use nodeconductor_core::{AppError, UserIdentity};
use tower_sessions::Session;

use crate::auth::SESSION_USER_KEY;
use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the calling worker's identifier on internal routes.
pub const WORKER_ID_HEADER: &str = "x-nodeconductor-worker-id";

const SEC_FETCH_SITE: &str = "sec-fetch-site";

/// Authenticated task worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity {
    worker_id: String,
}

impl WorkerIdentity {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
        }
    }

    pub fn worker_id(&self) -> &str {
        self.worker_id.as_str()
    }
}

pub async fn require_auth(
    session: Session,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let identity = session
        .get::<UserIdentity>(SESSION_USER_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session identity: {error}")))?
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

pub async fn require_worker_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let worker = authenticate_worker(request.headers(), state.worker_shared_secret.as_str())?;
    request.extensions_mut().insert(worker);
    Ok(next.run(request).await)
}

fn authenticate_worker(headers: &HeaderMap, shared_secret: &str) -> Result<WorkerIdentity, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("worker bearer token required".to_owned()))?;

    if !constant_time_eq(token.as_bytes(), shared_secret.as_bytes()) {
        return Err(AppError::Unauthorized("invalid worker token".to_owned()));
    }

    let worker_id = headers
        .get(WORKER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{WORKER_ID_HEADER} header is required")))?;

    Ok(WorkerIdentity::new(worker_id))
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }

    left.iter()
        .zip(right)
        .fold(0_u8, |difference, (a, b)| difference | (a ^ b))
        == 0
}

/// Rejects browser mutations that do not originate from the configured frontend.
pub async fn require_same_origin_for_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let mutating = matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    if mutating && !mutation_origin_allowed(request.headers(), state.frontend_url.as_str()) {
        return Err(AppError::Forbidden("cross-origin request blocked".to_owned()).into());
    }

    Ok(next.run(request).await)
}

fn mutation_origin_allowed(headers: &HeaderMap, frontend_url: &str) -> bool {
    if header_str(headers, SEC_FETCH_SITE) == Some("cross-site") {
        return false;
    }

    header_str(headers, header::ORIGIN.as_str()).is_some_and(|origin| origin == frontend_url)
        || header_str(headers, header::REFERER.as_str())
            .is_some_and(|referer| referer.starts_with(frontend_url))
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
