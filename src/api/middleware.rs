//! API Middleware
//!
//! Request context, per-caller rate limiting and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::IpAddr;
use uuid::Uuid;

use crate::domain::{OperationContext, UserId};
use crate::error::AppError;

use super::AppState;

pub const REQUEST_USER_HEADER: &str = "x-request-user-id";
pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

// =========================================================================
// Request context
// =========================================================================

/// Build the `OperationContext` from the caller headers.
///
/// A malformed `X-Request-User-Id` is rejected here; an absent one is left
/// to the handlers that need it.
pub async fn context_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let headers = request.headers();

    let request_user = match headers.get(REQUEST_USER_HEADER) {
        Some(value) => {
            let parsed = value
                .to_str()
                .ok()
                .and_then(|s| Uuid::parse_str(s.trim()).ok())
                .map(UserId::from_uuid);
            match parsed {
                Some(user_id) => Some(user_id),
                None => {
                    return Err(AppError::validation(
                        REQUEST_USER_HEADER,
                        "must be a UUID",
                    )
                    .into_response());
                }
            }
        }
        None => None,
    };

    let correlation_id = correlation_id(headers).unwrap_or_else(Uuid::new_v4);

    let mut context = OperationContext::new()
        .with_correlation_id(correlation_id)
        .with_timeout(state.request_timeout);
    if let Some(user_id) = request_user {
        context = context.with_request_user(user_id);
    }
    if let Some(ip) = client_ip(headers) {
        context = context.with_client_ip(ip);
    }

    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    Ok(response)
}

fn correlation_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// First hop of `X-Forwarded-For`
fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
}

// =========================================================================
// Rate limiting
// =========================================================================

/// Sliding-window budget per caller, keyed `api:<user id>`, falling back to
/// `api:ip:<client ip>` for anonymous requests
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let context = request.extensions().get::<OperationContext>();
    let caller = match (
        context.and_then(|ctx| ctx.request_user_id),
        context.and_then(|ctx| ctx.client_ip),
    ) {
        (Some(user_id), _) => user_id.to_string(),
        (None, Some(ip)) => format!("ip:{}", ip),
        (None, None) => "anonymous".to_string(),
    };

    let key = format!("api:{}", caller);
    if let Err(e) = state.limiter.check(&key, state.request_limit).await {
        return Err(AppError::from(e).into_response());
    }

    Ok(next.run(request).await)
}

// =========================================================================
// Logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());
    let correlation_id = correlation_id(request.headers());

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}
