// API handlers for Page Gate
//
// This module implements the route handlers for the gate.

use super::context::log_context;
use super::AppState;
use crate::error::Result;
use crate::types::{RestrictionReason, Verdict};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Path of the access-restricted error view
pub const ACCESS_RESTRICTED_PATH: &str = "/access-restricted";

const X_ROBOTS_TAG: &str = "x-robots-tag";

/// Redirect to the error view carrying `reason`
pub fn restricted_redirect(reason: RestrictionReason) -> Response {
    Redirect::to(&format!("{}?reason={}", ACCESS_RESTRICTED_PATH, reason)).into_response()
}

/// Serve a protected page.
///
/// Only the first segment of the page path names the page.
pub async fn gate_page(
    State(state): State<Arc<AppState>>,
    Path((token, page)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let page_name = page.trim_start_matches('/').split('/').next().unwrap_or_default();
    let ctx = log_context(&headers);

    match state.validator.validate(&token, page_name, Some(&ctx)).await {
        Verdict::Invalid { reason } => restricted_redirect(reason.into()),
        Verdict::Valid { token } => match state.content.resolve(page_name).await {
            Ok(Some(html)) => (
                [
                    (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                    (HeaderName::from_static(X_ROBOTS_TAG), "noindex, nofollow"),
                    (header::CACHE_CONTROL, "no-store"),
                ],
                html,
            )
                .into_response(),
            Ok(None) => {
                debug!(token_id = %token.id, "No document for page {:?}", page_name);
                restricted_redirect(RestrictionReason::PageNotFound)
            }
            Err(e) => {
                warn!(token_id = %token.id, "Failed to load page {:?}: {}", page_name, e);
                restricted_redirect(RestrictionReason::PageNotFound)
            }
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct RestrictedQuery {
    pub reason: Option<String>,
}

/// Error view for denied requests
pub async fn access_restricted(Query(query): Query<RestrictedQuery>) -> impl IntoResponse {
    let reason = query
        .reason
        .as_deref()
        .and_then(|r| r.parse::<RestrictionReason>().ok());

    let (code, message) = match reason {
        Some(reason) => (reason.as_str(), reason.message()),
        None => ("ACCESS_RESTRICTED", "Access to this page is restricted."),
    };

    (
        StatusCode::FORBIDDEN,
        [(HeaderName::from_static(X_ROBOTS_TAG), "noindex, nofollow")],
        Html(format!(
            "<!DOCTYPE html>\n<html><head><title>Access Restricted</title></head>\
             <body><h1>Access Restricted</h1><p>{}</p><p><code>{}</code></p></body></html>",
            message, code
        )),
    )
}

/// Health check handler
pub async fn health_check(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let stats = state.validator.store().get_stats().await?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "tokens": stats.total_tokens,
        "accesses": stats.total_accesses,
        "audit_failures": state.validator.audit_failures(),
    })))
}
