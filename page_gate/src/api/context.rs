// Request context extraction for Page Gate
//
// Builds the LogContext recorded with each successful access from the
// incoming request headers.

use crate::types::LogContext;
use axum::http::{header, HeaderMap};

/// IP recorded when no proxy header identifies the client
pub const UNKNOWN_CLIENT_IP: &str = "unknown";

/// Get the client IP from proxy headers
pub fn client_ip(headers: &HeaderMap) -> String {
    // Try to get X-Forwarded-For header
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = value.split(',').next() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    // Fallback to X-Real-IP header
    if let Some(value) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let ip = value.trim();
        if !ip.is_empty() {
            return ip.to_string();
        }
    }

    UNKNOWN_CLIENT_IP.to_string()
}

/// Build the access log context for a request
pub fn log_context(headers: &HeaderMap) -> LogContext {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    LogContext::new(Some(client_ip(headers)), user_agent)
}
