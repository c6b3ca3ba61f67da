// Page Gate
//
// This crate gates access to static HTML pages behind shareable tokens. A
// visitor presents a token and a page name; the gate checks that the token
// exists, is active, has not expired and allows the page, then serves the page
// or redirects to an error view carrying a stable reason code.
//
// # Architecture
//
// * **Types**: token records, access log entries and the validation verdict
// * **Storage**: the `TokenStore` contract with in-memory and SQLite backends
// * **Validator**: the ordered decision chain plus the audit update
// * **Content**: resolution of page names to HTML documents on disk
// * **API Layer**: HTTP routes that wire the pieces together
//
// # Usage
//
// ```rust,no_run
// use page_gate::storage::{StorageFactory, StorageKind};
// use page_gate::validator::TokenValidator;
// use page_gate::types::LogContext;
//
// async fn example() -> Result<(), Box<dyn std::error::Error>> {
//     let store = StorageFactory::new("data/page_gate.db").create(StorageKind::Sql)?;
//     let validator = TokenValidator::new(store);
//
//     let ctx = LogContext::new(Some("203.0.113.7".into()), None);
//     let verdict = validator.validate("abc", "report.html", Some(&ctx)).await;
//     println!("valid: {}", verdict.is_valid());
//
//     Ok(())
// }
// ```

/// HTTP surface for the gate.
///
/// Exposes the token-gated page route, the access-restricted error view and a
/// health probe.
pub mod api;

/// Configuration loading for the gate service.
pub mod config;

/// Resolution of page names to HTML documents.
pub mod content;

/// Error types for Page Gate.
///
/// Store faults, configuration problems and I/O failures all surface as
/// `PageGateError`. Deny reasons are not errors; see `types::DenyReason`.
pub mod error;

/// Token stores.
///
/// # Features
///
/// * `TokenStore` trait with exact-value lookup and an atomic audit update
/// * DashMap-backed memory store
/// * SQLite-backed persistent store
pub mod storage;

/// Token records, access log entries and the validation verdict.
pub mod types;

/// Token validation decision chain.
pub mod validator;
