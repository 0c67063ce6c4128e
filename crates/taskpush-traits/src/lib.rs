//! TaskPush Traits - collaborator contracts shared across the TaskPush workspace.
//!
//! This crate provides the narrow interfaces the queue client consumes:
//! - `TokenProvider` for bearer tokens and project id lookup
//! - `HttpTransport` for request/response mechanics
//! - `KeyFileLoader` and `ServiceAccountKey` for credential files
//! - `HttpMethod` and `Headers` wire primitives

pub mod auth;
pub mod credentials;
pub mod http;
pub mod transport;

// ── Top-level re-exports ─────────────────────────────────────────────

pub use auth::{AuthError, TokenProvider};
pub use credentials::{FsKeyFileLoader, KeyFileLoader, ServiceAccountKey};
pub use http::{Headers, HttpMethod, InvalidMethod, merge_headers};
pub use transport::{HttpTransport, TransportError, TransportRequest, TransportResponse};
