//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Rate limiting (governor), per route group
//!
//! Admin authentication is an extractor ([`RequireAdmin`]) rather than a
//! layer so handlers state their requirement in their signature.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{AdminSession, RequireAdmin, clear_admin_session, set_admin_session, verify_api_key};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
