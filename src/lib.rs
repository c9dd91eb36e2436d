//! tenantgate, an authorization gateway for a multi-tenant backend data API.
//!
//! Browser and service callers never hold backend credentials. They present a
//! shared secret to this gateway, which authenticates them, checks the
//! requested path and method against a configurable route policy, swaps the
//! caller's headers for privileged backend credentials, and forwards the
//! request. Backend responses come back with their status codes intact.
//!
//! The crate is organized as a pipeline:
//!
//! - [`config`]: startup environment loading, fail-fast
//! - [`resolve`]: collapse header/route destination inputs into one canonical form
//! - [`policy`]: pure allow/deny evaluation with fixed precedence
//! - [`headers`]: outbound credential rewriting
//! - [`forward`]: the pooled backend HTTP client
//! - [`server`]: axum routes tying the pipeline together
//! - [`provision`]: privileged tenant-admin creation
//! - [`audit`]: best-effort audit trail for privileged actions

pub mod audit;
pub mod config;
pub mod error;
pub mod forward;
pub mod headers;
pub mod policy;
pub mod provision;
pub mod resolve;
pub mod server;
