//! RDAP resolution.
//!
//! This module contains the resolver state machine, the server registry,
//! per-route rate limiting and the HTTP transport it runs on.

/// Resolver: route selection, retries and fallback
pub mod rdap;

/// Direct server table and URL templates
pub mod registry;

/// Per-route request spacing
pub mod rate_limit;

/// HTTP transport seam
pub mod transport;

// Re-export commonly used functions and types
pub use rate_limit::RateLimitState;
pub use rdap::{has_rdap_link, RdapResolver, Route, TldSupport, TldSupportStatus, RETRY_DELAY};
pub use registry::{get_direct_server_map, render_url, ServerRegistry};
pub use transport::{HeadResponse, HttpTransport, RdapTransport, TransportError};
