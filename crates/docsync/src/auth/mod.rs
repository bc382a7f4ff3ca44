//! Hook authentication
//!
//! Hook endpoints are called by scripts on developer machines, which
//! present a per-project key in the `X-API-Key` header.

mod middleware;

pub use middleware::{extract_api_key, require_api_key, HEADER_API_KEY};
