//! HTTP response parsing and resource identification for `patience`.
//!
//! Extracts retry hints (`Retry-After`, vendor rate-limit headers, JSON
//! body fields) from a captured attempt's stdout/stderr, and identifies the
//! logical resource an invocation targeted, for the HTTP-aware backoff
//! strategy and the rate-limit discovery store.

mod headers;
mod json;
mod parser;
mod resource;

pub use headers::{extract_headers, HeaderHints};
pub use json::{extract_json, JsonHints};
pub use parser::{extract_candidate_fact, CandidateFact, RetryHintParser, MAX_ANALYZED_BYTES};
pub use resource::identify_resource;
