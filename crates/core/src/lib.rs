//! apiprobe-core: the pure half of the method test bench.
//!
//! Everything in this crate is synchronous and free of I/O:
//!
//! - [`model`] -- account/method configuration, requests, execution results
//! - [`compose`] -- builds a concrete [`RequestSpec`] from layered configuration
//! - [`infer`] -- derives an [`InferredSchema`] from a sample JSON value
//!
//! Network execution, persistence and cross-linking live in `apiprobe-exec`.

pub mod compose;
pub mod infer;
pub mod model;

// ── Convenience re-exports ───────────────────────────────────────────

pub use compose::{compose_request, merge_headers, merge_query_params, parse_body, resolve_url};
pub use infer::{infer, InferredSchema};
pub use model::{
    AccountConfig, CursorSource, ErrorKind, ExecutionError, ExecutionResult, HttpVerb, KeyValue,
    MethodConfig, PaginationPolicy, Payload, RequestSpec, UserEdits,
};
