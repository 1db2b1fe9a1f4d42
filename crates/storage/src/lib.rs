//! Contracts for the platform stores the test bench reads and writes, plus
//! an in-memory backend, an HTTP backend and a conformance suite any backend
//! can run.

pub mod conformance;
mod error;
#[cfg(feature = "http")]
mod http;
mod memory;
mod record;
mod traits;

pub use error::StoreError;
#[cfg(feature = "http")]
pub use http::HttpPlatformStore;
pub use memory::{MemoryPlatform, StoreOp};
pub use record::{NamespaceRecord, SavedSchema, SchemaPayload, RESPONSE_SCHEMA_TYPE};
pub use traits::{AccountStore, MethodStore, NamespaceStore, PlatformStore, SchemaStore};
