//! apiprobe-exec: the effectful half of the method test bench.
//!
//! - [`transport`] -- the HTTP seam and its `ureq` implementation
//! - [`controller`] -- single-shot and paginated execution under a session guard
//! - [`session`] -- busy flag and cooperative cancellation per test session
//! - [`pagination`] -- next-page extraction (link header, body field, page counter)
//! - [`linker`] -- save-then-link saga for response schemas
//! - [`workbench`] -- everything above wired to the platform stores
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod config;
pub mod controller;
pub mod history;
pub mod linker;
pub mod pagination;
pub mod session;
pub mod transport;
pub mod workbench;

pub use config::{read_config, ConfigError, ProbeConfig};
pub use controller::{ExecutionController, ExecutionReport, RunOutcome, StopReason};
pub use history::ExecutionHistory;
pub use linker::{SaveReport, SaveSchemaRequest, SaveStep, SchemaLinker, StepReport, StepStatus};
pub use session::{CancelToken, Phase, RunGuard, SessionBusy, TestSession};
pub use transport::{HttpResponse, HttpTransport, TransportError, UreqTransport};
pub use workbench::{Workbench, WorkbenchError};
