//! Engine crate – SQL Server service administration logic.
//!
//! This crate contains the restart orchestrator and all OS integration
//! behind traits. It does NOT depend on CLI types, so it can be driven by
//! the `sqladmin` binary or embedded in another host.

pub mod commands;
pub mod context;
pub mod expander;
pub mod lifecycle;
pub mod platform;
pub mod report;
pub mod resolver;
pub mod restart;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use commands::CommandRegistry;
pub use context::AppContext;
pub use report::RestartReport;
pub use restart::{restart_services, RestartRequest};
pub use types::{CommandResult, ErrorCode, ErrorInfo, Status};
