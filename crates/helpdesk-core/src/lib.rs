//! helpdesk-core library.
//!
//! Data model, HTTP client and the ticket-resolution workspace used by the
//! `hd` terminal client.

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod preview;
pub mod session;
pub mod timing;
pub mod workspace;

/// # Conventions
///
/// - **Errors**: library errors are `thiserror` enums that map onto
///   [`error::ErrorCode`]; front ends use `anyhow::Result` at the boundary.
/// - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
/// - **Network**: every server call goes through [`api::TicketApi`].
pub use api::{ApiError, HttpApi, TicketApi};
pub use session::AppState;
pub use workspace::{Workspace, WorkspaceError};
