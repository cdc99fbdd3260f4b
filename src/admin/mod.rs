//! Admin / UI surface
//!
//! REST endpoints over the guardian's own state: mode toggles, trust
//! summaries and reports, ledger verification, and trust model
//! export/import. These routes sit on the adapter's skip list so the
//! guardian never mediates itself.

pub mod handler;
pub mod types;

pub use handler::admin_router;
pub use types::{ApiError, ApiErrorDetail};
