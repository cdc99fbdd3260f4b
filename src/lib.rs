//! Guardian - In-Process Privacy Mediation
//!
//! Guardian sits between a host application and the data it touches.
//! Every data access becomes an event, every event is risk-assessed
//! against policy, enforced (redacted, masked, or blocked), and recorded
//! in a hash-chained per-user ledger that users can audit.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Host Application                      │
//! │                              │                                │
//! │  ┌───────────────────────────▼──────────────────────────┐    │
//! │  │                  Mediation Adapter                    │    │
//! │  │  - Build an api_call event per request                │    │
//! │  │  - Honor the final action (forward or refuse)         │    │
//! │  └───────────────────────────┬──────────────────────────┘    │
//! │                              │                                │
//! │  ┌───────────────────────────▼──────────────────────────┐    │
//! │  │                  Guardian Service                     │    │
//! │  │   mode gates → validate → assess → enforce → ledger   │    │
//! │  └───────┬───────────────┬───────────────┬──────────────┘    │
//! │          │               │               │                   │
//! │   ┌──────▼─────┐  ┌──────▼──────┐  ┌─────▼──────┐            │
//! │   │   Policy   │  │   Ledger    │  │   Trust    │            │
//! │   │   Engine   │  │ (hash chain)│  │   Fabric   │            │
//! │   └────────────┘  └──────┬──────┘  └────────────┘            │
//! │                          │                                   │
//! │                   ┌──────▼──────┐                            │
//! │                   │  Inspector  │  (read-only analytics)     │
//! │                   └─────────────┘                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`event`]: the event model every other module shares
//! - [`policy`]: weight tables, hot-reloadable documents, risk scoring
//! - [`enforcement`]: payload transformations for each action
//! - [`ledger`]: append-only hash-chained per-user JSONL files
//! - [`service`]: the mediation pipeline tying everything together
//! - [`adapter`]: axum middleware at the host boundary
//! - [`inspector`]: ledger analytics and trust reports
//! - [`trust`]: per-user adaptive privacy models
//! - [`admin`]: REST surface for modes, reports, and decisions
//! - [`config`]: configuration management

pub mod adapter;
pub mod admin;
pub mod config;
pub mod enforcement;
pub mod error;
pub mod event;
pub mod inspector;
pub mod ledger;
pub mod policy;
pub mod service;
pub mod trust;

pub use config::GuardianConfig;
pub use error::{Error, Result};
pub use event::{DataClass, Event, GuardianAction, RiskLevel, Scope, UserDecision};
pub use service::GuardianService;
