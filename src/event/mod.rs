//! Event model: the immutable record of one data-touching operation

mod payload;
mod types;

pub use payload::validate_payload;
pub use types::{
    DataClass, Event, GuardianAction, RiskLevel, Scope, UserDecision,
};
