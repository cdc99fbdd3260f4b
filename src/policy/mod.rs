//! Policy documents and the risk assessment engine

mod document;
mod engine;

pub use document::{
    ActionThresholds, PolicyDocument, PolicyStore, RiskWeights,
};
pub use engine::assess;
