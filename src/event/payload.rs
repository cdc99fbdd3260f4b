//! Payload validation at the service boundary

use crate::error::{Error, Result};
use serde_json::Value;

/// Maximum nesting depth accepted for a payload snapshot.
const MAX_DEPTH: usize = 64;

/// Validate a `data_touched` payload before any state change.
///
/// The top level must be a JSON object; nesting beyond [`MAX_DEPTH`] is
/// rejected. `serde_json::Value` cannot express cycles, so depth is the
/// only structural hazard left to the caller.
pub fn validate_payload(payload: &Value) -> Result<()> {
    if !payload.is_object() {
        return Err(Error::InvalidEvent(
            "data_touched must be a mapping at the top level".to_string(),
        ));
    }
    if depth(payload) > MAX_DEPTH {
        return Err(Error::InvalidEvent(format!(
            "data_touched exceeds maximum nesting depth of {}",
            MAX_DEPTH
        )));
    }
    Ok(())
}

fn depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}
