//! Enforcement: apply the chosen action to a payload snapshot
//!
//! Pure functions over `serde_json::Value`. ALLOW and ALERT pass the payload
//! through; REDACT rewrites values under sensitive key names; MASK is
//! blanket structure-preserving obfuscation; BLOCK empties the payload.
//! Never errors on well-formed payloads.

use crate::event::GuardianAction;
use serde_json::{Map, Value};

/// Literal substituted for values under sensitive keys
pub const REDACTED: &str = "[REDACTED]";

/// Literal substituted for short or non-string leaves when masking
pub const MASKED: &str = "***";

/// Key-name fragments that mark a value as sensitive for REDACT
const SENSITIVE_KEYS: [&str; 9] = [
    "password",
    "token",
    "secret",
    "key",
    "credit_card",
    "ssn",
    "email",
    "phone",
    "address",
];

/// Apply `action` to `payload`, returning the finalized snapshot.
pub fn apply(action: GuardianAction, payload: &Value) -> Value {
    match action {
        GuardianAction::Allow | GuardianAction::Alert => payload.clone(),
        GuardianAction::Redact => redact(payload),
        GuardianAction::Mask => mask(payload),
        GuardianAction::Block => Value::Object(Map::new()),
    }
}

/// True when a key name contains any sensitive fragment (case-insensitive).
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|frag| lower.contains(frag))
}

/// Replace every value reachable through a sensitive key with [`REDACTED`],
/// recursing into nested mappings. Sequence elements are not keyed and are
/// left alone.
fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), redact(val));
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Blanket obfuscation: every leaf is rewritten regardless of key name.
/// Strings longer than 4 keep their first and last two characters.
fn mask(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let out = map.iter().map(|(k, v)| (k.clone(), mask(v))).collect();
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(mask).collect()),
        Value::String(s) => Value::String(mask_str(s)),
        _ => Value::String(MASKED.to_string()),
    }
}

fn mask_str(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 4 {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("{}{}{}", head, MASKED, tail)
    } else {
        MASKED.to_string()
    }
}
