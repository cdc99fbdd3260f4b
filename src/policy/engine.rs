//! Risk assessment and action selection
//!
//! [`assess`] is a pure function over an event, the active policy document
//! and an optional learned data-class weight override: it fills the event's
//! risk slots and selects an enforcement action. No I/O.

use crate::event::{DataClass, Event, GuardianAction, RiskLevel, Scope, UserDecision};
use crate::policy::PolicyDocument;

/// Assess an event: fill `risk_score`, `risk_level`, `risk_factors` and
/// select `guardian_action` / `action_reason`.
///
/// `class_weight_override` is the Trust Fabric's learned weight for the
/// event's data class; it blends with the policy table as
/// `max(global, override)`, so learning can only tighten.
pub fn assess(event: &mut Event, policy: &PolicyDocument, class_weight_override: Option<f64>) {
    let mut score: f64 = 0.0;
    let mut factors = Vec::new();

    let scope_weight = policy.scope_weight(event.scope);
    score += scope_weight * policy.risk_weights.scope;
    if scope_weight > 0.5 {
        factors.push(format!("High-risk scope: {}", event.scope));
    }

    let class_weight = match class_weight_override {
        Some(learned) => policy.data_class_weight(event.data_class).max(learned),
        None => policy.data_class_weight(event.data_class),
    };
    score += class_weight * policy.risk_weights.data_class;
    if class_weight > 0.5 {
        factors.push(format!("Sensitive data class: {}", event.data_class));
    }

    if event.scope == Scope::External {
        score += policy.risk_weights.external;
        factors.push("External API access".to_string());
    }

    if event.mfa_required {
        score -= 0.1;
    }

    if event.user_decision == Some(UserDecision::Deny) {
        score += 0.2;
        factors.push("User previously denied similar access".to_string());
    }

    let score = score.clamp(0.0, 1.0);
    let level = band(score, policy);

    event.risk_score = score;
    event.risk_level = level;
    event.risk_factors = factors;

    let action = select_action(event, policy, level);
    let denied = event.user_decision == Some(UserDecision::Deny);
    event.action_reason = reason(action, event.data_class, level, event.scope, policy, denied);
    event.guardian_action = action;
}

/// Band a score into a risk level using the policy's action thresholds.
fn band(score: f64, policy: &PolicyDocument) -> RiskLevel {
    let t = policy.action_thresholds;
    if score >= t.block {
        RiskLevel::Critical
    } else if score >= t.alert {
        RiskLevel::High
    } else if score >= t.redact {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn select_action(event: &Event, policy: &PolicyDocument, level: RiskLevel) -> GuardianAction {
    if let Some(allowed) = &policy.allowed_scopes {
        if !allowed.contains(&event.scope) {
            return GuardianAction::Block;
        }
    }

    let action = match level {
        RiskLevel::Critical => GuardianAction::Block,
        RiskLevel::High => {
            // A present decision means the UI is already involved
            if event.user_decision.is_some() {
                GuardianAction::Alert
            } else {
                GuardianAction::Mask
            }
        }
        RiskLevel::Medium => {
            if event.scope == Scope::External {
                GuardianAction::Redact
            } else {
                GuardianAction::Allow
            }
        }
        RiskLevel::Low => GuardianAction::Allow,
    };

    // A recorded denial floors the action at MASK: ALLOW and ALERT both
    // pass the payload through, and a denied payload must never leave in
    // cleartext whatever the score says.
    if event.user_decision == Some(UserDecision::Deny)
        && matches!(action, GuardianAction::Allow | GuardianAction::Alert)
    {
        return GuardianAction::Mask;
    }
    action
}

/// Short, stable sentence naming the action, data class and risk level.
fn reason(
    action: GuardianAction,
    class: DataClass,
    level: RiskLevel,
    scope: Scope,
    policy: &PolicyDocument,
    denied: bool,
) -> String {
    if let Some(allowed) = &policy.allowed_scopes {
        if !allowed.contains(&scope) {
            return format!("Scope '{}' not permitted by policy for {} data", scope, class);
        }
    }
    match action {
        GuardianAction::Block => format!("Blocked {} access at {} risk", class, level),
        GuardianAction::Alert => format!("Flagged {} access at {} risk for review", class, level),
        GuardianAction::Mask if denied => format!("Masked {} data after user denial", class),
        GuardianAction::Mask => format!("Masked {} data pending user confirmation", class),
        GuardianAction::Redact => {
            format!("Redacted sensitive fields in {} data bound externally", class)
        }
        GuardianAction::Allow => format!("Allowed {} access at {} risk", class, level),
    }
}
