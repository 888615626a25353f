use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

use atrium_core::HandlerId;

use crate::pattern::{ActionMatcher, TargetMatcher};
use crate::predicate::{context_matches, WhenPredicate};
use crate::types::{
    Decision, DenyCause, Effect, EvaluationRequest, Rule, MAX_PRIORITY, MIN_PRIORITY,
};

/// A transform handler: given the original request, produce the modified
/// action. Handlers are untrusted, bounded, and synchronous; any failure is
/// contained by the engine and downgraded to a denial.
pub type TransformFn = Box<dyn Fn(&EvaluationRequest) -> Result<String, String> + Send + Sync>;

/// The fixed reason carried by every failed-transform denial.
pub const TRANSFORM_FAILED_REASON: &str = "rule transform failed";

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Structural acceptance of a candidate rule. Returns every refusal reason
/// found, or an empty vec for an acceptable rule.
///
/// Level, effect type, and the enabled flag are enforced by the type system
/// at deserialization; this checks what types alone cannot.
pub fn validate_rule(rule: &Rule) -> Vec<String> {
    let mut errors = Vec::new();

    if rule.id.as_str().is_empty() {
        errors.push("rule id must not be empty".to_string());
    }

    if rule.name.is_empty() {
        errors.push("rule name must not be empty".to_string());
    }

    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&rule.priority) {
        errors.push(format!(
            "priority {} outside [{}, {}]",
            rule.priority, MIN_PRIORITY, MAX_PRIORITY
        ));
    }

    if rule.condition.action.is_empty() {
        errors.push("condition action pattern must not be empty".to_string());
    }

    if rule.condition.target.is_empty() {
        errors.push("condition target pattern must not be empty".to_string());
    } else if let Err(e) = TargetMatcher::compile(&rule.condition.target) {
        errors.push(e);
    }

    if let Err(e) = WhenPredicate::parse(&rule.condition.when) {
        errors.push(e);
    }

    errors
}

/// Validate a persisted rule array: per-rule structural checks plus
/// duplicate-id detection across the set.
pub fn validate_rule_set(rules: &[Rule]) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    let mut seen_ids = HashSet::new();

    for rule in rules {
        if !rule.id.as_str().is_empty() && !seen_ids.insert(rule.id.as_str()) {
            errors.push(format!("duplicate rule id: '{}'", rule.id));
        }
        for err in validate_rule(rule) {
            errors.push(format!("rule '{}': {}", rule.id, err));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ---------------------------------------------------------------------------
// CompiledRule — a rule admitted to the store
// ---------------------------------------------------------------------------

/// A validated rule plus its condition compiled into matchable form. The
/// `seq` is the admission order and serves as the tie-break among equal
/// priorities; it is assigned by the store.
#[derive(Debug)]
pub struct CompiledRule {
    pub rule: Rule,
    pub seq: u64,
    pub action: ActionMatcher,
    pub target: TargetMatcher,
    pub when: WhenPredicate,
}

impl CompiledRule {
    pub fn compile(rule: Rule) -> Result<Self, Vec<String>> {
        let errors = validate_rule(&rule);
        if !errors.is_empty() {
            return Err(errors);
        }
        let action = ActionMatcher::compile(&rule.condition.action);
        let target = TargetMatcher::compile(&rule.condition.target).map_err(|e| vec![e])?;
        let when = WhenPredicate::parse(&rule.condition.when).map_err(|e| vec![e])?;
        Ok(Self {
            rule,
            seq: 0,
            action,
            target,
            when,
        })
    }

    /// Whether this rule's full condition (action, target, predicate, and
    /// context map) matches the request. Disabled rules never apply.
    pub fn applies_to(&self, request: &EvaluationRequest) -> bool {
        self.rule.enabled
            && self.action.matches(&request.action)
            && self.target.matches(&request.target)
            && self.when.matches(&request.context)
            && context_matches(self.rule.condition.context.as_ref(), &request.context)
    }
}

// ---------------------------------------------------------------------------
// Effect application
// ---------------------------------------------------------------------------

/// Turn a matched rule's effect into a decision.
///
/// A modify effect with a transform handle resolves the handler through the
/// registered table and runs it under `catch_unwind`; a handler error, a
/// panic, or an unregistered handle all downgrade to a denial. Without a
/// handle, the effect's fallback payload becomes the modified action.
pub fn apply_effect(
    rule: &Rule,
    request: &EvaluationRequest,
    transforms: &HashMap<HandlerId, TransformFn>,
) -> Decision {
    match &rule.effect {
        Effect::Allow { reason } => Decision::allowed_by(rule, reason.clone(), None),
        Effect::Deny { reason } => Decision::denied_by(rule, reason.clone(), DenyCause::RuleDenied),
        Effect::Modify {
            reason,
            transform,
            fallback,
        } => match transform {
            Some(handle) => {
                let Some(handler) = transforms.get(handle) else {
                    tracing::warn!(
                        rule_id = %rule.id,
                        handler = %handle,
                        "modify effect references an unregistered transform handler"
                    );
                    return transform_failed(rule);
                };
                match catch_unwind(AssertUnwindSafe(|| handler(request))) {
                    Ok(Ok(modified)) => Decision::allowed_by(rule, reason.clone(), Some(modified)),
                    Ok(Err(err)) => {
                        tracing::warn!(rule_id = %rule.id, handler = %handle, error = %err,
                            "transform handler returned an error");
                        transform_failed(rule)
                    }
                    Err(_) => {
                        tracing::warn!(rule_id = %rule.id, handler = %handle,
                            "transform handler panicked");
                        transform_failed(rule)
                    }
                }
            }
            None => Decision::allowed_by(rule, reason.clone(), fallback.clone()),
        },
    }
}

fn transform_failed(rule: &Rule) -> Decision {
    Decision::denied_by(
        rule,
        TRANSFORM_FAILED_REASON.to_string(),
        DenyCause::TransformFailed,
    )
}
