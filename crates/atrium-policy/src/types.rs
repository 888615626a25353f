use atrium_core::{HandlerId, RuleId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lowest priority a rule may carry.
pub const MIN_PRIORITY: i64 = 1;
/// Highest priority a rule may carry. Higher priorities evaluate first.
pub const MAX_PRIORITY: i64 = 1000;

// ---------------------------------------------------------------------------
// HierarchyLevel — the trust tier a rule belongs to
// ---------------------------------------------------------------------------

/// Trust tier of a rule. Governs removability only: system-level rules can
/// never be removed by `unregister` or bulk `clear`. A level never implies
/// evaluation order; only `priority` does that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyLevel {
    System,
    Environment,
    Project,
    Mode,
    Widget,
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HierarchyLevel::System => write!(f, "system"),
            HierarchyLevel::Environment => write!(f, "environment"),
            HierarchyLevel::Project => write!(f, "project"),
            HierarchyLevel::Mode => write!(f, "mode"),
            HierarchyLevel::Widget => write!(f, "widget"),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule — a prioritized, leveled policy statement
// ---------------------------------------------------------------------------

/// The condition under which a rule applies to a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Action pattern: an exact taxonomy name or the wildcard `*`.
    pub action: String,
    /// Target pattern: literal, `*`, delimited regex `/…/`, or glob.
    #[serde(default = "default_target")]
    pub target: String,
    /// Contextual predicate: `"always"` or `"mode:<value>"`.
    #[serde(default = "default_when")]
    pub when: String,
    /// Context keys that must be present in the request with exact equality.
    #[serde(default)]
    pub context: Option<HashMap<String, String>>,
}

fn default_target() -> String {
    "*".to_string()
}

fn default_when() -> String {
    "always".to_string()
}

/// What a matched rule does to the request.
///
/// `Modify` names a transform *handle* rather than embedding a closure, so
/// rules stay plain serializable data; handler code is a capability
/// registered separately by trusted collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Effect {
    Allow {
        reason: String,
    },
    Deny {
        reason: String,
    },
    Modify {
        reason: String,
        #[serde(default)]
        transform: Option<HandlerId>,
        #[serde(default)]
        fallback: Option<String>,
    },
}

impl Effect {
    pub fn reason(&self) -> &str {
        match self {
            Effect::Allow { reason } | Effect::Deny { reason } | Effect::Modify { reason, .. } => {
                reason
            }
        }
    }
}

/// A single policy rule. Immutable by replacement: re-registering an id
/// replaces the stored rule in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    /// Integer in [1,1000]; higher evaluates first.
    pub priority: i64,
    pub level: HierarchyLevel,
    pub condition: RuleCondition,
    pub effect: Effect,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// EvaluationRequest — what a collaborator asks the engine about
// ---------------------------------------------------------------------------

/// A request for a policy decision: which action, against which target,
/// under what context, asked by whom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub action: String,
    pub target: String,
    #[serde(default)]
    pub context: HashMap<String, String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl EvaluationRequest {
    pub fn new(action: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            target: target.into(),
            context: HashMap::new(),
            source: None,
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Decision — the engine's answer
// ---------------------------------------------------------------------------

/// Why a deny-shaped decision was denied. Malformed requests and transform
/// failures are distinguishable from ordinary rule denials and from the
/// default deny, without any of them being an error the caller must unwrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenyCause {
    /// The request carried no action at all.
    MissingAction,
    /// The action is outside the closed taxonomy (and not `*`).
    UnknownAction,
    /// No enabled rule's condition matched the request.
    NoRuleMatched,
    /// A matching rule carried a deny effect.
    RuleDenied,
    /// A matching modify rule's transform handler failed.
    TransformFailed,
}

/// The outcome of evaluating a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: String,
    #[serde(default)]
    pub rule_id: Option<RuleId>,
    #[serde(default)]
    pub rule_name: Option<String>,
    /// Present when a modify effect rewrote the action.
    #[serde(default)]
    pub modified_action: Option<String>,
    #[serde(default)]
    pub cause: Option<DenyCause>,
}

impl Decision {
    /// A denial not attributed to any rule (malformed request or no match).
    pub fn denied(reason: impl Into<String>, cause: DenyCause) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            rule_id: None,
            rule_name: None,
            modified_action: None,
            cause: Some(cause),
        }
    }

    pub(crate) fn allowed_by(rule: &Rule, reason: String, modified_action: Option<String>) -> Self {
        Self {
            allowed: true,
            reason,
            rule_id: Some(rule.id.clone()),
            rule_name: Some(rule.name.clone()),
            modified_action,
            cause: None,
        }
    }

    pub(crate) fn denied_by(rule: &Rule, reason: String, cause: DenyCause) -> Self {
        Self {
            allowed: false,
            reason,
            rule_id: Some(rule.id.clone()),
            rule_name: Some(rule.name.clone()),
            modified_action: None,
            cause: Some(cause),
        }
    }
}

// ---------------------------------------------------------------------------
// DecisionRecord — what the diagnostics sink receives
// ---------------------------------------------------------------------------

/// A record of one decision, forwarded to the diagnostics sink. The engine
/// emits one per `evaluate` call, matched or not, and has no behavioral
/// dependency on whether anything is listening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub action: String,
    pub target: String,
    pub allowed: bool,
    pub reason: String,
    pub rule_id: Option<RuleId>,
    pub rule_name: Option<String>,
    pub source: Option<String>,
    pub context: HashMap<String, String>,
    pub decided_at: Timestamp,
}
