use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use atrium_core::{Action, HandlerId, RuleId, Timestamp};

use crate::error::{PolicyError, PolicyResult};
use crate::rule::{apply_effect, validate_rule_set, CompiledRule, TransformFn};
use crate::store::RuleStore;
use crate::types::{
    Decision, DecisionRecord, DenyCause, Effect, EvaluationRequest, HierarchyLevel, Rule,
    RuleCondition, MAX_PRIORITY, MIN_PRIORITY,
};

/// Upper bound on a serialized rule-set accepted by [`PolicyEngine::load_rules`].
const MAX_RULESET_BYTES: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// DecisionSink trait — diagnostics record emission
// ---------------------------------------------------------------------------

/// Receives a record of every decision the engine makes.
///
/// The engine behaves identically whether or not a sink is attached, so a
/// sink must handle its own failures; nothing it does can influence a
/// decision.
pub trait DecisionSink: Send + Sync {
    fn record(&self, record: &DecisionRecord);
}

/// In-memory sink for tests and tooling.
#[derive(Default)]
pub struct InMemoryDecisionSink {
    records: Mutex<Vec<DecisionRecord>>,
}

impl InMemoryDecisionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DecisionSink for InMemoryDecisionSink {
    fn record(&self, record: &DecisionRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }
}

// ---------------------------------------------------------------------------
// PolicyEngine — the facade every collaborator consults
// ---------------------------------------------------------------------------

/// The policy engine. Constructed once by the process bootstrap and handed
/// by reference to every collaborator; the built-in system rules are
/// installed at construction.
///
/// `evaluate` and `is_allowed` are concurrent reads over the current rule
/// list; the rarer mutating operations take the write side of the lock, so
/// no evaluation ever observes a partially mutated or partially sorted list.
pub struct PolicyEngine {
    store: RwLock<RuleStore>,
    transforms: RwLock<HashMap<HandlerId, TransformFn>>,
    sink: Option<Arc<dyn DecisionSink>>,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::bootstrap(None)
    }

    pub fn with_sink(sink: Arc<dyn DecisionSink>) -> Self {
        Self::bootstrap(Some(sink))
    }

    fn bootstrap(sink: Option<Arc<dyn DecisionSink>>) -> Self {
        let mut store = RuleStore::new();
        for rule in builtin_rules() {
            let compiled = CompiledRule::compile(rule).expect("built-in rule compiles");
            store.admit(compiled);
        }
        Self {
            store: RwLock::new(store),
            transforms: RwLock::new(HashMap::new()),
            sink,
        }
    }

    // -- rule lifecycle -----------------------------------------------------

    /// Register a rule, replacing any existing rule with the same id.
    ///
    /// Refusals (structural rejection, or an attempt to overwrite a
    /// system-level rule) log a warning, mutate nothing, and return false.
    pub fn register(&self, rule: Rule) -> bool {
        let rule_id = rule.id.clone();
        let compiled = match CompiledRule::compile(rule) {
            Ok(compiled) => compiled,
            Err(errors) => {
                tracing::warn!(
                    rule_id = %rule_id,
                    reasons = %errors.join("; "),
                    "rule registration refused"
                );
                return false;
            }
        };
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        if !store.admit(compiled) {
            tracing::warn!(rule_id = %rule_id, "refusing to overwrite a system-level rule");
            return false;
        }
        true
    }

    /// Remove exactly one non-system rule. Returns false for unknown ids and
    /// for system-level rules.
    pub fn unregister(&self, id: &RuleId) -> bool {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let level = store.get(id).map(|e| e.rule.level);
        match level {
            None => {
                tracing::debug!(rule_id = %id, "unregister: no such rule");
                false
            }
            Some(HierarchyLevel::System) => {
                tracing::warn!(rule_id = %id, "system-level rules cannot be removed");
                false
            }
            Some(_) => store.remove(id),
        }
    }

    /// Replace the project-level rule set.
    ///
    /// All currently registered project-level rules are evicted first, so
    /// reloading never accumulates stale project rules. Rules whose level is
    /// not `project` are refused: a project ruleset cannot smuggle in
    /// higher-tier rules. The whole exchange happens under one write lock
    /// and appears atomic to concurrent evaluations. Returns the number of
    /// rules accepted.
    pub fn load_project_rules(&self, rules: Vec<Rule>) -> usize {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let evicted = store.evict_level(HierarchyLevel::Project);
        tracing::debug!(evicted, incoming = rules.len(), "reloading project rules");

        let mut accepted = 0;
        for rule in rules {
            if rule.level != HierarchyLevel::Project {
                tracing::warn!(
                    rule_id = %rule.id,
                    level = %rule.level,
                    "project ruleset may only carry project-level rules"
                );
                continue;
            }
            let rule_id = rule.id.clone();
            match CompiledRule::compile(rule) {
                Ok(compiled) => {
                    if store.admit(compiled) {
                        accepted += 1;
                    } else {
                        tracing::warn!(rule_id = %rule_id, "refusing to overwrite a system-level rule");
                    }
                }
                Err(errors) => {
                    tracing::warn!(
                        rule_id = %rule_id,
                        reasons = %errors.join("; "),
                        "project rule refused"
                    );
                }
            }
        }
        accepted
    }

    /// Evict every non-system rule. Returns the number evicted.
    pub fn clear(&self) -> usize {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let evicted = store.clear_non_system();
        tracing::debug!(evicted, "cleared non-system rules");
        evicted
    }

    pub fn rule_count(&self) -> usize {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// A snapshot of the registered rules, in evaluation order.
    pub fn rules(&self) -> Vec<Rule> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rules()
    }

    // -- transforms ---------------------------------------------------------

    /// Register a transform handler under a handle. Modify-effect rules name
    /// the handle; the handler itself is a capability only trusted
    /// collaborators can install.
    pub fn register_transform<F>(&self, handle: HandlerId, transform: F)
    where
        F: Fn(&EvaluationRequest) -> Result<String, String> + Send + Sync + 'static,
    {
        self.transforms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, Box::new(transform));
    }

    pub fn unregister_transform(&self, handle: &HandlerId) -> bool {
        self.transforms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle)
            .is_some()
    }

    // -- evaluation ---------------------------------------------------------

    /// Evaluate a request against the current rule list.
    ///
    /// Never panics and never returns an error: malformed requests, rule
    /// denials, transform failures, and the no-match default all come back
    /// as deny-shaped decisions. Every decision is forwarded to the
    /// diagnostics sink, if one is attached.
    pub fn evaluate(&self, request: &EvaluationRequest) -> Decision {
        let decision = self.decide(request);
        self.forward(request, &decision);
        decision
    }

    /// Pure boolean convenience over [`evaluate`](Self::evaluate).
    pub fn is_allowed(&self, action: &str, target: &str) -> bool {
        self.evaluate(&EvaluationRequest::new(action, target)).allowed
    }

    fn decide(&self, request: &EvaluationRequest) -> Decision {
        if request.action.is_empty() {
            return Decision::denied("request has no action", DenyCause::MissingAction);
        }
        if request.action != "*" && Action::parse(&request.action).is_none() {
            return Decision::denied(
                format!("unknown action: {}", request.action),
                DenyCause::UnknownAction,
            );
        }

        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        for entry in store.iter() {
            if entry.applies_to(request) {
                let transforms = self
                    .transforms
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                return apply_effect(&entry.rule, request, &transforms);
            }
        }

        Decision::denied("no matching rule found", DenyCause::NoRuleMatched)
    }

    fn forward(&self, request: &EvaluationRequest, decision: &Decision) {
        let Some(sink) = &self.sink else { return };
        sink.record(&DecisionRecord {
            action: request.action.clone(),
            target: request.target.clone(),
            allowed: decision.allowed,
            reason: decision.reason.clone(),
            rule_id: decision.rule_id.clone(),
            rule_name: decision.rule_name.clone(),
            source: request.source.clone(),
            context: request.context.clone(),
            decided_at: Timestamp::now(),
        });
    }

    // -- persistence helpers ------------------------------------------------

    /// Parse and validate a rule array from raw JSON bytes. Persistence of
    /// the bytes themselves belongs to the calling collaborator.
    pub fn load_rules(data: &[u8]) -> PolicyResult<Vec<Rule>> {
        if data.is_empty() {
            return Err(PolicyError::LoadError("rule data is empty".to_string()));
        }
        if data.len() > MAX_RULESET_BYTES {
            return Err(PolicyError::LoadError(
                "rule data exceeds 10MB size limit".to_string(),
            ));
        }

        let json_str = std::str::from_utf8(data)
            .map_err(|_| PolicyError::LoadError("rule data is not valid UTF-8".to_string()))?;

        let rules: Vec<Rule> = serde_json::from_str(json_str)
            .map_err(|e| PolicyError::DeserializationError(format!("JSON parse error: {}", e)))?;

        validate_rule_set(&rules).map_err(|errors| PolicyError::ValidationError(errors.join("; ")))?;

        Ok(rules)
    }

    /// Serialize a validated rule array to JSON bytes for storage.
    pub fn save_rules(rules: &[Rule]) -> PolicyResult<Vec<u8>> {
        validate_rule_set(rules).map_err(|errors| PolicyError::ValidationError(errors.join("; ")))?;

        serde_json::to_vec_pretty(rules)
            .map_err(|e| PolicyError::SerializationError(format!("JSON serialize error: {}", e)))
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Built-in system rules
// ---------------------------------------------------------------------------

/// The fixed system rule set installed at construction: unconditional allows
/// for boot, logging, and debug access, plus a catch-all deny that ships
/// disabled. Because the catch-all is disabled, the functional default is
/// "deny by absence of a match", which produces the no-match reason rather
/// than this rule's.
fn builtin_rules() -> Vec<Rule> {
    fn system_allow(id: &str, name: &str, action: Action, reason: &str) -> Rule {
        Rule {
            id: RuleId::new(id),
            name: name.to_string(),
            priority: MAX_PRIORITY,
            level: HierarchyLevel::System,
            condition: RuleCondition {
                action: action.as_str().to_string(),
                target: "*".to_string(),
                when: "always".to_string(),
                context: None,
            },
            effect: Effect::Allow {
                reason: reason.to_string(),
            },
            enabled: true,
        }
    }

    vec![
        system_allow(
            "system-boot-allow",
            "System boot",
            Action::SystemBoot,
            "system boot is always permitted",
        ),
        system_allow(
            "system-log-allow",
            "System logging",
            Action::SystemLog,
            "system logging is always permitted",
        ),
        system_allow(
            "system-debug-allow",
            "Debug access",
            Action::SystemDebug,
            "debug access is always permitted",
        ),
        Rule {
            id: RuleId::new("system-default-deny"),
            name: "Default deny".to_string(),
            priority: MIN_PRIORITY,
            level: HierarchyLevel::System,
            condition: RuleCondition {
                action: "*".to_string(),
                target: "*".to_string(),
                when: "always".to_string(),
                context: None,
            },
            effect: Effect::Deny {
                reason: "denied by default policy".to_string(),
            },
            enabled: false,
        },
    ]
}
