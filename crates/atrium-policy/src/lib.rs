//! Atrium Policy Engine
//!
//! The single arbiter every sensitive operation in the atrium workspace must
//! consult before mutating state. Collaborators (storage, project lifecycle,
//! widgets, settings, the exporter) build an evaluation request and receive an
//! allow/deny/modify decision plus a human-readable reason; they own their own
//! persistence and presentation.
//!
//! Key properties:
//! - Closed action taxonomy; an unknown action is a malformed request, not a denial
//! - Five-level rule hierarchy (system/environment/project/mode/widget) that
//!   governs removability, never evaluation order
//! - Priority-ordered first-match-wins evaluation with a deterministic
//!   first-registered tie-break among equal priorities
//! - Literal, wildcard, regex, and glob target patterns, compiled once at
//!   registration
//! - allow/deny/modify effects; modify resolves a transform handle through a
//!   registered handler table and downgrades any handler failure to a denial
//! - Fail-closed: no matching rule means deny, and no failure crosses the
//!   engine boundary as a panic
//! - Optional diagnostics sink receiving a record of every decision

pub mod engine;
pub mod error;
pub mod pattern;
pub mod predicate;
pub mod rule;
pub mod store;
pub mod types;

// Re-export primary types for convenience
pub use engine::{DecisionSink, InMemoryDecisionSink, PolicyEngine};
pub use error::{PolicyError, PolicyResult};
pub use rule::{validate_rule, validate_rule_set};
pub use types::{
    Decision, DecisionRecord, DenyCause, Effect, EvaluationRequest, HierarchyLevel, Rule,
    RuleCondition,
};
