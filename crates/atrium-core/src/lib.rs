//! Shared value types for the atrium workspace.
//!
//! Typed identifiers, the canonical timestamp representation, and the closed
//! action taxonomy that every policy-consulting collaborator references.

pub mod action;
pub mod types;

pub use action::Action;
pub use types::{HandlerId, RuleId, Timestamp};
