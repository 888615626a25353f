use std::collections::HashMap;

// ---------------------------------------------------------------------------
// WhenPredicate — contextual "when" predicates, parsed at registration
// ---------------------------------------------------------------------------

/// Parsed form of a rule's `when` predicate string.
///
/// Parsing happens once, when the rule is registered; a malformed predicate
/// is a registration-time refusal rather than a silent per-evaluation miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhenPredicate {
    /// `"always"` — matches every request.
    Always,
    /// `"mode:<value>"` — matches when the request context's `mode` or
    /// `activeMode` equals the value.
    ModeEquals(String),
}

impl WhenPredicate {
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw == "always" {
            return Ok(WhenPredicate::Always);
        }
        if let Some(value) = raw.strip_prefix("mode:") {
            if value.is_empty() {
                return Err(format!("mode predicate has no value: '{}'", raw));
            }
            return Ok(WhenPredicate::ModeEquals(value.to_string()));
        }
        Err(format!("unrecognized when predicate: '{}'", raw))
    }

    pub fn matches(&self, context: &HashMap<String, String>) -> bool {
        match self {
            WhenPredicate::Always => true,
            WhenPredicate::ModeEquals(value) => ["mode", "activeMode"]
                .iter()
                .any(|key| context.get(*key).is_some_and(|v| v == value)),
        }
    }
}

/// Exact-equality gate over a rule's optional context requirements: every
/// required key must be present in the request context with an equal value.
pub fn context_matches(
    required: Option<&HashMap<String, String>>,
    context: &HashMap<String, String>,
) -> bool {
    match required {
        None => true,
        Some(required) => required
            .iter()
            .all(|(key, expected)| context.get(key) == Some(expected)),
    }
}
