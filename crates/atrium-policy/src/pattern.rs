use regex::Regex;

// ---------------------------------------------------------------------------
// TargetMatcher — compiled target-pattern forms
// ---------------------------------------------------------------------------

/// A target pattern compiled at registration time.
///
/// Four forms, in matching precedence: the literal `*` matches any target;
/// exact string equality; a delimited regex `"/…/"` whose inner text is
/// compiled and tested against the target; a glob containing `*`, translated
/// to an anchored regex. For the compiled forms, raw-string equality is
/// checked before the regex so a pattern always matches its own literal text.
#[derive(Debug, Clone)]
pub enum TargetMatcher {
    Any,
    Exact(String),
    Regex { raw: String, re: Regex },
    Glob { raw: String, re: Regex },
}

impl TargetMatcher {
    /// Compile a target pattern. Malformed regexes are refused here, at
    /// registration, rather than failing closed on every evaluation.
    pub fn compile(pattern: &str) -> Result<Self, String> {
        if pattern == "*" {
            return Ok(TargetMatcher::Any);
        }
        if let Some(inner) = pattern
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            let re = Regex::new(inner)
                .map_err(|e| format!("invalid regex target pattern '{}': {}", pattern, e))?;
            return Ok(TargetMatcher::Regex {
                raw: pattern.to_string(),
                re,
            });
        }
        if pattern.contains('*') {
            let re = Regex::new(&glob_to_regex(pattern))
                .map_err(|e| format!("invalid glob target pattern '{}': {}", pattern, e))?;
            return Ok(TargetMatcher::Glob {
                raw: pattern.to_string(),
                re,
            });
        }
        Ok(TargetMatcher::Exact(pattern.to_string()))
    }

    pub fn matches(&self, target: &str) -> bool {
        match self {
            TargetMatcher::Any => true,
            TargetMatcher::Exact(pattern) => pattern == target,
            TargetMatcher::Regex { raw, re } | TargetMatcher::Glob { raw, re } => {
                raw == target || re.is_match(target)
            }
        }
    }
}

/// Translate a glob pattern into an anchored regex. Every metacharacter
/// except `*` is escaped, so a target containing literal `.`, `+`, `(` etc.
/// is matched literally.
fn glob_to_regex(pattern: &str) -> String {
    let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
    format!("^{}$", escaped.join(".*"))
}

// ---------------------------------------------------------------------------
// ActionMatcher — exact or wildcard only
// ---------------------------------------------------------------------------

/// An action pattern: exact taxonomy name or the wildcard `*`. The taxonomy
/// is closed, so regex and glob forms are not supported for actions.
#[derive(Debug, Clone)]
pub enum ActionMatcher {
    Any,
    Exact(String),
}

impl ActionMatcher {
    pub fn compile(pattern: &str) -> Self {
        if pattern == "*" {
            ActionMatcher::Any
        } else {
            ActionMatcher::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, action: &str) -> bool {
        match self {
            ActionMatcher::Any => true,
            ActionMatcher::Exact(pattern) => pattern == action,
        }
    }
}
