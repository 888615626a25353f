use atrium_core::RuleId;

use crate::rule::CompiledRule;
use crate::types::{HierarchyLevel, Rule};

// ---------------------------------------------------------------------------
// RuleStore — owns the rule collection in evaluation order
// ---------------------------------------------------------------------------

/// The rule collection, always kept sorted by priority descending with
/// admission order as the tie-break. That ordering is a correctness
/// contract, not an optimization: it decides which of two equal-priority
/// rules with conflicting effects wins, and the answer must always be
/// "the one registered first".
#[derive(Debug, Default)]
pub struct RuleStore {
    entries: Vec<CompiledRule>,
    next_seq: u64,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, or replace the rule with the same id in place.
    ///
    /// Replacement keeps the original admission sequence, so a replaced rule
    /// keeps its first-registered position among equal priorities. Returns
    /// false without mutating when the id belongs to an existing
    /// system-level rule.
    pub fn admit(&mut self, mut compiled: CompiledRule) -> bool {
        if let Some(pos) = self.position(&compiled.rule.id) {
            if self.entries[pos].rule.level == HierarchyLevel::System {
                return false;
            }
            compiled.seq = self.entries[pos].seq;
            self.entries[pos] = compiled;
        } else {
            compiled.seq = self.next_seq;
            self.next_seq += 1;
            self.entries.push(compiled);
        }
        self.resort();
        true
    }

    /// Remove exactly one non-system rule. Returns false for unknown ids and
    /// for system-level rules, which are never removable.
    pub fn remove(&mut self, id: &RuleId) -> bool {
        match self.position(id) {
            Some(pos) if self.entries[pos].rule.level != HierarchyLevel::System => {
                self.entries.remove(pos);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: &RuleId) -> Option<&CompiledRule> {
        self.position(id).map(|pos| &self.entries[pos])
    }

    /// Evict every rule at the given level. Returns the number evicted.
    pub fn evict_level(&mut self, level: HierarchyLevel) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.rule.level != level);
        before - self.entries.len()
    }

    /// Evict every non-system rule. Returns the number evicted.
    pub fn clear_non_system(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.rule.level == HierarchyLevel::System);
        before - self.entries.len()
    }

    /// Rules in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A snapshot of the rule literals, in evaluation order.
    pub fn rules(&self) -> Vec<Rule> {
        self.entries.iter().map(|e| e.rule.clone()).collect()
    }

    fn position(&self, id: &RuleId) -> Option<usize> {
        self.entries.iter().position(|e| &e.rule.id == id)
    }

    fn resort(&mut self) {
        // The composite key makes the order total: equal priorities fall
        // back to admission order, never to sort-internal behavior.
        self.entries
            .sort_by(|a, b| b.rule.priority.cmp(&a.rule.priority).then(a.seq.cmp(&b.seq)));
    }
}
