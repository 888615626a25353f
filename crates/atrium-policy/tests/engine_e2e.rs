//! End-to-end integration test: a workspace session from boot to export.
//!
//! This test tells a story:
//!
//! 1. The bootstrap constructs the engine; built-in system rules are live
//! 2. The environment registers its baseline rules
//! 3. A project is opened and its rule set loaded
//! 4. A widget host installs a sandbox transform and a modify rule
//! 5. The user switches projects; the new rule set fully replaces the old
//! 6. The diagnostics sink holds a record of every decision along the way

use std::collections::HashMap;
use std::sync::Arc;

use atrium_core::{HandlerId, RuleId};
use atrium_policy::{
    Decision, DenyCause, Effect, EvaluationRequest, HierarchyLevel, InMemoryDecisionSink,
    PolicyEngine, Rule, RuleCondition,
};

fn rule(
    id: &str,
    priority: i64,
    level: HierarchyLevel,
    action: &str,
    target: &str,
    effect: Effect,
) -> Rule {
    Rule {
        id: RuleId::new(id),
        name: format!("Rule {}", id),
        priority,
        level,
        condition: RuleCondition {
            action: action.to_string(),
            target: target.to_string(),
            when: "always".to_string(),
            context: None,
        },
        effect,
        enabled: true,
    }
}

fn allow(reason: &str) -> Effect {
    Effect::Allow {
        reason: reason.to_string(),
    }
}

fn deny(reason: &str) -> Effect {
    Effect::Deny {
        reason: reason.to_string(),
    }
}

#[test]
fn chapter_1_boot_with_builtin_rules_only() {
    let engine = PolicyEngine::new();

    // Boot, logging, and debug access are permitted out of the box
    assert!(engine.is_allowed("system.boot", "kernel"));
    assert!(engine.is_allowed("system.log", "boot-banner"));
    assert!(engine.is_allowed("system.debug", "inspector"));

    // Everything else falls through to the default deny, which comes from
    // the absence of a match, not from the (disabled) catch-all rule
    let decision = engine.evaluate(&EvaluationRequest::new("project.save", "p1"));
    assert!(!decision.allowed);
    assert_eq!(decision.reason, "no matching rule found");
    assert!(decision.rule_id.is_none());

    // The built-in rules themselves are untouchable
    assert!(!engine.unregister(&RuleId::new("system-boot-allow")));
    assert!(engine.is_allowed("system.boot", "kernel"));
}

#[test]
fn chapter_2_environment_baseline() {
    let engine = PolicyEngine::new();

    // The environment bootstrap grants broad read access and protects the
    // settings store from widgets
    assert!(engine.register(rule(
        "env-db-read",
        800,
        HierarchyLevel::Environment,
        "db.read",
        "*",
        allow("reads are unrestricted"),
    )));
    assert!(engine.register(rule(
        "env-settings-guard",
        900,
        HierarchyLevel::Environment,
        "settings.write",
        "*",
        deny("settings are read-only outside setup"),
    )));

    assert!(engine.is_allowed("db.read", "notes/today"));

    let decision = engine.evaluate(&EvaluationRequest::new("settings.write", "theme"));
    assert!(!decision.allowed);
    assert_eq!(decision.reason, "settings are read-only outside setup");
    assert_eq!(decision.cause, Some(DenyCause::RuleDenied));
}

#[test]
fn chapter_3_project_rules_and_priority_conflicts() {
    let engine = PolicyEngine::new();

    // The project ships a permissive save rule and a deny for one widget
    let loaded = engine.load_project_rules(vec![
        rule(
            "proj-save",
            500,
            HierarchyLevel::Project,
            "project.save",
            "*",
            allow("project saves enabled"),
        ),
        rule(
            "proj-widget-block",
            500,
            HierarchyLevel::Project,
            "widget.execute",
            "widget.legacy-*",
            deny("legacy widgets are quarantined"),
        ),
    ]);
    assert_eq!(loaded, 2);

    assert!(engine.is_allowed("project.save", "index.html"));

    // Glob target: the block applies to the legacy family only
    assert!(!engine.is_allowed("widget.execute", "widget.legacy-marquee"));
    let decision = engine.evaluate(&EvaluationRequest::new("widget.execute", "widget.clock"));
    assert_eq!(decision.cause, Some(DenyCause::NoRuleMatched));

    // An equal-priority conflict resolves to the rule registered first,
    // every time
    assert!(engine.register(rule(
        "proj-save-revoke",
        500,
        HierarchyLevel::Project,
        "project.save",
        "*",
        deny("too late to win the tie"),
    )));
    for _ in 0..5 {
        let decision = engine.evaluate(&EvaluationRequest::new("project.save", "index.html"));
        assert!(decision.allowed);
        assert_eq!(decision.rule_id, Some(RuleId::new("proj-save")));
    }
}

#[test]
fn chapter_4_widget_sandbox_transform() {
    let engine = PolicyEngine::new();

    // The widget host installs a transform capability, then a mode-scoped
    // modify rule that routes widget execution through it
    engine.register_transform(HandlerId::new("widget-sandbox"), |req: &EvaluationRequest| {
        Ok(format!("{}#sandboxed:{}", req.action, req.target))
    });
    let mut sandbox = rule(
        "widget-sandbox-edit",
        700,
        HierarchyLevel::Mode,
        "widget.execute",
        "widget.*",
        Effect::Modify {
            reason: "widgets run sandboxed in edit mode".to_string(),
            transform: Some(HandlerId::new("widget-sandbox")),
            fallback: None,
        },
    );
    sandbox.condition.when = "mode:edit".to_string();
    assert!(engine.register(sandbox));

    let in_edit =
        EvaluationRequest::new("widget.execute", "widget.clock").with_context("mode", "edit");
    let decision = engine.evaluate(&in_edit);
    assert!(decision.allowed);
    assert_eq!(
        decision.modified_action.as_deref(),
        Some("widget.execute#sandboxed:widget.clock")
    );

    // In runner mode the rule does not apply and evaluation falls through
    let in_runner =
        EvaluationRequest::new("widget.execute", "widget.clock").with_context("mode", "runner");
    assert_eq!(
        engine.evaluate(&in_runner).cause,
        Some(DenyCause::NoRuleMatched)
    );

    // A broken replacement transform must never escape the engine
    engine.register_transform(HandlerId::new("widget-sandbox"), |_: &EvaluationRequest| {
        panic!("sandbox misconfigured")
    });
    let decision = engine.evaluate(&in_edit);
    assert!(!decision.allowed);
    assert_eq!(decision.reason, "rule transform failed");
    assert_eq!(decision.cause, Some(DenyCause::TransformFailed));
}

#[test]
fn chapter_5_project_switch_replaces_rules() {
    let engine = PolicyEngine::new();

    engine.register(rule(
        "env-keep",
        800,
        HierarchyLevel::Environment,
        "db.read",
        "*",
        allow("reads are unrestricted"),
    ));

    let set_a = vec![
        rule(
            "a-save",
            500,
            HierarchyLevel::Project,
            "project.save",
            "*",
            allow("project A saves"),
        ),
        rule(
            "a-export",
            400,
            HierarchyLevel::Project,
            "export.site",
            "*",
            allow("project A exports"),
        ),
    ];
    let set_b = vec![rule(
        "b-save",
        500,
        HierarchyLevel::Project,
        "project.save",
        "*",
        deny("project B is read-only"),
    )];

    assert_eq!(engine.load_project_rules(set_a), 2);
    assert!(engine.is_allowed("project.save", "index.html"));
    assert!(engine.is_allowed("export.site", "dist"));

    // Switching projects swaps the whole project tier; nothing from set A
    // survives and other tiers are untouched
    assert_eq!(engine.load_project_rules(set_b), 1);
    let ids: Vec<String> = engine.rules().iter().map(|r| r.id.to_string()).collect();
    assert!(ids.contains(&"b-save".to_string()));
    assert!(!ids.contains(&"a-save".to_string()));
    assert!(!ids.contains(&"a-export".to_string()));
    assert!(ids.contains(&"env-keep".to_string()));

    assert!(!engine.is_allowed("project.save", "index.html"));
    assert!(engine.is_allowed("db.read", "notes/today"));

    // A project set cannot carry a system-level rule
    let sneaky = rule(
        "sneaky",
        1000,
        HierarchyLevel::System,
        "*",
        "*",
        allow("total access"),
    );
    assert_eq!(engine.load_project_rules(vec![sneaky]), 0);
}

#[test]
fn chapter_6_diagnostics_trail() {
    let sink = Arc::new(InMemoryDecisionSink::new());
    let engine = PolicyEngine::with_sink(sink.clone());

    engine.register(rule(
        "save-ok",
        500,
        HierarchyLevel::Project,
        "project.save",
        "*",
        allow("saves enabled"),
    ));

    let request = EvaluationRequest::new("project.save", "index.html")
        .with_context("mode", "edit")
        .with_source("editor");
    let allowed: Decision = engine.evaluate(&request);
    assert!(allowed.allowed);

    engine.evaluate(&EvaluationRequest::new("db.delete", "notes/today").with_source("storage"));
    engine.evaluate(&EvaluationRequest::new("totally.unknown", "*"));

    let records = sink.records();
    assert_eq!(records.len(), 3);

    assert_eq!(records[0].action, "project.save");
    assert_eq!(records[0].rule_id, Some(RuleId::new("save-ok")));
    assert_eq!(records[0].rule_name.as_deref(), Some("Rule save-ok"));
    assert_eq!(records[0].source.as_deref(), Some("editor"));
    assert_eq!(
        records[0].context,
        HashMap::from([("mode".to_string(), "edit".to_string())])
    );

    assert!(!records[1].allowed);
    assert_eq!(records[1].reason, "no matching rule found");
    assert_eq!(records[1].source.as_deref(), Some("storage"));

    assert!(!records[2].allowed);
    assert_eq!(records[2].reason, "unknown action: totally.unknown");
    assert!(records[2].rule_id.is_none());
}

#[test]
fn chapter_7_ruleset_roundtrip_through_storage() {
    // The persistence collaborator serializes, stores, and reloads the rule
    // array; the engine only validates and parses
    let rules = vec![
        rule(
            "proj-save",
            500,
            HierarchyLevel::Project,
            "project.save",
            "*",
            allow("saves enabled"),
        ),
        rule(
            "proj-guard",
            600,
            HierarchyLevel::Project,
            "db.delete",
            "/^notes\\//",
            deny("notes are append-only"),
        ),
    ];

    let bytes = PolicyEngine::save_rules(&rules).unwrap();
    let reloaded = PolicyEngine::load_rules(&bytes).unwrap();
    assert_eq!(reloaded.len(), 2);

    let engine = PolicyEngine::new();
    assert_eq!(engine.load_project_rules(reloaded), 2);

    // The regex-form target survives the roundtrip
    assert!(!engine.is_allowed("db.delete", "notes/today"));
    let decision = engine.evaluate(&EvaluationRequest::new("db.delete", "archive/old"));
    assert_eq!(decision.cause, Some(DenyCause::NoRuleMatched));
}
