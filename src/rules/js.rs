// SPDX-License-Identifier: PMPL-1.0-or-later
//! JS rule family - whole-page checks over the behavior analysis report.
//!
//! Each rule reads sections of one [`JsAnalysisReport`]; a rule whose
//! section failed to compute reports `incomplete` rather than guessing.
//! Rule ids carry the `js-` prefix.

use crate::analyzers::js_behavior::{JsAnalysisReport, Section};
use crate::error::RuleError;
use crate::rules::{Impact, Rule, RuleCheck, RuleRegistry, WcagLevel};
use serde_json::json;

/// Target for JS rules: the whole-page behavior report.
pub struct JsRuleContext<'a> {
    pub report: &'a JsAnalysisReport,
}

/// Section accessor that turns a failed section into a rule-level error.
fn ready<'r, T>(section: &'r Section<T>, name: &str) -> Result<&'r T, RuleError> {
    section.as_ready().ok_or_else(|| {
        RuleError::check(format!(
            "{} analysis unavailable: {}",
            name,
            section.error().unwrap_or("unknown failure")
        ))
    })
}

/// Build the JS registry in its fixed registration order.
pub fn registry<'a>() -> RuleRegistry<JsRuleContext<'a>> {
    let mut registry = RuleRegistry::new("js");

    registry.register(
        Rule::new("js-keyboard-events", "Handlers work from the keyboard", keyboard_events)
            .impact(Impact::Serious)
            .wcag("2.1.1", WcagLevel::A)
            .describe(
                "Every pointer interaction must have a keyboard equivalent",
                "Pair click handlers with keydown handlers, or use native interactive elements",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/keyboard"),
    );
    registry.register(
        Rule::new("js-focus-management", "Focus is managed predictably", focus_management)
            .impact(Impact::Moderate)
            .wcag("2.4.3", WcagLevel::A)
            .describe(
                "Scripted focus must follow a predictable order",
                "Avoid competing autofocus elements and positive tabindex values",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/focus-order"),
    );
    registry.register(
        Rule::new("js-aria-states", "ARIA states match visibility", aria_states)
            .impact(Impact::Serious)
            .wcag("4.1.2", WcagLevel::A)
            .describe(
                "aria-hidden containers must not hold interactive elements",
                "Remove aria-hidden from containers with focusable content, or make the content inert",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/name-role-value"),
    );
    registry.register(
        Rule::new("js-live-regions", "Dynamic content announces itself", live_regions)
            .impact(Impact::Moderate)
            .wcag("4.1.3", WcagLevel::AA)
            .describe(
                "Status and alert content needs aria-live wiring",
                "Add aria-live=\"polite\" (or role=\"status\"/\"alert\") to dynamic message containers",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/status-messages"),
    );
    registry.register(
        Rule::new("js-custom-controls", "Custom controls are focusable", custom_controls)
            .impact(Impact::Serious)
            .wcag("4.1.2", WcagLevel::A)
            .describe(
                "Elements with widget roles must be reachable by keyboard",
                "Add tabindex=\"0\" and keyboard handlers to custom-role controls",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/name-role-value"),
    );
    registry.register(
        Rule::new("js-modal-behavior", "Modals contain the experience", modal_behavior)
            .impact(Impact::Serious)
            .wcag("2.4.3", WcagLevel::A)
            .describe(
                "Dialogs must mark themselves modal so background content is hidden",
                "Use <dialog> or add aria-modal=\"true\" to dialog containers",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/focus-order"),
    );

    // Reserved extension points; they pass until the checks are written.
    for (id, name) in [
        ("js-form-validation", "Form validation is accessible"),
        ("js-loading-states", "Loading states are announced"),
        ("js-error-handling", "Script errors surface accessibly"),
        ("js-content-announcements", "Content changes are announced"),
        ("js-auto-updates", "Auto-updates can be controlled"),
    ] {
        registry.register(
            Rule::new(id, name, stub_pass)
                .impact(Impact::Minor)
                .wcag("4.1.3", WcagLevel::AA)
                .describe("Reserved for behavioral analysis", ""),
        );
    }

    registry
}

fn keyboard_events(ctx: &JsRuleContext<'_>) -> Result<RuleCheck, RuleError> {
    let handlers = ready(&ctx.report.event_handlers, "event handler")?;
    if handlers.mouse_only == 0 {
        return Ok(RuleCheck::pass(format!(
            "{} handler-bearing elements are keyboard capable",
            handlers.keyboard_capable
        )));
    }
    Ok(RuleCheck::violation(
        format!("{} elements respond to mouse events only", handlers.mouse_only),
        handlers.mouse_only_nodes.clone(),
    )
    .with_details(json!({
        "total_with_handlers": handlers.total_with_handlers,
        "keyboard_capable": handlers.keyboard_capable,
        "mouse_only": handlers.mouse_only,
    }))
    .with_fix("Pair every click handler with a keydown handler or switch to <button>"))
}

fn focus_management(ctx: &JsRuleContext<'_>) -> Result<RuleCheck, RuleError> {
    let focus = ready(&ctx.report.focus_management, "focus management")?;
    if focus.issues.is_empty() {
        return Ok(RuleCheck::pass("No focus management problems observed"));
    }
    Ok(RuleCheck::violation(
        format!("{} focus management problems observed", focus.issues.len()),
        Vec::new(),
    )
    .with_details(json!({
        "issues": focus.issues,
        "autofocus_count": focus.autofocus_count,
        "positive_tabindex_count": focus.positive_tabindex_count,
    })))
}

fn aria_states(ctx: &JsRuleContext<'_>) -> Result<RuleCheck, RuleError> {
    let aria = ready(&ctx.report.accessibility_apis, "ARIA usage")?;
    if aria.hidden_interactive.is_empty() {
        return Ok(RuleCheck::pass(format!(
            "{} elements use ARIA attributes consistently",
            aria.aria_attribute_elements
        )));
    }
    Ok(RuleCheck::violation(
        format!(
            "{} interactive elements are hidden from assistive technology",
            aria.hidden_interactive.len()
        ),
        aria.hidden_interactive.clone(),
    )
    .with_fix("Remove aria-hidden=\"true\" from containers holding focusable content"))
}

fn live_regions(ctx: &JsRuleContext<'_>) -> Result<RuleCheck, RuleError> {
    let aria = ready(&ctx.report.accessibility_apis, "ARIA usage")?;
    let live = ready(&ctx.report.aria_live_regions, "live region")?;

    if aria.missing_live_region.is_empty() && live.issues.is_empty() {
        return Ok(RuleCheck::pass(format!(
            "{} live regions configured",
            live.region_count
        )));
    }
    let mut check = RuleCheck::violation(
        format!(
            "{} dynamic containers lack live-region wiring",
            aria.missing_live_region.len()
        ),
        aria.missing_live_region.clone(),
    )
    .with_details(json!({ "live_region_issues": live.issues }));
    if !live.issues.is_empty() {
        check = check.with_fix("Reserve assertive live regions for urgent interruptions");
    }
    Ok(check.with_fix("Add aria-live=\"polite\" or role=\"status\" to dynamic message containers"))
}

fn custom_controls(ctx: &JsRuleContext<'_>) -> Result<RuleCheck, RuleError> {
    let keyboard = ready(&ctx.report.keyboard_support, "keyboard support")?;
    if keyboard.unfocusable_custom_controls.is_empty() {
        return Ok(RuleCheck::pass(format!(
            "{} custom controls are focusable",
            keyboard.custom_control_count
        )));
    }
    Ok(RuleCheck::violation(
        format!(
            "{} custom-role controls cannot receive keyboard focus",
            keyboard.unfocusable_custom_controls.len()
        ),
        keyboard.unfocusable_custom_controls.clone(),
    )
    .with_fix("Add tabindex=\"0\" and keydown handling to each custom control"))
}

fn modal_behavior(ctx: &JsRuleContext<'_>) -> Result<RuleCheck, RuleError> {
    let focus = ready(&ctx.report.focus_management, "focus management")?;
    if focus.modal_count == 0 {
        return Ok(RuleCheck::pass("No modal dialogs on the page"));
    }
    if focus.modals_without_aria_modal == 0 {
        return Ok(RuleCheck::pass(format!(
            "{} dialogs declare modal behavior",
            focus.modal_count
        )));
    }
    Ok(RuleCheck::violation(
        format!(
            "{} of {} dialogs leave background content exposed",
            focus.modals_without_aria_modal, focus.modal_count
        ),
        Vec::new(),
    )
    .with_fix("Use <dialog> or add aria-modal=\"true\" to each dialog container"))
}

fn stub_pass(_ctx: &JsRuleContext<'_>) -> Result<RuleCheck, RuleError> {
    Ok(RuleCheck::pass("Not evaluated by this engine version"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::js_behavior::JsBehaviorAnalyzer;
    use crate::config::ScoreWeights;
    use crate::rules::{RegistryResult, RuleStatus};
    use crate::static_dom::StaticDom;

    fn run(html: &str) -> RegistryResult {
        let dom = StaticDom::from_html(html);
        let report = JsBehaviorAnalyzer::new(&dom, ScoreWeights::default()).analyze_page();
        let result = registry().run_all(&JsRuleContext { report: &report }).unwrap();
        result
    }

    #[test]
    fn test_mouse_only_violates_keyboard_events() {
        let result = run(r#"<html><body><div onclick="go()">go</div></body></html>"#);
        let row = result.result_for("js-keyboard-events").unwrap();
        assert_eq!(row.status, RuleStatus::Violation);
        assert_eq!(row.nodes.len(), 1);
    }

    #[test]
    fn test_keyboard_paired_passes() {
        let result = run(
            r#"<html><body><div onclick="go()" onkeydown="go()" tabindex="0">go</div></body></html>"#,
        );
        assert_eq!(result.result_for("js-keyboard-events").unwrap().status, RuleStatus::Pass);
    }

    #[test]
    fn test_hidden_interactive_violates_aria_states() {
        let result = run(
            r#"<html><body><nav aria-hidden="true"><a href="/x">ghost</a></nav></body></html>"#,
        );
        assert_eq!(result.result_for("js-aria-states").unwrap().status, RuleStatus::Violation);
    }

    #[test]
    fn test_status_without_live_region() {
        let result = run(r#"<html><body><div class="status">saved</div></body></html>"#);
        let row = result.result_for("js-live-regions").unwrap();
        assert_eq!(row.status, RuleStatus::Violation);
        assert!(!row.suggested_fixes.is_empty());
    }

    #[test]
    fn test_unfocusable_custom_control() {
        let result = run(r#"<html><body><div role="button">do it</div></body></html>"#);
        assert_eq!(result.result_for("js-custom-controls").unwrap().status, RuleStatus::Violation);

        let focusable =
            run(r#"<html><body><div role="button" tabindex="0">do it</div></body></html>"#);
        assert_eq!(
            focusable.result_for("js-custom-controls").unwrap().status,
            RuleStatus::Pass
        );
    }

    #[test]
    fn test_modal_without_aria_modal() {
        let result = run(r#"<html><body><div role="dialog">settings</div></body></html>"#);
        assert_eq!(result.result_for("js-modal-behavior").unwrap().status, RuleStatus::Violation);

        let native = run("<html><body><dialog>settings</dialog></body></html>");
        assert_eq!(native.result_for("js-modal-behavior").unwrap().status, RuleStatus::Pass);
    }

    #[test]
    fn test_stub_rules_pass() {
        let result = run("<html><body><p>plain</p></body></html>");
        for id in [
            "js-form-validation",
            "js-loading-states",
            "js-error-handling",
            "js-content-announcements",
            "js-auto-updates",
        ] {
            assert_eq!(result.result_for(id).unwrap().status, RuleStatus::Pass, "{}", id);
        }
    }

    #[test]
    fn test_failed_section_reports_incomplete() {
        use crate::analyzers::js_behavior::Section;
        let dom = StaticDom::from_html("<html><body></body></html>");
        let mut report =
            JsBehaviorAnalyzer::new(&dom, ScoreWeights::default()).analyze_page();
        report.event_handlers = Section::Failed { error: "probe exploded".to_string() };

        let result = registry().run_all(&JsRuleContext { report: &report }).unwrap();
        let row = result.result_for("js-keyboard-events").unwrap();
        assert_eq!(row.status, RuleStatus::Incomplete);
        assert!(row.reason.as_ref().unwrap().contains("probe exploded"));
    }

    #[test]
    fn test_all_rules_prefixed() {
        for id in registry().rule_ids() {
            assert!(id.starts_with("js-"), "{}", id);
        }
    }
}
