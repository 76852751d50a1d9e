// SPDX-License-Identifier: PMPL-1.0-or-later
//! JavaScript behavior analyzer - whole-page census of script wiring.
//!
//! Inspects scripts, event handlers, ARIA usage, keyboard support, live
//! regions, and focus management by observing structure and heuristics; it
//! never simulates a user session. Each sub-analysis is computed
//! independently: one section's failure degrades to an error marker for
//! that section only, never aborting the others.
//!
//! The analyzer also derives the page accessibility score consumed by
//! reporting and trending.

use crate::config::ScoreWeights;
use crate::error::RuleError;
use crate::facade::{DomFacade, ElementHandle};
use crate::result::ScoreSheet;
use crate::rules::NodeRef;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::debug;

/// Landmark roles per WAI-ARIA.
const LANDMARK_ROLES: &[&str] = &[
    "banner",
    "complementary",
    "contentinfo",
    "form",
    "main",
    "navigation",
    "region",
    "search",
];

/// Widget roles that imply interactive behavior.
const WIDGET_ROLES: &[&str] = &[
    "alertdialog",
    "button",
    "checkbox",
    "combobox",
    "dialog",
    "gridcell",
    "link",
    "listbox",
    "menu",
    "menubar",
    "menuitem",
    "option",
    "progressbar",
    "radio",
    "radiogroup",
    "scrollbar",
    "searchbox",
    "slider",
    "spinbutton",
    "switch",
    "tab",
    "tablist",
    "tabpanel",
    "textbox",
    "tree",
    "treegrid",
    "treeitem",
];

/// Custom control roles that need explicit keyboard wiring.
const CUSTOM_CONTROL_ROLES: &[&str] =
    &["button", "link", "checkbox", "tab", "menuitem", "switch", "slider"];

const MOUSE_HANDLER_ATTRS: &[&str] =
    &["onclick", "ondblclick", "onmousedown", "onmouseup", "onmouseover"];
const KEYBOARD_HANDLER_ATTRS: &[&str] = &["onkeydown", "onkeyup", "onkeypress"];
const TOUCH_HANDLER_ATTRS: &[&str] = &["ontouchstart", "ontouchend"];

/// One sub-analysis: its data, or the error that kept it from completing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Section<T> {
    Ready(T),
    Failed { error: String },
}

impl<T> Section<T> {
    pub fn from_result(result: Result<T, RuleError>) -> Self {
        match result {
            Ok(value) => Section::Ready(value),
            Err(e) => Section::Failed { error: e.to_string() },
        }
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            Section::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Section::Ready(_) => None,
            Section::Failed { error } => Some(error),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptAnalysis {
    pub inline_count: usize,
    pub external_count: usize,
    pub inline_handler_count: usize,
    /// Named concern strings, one per smell detected.
    pub concerns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventHandlerAnalysis {
    pub total_with_handlers: usize,
    pub keyboard_capable: usize,
    pub mouse_only: usize,
    pub touch_capable: usize,
    /// Every mouse-only interactive element, with a remediation suggestion.
    pub mouse_only_nodes: Vec<NodeRef>,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynamicContentAnalysis {
    pub auto_update_count: usize,
    pub loading_indicator_count: usize,
    pub modal_count: usize,
    pub live_region_count: usize,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AriaUsageAnalysis {
    pub aria_attribute_elements: usize,
    pub landmark_role_count: usize,
    pub widget_role_count: usize,
    /// Interactive elements nested under aria-hidden="true" containers.
    pub hidden_interactive: Vec<NodeRef>,
    /// Dynamic-looking content with no aria-live wiring.
    pub missing_live_region: Vec<NodeRef>,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyboardSupportAnalysis {
    pub focusable_count: usize,
    pub tabindex_zero_count: usize,
    pub tabindex_negative_count: usize,
    /// Elements with a positive tabindex; document order should drive tab order.
    pub positive_tabindex_nodes: Vec<NodeRef>,
    pub has_skip_link: bool,
    pub custom_control_count: usize,
    /// Custom-role controls that are not focusable at all.
    pub unfocusable_custom_controls: Vec<NodeRef>,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveRegionAnalysis {
    pub region_count: usize,
    pub polite_count: usize,
    pub assertive_count: usize,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FocusManagementAnalysis {
    pub autofocus_count: usize,
    pub modal_count: usize,
    pub modals_without_aria_modal: usize,
    pub positive_tabindex_count: usize,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorHandlingAnalysis {
    pub form_count: usize,
    pub novalidate_forms: usize,
    pub required_fields: usize,
    pub required_without_description: usize,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceAnalysis {
    pub dom_node_count: usize,
    pub script_count: usize,
    pub issues: Vec<String>,
}

/// Full page behavior report with the derived accessibility score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsAnalysisReport {
    pub scripts: Section<ScriptAnalysis>,
    pub event_handlers: Section<EventHandlerAnalysis>,
    pub dynamic_content: Section<DynamicContentAnalysis>,
    pub accessibility_apis: Section<AriaUsageAnalysis>,
    pub keyboard_support: Section<KeyboardSupportAnalysis>,
    pub aria_live_regions: Section<LiveRegionAnalysis>,
    pub focus_management: Section<FocusManagementAnalysis>,
    pub error_handling: Section<ErrorHandlingAnalysis>,
    pub performance_impact: Section<PerformanceAnalysis>,
    pub accessibility_score: ScoreSheet,
}

/// Whole-page behavior analyzer.
pub struct JsBehaviorAnalyzer<'a> {
    facade: &'a dyn DomFacade,
    weights: ScoreWeights,
}

impl<'a> JsBehaviorAnalyzer<'a> {
    pub fn new(facade: &'a dyn DomFacade, weights: ScoreWeights) -> Self {
        JsBehaviorAnalyzer { facade, weights }
    }

    /// Run every sub-analysis and derive the page score.
    pub fn analyze_page(&self) -> JsAnalysisReport {
        let mut report = JsAnalysisReport {
            scripts: Section::from_result(self.analyze_scripts()),
            event_handlers: Section::from_result(self.analyze_event_handlers()),
            dynamic_content: Section::from_result(self.analyze_dynamic_content()),
            accessibility_apis: Section::from_result(self.analyze_aria_usage()),
            keyboard_support: Section::from_result(self.analyze_keyboard_support()),
            aria_live_regions: Section::from_result(self.analyze_live_regions()),
            focus_management: Section::from_result(self.analyze_focus_management()),
            error_handling: Section::from_result(self.analyze_error_handling()),
            performance_impact: Section::from_result(self.analyze_performance()),
            accessibility_score: ScoreSheet::from_score(100, Vec::new(), 0),
        };
        report.accessibility_score = score_report(&report, &self.weights);
        report
    }

    fn find(&self, selector: &str) -> Result<Vec<ElementHandle>, RuleError> {
        Ok(self.facade.find_all(selector)?)
    }

    fn has_attr(&self, el: ElementHandle, name: &str) -> bool {
        matches!(self.facade.attribute(el, name), Ok(Some(_)))
    }

    fn attr(&self, el: ElementHandle, name: &str) -> Option<String> {
        self.facade.attribute(el, name).ok().flatten()
    }

    fn is_native_interactive(&self, el: ElementHandle) -> bool {
        self.facade
            .tag_name(el)
            .map(|tag| super::css_props::NATIVE_INTERACTIVE_TAGS.contains(&tag.as_str()))
            .unwrap_or(false)
    }

    fn analyze_scripts(&self) -> Result<ScriptAnalysis, RuleError> {
        let mut analysis = ScriptAnalysis::default();
        let mut inline_source = String::new();

        for script in self.find("script")? {
            if self.has_attr(script, "src") {
                analysis.external_count += 1;
            } else {
                analysis.inline_count += 1;
                if let Ok(source) = self.facade.text(script) {
                    inline_source.push_str(&source);
                    inline_source.push('\n');
                }
            }
        }

        analysis.inline_handler_count = self.find("[onclick]")?.len();
        if analysis.inline_handler_count > 0 {
            analysis
                .concerns
                .push("Inline event handlers mix behavior with markup".to_string());
        }
        if inline_source.contains("alert(") {
            analysis
                .concerns
                .push("alert() dialogs interrupt assistive technology".to_string());
        }
        if inline_source.contains("setTimeout") || inline_source.contains("setInterval") {
            analysis
                .concerns
                .push("Timed scripts may change content without notice".to_string());
        }
        if inline_source.contains(".focus(") && !inline_source.contains(".blur(") {
            analysis
                .concerns
                .push("Scripted focus changes with no blur handling".to_string());
        }
        if inline_source.contains("document.write") {
            analysis
                .concerns
                .push("document.write can rebuild the page under assistive technology".to_string());
        }

        Ok(analysis)
    }

    fn analyze_event_handlers(&self) -> Result<EventHandlerAnalysis, RuleError> {
        let mut analysis = EventHandlerAnalysis::default();
        let mut seen = BTreeSet::new();

        let mouse_selector = MOUSE_HANDLER_ATTRS
            .iter()
            .map(|attr| format!("[{}]", attr))
            .collect::<Vec<_>>()
            .join(", ");

        for el in self.find(&mouse_selector)? {
            if !seen.insert(el) {
                continue;
            }
            analysis.total_with_handlers += 1;

            let keyboard = KEYBOARD_HANDLER_ATTRS.iter().any(|attr| self.has_attr(el, *attr))
                || self.is_native_interactive(el);
            let touch = TOUCH_HANDLER_ATTRS.iter().any(|attr| self.has_attr(el, *attr));

            if touch {
                analysis.touch_capable += 1;
            }
            if keyboard {
                analysis.keyboard_capable += 1;
            } else {
                analysis.mouse_only += 1;
                let tag = self.facade.tag_name(el).unwrap_or_default();
                analysis.mouse_only_nodes.push(
                    NodeRef::capture(self.facade, el).with_details(json!({
                        "suggestion": format!(
                            "Use a <button> instead of <{}>, or add tabindex=\"0\" and a keydown handler",
                            tag
                        ),
                    })),
                );
            }
        }

        // Keyboard-only handler wiring still counts toward the census.
        let keyboard_selector = KEYBOARD_HANDLER_ATTRS
            .iter()
            .map(|attr| format!("[{}]", attr))
            .collect::<Vec<_>>()
            .join(", ");
        for el in self.find(&keyboard_selector)? {
            if seen.insert(el) {
                analysis.total_with_handlers += 1;
                analysis.keyboard_capable += 1;
            }
        }

        if analysis.mouse_only > 0 {
            analysis.issues.push(format!(
                "{} interactive elements respond to mouse events only",
                analysis.mouse_only
            ));
        }

        Ok(analysis)
    }

    fn analyze_dynamic_content(&self) -> Result<DynamicContentAnalysis, RuleError> {
        let mut analysis = DynamicContentAnalysis::default();

        analysis.auto_update_count =
            self.find("[data-auto-refresh], [data-poll], marquee")?.len();
        analysis.loading_indicator_count =
            self.find(".loading, .spinner, [aria-busy=\"true\"]")?.len();
        analysis.modal_count = self
            .find("dialog, [role=\"dialog\"], [role=\"alertdialog\"], .modal")?
            .len();
        analysis.live_region_count = self.find("[aria-live]")?.len();

        if analysis.auto_update_count > 0 && analysis.live_region_count == 0 {
            analysis
                .issues
                .push("Auto-updating content without any live region".to_string());
        }

        Ok(analysis)
    }

    fn analyze_aria_usage(&self) -> Result<AriaUsageAnalysis, RuleError> {
        let mut analysis = AriaUsageAnalysis::default();

        let aria_selector = "[aria-label], [aria-labelledby], [aria-describedby], \
             [aria-hidden], [aria-live], [aria-expanded], [aria-controls], \
             [aria-current], [aria-selected], [aria-checked], [aria-disabled], \
             [aria-required], [aria-invalid], [aria-modal], [aria-haspopup], [aria-pressed]";
        analysis.aria_attribute_elements = self.find(aria_selector)?.len();

        for el in self.find("[role]")? {
            let Some(role) = self.attr(el, "role") else { continue };
            let role = role.to_lowercase();
            if LANDMARK_ROLES.contains(&role.as_str()) {
                analysis.landmark_role_count += 1;
            } else if WIDGET_ROLES.contains(&role.as_str()) {
                analysis.widget_role_count += 1;
            }
        }

        let hidden_interactive_selector = "[aria-hidden=\"true\"] a, [aria-hidden=\"true\"] button, \
             [aria-hidden=\"true\"] input, [aria-hidden=\"true\"] select, \
             [aria-hidden=\"true\"] textarea, [aria-hidden=\"true\"] [tabindex]";
        for el in self.find(hidden_interactive_selector)? {
            analysis.hidden_interactive.push(NodeRef::capture(self.facade, el));
        }
        if !analysis.hidden_interactive.is_empty() {
            analysis
                .issues
                .push("Interactive elements inside aria-hidden containers".to_string());
        }

        for el in self.find(".alert, .status, .error, .success")? {
            let has_live = self.has_attr(el, "aria-live");
            let has_live_role = self
                .attr(el, "role")
                .map(|r| matches!(r.as_str(), "alert" | "status" | "log"))
                .unwrap_or(false);
            if !has_live && !has_live_role {
                analysis.missing_live_region.push(NodeRef::capture(self.facade, el));
            }
        }
        if !analysis.missing_live_region.is_empty() {
            analysis
                .issues
                .push("Dynamic status content without aria-live".to_string());
        }

        Ok(analysis)
    }

    fn analyze_keyboard_support(&self) -> Result<KeyboardSupportAnalysis, RuleError> {
        let mut analysis = KeyboardSupportAnalysis::default();

        let mut focusable = BTreeSet::new();
        for el in self.find("a[href], button, input, select, textarea, [tabindex]")? {
            focusable.insert(el);
        }
        analysis.focusable_count = focusable.len();

        for el in self.find("[tabindex]")? {
            let Some(value) = self.attr(el, "tabindex") else { continue };
            match value.trim().parse::<i32>() {
                Ok(0) => analysis.tabindex_zero_count += 1,
                Ok(v) if v > 0 => {
                    analysis.positive_tabindex_nodes.push(
                        NodeRef::capture(self.facade, el)
                            .with_details(json!({ "tabindex": v })),
                    );
                }
                Ok(_) => analysis.tabindex_negative_count += 1,
                Err(_) => {}
            }
        }

        analysis.has_skip_link = self.find("a[href^=\"#\"]")?.into_iter().any(|link| {
            let href = self.attr(link, "href").unwrap_or_default();
            let text = self
                .facade
                .text(link)
                .unwrap_or_default()
                .to_lowercase();
            href == "#main" || href == "#content" || text.contains("skip")
        });

        let custom_selector = CUSTOM_CONTROL_ROLES
            .iter()
            .map(|role| format!("[role=\"{}\"]", role))
            .collect::<Vec<_>>()
            .join(", ");
        for el in self.find(&custom_selector)? {
            if self.is_native_interactive(el) {
                continue;
            }
            analysis.custom_control_count += 1;
            if !self.has_attr(el, "tabindex") {
                analysis
                    .unfocusable_custom_controls
                    .push(NodeRef::capture(self.facade, el));
            }
        }

        if !analysis.positive_tabindex_nodes.is_empty() {
            analysis
                .issues
                .push("Positive tabindex values disrupt natural tab order".to_string());
        }
        if !analysis.unfocusable_custom_controls.is_empty() {
            analysis
                .issues
                .push("Custom controls that cannot receive keyboard focus".to_string());
        }
        if !analysis.has_skip_link && analysis.focusable_count > 20 {
            analysis
                .issues
                .push("Long tab sequence with no skip link".to_string());
        }

        Ok(analysis)
    }

    fn analyze_live_regions(&self) -> Result<LiveRegionAnalysis, RuleError> {
        let mut analysis = LiveRegionAnalysis::default();

        for el in self.find("[aria-live]")? {
            analysis.region_count += 1;
            match self.attr(el, "aria-live").as_deref() {
                Some("assertive") => analysis.assertive_count += 1,
                Some("polite") => analysis.polite_count += 1,
                _ => {}
            }
        }

        if analysis.assertive_count > 2 {
            analysis.issues.push(
                "Multiple assertive live regions compete for announcements".to_string(),
            );
        }

        Ok(analysis)
    }

    fn analyze_focus_management(&self) -> Result<FocusManagementAnalysis, RuleError> {
        let mut analysis = FocusManagementAnalysis::default();

        analysis.autofocus_count = self.find("[autofocus]")?.len();
        let modals = self.find("dialog, [role=\"dialog\"], [role=\"alertdialog\"]")?;
        analysis.modal_count = modals.len();
        for modal in modals {
            let has_aria_modal = self
                .attr(modal, "aria-modal")
                .map(|v| v == "true")
                .unwrap_or(false);
            let is_native_dialog = self
                .facade
                .tag_name(modal)
                .map(|t| t == "dialog")
                .unwrap_or(false);
            if !has_aria_modal && !is_native_dialog {
                analysis.modals_without_aria_modal += 1;
            }
        }
        analysis.positive_tabindex_count = self
            .find("[tabindex]")?
            .into_iter()
            .filter(|&el| {
                self.attr(el, "tabindex")
                    .and_then(|v| v.trim().parse::<i32>().ok())
                    .map(|v| v > 0)
                    .unwrap_or(false)
            })
            .count();

        if analysis.autofocus_count > 1 {
            analysis
                .issues
                .push("Multiple autofocus elements compete for initial focus".to_string());
        }
        if analysis.modals_without_aria_modal > 0 {
            analysis
                .issues
                .push("Dialogs without aria-modal leave background content exposed".to_string());
        }

        Ok(analysis)
    }

    fn analyze_error_handling(&self) -> Result<ErrorHandlingAnalysis, RuleError> {
        let mut analysis = ErrorHandlingAnalysis::default();

        let forms = self.find("form")?;
        analysis.form_count = forms.len();
        analysis.novalidate_forms = forms
            .into_iter()
            .filter(|&form| self.has_attr(form, "novalidate"))
            .count();

        for field in self.find("[required]")? {
            analysis.required_fields += 1;
            if !self.has_attr(field, "aria-describedby") {
                analysis.required_without_description += 1;
            }
        }

        if analysis.novalidate_forms > 0 {
            analysis.issues.push(
                "Forms opt out of native validation without visible alternatives".to_string(),
            );
        }

        Ok(analysis)
    }

    fn analyze_performance(&self) -> Result<PerformanceAnalysis, RuleError> {
        let mut analysis = PerformanceAnalysis::default();

        // Prefer a live probe; a snapshot facade reports script errors, so
        // fall back to a DOM census.
        analysis.dom_node_count = match self
            .facade
            .eval_script("return document.querySelectorAll('*').length;")
        {
            Ok(value) => value.as_u64().unwrap_or(0) as usize,
            Err(e) => {
                debug!(error = %e, "eval probe unavailable, using DOM census");
                self.find("*")?.len()
            }
        };
        analysis.script_count = self.find("script")?.len();

        if analysis.dom_node_count > 1_500 {
            analysis
                .issues
                .push("Very large DOM slows assistive technology traversal".to_string());
        }

        Ok(analysis)
    }
}

/// Derive the page accessibility score from a report.
///
/// Pure function of the report sections: distinct issue types deduct per
/// category, each category capped, floored at 0. Failed sections contribute
/// no deductions.
pub fn score_report(report: &JsAnalysisReport, weights: &ScoreWeights) -> ScoreSheet {
    let mut deductions = Vec::new();
    let mut total_issues = 0usize;
    let mut total_deduction = 0u32;

    let mut apply = |label: &str, issues: Option<Vec<&str>>, weight: crate::config::CategoryWeight| {
        let Some(issues) = issues else { return };
        let distinct: BTreeSet<&str> = issues.into_iter().collect();
        if distinct.is_empty() {
            return;
        }
        let deduction = (weight.per_issue * distinct.len() as u32).min(weight.cap);
        total_issues += distinct.len();
        total_deduction += deduction;
        for issue in &distinct {
            deductions.push(format!("{}: {} (-{})", label, issue, weight.per_issue));
        }
    };

    apply(
        "scripts",
        report
            .scripts
            .as_ready()
            .map(|s| s.concerns.iter().map(String::as_str).collect()),
        weights.scripts,
    );
    apply(
        "mouse-only",
        report
            .event_handlers
            .as_ready()
            .map(|e| e.issues.iter().map(String::as_str).collect()),
        weights.mouse_only,
    );
    apply(
        "aria",
        report
            .accessibility_apis
            .as_ready()
            .map(|a| a.issues.iter().map(String::as_str).collect()),
        weights.aria,
    );
    apply(
        "keyboard",
        report
            .keyboard_support
            .as_ready()
            .map(|k| k.issues.iter().map(String::as_str).collect()),
        weights.keyboard,
    );
    apply(
        "focus",
        report
            .focus_management
            .as_ready()
            .map(|f| f.issues.iter().map(String::as_str).collect()),
        weights.focus,
    );

    let score = 100u32.saturating_sub(total_deduction);
    ScoreSheet::from_score(score, deductions, total_issues)
}
