// SPDX-License-Identifier: PMPL-1.0-or-later
//! Scan orchestration - one page, three rule families, one result.
//!
//! Runs the structural rules unconditionally, the CSS family over a bounded
//! element sample, and the JS family over one whole-page behavior report,
//! then merges everything into a single [`TestResult`] in family order
//! (structural, CSS, JS).
//!
//! Failure discipline: a single rule's failure degrades to an `incomplete`
//! row inside its registry; a whole family's setup failure becomes one
//! `incomplete` entry naming the family; only a fatal facade failure (dead
//! session, navigation timeout) aborts the scan.
//!
//! A scan is sequential by design: rules share and may mutate page state
//! (focus, temporary styles), so interleaving would corrupt before/after
//! comparisons. Run concurrent scans against separate sessions instead.

use crate::analyzers::css_props::CssPropertyAnalyzer;
use crate::analyzers::js_behavior::JsBehaviorAnalyzer;
use crate::config::ScanConfig;
use crate::error::{FacadeError, ScanError};
use crate::facade::{DomFacade, ElementHandle};
use crate::result::TestResult;
use crate::rules::css::CssRuleContext;
use crate::rules::js::JsRuleContext;
use crate::rules::structural::StructuralContext;
use crate::rules::{
    self, RegistryResult, RegistrySummary, RuleResult, RuleStatus,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Incomplete-entry id recorded when the CSS family fails as a whole.
pub const CSS_FAMILY_ID: &str = "css-testing";
/// Incomplete-entry id recorded when the JS family fails as a whole.
pub const JS_FAMILY_ID: &str = "js-testing";
/// Incomplete-entry id recorded when a scan is cancelled mid-flight.
pub const CANCELLED_ID: &str = "scan-cancelled";

/// Selector categories sampled for the CSS family, in evaluation order.
pub const CSS_SELECTOR_CATEGORIES: &[(&str, &str)] = &[
    ("interactive", "a[href], button, input, select, textarea"),
    ("clickable", "[onclick], [role=\"button\"], [tabindex]"),
    ("headings", "h1, h2, h3, h4, h5, h6"),
    ("text", "p, li, label, blockquote"),
    ("media", "img, svg, video, canvas"),
    ("structure", "div, section, article, nav, header, footer"),
    ("tables", "table, th, td"),
];

/// Cooperative cancellation flag, checked between rules and elements.
///
/// Cancellation never interrupts a rule mid-flight; whatever already ran is
/// kept and the scan finishes aggregating.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Stages of one scan, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Idle,
    Navigating,
    StructuralRules,
    CssRules,
    JsRules,
    Aggregating,
    Completed,
    Failed,
}

impl std::fmt::Display for ScanStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStage::Idle => write!(f, "idle"),
            ScanStage::Navigating => write!(f, "navigating"),
            ScanStage::StructuralRules => write!(f, "structural-rules"),
            ScanStage::CssRules => write!(f, "css-rules"),
            ScanStage::JsRules => write!(f, "js-rules"),
            ScanStage::Aggregating => write!(f, "aggregating"),
            ScanStage::Completed => write!(f, "completed"),
            ScanStage::Failed => write!(f, "failed"),
        }
    }
}

/// Family-level failure: either the session died (scan over) or the family
/// alone is unusable (record one incomplete entry and move on).
#[derive(Debug)]
enum FamilyError {
    Fatal(FacadeError),
    Recoverable(String),
}

impl From<FacadeError> for FamilyError {
    fn from(e: FacadeError) -> Self {
        if e.is_fatal() {
            FamilyError::Fatal(e)
        } else {
            FamilyError::Recoverable(e.to_string())
        }
    }
}

/// Run a full scan against one page with default configuration.
pub fn run_scan_with_defaults(
    page_id: &str,
    facade: &dyn DomFacade,
) -> Result<TestResult, ScanError> {
    run_scan(page_id, facade, &ScanConfig::default(), &CancelToken::new())
}

/// Run a full scan: structural rules, then the optional CSS and JS families.
///
/// Retry policy belongs to the caller; a failed scan is reported once and
/// never retried here.
pub fn run_scan(
    page_id: &str,
    facade: &dyn DomFacade,
    config: &ScanConfig,
    cancel: &CancelToken,
) -> Result<TestResult, ScanError> {
    if page_id.trim().is_empty() {
        return Err(ScanError::Validation("page id must not be empty".to_string()));
    }

    let mut stage = ScanStage::Idle;
    advance(&mut stage, ScanStage::Navigating);
    facade
        .wait_for("body", Duration::from_millis(config.navigation_timeout_ms))
        .map_err(|e| fail(&mut stage, "navigation", e))?;
    let url = facade.current_url().map_err(|e| fail(&mut stage, "navigation", e))?;
    let title = facade.title().map_err(|e| fail(&mut stage, "navigation", e))?;

    let mut result = TestResult::new(page_id, &url, &title);
    info!(page_id, url = %result.url, "scan started");

    advance(&mut stage, ScanStage::StructuralRules);
    let structural = rules::structural::registry()
        .run_all(&StructuralContext { facade })
        .map_err(|e| fail(&mut stage, "structural-rules", e))?;
    debug!(
        passed = structural.summary.passed,
        failed = structural.summary.failed,
        "structural rules done"
    );
    result.fold_registry(&structural);

    if config.css_testing && !check_cancel(cancel, &mut result) {
        advance(&mut stage, ScanStage::CssRules);
        match run_css_family(facade, config, cancel) {
            Ok(merged) => result.fold_registry(&merged),
            Err(FamilyError::Fatal(e)) => return Err(fail(&mut stage, "css-rules", e)),
            Err(FamilyError::Recoverable(reason)) => {
                warn!(reason = %reason, "CSS family did not complete");
                result.push_family_incomplete(CSS_FAMILY_ID, reason);
            }
        }
    }

    if config.js_testing && !check_cancel(cancel, &mut result) {
        advance(&mut stage, ScanStage::JsRules);
        match run_js_family(facade, config) {
            Ok((merged, score)) => {
                result.fold_registry(&merged);
                result.js_score = Some(score);
            }
            Err(FamilyError::Fatal(e)) => return Err(fail(&mut stage, "js-rules", e)),
            Err(FamilyError::Recoverable(reason)) => {
                warn!(reason = %reason, "JS family did not complete");
                result.push_family_incomplete(JS_FAMILY_ID, reason);
            }
        }
    }

    advance(&mut stage, ScanStage::Aggregating);
    result.finalize();
    advance(&mut stage, ScanStage::Completed);
    info!(
        violations = result.summary.violations,
        passes = result.summary.passes,
        incomplete = result.summary.incomplete,
        "scan completed"
    );
    Ok(result)
}

fn advance(stage: &mut ScanStage, next: ScanStage) {
    debug!(from = %stage, to = %next, "scan stage");
    *stage = next;
}

fn fail(stage: &mut ScanStage, at: &'static str, source: FacadeError) -> ScanError {
    advance(stage, ScanStage::Failed);
    ScanError::Facade { stage: at, source }
}

/// Record cancellation once; the scan keeps whatever already ran.
fn check_cancel(cancel: &CancelToken, result: &mut TestResult) -> bool {
    if !cancel.is_cancelled() {
        return false;
    }
    if !result.incomplete.iter().any(|i| i.id == CANCELLED_ID) {
        result.push_family_incomplete(CANCELLED_ID, "scan cancelled by caller".to_string());
    }
    true
}

/// Bounded, representative element sample for the CSS family.
///
/// At most `per_category` elements per selector category and `total`
/// overall, deduplicated across categories; both limits are clamped to the
/// hard caps.
fn sample_elements(
    facade: &dyn DomFacade,
    config: &ScanConfig,
) -> Result<Vec<ElementHandle>, FacadeError> {
    let per_category = config.sampling.effective_per_category();
    let total = config.sampling.effective_total();

    let mut seen = BTreeSet::new();
    let mut sample = Vec::new();
    for (category, selector) in CSS_SELECTOR_CATEGORIES {
        let mut taken = 0usize;
        for el in facade.find_all(selector)? {
            if sample.len() >= total {
                debug!(category = %category, "sample cap reached");
                return Ok(sample);
            }
            if taken >= per_category {
                break;
            }
            if seen.insert(el) {
                sample.push(el);
                taken += 1;
            }
        }
    }
    Ok(sample)
}

fn run_css_family(
    facade: &dyn DomFacade,
    config: &ScanConfig,
    cancel: &CancelToken,
) -> Result<RegistryResult, FamilyError> {
    let sample = sample_elements(facade, config)?;
    debug!(sampled = sample.len(), "css sample collected");

    let analyzer = CssPropertyAnalyzer::new(facade, config.readability.clone());
    let mut analyses = Vec::with_capacity(sample.len());
    for element in sample {
        if cancel.is_cancelled() {
            break;
        }
        analyses.push((element, analyzer.analyze(element)));
    }

    let registry = rules::css::registry();
    let mut runs = Vec::with_capacity(analyses.len());
    for (element, analysis) in &analyses {
        if cancel.is_cancelled() {
            break;
        }
        let run = registry
            .run_all(&CssRuleContext { analysis, element: *element, facade })
            .map_err(FamilyError::from)?;
        runs.push(run);
    }

    Ok(merge_element_runs("css", runs))
}

fn run_js_family(
    facade: &dyn DomFacade,
    config: &ScanConfig,
) -> Result<(RegistryResult, crate::result::ScoreSheet), FamilyError> {
    // Liveness probe before any heavier analysis.
    facade.find_all("body").map_err(FamilyError::from)?;

    let analyzer = JsBehaviorAnalyzer::new(facade, config.score_weights.clone());
    let report = analyzer.analyze_page();

    let all_failed = report.scripts.as_ready().is_none()
        && report.event_handlers.as_ready().is_none()
        && report.accessibility_apis.as_ready().is_none()
        && report.keyboard_support.as_ready().is_none()
        && report.focus_management.as_ready().is_none();
    if all_failed {
        return Err(FamilyError::Recoverable(
            "behavior analysis produced no usable sections".to_string(),
        ));
    }

    let merged = rules::js::registry()
        .run_all(&JsRuleContext { report: &report })
        .map_err(FamilyError::from)?;
    Ok((merged, report.accessibility_score))
}

/// Merge per-element registry runs into one family result.
///
/// Row precedence per rule: violation over incomplete over pass. Nodes
/// accumulate across elements; registration order is preserved.
fn merge_element_runs(family: &str, runs: Vec<RegistryResult>) -> RegistryResult {
    let Some(first) = runs.first() else {
        return RegistryResult {
            family: family.to_string(),
            results: Vec::new(),
            summary: RegistrySummary::default(),
        };
    };

    let total_elements = runs.len();
    let mut merged: Vec<RuleResult> = Vec::with_capacity(first.results.len());

    for (index, template) in first.results.iter().enumerate() {
        let mut row = RuleResult {
            rule_id: template.rule_id.clone(),
            status: RuleStatus::Pass,
            message: String::new(),
            reason: None,
            nodes: Vec::new(),
            passed_nodes: Vec::new(),
            details: serde_json::Value::Null,
            suggested_fixes: Vec::new(),
            rule_info: template.rule_info.clone(),
        };
        let mut failing_elements = 0usize;
        let mut incomplete_elements = 0usize;

        for run in &runs {
            let Some(element_row) = run.results.get(index) else { continue };
            match element_row.status {
                RuleStatus::Violation => {
                    failing_elements += 1;
                    row.status = RuleStatus::Violation;
                    row.nodes.extend(element_row.nodes.iter().cloned());
                    if row.details.is_null() {
                        row.details = element_row.details.clone();
                    }
                    for fix in &element_row.suggested_fixes {
                        if !row.suggested_fixes.contains(fix) {
                            row.suggested_fixes.push(fix.clone());
                        }
                    }
                }
                RuleStatus::Incomplete => {
                    incomplete_elements += 1;
                    if row.status != RuleStatus::Violation {
                        row.status = RuleStatus::Incomplete;
                    }
                    if row.reason.is_none() {
                        row.reason = element_row.reason.clone();
                    }
                }
                RuleStatus::Pass => {
                    row.passed_nodes.extend(element_row.nodes.iter().cloned());
                }
            }
        }

        row.message = match row.status {
            RuleStatus::Violation => format!(
                "{} of {} sampled elements fail",
                failing_elements, total_elements
            ),
            RuleStatus::Incomplete => format!(
                "{} of {} sampled elements could not be checked",
                incomplete_elements, total_elements
            ),
            RuleStatus::Pass => format!("{} sampled elements pass", total_elements),
        };
        merged.push(row);
    }

    let mut summary = RegistrySummary::default();
    for row in &merged {
        match row.status {
            RuleStatus::Pass => summary.passed += 1,
            RuleStatus::Violation => {
                summary.failed += 1;
                if row.rule_info.impact.is_severe() {
                    summary.critical_issues += 1;
                }
            }
            RuleStatus::Incomplete => summary.incomplete += 1,
        }
    }

    RegistryResult { family: family.to_string(), results: merged, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ElementError;
    use crate::static_dom::StaticDom;

    const PAGE: &str = r##"<html lang="en"><head><title>Fixture</title></head><body>
        <nav><a href="#main">Skip to main content</a></nav>
        <main id="main">
            <h1>Fixture</h1>
            <button style="width: 30px; height: 30px">small</button>
            <img src="a.png" alt="chart">
            <div onclick="go()">mouse only</div>
        </main>
    </body></html>"##;

    #[test]
    fn test_full_scan_merges_families_in_order() {
        let dom = StaticDom::from_html_with_url(PAGE, "https://example.com");
        let result = run_scan_with_defaults("page-1", &dom).unwrap();

        assert_eq!(result.page_title, "Fixture");
        assert_eq!(result.url, "https://example.com");

        // Families stay in structural, css, js order after the merge.
        let first_css = result.violations.iter().position(|v| v.id.starts_with("css-"));
        let first_js = result.violations.iter().position(|v| v.id.starts_with("js-"));
        let last_structural = result
            .violations
            .iter()
            .rposition(|v| !v.id.starts_with("css-") && !v.id.starts_with("js-"));
        if let (Some(css), Some(js)) = (first_css, first_js) {
            assert!(css < js);
        }
        if let (Some(structural), Some(css)) = (last_structural, first_css) {
            assert!(structural < css);
        }

        assert!(result.violations.iter().any(|v| v.id == "css-touch-target"));
        assert!(result.violations.iter().any(|v| v.id == "js-keyboard-events"));
        assert!(result.js_score.is_some());
        assert_eq!(result.summary.violations, result.violations.len());
    }

    #[test]
    fn test_empty_page_id_rejected_before_facade_use() {
        let dom = StaticDom::from_html(PAGE);
        let err = run_scan_with_defaults("  ", &dom).unwrap_err();
        assert!(matches!(err, ScanError::Validation(_)));
    }

    #[test]
    fn test_families_can_be_disabled() {
        let dom = StaticDom::from_html(PAGE);
        let config = ScanConfig { css_testing: false, js_testing: false, ..Default::default() };
        let result = run_scan("page-1", &dom, &config, &CancelToken::new()).unwrap();

        assert!(result.violations.iter().all(|v| !v.id.starts_with("css-")));
        assert!(result.violations.iter().all(|v| !v.id.starts_with("js-")));
        assert!(result.js_score.is_none());
        // Disabled families are not failures.
        assert!(result.incomplete.iter().all(|i| i.id != CSS_FAMILY_ID && i.id != JS_FAMILY_ID));
    }

    #[test]
    fn test_sampling_bound_holds() {
        let mut html = String::from("<html><head><title>big</title></head><body>");
        for i in 0..200 {
            html.push_str(&format!("<button id=\"b{}\">b</button>", i));
        }
        for i in 0..200 {
            html.push_str(&format!("<p id=\"p{}\">text</p>", i));
        }
        html.push_str("</body></html>");
        let dom = StaticDom::from_html(&html);

        let sample = sample_elements(&dom, &ScanConfig::default()).unwrap();
        assert!(sample.len() <= 50, "sample {} exceeds hard cap", sample.len());

        let buttons = sample
            .iter()
            .filter(|&&el| dom.tag_name(el).unwrap() == "button")
            .count();
        assert!(buttons <= 5, "{} buttons exceed per-category cap", buttons);
    }

    #[test]
    fn test_cancellation_is_recorded_and_scan_still_returns() {
        let dom = StaticDom::from_html(PAGE);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = run_scan("page-1", &dom, &ScanConfig::default(), &cancel).unwrap();

        // Structural rules ran; later families were skipped.
        assert!(!result.violations.is_empty() || !result.passes.is_empty());
        assert!(result.incomplete.iter().any(|i| i.id == CANCELLED_ID));
        assert!(result.violations.iter().all(|v| !v.id.starts_with("css-")));
    }

    #[test]
    fn test_merge_element_runs_precedence() {
        let dom = StaticDom::from_html(
            r#"<html><body>
                <button style="width: 30px; height: 30px">tiny</button>
                <button style="width: 60px; height: 60px">roomy</button>
            </body></html>"#,
        );
        let config = ScanConfig::default();
        let merged = run_css_family(&dom, &config, &CancelToken::new()).unwrap();

        let row = merged.result_for("css-touch-target").unwrap();
        assert_eq!(row.status, RuleStatus::Violation);
        assert_eq!(row.nodes.len(), 1, "only the tiny button contributes a node");
        assert_eq!(row.message, "1 of 2 sampled elements fail");
        assert_eq!(merged.summary.failed, merged.summary.critical_issues);
    }

    /// Facade whose session is gone: every call fails fatally.
    struct DeadFacade;

    impl DomFacade for DeadFacade {
        fn find_all(&self, _: &str) -> Result<Vec<ElementHandle>, FacadeError> {
            Err(FacadeError::Session("connection refused".to_string()))
        }
        fn tag_name(&self, _: ElementHandle) -> Result<String, ElementError> {
            Err(ElementError::Detached)
        }
        fn attribute(&self, _: ElementHandle, _: &str) -> Result<Option<String>, ElementError> {
            Err(ElementError::Detached)
        }
        fn computed_style(&self, _: ElementHandle, _: &str) -> Result<String, ElementError> {
            Err(ElementError::Detached)
        }
        fn text(&self, _: ElementHandle) -> Result<String, ElementError> {
            Err(ElementError::Detached)
        }
        fn outer_html(&self, _: ElementHandle) -> Result<String, ElementError> {
            Err(ElementError::Detached)
        }
        fn inline_style(&self, _: ElementHandle) -> Result<Option<String>, ElementError> {
            Err(ElementError::Detached)
        }
        fn set_inline_style(
            &self,
            _: ElementHandle,
            _: Option<&str>,
        ) -> Result<(), ElementError> {
            Err(ElementError::Detached)
        }
        fn eval_script(&self, _: &str) -> Result<serde_json::Value, FacadeError> {
            Err(FacadeError::Session("connection refused".to_string()))
        }
        fn current_url(&self) -> Result<String, FacadeError> {
            Err(FacadeError::Session("connection refused".to_string()))
        }
        fn title(&self) -> Result<String, FacadeError> {
            Err(FacadeError::Session("connection refused".to_string()))
        }
        fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), FacadeError> {
            Err(FacadeError::Timeout {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    #[test]
    fn test_dead_session_fails_scan() {
        let err = run_scan_with_defaults("page-1", &DeadFacade).unwrap_err();
        match err {
            ScanError::Facade { stage, source } => {
                assert_eq!(stage, "navigation");
                assert!(source.is_fatal());
            }
            other => panic!("expected facade failure, got {:?}", other),
        }
    }
}
