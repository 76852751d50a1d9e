// SPDX-License-Identifier: PMPL-1.0-or-later
//! Integration tests for the full scan pipeline.

use a11yscan::aggregator::{run_scan, run_scan_with_defaults, CancelToken};
use a11yscan::analyzers::css_props::CssPropertyAnalyzer;
use a11yscan::config::{ReadabilityPenalties, ScanConfig};
use a11yscan::error::{ElementError, FacadeError};
use a11yscan::facade::{DomFacade, ElementHandle};
use a11yscan::report::{generate_report, OutputFormat};
use a11yscan::rules::Impact;
use a11yscan::static_dom::StaticDom;
use std::cell::Cell;
use std::path::Path;
use std::time::Duration;

fn scan_fixture(name: &str) -> a11yscan::result::TestResult {
    let path = Path::new("tests/fixtures").join(name);
    let dom = StaticDom::from_file(&path).expect("fixture should load");
    run_scan_with_defaults(name, &dom).expect("scan should complete")
}

#[test]
fn test_accessible_fixture_has_no_violations() {
    let result = scan_fixture("accessible.html");
    assert!(
        !result.has_critical_violations(),
        "accessible fixture should have no serious/critical violations: {:?}",
        result.violations.iter().map(|v| &v.id).collect::<Vec<_>>()
    );
    assert_eq!(
        result.summary.violations,
        0,
        "accessible fixture should be clean: {:?}",
        result.violations.iter().map(|v| &v.id).collect::<Vec<_>>()
    );
    assert!(result.summary.passes > 10);

    let score = result.js_score.expect("JS family ran");
    assert_eq!(score.score, 100);
    assert_eq!(score.grade, "A");
}

#[test]
fn test_inaccessible_fixture_fails_across_families() {
    let result = scan_fixture("inaccessible.html");

    assert!(result.has_critical_violations());
    assert!(
        result.summary.violations >= 10,
        "expected broad failure, got {}: {:?}",
        result.summary.violations,
        result.violations.iter().map(|v| &v.id).collect::<Vec<_>>()
    );

    // Every family contributed.
    for expected in [
        "page-has-title",
        "html-has-lang",
        "images-have-alt",
        "meta-viewport-scalable",
        "css-touch-target",
        "css-focus-visible",
        "css-color-contrast",
        "js-keyboard-events",
        "js-aria-states",
        "js-modal-behavior",
    ] {
        assert!(
            result.violations.iter().any(|v| v.id == expected),
            "missing expected violation {}",
            expected
        );
    }

    let score = result.js_score.expect("JS family ran");
    assert!(score.score < 100);
    assert!(score.total_issues > 0);
}

// Scenario: an empty <title> is a violation anchored to the title element.
#[test]
fn test_empty_title_scenario() {
    let dom = StaticDom::from_html(
        "<html><head><title></title></head><body><p>content</p></body></html>",
    );
    let result = run_scan_with_defaults("empty-title", &dom).unwrap();

    let violation = result
        .violations
        .iter()
        .find(|v| v.id == "page-has-title")
        .expect("empty title should violate");
    assert_eq!(violation.nodes[0].target, vec!["title".to_string()]);
    assert!(violation.nodes[0].html.contains("<title>"));
}

// Scenario: one bad image among good ones still violates, with one node.
#[test]
fn test_partial_alt_scenario() {
    let dom = StaticDom::from_html(
        r#"<html lang="en"><head><title>t</title></head><body>
            <img src="a.png"><img src="b.png" alt="labelled">
        </body></html>"#,
    );
    let result = run_scan_with_defaults("partial-alt", &dom).unwrap();

    let violation = result
        .violations
        .iter()
        .find(|v| v.id == "images-have-alt")
        .expect("missing alt should violate");
    assert_eq!(violation.nodes.len(), 1);
}

// Severity closure: every violation's impact is one of the four severities.
#[test]
fn test_impact_closure_over_full_scan() {
    let result = scan_fixture("inaccessible.html");
    for violation in &result.violations {
        assert!(matches!(
            violation.impact,
            Impact::Minor | Impact::Moderate | Impact::Serious | Impact::Critical
        ));
    }
}

// Prefix disambiguation: family ids never collide after the merge.
#[test]
fn test_family_prefixes_disjoint() {
    let result = scan_fixture("inaccessible.html");

    let mut seen = std::collections::BTreeSet::new();
    for violation in &result.violations {
        assert!(seen.insert(&violation.id), "duplicate violation id {}", violation.id);
    }

    let css: Vec<_> =
        result.violations.iter().filter(|v| v.id.starts_with("css-")).collect();
    let js: Vec<_> = result.violations.iter().filter(|v| v.id.starts_with("js-")).collect();
    assert!(!css.is_empty());
    assert!(!js.is_empty());
}

#[test]
fn test_sampling_never_exceeds_caps() {
    // 400 interactive elements; the CSS family must stay bounded.
    let mut html = String::from(
        r#"<html lang="en"><head><title>dense</title></head><body><main>"#,
    );
    for i in 0..400 {
        html.push_str(&format!(
            "<button style=\"width: 20px; height: 20px\" id=\"b{}\">b{}</button>",
            i, i
        ));
    }
    html.push_str("</main></body></html>");

    let dom = StaticDom::from_html(&html);
    let result = run_scan_with_defaults("dense", &dom).unwrap();

    let touch = result
        .violations
        .iter()
        .find(|v| v.id == "css-touch-target")
        .expect("small buttons violate");
    // Buttons fall in one selector category: at most 5 sampled.
    assert!(
        touch.nodes.len() <= 5,
        "{} nodes exceed the per-category sample cap",
        touch.nodes.len()
    );
}

#[test]
fn test_report_formats_over_real_scan() {
    let result = scan_fixture("inaccessible.html");

    let text = generate_report(&result, OutputFormat::Text);
    assert!(text.contains("a11yscan Accessibility Report"));
    assert!(text.contains("RESULT: FAIL"));

    let json = generate_report(&result, OutputFormat::Json);
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
    assert_eq!(parsed["engine"], "a11yscan");
    assert_eq!(
        parsed["summary"]["violations"].as_u64().unwrap() as usize,
        result.summary.violations
    );

    let sarif = generate_report(&result, OutputFormat::Sarif);
    let parsed: serde_json::Value = serde_json::from_str(&sarif).expect("valid JSON");
    assert_eq!(parsed["runs"][0]["tool"]["driver"]["name"], "a11yscan");
}

#[test]
fn test_cancelled_scan_keeps_partial_results() {
    let dom = StaticDom::from_file(Path::new("tests/fixtures/inaccessible.html")).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    let result =
        run_scan("cancelled", &dom, &ScanConfig::default(), &cancel).expect("scan returns");
    assert!(result.violations.iter().any(|v| v.id == "page-has-title"));
    assert!(result.incomplete.iter().any(|i| i.id == "scan-cancelled"));
}

/// Delegating facade whose computed-style reads start failing on command.
/// Style writes keep working, so restoration is still possible.
struct FlakyStyles {
    inner: StaticDom,
    reads_left: Cell<i64>,
}

impl FlakyStyles {
    fn new(html: &str, reads_left: i64) -> Self {
        FlakyStyles { inner: StaticDom::from_html(html), reads_left: Cell::new(reads_left) }
    }
}

impl DomFacade for FlakyStyles {
    fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>, FacadeError> {
        self.inner.find_all(selector)
    }
    fn tag_name(&self, el: ElementHandle) -> Result<String, ElementError> {
        self.inner.tag_name(el)
    }
    fn attribute(&self, el: ElementHandle, name: &str) -> Result<Option<String>, ElementError> {
        self.inner.attribute(el, name)
    }
    fn computed_style(&self, el: ElementHandle, property: &str) -> Result<String, ElementError> {
        let left = self.reads_left.get();
        if left <= 0 {
            return Err(ElementError::StyleUnavailable(property.to_string()));
        }
        self.reads_left.set(left - 1);
        self.inner.computed_style(el, property)
    }
    fn text(&self, el: ElementHandle) -> Result<String, ElementError> {
        self.inner.text(el)
    }
    fn outer_html(&self, el: ElementHandle) -> Result<String, ElementError> {
        self.inner.outer_html(el)
    }
    fn inline_style(&self, el: ElementHandle) -> Result<Option<String>, ElementError> {
        self.inner.inline_style(el)
    }
    fn set_inline_style(
        &self,
        el: ElementHandle,
        css_text: Option<&str>,
    ) -> Result<(), ElementError> {
        self.inner.set_inline_style(el, css_text)
    }
    fn eval_script(&self, code: &str) -> Result<serde_json::Value, FacadeError> {
        self.inner.eval_script(code)
    }
    fn current_url(&self) -> Result<String, FacadeError> {
        self.inner.current_url()
    }
    fn title(&self) -> Result<String, FacadeError> {
        self.inner.title()
    }
    fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), FacadeError> {
        self.inner.wait_for(selector, timeout)
    }
}

// Restoration invariant: the original style survives even when the
// re-analysis inside the what-if preview degrades to failures.
#[test]
fn test_style_restoration_survives_partial_failure() {
    let facade = FlakyStyles::new(
        r#"<html><body><p style="font-size: 10px; color: red">x</p></body></html>"#,
        40,
    );
    let paras = facade.find_all("p").unwrap();
    let el = paras[0];
    let original = facade.inline_style(el).unwrap();

    let analyzer = CssPropertyAnalyzer::new(&facade, ReadabilityPenalties::default());
    // Exhaust the read budget during the "after" analysis.
    let report = analyzer
        .test_style_modifications(el, &[("font-size".to_string(), "18px".to_string())])
        .expect("preview completes with degraded after-analysis");

    assert_eq!(report.before.typography.font_size_px, 10.0);
    assert_eq!(facade.inline_style(el).unwrap(), original, "inline style fully restored");
}

#[test]
fn test_scan_is_reproducible_for_same_page() {
    let dom = StaticDom::from_file(Path::new("tests/fixtures/inaccessible.html")).unwrap();
    let first = run_scan_with_defaults("repeat", &dom).unwrap();
    let second = run_scan_with_defaults("repeat", &dom).unwrap();

    let ids = |r: &a11yscan::result::TestResult| {
        r.violations.iter().map(|v| v.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.summary, second.summary);
    assert_eq!(
        first.js_score.as_ref().map(|s| s.score),
        second.js_score.as_ref().map(|s| s.score)
    );
    // Each scan is a fresh record.
    assert_ne!(first.test_result_id, second.test_result_id);
}
