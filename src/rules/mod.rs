// SPDX-License-Identifier: PMPL-1.0-or-later
//! Rule model and the fail-soft rule registry.
//!
//! A [`Rule`] is a named, independently invokable check tagged with severity
//! and WCAG metadata. A [`RuleRegistry`] owns an ordered collection of rules
//! for one family (structural, CSS, JS) and runs all of them against one
//! target, absorbing individual rule failures into `incomplete` rows so a
//! single malformed check never aborts a scan.
//!
//! Checks are registered as direct function references, not looked up by
//! name at run time.

pub mod css;
pub mod js;
pub mod structural;

use crate::error::{FacadeError, RuleError};
use crate::facade::{describe_element, DomFacade, ElementHandle};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Outer-markup snapshots captured into [`NodeRef`]s are truncated to this.
pub const MAX_HTML_SNAPSHOT: usize = 200;

/// Canonical severity of a rule violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Minor,
    Moderate,
    Serious,
    Critical,
}

impl Impact {
    /// Whether a failed rule with this impact counts as a critical issue.
    pub fn is_severe(&self) -> bool {
        matches!(self, Impact::Serious | Impact::Critical)
    }
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Impact::Minor => write!(f, "minor"),
            Impact::Moderate => write!(f, "moderate"),
            Impact::Serious => write!(f, "serious"),
            Impact::Critical => write!(f, "critical"),
        }
    }
}

/// WCAG conformance level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WcagLevel {
    /// Level A - minimum conformance
    A,
    /// Level AA - standard conformance
    AA,
    /// Level AAA - enhanced conformance
    AAA,
}

impl std::fmt::Display for WcagLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WcagLevel::A => write!(f, "A"),
            WcagLevel::AA => write!(f, "AA"),
            WcagLevel::AAA => write!(f, "AAA"),
        }
    }
}

/// Outcome classification of one rule run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Pass,
    Violation,
    Incomplete,
}

/// Descriptive snapshot of an element at the moment a rule examined it.
///
/// Never re-resolved back to a live element; `target` and `html` exist for
/// human review, `details` carries family-specific context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRef {
    /// Selector/tag fragments identifying the element, outermost first.
    pub target: Vec<String>,
    /// Truncated outer markup.
    pub html: String,
    /// Family-specific context (css_context, js_context, suggested fixes).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl NodeRef {
    /// Snapshot a live element through the facade.
    ///
    /// Element reads that fail degrade to placeholders; capturing a node
    /// never aborts the rule that asked for it.
    pub fn capture(facade: &dyn DomFacade, el: ElementHandle) -> Self {
        let target = vec![describe_element(facade, el)];
        let html = facade
            .outer_html(el)
            .map(|h| truncate_html(&h))
            .unwrap_or_else(|_| String::from("<unavailable>"));
        NodeRef { target, html, details: serde_json::Value::Null }
    }

    pub fn synthetic(target: &str, html: &str) -> Self {
        NodeRef {
            target: vec![target.to_string()],
            html: truncate_html(html),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

fn truncate_html(html: &str) -> String {
    if html.len() <= MAX_HTML_SNAPSHOT {
        return html.to_string();
    }
    let mut cut = MAX_HTML_SNAPSHOT;
    while !html.is_char_boundary(cut) {
        cut -= 1;
    }
    html[..cut].to_string()
}

/// What a rule's check function returns on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCheck {
    pub status: RuleStatus,
    pub message: String,
    /// Nodes matching the status: violating nodes for a violation,
    /// passing nodes for a pass.
    pub nodes: Vec<NodeRef>,
    /// Passing nodes recorded alongside a violation, kept for review.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passed_nodes: Vec<NodeRef>,
    /// Required when status is `Incomplete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_fixes: Vec<String>,
}

impl RuleCheck {
    pub fn pass(message: impl Into<String>) -> Self {
        RuleCheck {
            status: RuleStatus::Pass,
            message: message.into(),
            nodes: Vec::new(),
            passed_nodes: Vec::new(),
            reason: None,
            details: serde_json::Value::Null,
            suggested_fixes: Vec::new(),
        }
    }

    pub fn violation(message: impl Into<String>, nodes: Vec<NodeRef>) -> Self {
        RuleCheck {
            status: RuleStatus::Violation,
            message: message.into(),
            nodes,
            passed_nodes: Vec::new(),
            reason: None,
            details: serde_json::Value::Null,
            suggested_fixes: Vec::new(),
        }
    }

    pub fn incomplete(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        RuleCheck {
            status: RuleStatus::Incomplete,
            message: reason.clone(),
            nodes: Vec::new(),
            passed_nodes: Vec::new(),
            reason: Some(reason),
            details: serde_json::Value::Null,
            suggested_fixes: Vec::new(),
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<NodeRef>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_passed_nodes(mut self, nodes: Vec<NodeRef>) -> Self {
        self.passed_nodes = nodes;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fixes.push(fix.into());
        self
    }
}

/// Check function: direct reference captured at registration time.
pub type CheckFn<Ctx> = Box<dyn Fn(&Ctx) -> std::result::Result<RuleCheck, RuleError> + Send + Sync>;

/// A named, independently invokable accessibility check.
///
/// Immutable once registered; identified by `id` for the life of the process.
pub struct Rule<Ctx> {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub help: &'static str,
    pub help_url: &'static str,
    pub impact: Impact,
    pub wcag_criterion: &'static str,
    pub wcag_level: WcagLevel,
    check: CheckFn<Ctx>,
}

impl<Ctx> Rule<Ctx> {
    pub fn new(
        id: &'static str,
        name: &'static str,
        check: impl Fn(&Ctx) -> std::result::Result<RuleCheck, RuleError> + Send + Sync + 'static,
    ) -> Self {
        Rule {
            id,
            name,
            description: "",
            help: "",
            help_url: "",
            impact: Impact::Moderate,
            wcag_criterion: "",
            wcag_level: WcagLevel::A,
            check: Box::new(check),
        }
    }

    pub fn impact(mut self, impact: Impact) -> Self {
        self.impact = impact;
        self
    }

    pub fn wcag(mut self, criterion: &'static str, level: WcagLevel) -> Self {
        self.wcag_criterion = criterion;
        self.wcag_level = level;
        self
    }

    pub fn describe(mut self, description: &'static str, help: &'static str) -> Self {
        self.description = description;
        self.help = help;
        self
    }

    pub fn help_url(mut self, url: &'static str) -> Self {
        self.help_url = url;
        self
    }

    fn info(&self) -> RuleInfo {
        RuleInfo {
            name: self.name.to_string(),
            description: self.description.to_string(),
            help: self.help.to_string(),
            help_url: self.help_url.to_string(),
            impact: self.impact,
            wcag_criterion: self.wcag_criterion.to_string(),
            wcag_level: self.wcag_level,
        }
    }
}

impl<Ctx> std::fmt::Debug for Rule<Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("impact", &self.impact)
            .field("wcag_criterion", &self.wcag_criterion)
            .finish()
    }
}

/// Serializable snapshot of a rule's metadata, attached to every result row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleInfo {
    pub name: String,
    pub description: String,
    pub help: String,
    pub help_url: String,
    pub impact: Impact,
    pub wcag_criterion: String,
    pub wcag_level: WcagLevel,
}

/// One rule's result within a registry run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub status: RuleStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub nodes: Vec<NodeRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passed_nodes: Vec<NodeRef>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_fixes: Vec<String>,
    pub rule_info: RuleInfo,
}

/// Aggregate counts for one registry run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySummary {
    pub passed: usize,
    pub failed: usize,
    pub incomplete: usize,
    /// Failed rules whose impact is serious or critical.
    pub critical_issues: usize,
}

/// Uniform result envelope: detail rows in registration order plus summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryResult {
    pub family: String,
    pub results: Vec<RuleResult>,
    pub summary: RegistrySummary,
}

impl RegistryResult {
    pub fn result_for(&self, rule_id: &str) -> Option<&RuleResult> {
        self.results.iter().find(|r| r.rule_id == rule_id)
    }
}

/// Ordered collection of rules for one family.
pub struct RuleRegistry<Ctx> {
    family: &'static str,
    rules: Vec<Rule<Ctx>>,
}

impl<Ctx> RuleRegistry<Ctx> {
    pub fn new(family: &'static str) -> Self {
        RuleRegistry { family, rules: Vec::new() }
    }

    /// Register a rule. Ids must be unique within the registry.
    pub fn register(&mut self, rule: Rule<Ctx>) {
        debug_assert!(
            !self.rules.iter().any(|r| r.id == rule.id),
            "duplicate rule id {}",
            rule.id
        );
        self.rules.push(rule);
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id).collect()
    }

    /// Run every registered rule against one target.
    ///
    /// A rule's element-level or check-level failure becomes an `incomplete`
    /// row and the batch continues. Only a fatal facade failure propagates,
    /// so the aggregator can decide page-level failure.
    pub fn run_all(&self, ctx: &Ctx) -> std::result::Result<RegistryResult, FacadeError> {
        let mut results = Vec::with_capacity(self.rules.len());
        let mut summary = RegistrySummary::default();

        for rule in &self.rules {
            let result = match (rule.check)(ctx) {
                Ok(check) => RuleResult {
                    rule_id: rule.id.to_string(),
                    status: check.status,
                    message: check.message,
                    reason: check.reason,
                    nodes: check.nodes,
                    passed_nodes: check.passed_nodes,
                    details: check.details,
                    suggested_fixes: check.suggested_fixes,
                    rule_info: rule.info(),
                },
                Err(RuleError::Facade(e)) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!(rule = rule.id, error = %e, "rule check failed");
                    let reason = format!("Test error: {}", e);
                    RuleResult {
                        rule_id: rule.id.to_string(),
                        status: RuleStatus::Incomplete,
                        message: reason.clone(),
                        reason: Some(reason),
                        nodes: Vec::new(),
                        passed_nodes: Vec::new(),
                        details: serde_json::Value::Null,
                        suggested_fixes: Vec::new(),
                        rule_info: rule.info(),
                    }
                }
            };

            match result.status {
                RuleStatus::Pass => summary.passed += 1,
                RuleStatus::Violation => {
                    summary.failed += 1;
                    if result.rule_info.impact.is_severe() {
                        summary.critical_issues += 1;
                    }
                }
                RuleStatus::Incomplete => summary.incomplete += 1,
            }

            results.push(result);
        }

        Ok(RegistryResult { family: self.family.to_string(), results, summary })
    }
}
