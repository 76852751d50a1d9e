// SPDX-License-Identifier: PMPL-1.0-or-later
//! The persisted record of one completed page scan.
//!
//! A [`TestResult`] is created once per scan and never mutated; a new scan
//! produces a new record. Downstream consumers (persistence, reporting,
//! trending) read the violation/pass/incomplete lists and the summary
//! counts - nothing else in the engine is part of the storage contract.

use crate::rules::{Impact, NodeRef, RegistryResult, RuleStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable tag distinguishing this engine's output in a shared store.
pub const ENGINE_TAG: &str = "a11yscan";

/// A confirmed rule violation with the elements it was observed on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Rule id, namespaced by family prefix (`css-`, `js-`, or unprefixed).
    pub id: String,
    pub impact: Impact,
    pub description: String,
    pub help: String,
    pub help_url: String,
    pub nodes: Vec<NodeRef>,
}

/// A rule that ran and found nothing wrong.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pass {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<Impact>,
    pub description: String,
    pub help_url: String,
    pub nodes: Vec<NodeRef>,
}

/// A rule or family that could not complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incomplete {
    pub id: String,
    pub description: String,
    pub reason: String,
}

/// Counts over the merged result lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub violations: usize,
    pub passes: usize,
    pub incomplete: usize,
}

/// Derived 0-100 page accessibility score with letter grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSheet {
    pub score: u32,
    pub grade: String,
    pub status: String,
    pub deductions: Vec<String>,
    pub total_issues: usize,
}

impl ScoreSheet {
    /// Map a 0-100 score to its letter grade and status label.
    pub fn from_score(score: u32, deductions: Vec<String>, total_issues: usize) -> Self {
        let (grade, status) = match score {
            90..=u32::MAX => ("A", "excellent"),
            80..=89 => ("B", "good"),
            70..=79 => ("C", "fair"),
            60..=69 => ("D", "poor"),
            _ => ("F", "critical"),
        };
        ScoreSheet {
            score,
            grade: grade.to_string(),
            status: status.to_string(),
            deductions,
            total_issues,
        }
    }
}

/// The aggregate record persisted per page-test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_result_id: Uuid,
    pub page_id: String,
    pub url: String,
    pub page_title: String,
    pub engine: String,
    pub created_at: DateTime<Utc>,
    pub violations: Vec<Violation>,
    pub passes: Vec<Pass>,
    pub incomplete: Vec<Incomplete>,
    pub summary: Summary,
    /// Present when the JS family ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub js_score: Option<ScoreSheet>,
}

impl TestResult {
    pub fn new(page_id: &str, url: &str, page_title: &str) -> Self {
        TestResult {
            test_result_id: Uuid::new_v4(),
            page_id: page_id.to_string(),
            url: url.to_string(),
            page_title: page_title.to_string(),
            engine: ENGINE_TAG.to_string(),
            created_at: Utc::now(),
            violations: Vec::new(),
            passes: Vec::new(),
            incomplete: Vec::new(),
            summary: Summary::default(),
            js_score: None,
        }
    }

    /// Fold one family's registry output into the merged lists.
    ///
    /// Appends in place, so calling in family order (structural, CSS, JS)
    /// yields the documented merge ordering. Ids are not deduplicated across
    /// families; family prefixes keep them disjoint.
    pub fn fold_registry(&mut self, registry: &RegistryResult) {
        for row in &registry.results {
            match row.status {
                RuleStatus::Violation => self.violations.push(Violation {
                    id: row.rule_id.clone(),
                    impact: row.rule_info.impact,
                    description: row.rule_info.description.clone(),
                    help: row.rule_info.help.clone(),
                    help_url: row.rule_info.help_url.clone(),
                    nodes: row.nodes.clone(),
                }),
                RuleStatus::Pass => self.passes.push(Pass {
                    id: row.rule_id.clone(),
                    impact: Some(row.rule_info.impact),
                    description: row.rule_info.description.clone(),
                    help_url: row.rule_info.help_url.clone(),
                    nodes: row.nodes.clone(),
                }),
                RuleStatus::Incomplete => self.incomplete.push(Incomplete {
                    id: row.rule_id.clone(),
                    description: row.rule_info.description.clone(),
                    reason: row
                        .reason
                        .clone()
                        .unwrap_or_else(|| "no reason recorded".to_string()),
                }),
            }
        }
    }

    /// Record a family-level failure as one incomplete entry.
    pub fn push_family_incomplete(&mut self, family_id: &str, reason: String) {
        self.incomplete.push(Incomplete {
            id: family_id.to_string(),
            description: format!("{} did not complete", family_id),
            reason,
        });
    }

    /// Recompute summary counts from the merged lists.
    pub fn finalize(&mut self) {
        self.summary = Summary {
            violations: self.violations.len(),
            passes: self.passes.len(),
            incomplete: self.incomplete.len(),
        };
    }

    pub fn violations_by_impact(&self, impact: Impact) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.impact == impact).collect()
    }

    /// Whether any violation is serious or critical.
    pub fn has_critical_violations(&self) -> bool {
        self.violations.iter().any(|v| v.impact.is_severe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RegistrySummary, RuleInfo, RuleResult, WcagLevel};

    fn rule_info(impact: Impact) -> RuleInfo {
        RuleInfo {
            name: "Sample".to_string(),
            description: "Sample rule".to_string(),
            help: "Fix the sample".to_string(),
            help_url: String::new(),
            impact,
            wcag_criterion: "1.1.1".to_string(),
            wcag_level: WcagLevel::A,
        }
    }

    fn row(id: &str, status: RuleStatus, impact: Impact) -> RuleResult {
        RuleResult {
            rule_id: id.to_string(),
            status,
            message: String::new(),
            reason: matches!(status, RuleStatus::Incomplete)
                .then(|| "Test error: boom".to_string()),
            nodes: Vec::new(),
            passed_nodes: Vec::new(),
            details: serde_json::Value::Null,
            suggested_fixes: Vec::new(),
            rule_info: rule_info(impact),
        }
    }

    fn registry_result(rows: Vec<RuleResult>) -> RegistryResult {
        RegistryResult {
            family: "test".to_string(),
            results: rows,
            summary: RegistrySummary::default(),
        }
    }

    #[test]
    fn test_fold_and_finalize() {
        let mut result = TestResult::new("page-1", "https://example.com", "Example");
        result.fold_registry(&registry_result(vec![
            row("page-has-title", RuleStatus::Violation, Impact::Serious),
            row("images-have-alt", RuleStatus::Pass, Impact::Critical),
            row("heading-order", RuleStatus::Incomplete, Impact::Moderate),
        ]));
        result.finalize();

        assert_eq!(result.summary, Summary { violations: 1, passes: 1, incomplete: 1 });
        assert_eq!(result.violations[0].id, "page-has-title");
        assert!(result.has_critical_violations());
    }

    #[test]
    fn test_merge_order_across_families() {
        let mut result = TestResult::new("p", "u", "t");
        result.fold_registry(&registry_result(vec![row(
            "duplicate-ids",
            RuleStatus::Violation,
            Impact::Minor,
        )]));
        result.fold_registry(&registry_result(vec![row(
            "css-touch-target",
            RuleStatus::Violation,
            Impact::Serious,
        )]));
        result.fold_registry(&registry_result(vec![row(
            "js-keyboard-events",
            RuleStatus::Violation,
            Impact::Serious,
        )]));

        let ids: Vec<_> = result.violations.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["duplicate-ids", "css-touch-target", "js-keyboard-events"]);
    }

    #[test]
    fn test_family_incomplete_entry() {
        let mut result = TestResult::new("p", "u", "t");
        result.push_family_incomplete("css-testing", "stylesheet probe failed".to_string());
        result.finalize();
        assert_eq!(result.incomplete.len(), 1);
        assert_eq!(result.incomplete[0].id, "css-testing");
    }

    #[test]
    fn test_score_sheet_grades() {
        assert_eq!(ScoreSheet::from_score(95, vec![], 0).grade, "A");
        assert_eq!(ScoreSheet::from_score(90, vec![], 0).grade, "A");
        assert_eq!(ScoreSheet::from_score(85, vec![], 2).grade, "B");
        assert_eq!(ScoreSheet::from_score(72, vec![], 4).grade, "C");
        assert_eq!(ScoreSheet::from_score(60, vec![], 6).grade, "D");
        assert_eq!(ScoreSheet::from_score(10, vec![], 9).status, "critical");
    }

    #[test]
    fn test_engine_tag_stable() {
        let result = TestResult::new("p", "u", "t");
        assert_eq!(result.engine, "a11yscan");
    }

    #[test]
    fn test_result_serializes() {
        let mut result = TestResult::new("p", "https://example.com", "Example");
        result.finalize();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["engine"], "a11yscan");
        assert!(json["violations"].is_array());
        assert!(json["summary"]["passes"].is_number());
    }
}
