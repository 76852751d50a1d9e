// SPDX-License-Identifier: PMPL-1.0-or-later
//! Report generation over a completed [`TestResult`].
//!
//! Supports multiple output formats:
//! - Text: human-readable findings grouped by severity
//! - JSON: the full result record for programmatic consumption
//! - SARIF: Static Analysis Results Interchange Format for IDE/CI integration
//!
//! Consumes the result lists and summary only; no report logic reaches back
//! into the engine.

use crate::result::TestResult;
use crate::rules::Impact;
use serde::Serialize;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Structured JSON
    Json,
    /// SARIF for IDE/CI integration
    Sarif,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Sarif => write!(f, "sarif"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "sarif" => Ok(OutputFormat::Sarif),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Generate a report from a scan result
pub fn generate_report(result: &TestResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => generate_text_report(result),
        OutputFormat::Json => generate_json_report(result),
        OutputFormat::Sarif => generate_sarif_report(result),
    }
}

/// Generate human-readable text report
fn generate_text_report(result: &TestResult) -> String {
    let mut output = String::new();

    output.push_str("=== a11yscan Accessibility Report ===\n\n");
    output.push_str(&format!("Page:   {} ({})\n", result.page_title, result.url));
    output.push_str(&format!("Engine: {}  Run: {}\n\n", result.engine, result.test_result_id));

    output.push_str(&format!(
        "Summary: {} violation(s), {} pass(es), {} incomplete\n\n",
        result.summary.violations, result.summary.passes, result.summary.incomplete
    ));

    if let Some(ref score) = result.js_score {
        output.push_str(&format!(
            "Behavior score: {}/100 (grade {}, {})\n\n",
            score.score, score.grade, score.status
        ));
    }

    // Group violations by severity, worst first
    for impact in [Impact::Critical, Impact::Serious, Impact::Moderate, Impact::Minor] {
        let violations = result.violations_by_impact(impact);
        if violations.is_empty() {
            continue;
        }

        output.push_str(&format!("--- {} ({}) ---\n", impact, violations.len()));
        for violation in violations {
            output.push_str(&format!("[{}] {}\n", violation.id, violation.description));
            if !violation.help.is_empty() {
                output.push_str(&format!("  Fix: {}\n", violation.help));
            }
            for node in violation.nodes.iter().take(5) {
                output.push_str(&format!(
                    "  Element: {} | {}\n",
                    node.target.join(" > "),
                    node.html
                ));
            }
            if violation.nodes.len() > 5 {
                output.push_str(&format!(
                    "  ... and {} more element(s)\n",
                    violation.nodes.len() - 5
                ));
            }
            output.push('\n');
        }
    }

    if !result.incomplete.is_empty() {
        output.push_str(&format!("--- incomplete ({}) ---\n", result.incomplete.len()));
        for entry in &result.incomplete {
            output.push_str(&format!("[{}] {}\n", entry.id, entry.reason));
        }
        output.push('\n');
    }

    if result.has_critical_violations() {
        output.push_str("RESULT: FAIL (serious or critical issues found)\n");
    } else if result.summary.violations > 0 {
        output.push_str("RESULT: PASS WITH WARNINGS\n");
    } else {
        output.push_str("RESULT: PASS\n");
    }

    output
}

/// Generate JSON report
fn generate_json_report(result: &TestResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|e| {
        format!("{{\"error\": \"Failed to serialize result: {}\"}}", e)
    })
}

/// SARIF report structure (simplified)
#[derive(Debug, Serialize)]
struct SarifReport {
    #[serde(rename = "$schema")]
    schema: String,
    version: String,
    runs: Vec<SarifRun>,
}

#[derive(Debug, Serialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Debug, Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Debug, Serialize)]
struct SarifDriver {
    name: String,
    version: String,
    #[serde(rename = "informationUri")]
    information_uri: String,
}

#[derive(Debug, Serialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: String,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Debug, Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Debug, Serialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Debug, Serialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifactLocation,
}

#[derive(Debug, Serialize)]
struct SarifArtifactLocation {
    uri: String,
}

/// Generate SARIF report
fn generate_sarif_report(result: &TestResult) -> String {
    let results: Vec<SarifResult> = result
        .violations
        .iter()
        .map(|v| {
            let level = match v.impact {
                Impact::Critical | Impact::Serious => "error",
                Impact::Moderate => "warning",
                Impact::Minor => "note",
            };

            SarifResult {
                rule_id: v.id.clone(),
                level: level.to_string(),
                message: SarifMessage { text: v.description.clone() },
                locations: vec![SarifLocation {
                    physical_location: SarifPhysicalLocation {
                        artifact_location: SarifArtifactLocation { uri: result.url.clone() },
                    },
                }],
            }
        })
        .collect();

    let report = SarifReport {
        schema: "https://json.schemastore.org/sarif-2.1.0.json".to_string(),
        version: "2.1.0".to_string(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: "a11yscan".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    information_uri: "https://github.com/hyperpolymath/a11yscan".to_string(),
                },
            },
            results,
        }],
    };

    serde_json::to_string_pretty(&report).unwrap_or_else(|e| {
        format!("{{\"error\": \"Failed to serialize SARIF report: {}\"}}", e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{TestResult, Violation};
    use crate::rules::NodeRef;

    fn sample_result() -> TestResult {
        let mut result = TestResult::new("page-1", "https://example.com", "Example");
        result.violations.push(Violation {
            id: "images-have-alt".to_string(),
            impact: Impact::Critical,
            description: "Every <img> must have an alt attribute".to_string(),
            help: "Add alt text".to_string(),
            help_url: String::new(),
            nodes: vec![NodeRef::synthetic("img", "<img src=\"a.png\">")],
        });
        result.finalize();
        result
    }

    #[test]
    fn test_text_report_clean() {
        let mut result = TestResult::new("page-1", "https://example.com", "Example");
        result.finalize();
        let report = generate_report(&result, OutputFormat::Text);
        assert!(report.contains("RESULT: PASS"));
    }

    #[test]
    fn test_text_report_with_violation() {
        let report = generate_report(&sample_result(), OutputFormat::Text);
        assert!(report.contains("images-have-alt"));
        assert!(report.contains("critical"));
        assert!(report.contains("RESULT: FAIL"));
    }

    #[test]
    fn test_json_report() {
        let report = generate_report(&sample_result(), OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&report).expect("valid JSON");
        assert_eq!(parsed["engine"], "a11yscan");
        assert!(parsed["violations"].is_array());
    }

    #[test]
    fn test_sarif_report() {
        let report = generate_report(&sample_result(), OutputFormat::Sarif);
        let parsed: serde_json::Value = serde_json::from_str(&report).expect("valid JSON");
        assert_eq!(parsed["version"], "2.1.0");
        assert_eq!(parsed["runs"][0]["results"][0]["level"], "error");
        assert_eq!(
            parsed["runs"][0]["results"][0]["locations"][0]["physicalLocation"]
                ["artifactLocation"]["uri"],
            "https://example.com"
        );
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("sarif".parse::<OutputFormat>().unwrap(), OutputFormat::Sarif);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
