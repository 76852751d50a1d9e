// SPDX-License-Identifier: PMPL-1.0-or-later
//! Configuration for a11yscan scans.
//!
//! All tuning constants live here with their defaults. Score weights and
//! readability penalties are heuristics, exposed as configuration rather
//! than baked in; the sampling limits are clamped to hard caps so a
//! misconfigured scan cannot run unbounded on a large page.

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard cap on elements evaluated by the CSS family in one scan.
pub const MAX_SAMPLE_TOTAL: usize = 50;
/// Hard cap on elements sampled per selector category.
pub const MAX_SAMPLE_PER_CATEGORY: usize = 5;

/// Default bound on the wait for a usable document body.
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Run the CSS rule family over a sampled set of elements.
    pub css_testing: bool,
    /// Run the JS behavior analysis and rule family.
    pub js_testing: bool,
    pub sampling: SamplingConfig,
    /// Maximum wait for the document body before the scan fails.
    pub navigation_timeout_ms: u64,
    pub readability: ReadabilityPenalties,
    pub score_weights: ScoreWeights,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            css_testing: true,
            js_testing: true,
            sampling: SamplingConfig::default(),
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            readability: ReadabilityPenalties::default(),
            score_weights: ScoreWeights::default(),
        }
    }
}

impl ScanConfig {
    /// Load configuration from a JSON or YAML file, by extension.
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| ScanError::Config(format!("{}: {}", path.display(), e))),
            _ => serde_json::from_str(&content)
                .map_err(|e| ScanError::Config(format!("{}: {}", path.display(), e))),
        }
    }
}

/// Bounds on how many elements the CSS family evaluates per scan.
///
/// Values are requests; the effective limits never exceed
/// [`MAX_SAMPLE_TOTAL`] / [`MAX_SAMPLE_PER_CATEGORY`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub per_category: usize,
    pub total: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { per_category: MAX_SAMPLE_PER_CATEGORY, total: MAX_SAMPLE_TOTAL }
    }
}

impl SamplingConfig {
    pub fn effective_per_category(&self) -> usize {
        self.per_category.min(MAX_SAMPLE_PER_CATEGORY)
    }

    pub fn effective_total(&self) -> usize {
        self.total.min(MAX_SAMPLE_TOTAL)
    }
}

/// Deductions applied to the typography readability score (starts at 100).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadabilityPenalties {
    /// Font size below 14px.
    pub small_font: u32,
    /// Line-height ratio below 1.2.
    pub tight_line_height: u32,
    /// Negative letter-spacing.
    pub negative_letter_spacing: u32,
}

impl Default for ReadabilityPenalties {
    fn default() -> Self {
        Self { small_font: 20, tight_line_height: 15, negative_letter_spacing: 10 }
    }
}

/// One scoring category: a per-issue deduction and a cap on the category total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CategoryWeight {
    pub per_issue: u32,
    pub cap: u32,
}

/// Deduction weights for the derived page accessibility score.
///
/// Deductions apply once per distinct issue type, not per affected element,
/// and each category's total is capped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub scripts: CategoryWeight,
    pub mouse_only: CategoryWeight,
    pub aria: CategoryWeight,
    pub keyboard: CategoryWeight,
    pub focus: CategoryWeight,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            scripts: CategoryWeight { per_issue: 5, cap: 20 },
            mouse_only: CategoryWeight { per_issue: 10, cap: 30 },
            aria: CategoryWeight { per_issue: 5, cap: 25 },
            keyboard: CategoryWeight { per_issue: 5, cap: 25 },
            focus: CategoryWeight { per_issue: 5, cap: 20 },
        }
    }
}
