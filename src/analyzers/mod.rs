// SPDX-License-Identifier: PMPL-1.0-or-later
//! Page analyzers feeding the CSS and JS rule families.
//!
//! - [`css_props`] converts one element's computed style into six
//!   accessibility-relevant buckets and supports temporary what-if style
//!   overrides with guaranteed restoration.
//! - [`js_behavior`] takes a census of a whole page's script wiring, event
//!   handlers, ARIA usage, and keyboard support, and derives the page
//!   accessibility score.
//!
//! Analyzers hold no scan state: everything they learn is passed in through
//! the facade and returned as data.

pub mod css_props;
pub mod js_behavior;

pub use css_props::{CssAnalysis, CssPropertyAnalyzer, StyleModificationReport, StyleOverride};
pub use js_behavior::{JsAnalysisReport, JsBehaviorAnalyzer, Section};
