// SPDX-License-Identifier: PMPL-1.0-or-later
//! a11yscan - browser-driven WCAG accessibility rule engine
//!
//! A rule evaluation and aggregation engine for accessibility testing: it
//! runs an extensible set of independent rule checks against a loaded page,
//! classifies each outcome (pass / violation / incomplete), and merges
//! results from three rule families into one consistent ledger with
//! severity and WCAG metadata.
//!
//! ## Philosophy
//!
//! One failing rule must never abort a scan. Every failure that can be
//! represented as data is represented as data; only a dead browser session
//! or invalid input escapes as an error.
//!
//! ## Architecture
//!
//! The engine is written entirely against the narrow [`facade::DomFacade`]
//! capability, so it runs unchanged over a live browser session or over the
//! bundled [`static_dom::StaticDom`] snapshot facade:
//!
//! - **Structural family**: document structure checks (titles, alt text,
//!   labels, heading order)
//! - **CSS family**: computed-style checks over a bounded element sample
//!   (contrast, touch targets, focus visibility, motion)
//! - **JS family**: whole-page behavior census (event wiring, ARIA usage,
//!   keyboard support) with a derived 0-100 accessibility score
//!
//! [`aggregator::run_scan`] orchestrates one scan and produces one
//! immutable [`result::TestResult`] for persistence and reporting.

pub mod aggregator;
pub mod analyzers;
pub mod config;
pub mod error;
pub mod facade;
pub mod report;
pub mod result;
pub mod rules;
pub mod static_dom;

pub use aggregator::{run_scan, run_scan_with_defaults, CancelToken, ScanStage};
pub use config::ScanConfig;
pub use error::{ElementError, FacadeError, RuleError, ScanError};
pub use facade::{DomFacade, ElementHandle};
pub use result::{ScoreSheet, Summary, TestResult, Violation};
pub use rules::{Impact, NodeRef, RuleStatus, WcagLevel};
