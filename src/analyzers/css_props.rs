// SPDX-License-Identifier: PMPL-1.0-or-later
//! CSS property analyzer - computed style to accessibility dimensions.
//!
//! Converts one element's computed style into six analysis buckets (color,
//! typography, layout, interaction, motion, visibility), each surfacing raw
//! values plus the accessibility issues they imply. Missing or garbage
//! computed values degrade to the property's CSS initial value; a hard
//! per-element failure degrades to an empty analysis so the calling rule
//! registry can classify it as incomplete.
//!
//! Also implements what-if remediation previews: apply temporary inline
//! overrides, re-analyze, and restore the original style on every exit path.

use crate::config::ReadabilityPenalties;
use crate::error::ElementError;
use crate::facade::{DomFacade, ElementHandle};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;

/// Tags that are interactive without any ARIA or handler wiring.
pub const NATIVE_INTERACTIVE_TAGS: &[&str] = &["a", "button", "input", "select", "textarea"];

/// Parse a CSS hex color (#rgb, #rrggbb) into (r, g, b) components
pub fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    match hex.len() {
        3 => {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
            Some((r, g, b))
        }
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some((r, g, b))
        }
        _ => None,
    }
}

/// Parse an rgb() or rgba() color into (r, g, b), `None` for full transparency.
pub fn parse_rgb_color(value: &str) -> Option<(u8, u8, u8)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"rgba?\(\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*(?:,\s*([\d.]+)\s*)?\)")
            .expect("valid regex")
    });
    let caps = re.captures(value)?;
    if let Some(alpha) = caps.get(4) {
        if alpha.as_str().parse::<f64>().ok()? == 0.0 {
            return None;
        }
    }
    let r: u8 = caps[1].parse().ok()?;
    let g: u8 = caps[2].parse().ok()?;
    let b: u8 = caps[3].parse().ok()?;
    Some((r, g, b))
}

/// Parse any CSS color value into (r, g, b)
pub fn parse_color(value: &str) -> Option<(u8, u8, u8)> {
    let trimmed = value.trim().to_lowercase();
    if trimmed.starts_with('#') {
        parse_hex_color(&trimmed)
    } else if trimmed.starts_with("rgb") {
        parse_rgb_color(&trimmed)
    } else {
        parse_named_color(&trimmed)
    }
}

/// Parse a named CSS color
pub fn parse_named_color(name: &str) -> Option<(u8, u8, u8)> {
    match name {
        "white" => Some((255, 255, 255)),
        "black" => Some((0, 0, 0)),
        "red" => Some((255, 0, 0)),
        "green" => Some((0, 128, 0)),
        "blue" => Some((0, 0, 255)),
        "yellow" => Some((255, 255, 0)),
        "gray" | "grey" => Some((128, 128, 128)),
        "silver" => Some((192, 192, 192)),
        "maroon" => Some((128, 0, 0)),
        "olive" => Some((128, 128, 0)),
        "lime" => Some((0, 255, 0)),
        "aqua" | "cyan" => Some((0, 255, 255)),
        "teal" => Some((0, 128, 128)),
        "navy" => Some((0, 0, 128)),
        "fuchsia" | "magenta" => Some((255, 0, 255)),
        "purple" => Some((128, 0, 128)),
        "orange" => Some((255, 165, 0)),
        _ => None,
    }
}

/// Calculate relative luminance per WCAG 2.x
/// <https://www.w3.org/TR/WCAG21/#dfn-relative-luminance>
pub fn relative_luminance(r: u8, g: u8, b: u8) -> f64 {
    let srgb = [r, g, b].map(|c| {
        let v = c as f64 / 255.0;
        if v <= 0.04045 {
            v / 12.92
        } else {
            ((v + 0.055) / 1.055).powf(2.4)
        }
    });
    0.2126 * srgb[0] + 0.7152 * srgb[1] + 0.0722 * srgb[2]
}

/// Calculate contrast ratio between two colors
/// Returns a ratio >= 1.0 (e.g., 4.5, 7.0, 21.0)
pub fn contrast_ratio(fg: (u8, u8, u8), bg: (u8, u8, u8)) -> f64 {
    let l1 = relative_luminance(fg.0, fg.1, fg.2);
    let l2 = relative_luminance(bg.0, bg.1, bg.2);
    let (lighter, darker) = if l1 > l2 { (l1, l2) } else { (l2, l1) };
    (lighter + 0.05) / (darker + 0.05)
}

/// Parse a pixel length, `None` for auto/keywords/garbage.
pub fn parse_px(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if let Some(number) = trimmed.strip_suffix("px") {
        return number.trim().parse::<f64>().ok().filter(|v| v.is_finite());
    }
    // Bare numbers show up in sloppy inline styles.
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a CSS time value into seconds.
pub fn parse_seconds(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if let Some(ms) = trimmed.strip_suffix("ms") {
        return ms.trim().parse::<f64>().ok().map(|v| v / 1000.0);
    }
    if let Some(s) = trimmed.strip_suffix('s') {
        return s.trim().parse::<f64>().ok();
    }
    None
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColorAnalysis {
    pub color: String,
    pub background_color: String,
    /// WCAG contrast ratio when both colors resolved.
    pub contrast_ratio: Option<f64>,
    pub potential_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypographyAnalysis {
    pub font_size_px: f64,
    /// Line height as a ratio of font size.
    pub line_height_ratio: f64,
    pub letter_spacing_px: f64,
    pub font_weight: String,
    /// 100 minus readability penalties, floored at 0.
    pub readability_score: u32,
    pub potential_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutAnalysis {
    pub display: String,
    pub position: String,
    pub width_px: Option<f64>,
    pub height_px: Option<f64>,
    pub overflow: String,
    pub potential_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionAnalysis {
    pub cursor: String,
    pub outline_style: String,
    pub box_shadow: String,
    /// Whether any visible focus treatment was detected.
    pub has_focus_indicator: bool,
    pub potential_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MotionAnalysis {
    pub animation_duration_s: f64,
    pub transition_duration_s: f64,
    pub has_motion: bool,
    pub potential_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisibilityAnalysis {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    /// Non-collapsed rendered box, judged from the live DOM.
    pub is_visible: bool,
    /// Interactive by tag, tabindex, or onclick - runtime attributes count.
    pub is_interactive: bool,
    pub potential_issues: Vec<String>,
}

/// One element's computed style, classified into accessibility dimensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CssAnalysis {
    pub color: ColorAnalysis,
    pub typography: TypographyAnalysis,
    pub layout: LayoutAnalysis,
    pub interaction: InteractionAnalysis,
    pub motion: MotionAnalysis,
    pub visibility: VisibilityAnalysis,
}

impl CssAnalysis {
    /// All issues across buckets, for impact summaries.
    pub fn all_issues(&self) -> Vec<&str> {
        self.color
            .potential_issues
            .iter()
            .chain(&self.typography.potential_issues)
            .chain(&self.layout.potential_issues)
            .chain(&self.interaction.potential_issues)
            .chain(&self.motion.potential_issues)
            .chain(&self.visibility.potential_issues)
            .map(String::as_str)
            .collect()
    }
}

/// Scoped inline-style override.
///
/// Captures the original inline style on apply and restores it exactly once:
/// explicitly through [`restore`](StyleOverride::restore), or on drop for
/// every other exit path, including panics and cancellation.
pub struct StyleOverride<'a> {
    facade: &'a dyn DomFacade,
    element: ElementHandle,
    original: Option<String>,
    restored: bool,
}

impl<'a> StyleOverride<'a> {
    /// Apply `mods` as inline declarations on top of the existing style.
    pub fn apply(
        facade: &'a dyn DomFacade,
        element: ElementHandle,
        mods: &[(String, String)],
    ) -> Result<Self, ElementError> {
        let original = facade.inline_style(element)?;
        let mut css = original.clone().unwrap_or_default();
        for (property, value) in mods {
            if !css.is_empty() && !css.trim_end().ends_with(';') {
                css.push(';');
            }
            css.push_str(&format!(" {}: {}", property, value));
        }
        facade.set_inline_style(element, Some(css.trim()))?;
        Ok(StyleOverride { facade, element, original, restored: false })
    }

    /// Restore the original style and report any restoration failure.
    pub fn restore(mut self) -> Result<(), ElementError> {
        self.restore_once()
    }

    fn restore_once(&mut self) -> Result<(), ElementError> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        self.facade.set_inline_style(self.element, self.original.as_deref())
    }
}

impl Drop for StyleOverride<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.restore_once() {
            debug!(element = self.element.id(), error = %e, "style restore on drop failed");
        }
    }
}

/// A property's computed value before and after a what-if override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyChange {
    pub property: String,
    pub before: String,
    pub after: String,
}

/// Direction of the accessibility delta produced by a what-if override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessibilityImpact {
    pub improved: Vec<String>,
    pub regressed: Vec<String>,
    pub verdict: String,
}

/// Before/after diff for a temporary style modification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleModificationReport {
    pub before: CssAnalysis,
    pub after: CssAnalysis,
    pub comparison: Vec<PropertyChange>,
    pub accessibility_impact: AccessibilityImpact,
}

/// Analyzer over one element's computed style.
pub struct CssPropertyAnalyzer<'a> {
    facade: &'a dyn DomFacade,
    penalties: ReadabilityPenalties,
}

impl<'a> CssPropertyAnalyzer<'a> {
    pub fn new(facade: &'a dyn DomFacade, penalties: ReadabilityPenalties) -> Self {
        CssPropertyAnalyzer { facade, penalties }
    }

    /// Computed style value with fallback; never errors.
    fn style(&self, el: ElementHandle, property: &str, fallback: &str) -> String {
        match self.facade.computed_style(el, property) {
            Ok(value) if !value.is_empty() => value,
            _ => fallback.to_string(),
        }
    }

    /// Analyze one element into the six buckets.
    ///
    /// Never propagates element failures: a detached element yields the
    /// empty default analysis.
    pub fn analyze(&self, el: ElementHandle) -> CssAnalysis {
        if self.facade.tag_name(el).is_err() {
            return CssAnalysis::default();
        }
        CssAnalysis {
            color: self.analyze_color(el),
            typography: self.analyze_typography(el),
            layout: self.analyze_layout(el),
            interaction: self.analyze_interaction(el),
            motion: self.analyze_motion(el),
            visibility: self.analyze_visibility(el),
        }
    }

    fn analyze_color(&self, el: ElementHandle) -> ColorAnalysis {
        let color = self.style(el, "color", "rgb(0, 0, 0)");
        let background_color = self.style(el, "background-color", "rgba(0, 0, 0, 0)");

        let fg = parse_color(&color);
        let bg = self.resolve_background(&background_color);
        let ratio = match (fg, bg) {
            (Some(fg), Some(bg)) => Some(contrast_ratio(fg, bg)),
            _ => None,
        };

        let mut potential_issues = Vec::new();
        if let Some(ratio) = ratio {
            if ratio < 4.5 {
                potential_issues.push(format!(
                    "Text contrast ratio {:.2}:1 is below the 4.5:1 minimum",
                    ratio
                ));
            }
        }

        ColorAnalysis { color, background_color, contrast_ratio: ratio, potential_issues }
    }

    /// Element background, falling back to the body background and finally
    /// white when every layer is transparent.
    fn resolve_background(&self, own: &str) -> Option<(u8, u8, u8)> {
        if let Some(bg) = parse_color(own) {
            return Some(bg);
        }
        let body_bg = self
            .facade
            .find_all("body")
            .ok()
            .and_then(|body| body.first().copied())
            .map(|body| self.style(body, "background-color", "rgb(255, 255, 255)"))
            .and_then(|value| parse_color(&value));
        body_bg.or(Some((255, 255, 255)))
    }

    fn analyze_typography(&self, el: ElementHandle) -> TypographyAnalysis {
        let font_size_px = parse_px(&self.style(el, "font-size", "16px")).unwrap_or(16.0);
        let line_height_raw = self.style(el, "line-height", "normal");
        // Unitless line-height is already a ratio; pixel values are scaled
        // against the font size.
        let line_height_ratio = match line_height_raw.as_str() {
            "normal" => 1.2,
            other => match other.parse::<f64>() {
                Ok(ratio) => ratio,
                Err(_) => parse_px(other)
                    .map(|px| if font_size_px > 0.0 { px / font_size_px } else { 1.2 })
                    .unwrap_or(1.2),
            },
        };
        let letter_spacing_px = match self.style(el, "letter-spacing", "normal").as_str() {
            "normal" => 0.0,
            other => parse_px(other).unwrap_or(0.0),
        };
        let font_weight = self.style(el, "font-weight", "400");

        let mut potential_issues = Vec::new();
        let mut score: i64 = 100;
        if font_size_px < 14.0 {
            score -= i64::from(self.penalties.small_font);
            potential_issues.push(format!("Font size {:.0}px is too small", font_size_px));
        }
        if line_height_ratio < 1.2 {
            score -= i64::from(self.penalties.tight_line_height);
            potential_issues.push(format!(
                "Line height ratio {:.2} is too tight for comfortable reading",
                line_height_ratio
            ));
        }
        if letter_spacing_px < 0.0 {
            score -= i64::from(self.penalties.negative_letter_spacing);
            potential_issues.push("Negative letter spacing crowds characters".to_string());
        }

        TypographyAnalysis {
            font_size_px,
            line_height_ratio,
            letter_spacing_px,
            font_weight,
            readability_score: score.max(0) as u32,
            potential_issues,
        }
    }

    fn analyze_layout(&self, el: ElementHandle) -> LayoutAnalysis {
        let display = self.style(el, "display", "block");
        let position = self.style(el, "position", "static");
        let width_px = parse_px(&self.style(el, "width", "auto"));
        let height_px = parse_px(&self.style(el, "height", "auto"));
        let overflow = self.style(el, "overflow", "visible");

        let mut potential_issues = Vec::new();
        if overflow == "hidden" {
            potential_issues
                .push("Hidden overflow can clip enlarged text".to_string());
        }

        LayoutAnalysis { display, position, width_px, height_px, overflow, potential_issues }
    }

    fn analyze_interaction(&self, el: ElementHandle) -> InteractionAnalysis {
        let cursor = self.style(el, "cursor", "auto");
        let outline_style = self.style(el, "outline-style", "none");
        let box_shadow = self.style(el, "box-shadow", "none");
        let has_focus_indicator = outline_style != "none" || box_shadow != "none";

        let mut potential_issues = Vec::new();
        if self.is_interactive(el) && !has_focus_indicator {
            potential_issues
                .push("Interactive element lacks visible focus indicator".to_string());
        }

        InteractionAnalysis {
            cursor,
            outline_style,
            box_shadow,
            has_focus_indicator,
            potential_issues,
        }
    }

    fn analyze_motion(&self, el: ElementHandle) -> MotionAnalysis {
        let animation_duration_s =
            parse_seconds(&self.style(el, "animation-duration", "0s")).unwrap_or(0.0);
        let transition_duration_s =
            parse_seconds(&self.style(el, "transition-duration", "0s")).unwrap_or(0.0);
        let has_motion = animation_duration_s > 0.0 || transition_duration_s > 0.0;

        let mut potential_issues = Vec::new();
        if animation_duration_s > 5.0 {
            potential_issues.push(format!(
                "Animation runs for {:.1}s with no apparent pause control",
                animation_duration_s
            ));
        }

        MotionAnalysis {
            animation_duration_s,
            transition_duration_s,
            has_motion,
            potential_issues,
        }
    }

    fn analyze_visibility(&self, el: ElementHandle) -> VisibilityAnalysis {
        let display = self.style(el, "display", "block");
        let visibility = self.style(el, "visibility", "visible");
        let opacity = self.style(el, "opacity", "1").parse::<f64>().unwrap_or(1.0);
        let width = parse_px(&self.style(el, "width", "auto"));
        let height = parse_px(&self.style(el, "height", "auto"));

        let collapsed = matches!(width, Some(w) if w <= 0.0) || matches!(height, Some(h) if h <= 0.0);
        let is_visible =
            display != "none" && visibility != "hidden" && opacity > 0.0 && !collapsed;
        let is_interactive = self.is_interactive(el);

        let mut potential_issues = Vec::new();
        if is_interactive && !is_visible {
            potential_issues.push("Interactive element is not rendered visibly".to_string());
        }

        VisibilityAnalysis {
            display,
            visibility,
            opacity,
            is_visible,
            is_interactive,
            potential_issues,
        }
    }

    /// Interactivity from the live DOM: tag, tabindex, or click wiring.
    pub fn is_interactive(&self, el: ElementHandle) -> bool {
        let tag = match self.facade.tag_name(el) {
            Ok(tag) => tag,
            Err(_) => return false,
        };
        if NATIVE_INTERACTIVE_TAGS.contains(&tag.as_str()) {
            return true;
        }
        let has_attr = |name: &str| {
            matches!(self.facade.attribute(el, name), Ok(Some(_)))
        };
        has_attr("tabindex") || has_attr("onclick")
    }

    /// What-if preview: apply `mods`, re-analyze, restore unconditionally.
    pub fn test_style_modifications(
        &self,
        el: ElementHandle,
        mods: &[(String, String)],
    ) -> Result<StyleModificationReport, ElementError> {
        let before = self.analyze(el);

        let guard = StyleOverride::apply(self.facade, el, mods)?;
        let after = self.analyze(el);
        let comparison = mods
            .iter()
            .map(|(property, _)| PropertyChange {
                property: property.clone(),
                before: before_value(&before, property),
                after: self.style(el, property, ""),
            })
            .collect();
        guard.restore()?;

        let accessibility_impact = compare_impact(&before, &after);
        Ok(StyleModificationReport { before, after, comparison, accessibility_impact })
    }
}

fn before_value(analysis: &CssAnalysis, property: &str) -> String {
    match property {
        "color" => analysis.color.color.clone(),
        "background-color" => analysis.color.background_color.clone(),
        "font-size" => format!("{}px", analysis.typography.font_size_px),
        "display" => analysis.layout.display.clone(),
        "outline-style" => analysis.interaction.outline_style.clone(),
        _ => String::new(),
    }
}

fn compare_impact(before: &CssAnalysis, after: &CssAnalysis) -> AccessibilityImpact {
    let mut impact = AccessibilityImpact::default();

    let before_issues: std::collections::BTreeSet<_> =
        before.all_issues().into_iter().map(str::to_string).collect();
    let after_issues: std::collections::BTreeSet<_> =
        after.all_issues().into_iter().map(str::to_string).collect();

    for resolved in before_issues.difference(&after_issues) {
        impact.improved.push(format!("resolved: {}", resolved));
    }
    for introduced in after_issues.difference(&before_issues) {
        impact.regressed.push(format!("introduced: {}", introduced));
    }

    let score_delta = i64::from(after.typography.readability_score)
        - i64::from(before.typography.readability_score);
    if score_delta > 0 {
        impact.improved.push(format!("readability score +{}", score_delta));
    } else if score_delta < 0 {
        impact.regressed.push(format!("readability score {}", score_delta));
    }

    impact.verdict = match (impact.improved.is_empty(), impact.regressed.is_empty()) {
        (true, true) => "no accessibility change".to_string(),
        (false, true) => "improvement".to_string(),
        (true, false) => "regression".to_string(),
        (false, false) => "mixed".to_string(),
    };
    impact
}
