// SPDX-License-Identifier: PMPL-1.0-or-later
//! Static snapshot facade - a [`DomFacade`] over parsed HTML.
//!
//! Backs the CLI and the test suite: parses an HTML snapshot with `scraper`,
//! extracts embedded stylesheets, and answers computed-style queries through
//! a simplified cascade (inline > id > class > tag, later rules win ties,
//! inherited properties walk up the tree, everything else falls back to the
//! property's CSS initial value).
//!
//! Limitations are those of any snapshot: no layout engine, so `width` and
//! `height` resolve only when authored, and `eval_script` reports a script
//! error rather than executing anything.

use crate::error::{ElementError, FacadeError};
use crate::facade::{DomFacade, ElementHandle};
use scraper::{ElementRef, Html, Selector};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Inline declarations outrank any stylesheet selector.
const INLINE_SPECIFICITY: u32 = 1_000;

/// Properties that inherit from the parent element when unset.
const INHERITED_PROPERTIES: &[&str] = &[
    "color",
    "cursor",
    "font-size",
    "font-weight",
    "letter-spacing",
    "line-height",
    "visibility",
];

/// One parsed stylesheet rule: a simple selector and its declarations.
#[derive(Debug, Clone)]
struct StyleRule {
    selector: SimpleSelector,
    specificity: u32,
    declarations: Vec<(String, String)>,
}

/// Subject compound of a selector: tag, id, classes, attribute presence.
///
/// Descendant combinators are matched on the subject only; selectors with
/// pseudo-classes are skipped entirely (a snapshot has no :hover/:focus
/// state to resolve).
#[derive(Debug, Clone, Default)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl SimpleSelector {
    fn parse(compound: &str) -> Option<Self> {
        if compound.contains(':') {
            return None;
        }
        let mut sel = SimpleSelector::default();
        let mut rest = compound.trim();
        if rest.is_empty() || rest == "*" {
            return Some(sel);
        }

        // Leading tag name
        let tag_end = rest
            .find(|c| c == '.' || c == '#' || c == '[')
            .unwrap_or(rest.len());
        if tag_end > 0 {
            sel.tag = Some(rest[..tag_end].to_lowercase());
            rest = &rest[tag_end..];
        }

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('.') {
                let end = after
                    .find(|c| c == '.' || c == '#' || c == '[')
                    .unwrap_or(after.len());
                sel.classes.push(after[..end].to_string());
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('#') {
                let end = after
                    .find(|c| c == '.' || c == '#' || c == '[')
                    .unwrap_or(after.len());
                sel.id = Some(after[..end].to_string());
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let end = after.find(']')?;
                let body = &after[..end];
                match body.split_once('=') {
                    Some((name, value)) => sel.attributes.push((
                        name.trim().to_lowercase(),
                        Some(value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()),
                    )),
                    None => sel.attributes.push((body.trim().to_lowercase(), None)),
                }
                rest = &after[end + 1..];
            } else {
                return None;
            }
        }
        Some(sel)
    }

    fn specificity(&self) -> u32 {
        let ids = self.id.is_some() as u32;
        let classes = self.classes.len() as u32 + self.attributes.len() as u32;
        let tags = self.tag.is_some() as u32;
        ids * 100 + classes * 10 + tags
    }

    fn matches(&self, el: &ElementRef<'_>) -> bool {
        let value = el.value();
        if let Some(ref tag) = self.tag {
            if value.name() != tag {
                return false;
            }
        }
        if let Some(ref id) = self.id {
            if value.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        for class in &self.classes {
            if !value.classes().any(|c| c == class) {
                return false;
            }
        }
        for (name, expected) in &self.attributes {
            match (value.attr(name), expected) {
                (None, _) => return false,
                (Some(actual), Some(expected)) if actual != expected => return false,
                _ => {}
            }
        }
        true
    }
}

/// DOM facade over a parsed HTML snapshot.
pub struct StaticDom {
    document: Html,
    handles: Vec<ego_tree::NodeId>,
    index: HashMap<ego_tree::NodeId, u64>,
    styles: Vec<StyleRule>,
    /// Inline style overrides applied through `set_inline_style`.
    /// `Some(None)` records an explicit removal.
    overrides: RefCell<HashMap<u64, Option<String>>>,
    url: String,
}

impl StaticDom {
    pub fn from_html(html: &str) -> Self {
        Self::from_html_with_url(html, "about:blank")
    }

    pub fn from_html_with_url(html: &str, url: &str) -> Self {
        let document = Html::parse_document(html);
        let universal = Selector::parse("*").expect("valid selector");
        let handles: Vec<_> = document.select(&universal).map(|el| el.id()).collect();
        let index = handles
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, idx as u64))
            .collect();

        let style_sel = Selector::parse("style").expect("valid selector");
        let mut styles = Vec::new();
        for style_el in document.select(&style_sel) {
            let css: String = style_el.text().collect();
            styles.extend(parse_stylesheet(&css));
        }

        StaticDom {
            document,
            handles,
            index,
            styles,
            overrides: RefCell::new(HashMap::new()),
            url: url.to_string(),
        }
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let html = std::fs::read_to_string(path)?;
        Ok(Self::from_html_with_url(&html, &format!("file://{}", path.display())))
    }

    fn element(&self, handle: ElementHandle) -> Result<ElementRef<'_>, ElementError> {
        let node_id = self
            .handles
            .get(handle.id() as usize)
            .copied()
            .ok_or(ElementError::Detached)?;
        self.document
            .tree
            .get(node_id)
            .and_then(ElementRef::wrap)
            .ok_or(ElementError::Detached)
    }

    fn handle_for(&self, el: &ElementRef<'_>) -> Option<ElementHandle> {
        // Handles are assigned in document order at construction.
        self.index.get(&el.id()).map(|&idx| ElementHandle::new(idx))
    }

    /// Effective inline style text for an element, override first.
    fn effective_inline(&self, handle: ElementHandle) -> Result<Option<String>, ElementError> {
        if let Some(stored) = self.overrides.borrow().get(&handle.id()) {
            return Ok(stored.clone());
        }
        let el = self.element(handle)?;
        Ok(el.value().attr("style").map(str::to_string))
    }

    /// Best-matching declaration for a property on one element, or `None`.
    fn declared_value(
        &self,
        handle: ElementHandle,
        property: &str,
    ) -> Result<Option<String>, ElementError> {
        let el = self.element(handle)?;
        let mut best: Option<(u32, usize, String)> = None;

        for (order, rule) in self.styles.iter().enumerate() {
            if !rule.selector.matches(&el) {
                continue;
            }
            for (prop, value) in &rule.declarations {
                if prop == property {
                    let candidate = (rule.specificity, order, value.clone());
                    if best
                        .as_ref()
                        .map(|(s, o, _)| (candidate.0, candidate.1) >= (*s, *o))
                        .unwrap_or(true)
                    {
                        best = Some(candidate);
                    }
                }
            }
        }

        if let Some(inline) = self.effective_inline(handle)? {
            for (prop, value) in expand_all(parse_declarations(&inline)) {
                if prop == property {
                    best = Some((INLINE_SPECIFICITY, usize::MAX, value));
                }
            }
        }

        Ok(best.map(|(_, _, value)| value))
    }

    fn resolve_style(
        &self,
        handle: ElementHandle,
        property: &str,
    ) -> Result<String, ElementError> {
        if let Some(value) = self.declared_value(handle, property)? {
            if value != "inherit" {
                return Ok(value);
            }
        }

        if INHERITED_PROPERTIES.contains(&property) {
            let el = self.element(handle)?;
            let mut parent = el.parent().and_then(ElementRef::wrap);
            while let Some(p) = parent {
                if let Some(parent_handle) = self.handle_for(&p) {
                    if let Some(value) = self.declared_value(parent_handle, property)? {
                        if value != "inherit" {
                            return Ok(value);
                        }
                    }
                }
                parent = p.parent().and_then(ElementRef::wrap);
            }
        }

        let el = self.element(handle)?;
        Ok(initial_value(el.value().name(), property).to_string())
    }
}

impl DomFacade for StaticDom {
    fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>, FacadeError> {
        let parsed = Selector::parse(selector)
            .map_err(|_| FacadeError::Selector(selector.to_string()))?;
        Ok(self
            .document
            .select(&parsed)
            .filter_map(|el| self.handle_for(&el))
            .collect())
    }

    fn tag_name(&self, el: ElementHandle) -> Result<String, ElementError> {
        Ok(self.element(el)?.value().name().to_lowercase())
    }

    fn attribute(&self, el: ElementHandle, name: &str) -> Result<Option<String>, ElementError> {
        if name.eq_ignore_ascii_case("style") {
            return self.effective_inline(el);
        }
        Ok(self.element(el)?.value().attr(name).map(str::to_string))
    }

    fn computed_style(&self, el: ElementHandle, property: &str) -> Result<String, ElementError> {
        self.resolve_style(el, &property.to_lowercase())
    }

    fn text(&self, el: ElementHandle) -> Result<String, ElementError> {
        Ok(self.element(el)?.text().collect::<String>())
    }

    fn outer_html(&self, el: ElementHandle) -> Result<String, ElementError> {
        Ok(self.element(el)?.html())
    }

    fn inline_style(&self, el: ElementHandle) -> Result<Option<String>, ElementError> {
        self.effective_inline(el)
    }

    fn set_inline_style(
        &self,
        el: ElementHandle,
        css_text: Option<&str>,
    ) -> Result<(), ElementError> {
        self.element(el)?;
        self.overrides
            .borrow_mut()
            .insert(el.id(), css_text.map(str::to_string));
        Ok(())
    }

    fn eval_script(&self, _code: &str) -> Result<serde_json::Value, FacadeError> {
        Err(FacadeError::Script(
            "script evaluation is not supported by the static facade".to_string(),
        ))
    }

    fn current_url(&self) -> Result<String, FacadeError> {
        Ok(self.url.clone())
    }

    fn title(&self) -> Result<String, FacadeError> {
        let sel = Selector::parse("title").expect("valid selector");
        Ok(self
            .document
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default())
    }

    fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), FacadeError> {
        // A snapshot cannot change; the wait degenerates to a presence check.
        if self.find_all(selector)?.is_empty() {
            return Err(FacadeError::Timeout {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }
}

/// Parse a stylesheet into simple rules.
///
/// Comments are stripped, `@media` blocks are flattened into their inner
/// rules, other at-rules (`@keyframes`, `@font-face`, ...) are skipped.
fn parse_stylesheet(css: &str) -> Vec<StyleRule> {
    let css = strip_comments(css);
    let mut rules = Vec::new();
    collect_rules(&css, &mut rules);
    rules
}

fn collect_rules(css: &str, rules: &mut Vec<StyleRule>) {
    let mut rest = css;
    while let Some(open) = rest.find('{') {
        let prelude = rest[..open].trim().to_string();
        let Some(close) = matching_brace(rest, open) else { return };
        let body = &rest[open + 1..close];

        if let Some(at_rule) = prelude.strip_prefix('@') {
            if at_rule.starts_with("media") || at_rule.starts_with("supports") {
                collect_rules(body, rules);
            }
            // Other at-rules carry no element declarations.
        } else {
            let declarations = expand_all(parse_declarations(body));
            if !declarations.is_empty() {
                for selector_text in prelude.split(',') {
                    // Match the subject compound of descendant selectors.
                    let subject = selector_text.split_whitespace().last().unwrap_or("");
                    if let Some(selector) = SimpleSelector::parse(subject) {
                        rules.push(StyleRule {
                            specificity: selector.specificity(),
                            selector,
                            declarations: declarations.clone(),
                        });
                    }
                }
            }
        }
        rest = &rest[close + 1..];
    }
}

fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in text[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start..].find("*/") {
            Some(end) => rest = &rest[start + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Split a declaration block into lowercase-property pairs.
fn parse_declarations(body: &str) -> Vec<(String, String)> {
    body.split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_lowercase();
            let value = value.trim().trim_end_matches("!important").trim().to_string();
            (!prop.is_empty() && !value.is_empty()).then_some((prop, value))
        })
        .collect()
}

fn expand_all(declarations: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut out = Vec::with_capacity(declarations.len());
    for (prop, value) in declarations {
        out.extend(expand_declaration(&prop, &value));
    }
    out
}

/// Derive the longhand values the engine queries from common shorthands.
fn expand_declaration(prop: &str, value: &str) -> Vec<(String, String)> {
    let mut out = vec![(prop.to_string(), value.to_string())];
    match prop {
        "outline" => {
            let style = if value == "none" || value == "0" || value.split_whitespace().any(|t| t == "none") {
                "none"
            } else {
                "solid"
            };
            out.push(("outline-style".to_string(), style.to_string()));
        }
        "animation" => {
            if let Some(time) = first_time_token(value) {
                out.push(("animation-duration".to_string(), time));
            }
        }
        "transition" => {
            if let Some(time) = first_time_token(value) {
                out.push(("transition-duration".to_string(), time));
            }
        }
        "background" => {
            if let Some(color) = value.split_whitespace().find(|t| is_color_token(t)) {
                out.push(("background-color".to_string(), color.to_string()));
            }
        }
        "text-decoration" => {
            out.push(("text-decoration-line".to_string(), value.to_string()));
        }
        _ => {}
    }
    out
}

fn first_time_token(value: &str) -> Option<String> {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .find(|t| t.ends_with("ms") || (t.ends_with('s') && t.len() > 1 && t[..t.len() - 1].parse::<f64>().is_ok()))
        .map(str::to_string)
}

fn is_color_token(token: &str) -> bool {
    token.starts_with('#')
        || token.starts_with("rgb")
        || token.starts_with("hsl")
        || matches!(
            token,
            "white" | "black" | "red" | "green" | "blue" | "yellow" | "gray" | "grey"
                | "transparent" | "orange" | "purple" | "silver" | "navy" | "teal"
        )
}

/// Documented CSS initial value, with display defaulted per tag.
fn initial_value(tag: &str, property: &str) -> &'static str {
    match property {
        "display" => default_display(tag),
        "visibility" => "visible",
        "opacity" => "1",
        "color" => "rgb(0, 0, 0)",
        "background-color" => "rgba(0, 0, 0, 0)",
        "font-size" => "16px",
        "font-weight" => "400",
        "line-height" => "normal",
        "letter-spacing" => "normal",
        // Native interactive elements keep the user-agent focus ring unless
        // an author style suppresses it.
        "outline-style" => {
            if matches!(tag, "a" | "button" | "input" | "select" | "textarea" | "summary") {
                "auto"
            } else {
                "none"
            }
        }
        "outline-width" => "medium",
        "box-shadow" => "none",
        "cursor" => "auto",
        "width" | "height" => "auto",
        "animation-duration" | "transition-duration" => "0s",
        "position" => "static",
        "overflow" => "visible",
        // Links are underlined by the user-agent stylesheet.
        "text-decoration-line" => {
            if tag == "a" {
                "underline"
            } else {
                "none"
            }
        }
        _ => "",
    }
}

fn default_display(tag: &str) -> &'static str {
    match tag {
        "div" | "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "ul" | "ol" | "section"
        | "article" | "nav" | "header" | "footer" | "main" | "aside" | "form" | "fieldset"
        | "blockquote" | "pre" | "hr" | "address" | "figure" | "body" | "html" | "dialog" => "block",
        "li" => "list-item",
        "table" => "table",
        "button" | "input" | "select" | "textarea" | "img" => "inline-block",
        "script" | "style" | "head" | "meta" | "link" | "title" | "template" => "none",
        _ => "inline",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title> Sample </title>
        <style>
            /* base */
            p { color: #333; font-size: 12px; }
            .hero { font-size: 24px; }
            #cta { color: rgb(200, 0, 0); }
            button { outline: none; }
            @media (max-width: 600px) { p { font-size: 10px; } }
            @keyframes spin { from { opacity: 0; } }
        </style></head>
        <body>
            <p id="first">hello</p>
            <p class="hero" id="cta">go</p>
            <button style="width: 30px; height: 30px">Buy</button>
            <span>plain</span>
        </body></html>"#;

    #[test]
    fn test_find_all_document_order() {
        let dom = StaticDom::from_html(PAGE);
        let paras = dom.find_all("p").unwrap();
        assert_eq!(paras.len(), 2);
        assert_eq!(dom.attribute(paras[0], "id").unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn test_cascade_specificity() {
        let dom = StaticDom::from_html(PAGE);
        let paras = dom.find_all("p").unwrap();
        // Tag rule applies to the first paragraph...
        assert_eq!(dom.computed_style(paras[0], "color").unwrap(), "#333");
        // ...but the id selector outranks it on the second, and the later
        // media-flattened tag rule outranks the earlier tag rule for size.
        assert_eq!(dom.computed_style(paras[1], "color").unwrap(), "rgb(200, 0, 0)");
        assert_eq!(dom.computed_style(paras[1], "font-size").unwrap(), "24px");
        assert_eq!(dom.computed_style(paras[0], "font-size").unwrap(), "10px");
    }

    #[test]
    fn test_initial_value_fallback() {
        let dom = StaticDom::from_html(PAGE);
        let spans = dom.find_all("span").unwrap();
        assert_eq!(dom.computed_style(spans[0], "font-size").unwrap(), "16px");
        assert_eq!(dom.computed_style(spans[0], "display").unwrap(), "inline");
        assert_eq!(dom.computed_style(spans[0], "background-color").unwrap(), "rgba(0, 0, 0, 0)");
    }

    #[test]
    fn test_outline_shorthand_expansion() {
        let dom = StaticDom::from_html(PAGE);
        let buttons = dom.find_all("button").unwrap();
        assert_eq!(dom.computed_style(buttons[0], "outline-style").unwrap(), "none");
    }

    #[test]
    fn test_inline_style_wins() {
        let dom = StaticDom::from_html(PAGE);
        let buttons = dom.find_all("button").unwrap();
        assert_eq!(dom.computed_style(buttons[0], "width").unwrap(), "30px");
        assert_eq!(dom.computed_style(buttons[0], "height").unwrap(), "30px");
    }

    #[test]
    fn test_inline_override_and_restore() {
        let dom = StaticDom::from_html(PAGE);
        let buttons = dom.find_all("button").unwrap();
        let el = buttons[0];
        let original = dom.inline_style(el).unwrap();

        dom.set_inline_style(el, Some("width: 60px; height: 60px")).unwrap();
        assert_eq!(dom.computed_style(el, "width").unwrap(), "60px");

        dom.set_inline_style(el, original.as_deref()).unwrap();
        assert_eq!(dom.computed_style(el, "width").unwrap(), "30px");
    }

    #[test]
    fn test_inheritance() {
        let dom = StaticDom::from_html(
            r#"<html><head><style>body { color: #222; font-size: 18px; }</style></head>
               <body><div><span>nested</span></div></body></html>"#,
        );
        let spans = dom.find_all("span").unwrap();
        assert_eq!(dom.computed_style(spans[0], "color").unwrap(), "#222");
        assert_eq!(dom.computed_style(spans[0], "font-size").unwrap(), "18px");
    }

    #[test]
    fn test_title_and_url() {
        let dom = StaticDom::from_html_with_url(PAGE, "https://example.com/a");
        assert_eq!(dom.title().unwrap(), "Sample");
        assert_eq!(dom.current_url().unwrap(), "https://example.com/a");
    }

    #[test]
    fn test_wait_for() {
        let dom = StaticDom::from_html(PAGE);
        assert!(dom.wait_for("body", Duration::from_millis(100)).is_ok());
        let err = dom.wait_for("canvas", Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, FacadeError::Timeout { .. }));
    }

    #[test]
    fn test_eval_script_unsupported() {
        let dom = StaticDom::from_html(PAGE);
        let err = dom.eval_script("1 + 1").unwrap_err();
        assert!(matches!(err, FacadeError::Script(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_bad_selector() {
        let dom = StaticDom::from_html(PAGE);
        assert!(matches!(dom.find_all("p[["), Err(FacadeError::Selector(_))));
    }

    #[test]
    fn test_stale_handle() {
        let dom = StaticDom::from_html(PAGE);
        let bogus = ElementHandle::new(9_999);
        assert!(matches!(dom.tag_name(bogus), Err(ElementError::Detached)));
    }

    #[test]
    fn test_text_and_outer_html() {
        let dom = StaticDom::from_html(PAGE);
        let buttons = dom.find_all("button").unwrap();
        assert_eq!(dom.text(buttons[0]).unwrap(), "Buy");
        assert!(dom.outer_html(buttons[0]).unwrap().starts_with("<button"));
    }

    #[test]
    fn test_pseudo_class_selectors_skipped() {
        let dom = StaticDom::from_html(
            r#"<html><head><style>
                button:focus { outline-style: solid; }
                button { outline-style: none; }
            </style></head><body><button>x</button></body></html>"#,
        );
        let buttons = dom.find_all("button").unwrap();
        // The :focus rule describes a state the snapshot is not in.
        assert_eq!(dom.computed_style(buttons[0], "outline-style").unwrap(), "none");
    }
}
