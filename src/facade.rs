// SPDX-License-Identifier: PMPL-1.0-or-later
//! DOM query facade - the engine's only window onto a live page.
//!
//! Everything the rule engine knows about a page it learns through
//! [`DomFacade`]. The trait is deliberately narrow so the engine can run
//! against a real browser session (WebDriver, CDP) or against the bundled
//! [`StaticDom`](crate::static_dom::StaticDom) snapshot facade in tests and
//! CLI runs.
//!
//! The facade is a capability object: it is passed by reference down the
//! call chain and never stored in a global.

use crate::error::{ElementError, FacadeError};
use std::time::Duration;

/// Opaque handle to an element in the live document.
///
/// Handles are only meaningful to the facade that produced them and are
/// never re-resolved after a scan captures a [`NodeRef`](crate::rules::NodeRef)
/// snapshot from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(u64);

impl ElementHandle {
    pub fn new(id: u64) -> Self {
        ElementHandle(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Narrow query interface over a loaded document.
///
/// Two error channels: [`FacadeError`] for session-level failures (fatal to
/// the scan, or to one family for the recoverable variants) and
/// [`ElementError`] for per-element reads that rules must degrade on.
pub trait DomFacade {
    /// All elements matching a CSS selector, in document order.
    fn find_all(&self, selector: &str) -> std::result::Result<Vec<ElementHandle>, FacadeError>;

    /// Lowercase tag name of the element.
    fn tag_name(&self, el: ElementHandle) -> std::result::Result<String, ElementError>;

    /// Attribute value, `None` when the attribute is absent.
    fn attribute(
        &self,
        el: ElementHandle,
        name: &str,
    ) -> std::result::Result<Option<String>, ElementError>;

    /// Computed value of a single CSS property.
    ///
    /// Implementations fall back to the property's CSS initial value rather
    /// than erroring when the property was never set.
    fn computed_style(
        &self,
        el: ElementHandle,
        property: &str,
    ) -> std::result::Result<String, ElementError>;

    /// Concatenated text content of the element's subtree.
    fn text(&self, el: ElementHandle) -> std::result::Result<String, ElementError>;

    /// Outer markup of the element. Callers truncate before persisting.
    fn outer_html(&self, el: ElementHandle) -> std::result::Result<String, ElementError>;

    /// Current inline `style` attribute, `None` when absent.
    fn inline_style(&self, el: ElementHandle) -> std::result::Result<Option<String>, ElementError>;

    /// Replace (or with `None`, remove) the inline `style` attribute.
    ///
    /// This is the only mutating operation the engine performs, and every
    /// use goes through a scoped guard that restores the previous value.
    fn set_inline_style(
        &self,
        el: ElementHandle,
        css_text: Option<&str>,
    ) -> std::result::Result<(), ElementError>;

    /// Execute a script in the page and return its JSON-converted result.
    fn eval_script(&self, code: &str) -> std::result::Result<serde_json::Value, FacadeError>;

    /// URL of the current document.
    fn current_url(&self) -> std::result::Result<String, FacadeError>;

    /// Document title.
    fn title(&self) -> std::result::Result<String, FacadeError>;

    /// Block until the selector matches at least one element, or time out.
    fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> std::result::Result<(), FacadeError>;
}

/// Short human-readable descriptor for an element, e.g. `button#save.primary`.
pub fn describe_element(facade: &dyn DomFacade, el: ElementHandle) -> String {
    let tag = facade.tag_name(el).unwrap_or_else(|_| "unknown".to_string());
    let mut out = tag;
    if let Ok(Some(id)) = facade.attribute(el, "id") {
        if !id.is_empty() {
            out.push('#');
            out.push_str(&id);
        }
    }
    if let Ok(Some(classes)) = facade.attribute(el, "class") {
        for class in classes.split_whitespace().take(2) {
            out.push('.');
            out.push_str(class);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::static_dom::StaticDom;

    #[test]
    fn test_describe_element() {
        let dom = StaticDom::from_html(
            r#"<html><body><button id="save" class="primary large wide">Save</button></body></html>"#,
        );
        let buttons = dom.find_all("button").unwrap();
        assert_eq!(describe_element(&dom, buttons[0]), "button#save.primary.large");
    }

    #[test]
    fn test_describe_element_plain_tag() {
        let dom = StaticDom::from_html("<html><body><p>text</p></body></html>");
        let paras = dom.find_all("p").unwrap();
        assert_eq!(describe_element(&dom, paras[0]), "p");
    }
}
