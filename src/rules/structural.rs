// SPDX-License-Identifier: PMPL-1.0-or-later
//! Structural HTML rule family.
//!
//! Page-level checks over document structure: titles, language, text
//! alternatives, labels, heading order, id uniqueness. Violation ids are
//! unprefixed; the CSS and JS families carry `css-`/`js-` prefixes so the
//! merged ledger stays collision-free.

use crate::error::RuleError;
use crate::facade::DomFacade;
use crate::rules::{Impact, NodeRef, Rule, RuleCheck, RuleRegistry, WcagLevel};
use serde_json::json;
use std::collections::HashMap;

/// Target for structural rules: the whole current page.
pub struct StructuralContext<'a> {
    pub facade: &'a dyn DomFacade,
}

/// Build the structural registry in its fixed registration order.
pub fn registry<'a>() -> RuleRegistry<StructuralContext<'a>> {
    let mut registry = RuleRegistry::new("structural");

    registry.register(
        Rule::new("page-has-title", "Page has a title", page_has_title)
            .impact(Impact::Serious)
            .wcag("2.4.2", WcagLevel::A)
            .describe(
                "Documents must have a non-empty <title> element",
                "Add a <title> that describes the page's topic or purpose",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/page-titled"),
    );
    registry.register(
        Rule::new("html-has-lang", "Document has a language", html_has_lang)
            .impact(Impact::Serious)
            .wcag("3.1.1", WcagLevel::A)
            .describe(
                "The <html> element must declare a lang attribute",
                "Add lang=\"en\" (or the page's language) to the <html> element",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/language-of-page"),
    );
    registry.register(
        Rule::new("images-have-alt", "Images have text alternatives", images_have_alt)
            .impact(Impact::Critical)
            .wcag("1.1.1", WcagLevel::A)
            .describe(
                "Every <img> must have an alt attribute",
                "Add alt=\"description\" for informative images or alt=\"\" for decorative images",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/non-text-content"),
    );
    registry.register(
        Rule::new("links-have-text", "Links have discernible text", links_have_text)
            .impact(Impact::Serious)
            .wcag("2.4.4", WcagLevel::A)
            .describe(
                "Every link must expose an accessible name",
                "Give the link visible text, an aria-label, or a labelled image",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/link-purpose-in-context"),
    );
    registry.register(
        Rule::new("buttons-have-text", "Buttons have accessible names", buttons_have_text)
            .impact(Impact::Critical)
            .wcag("4.1.2", WcagLevel::A)
            .describe(
                "Every button must expose an accessible name",
                "Give the button visible text, an aria-label, or a value",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/name-role-value"),
    );
    registry.register(
        Rule::new("form-labels", "Form fields are labelled", form_labels)
            .impact(Impact::Critical)
            .wcag("3.3.2", WcagLevel::A)
            .describe(
                "Form fields must be programmatically associated with a label",
                "Associate a <label for> with the field, or add aria-label/aria-labelledby",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/labels-or-instructions"),
    );
    registry.register(
        Rule::new("heading-order", "Heading levels descend in order", heading_order)
            .impact(Impact::Moderate)
            .wcag("1.3.1", WcagLevel::A)
            .describe(
                "Heading levels should not skip (h2 followed by h4)",
                "Restructure headings so each level increases by at most one",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/info-and-relationships"),
    );
    registry.register(
        Rule::new("duplicate-ids", "Element ids are unique", duplicate_ids)
            .impact(Impact::Minor)
            .wcag("4.1.1", WcagLevel::A)
            .describe(
                "id attribute values must be unique within the document",
                "Rename duplicated ids; assistive technology resolves the first match only",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/parsing"),
    );
    registry.register(
        Rule::new(
            "meta-viewport-scalable",
            "Viewport allows zooming",
            meta_viewport_scalable,
        )
        .impact(Impact::Critical)
        .wcag("1.4.4", WcagLevel::AA)
        .describe(
            "The viewport meta tag must not disable user scaling",
            "Remove user-scalable=no and maximum-scale restrictions from the viewport meta tag",
        )
        .help_url("https://www.w3.org/WAI/WCAG21/Understanding/resize-text"),
    );
    registry.register(
        Rule::new("frames-have-title", "Frames are titled", frames_have_title)
            .impact(Impact::Serious)
            .wcag("4.1.2", WcagLevel::A)
            .describe(
                "Every <iframe> and <frame> must have a title attribute",
                "Add title=\"purpose of the frame\" to each frame element",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/name-role-value"),
    );
    registry.register(
        Rule::new("skip-link", "Page offers a skip link", skip_link)
            .impact(Impact::Moderate)
            .wcag("2.4.1", WcagLevel::A)
            .describe(
                "Pages with navigation should let keyboard users skip to content",
                "Add <a href=\"#main\">Skip to main content</a> as the first focusable element",
            )
            .help_url("https://www.w3.org/WAI/WCAG21/Understanding/bypass-blocks"),
    );

    registry
}

fn page_has_title(ctx: &StructuralContext<'_>) -> Result<RuleCheck, RuleError> {
    let facade = ctx.facade;
    let titles = facade.find_all("title")?;

    match titles.first() {
        None => Ok(RuleCheck::violation(
            "Document has no <title> element",
            vec![NodeRef::synthetic("html", "<html>")],
        )),
        Some(&title) => {
            let text = facade.text(title)?;
            if text.trim().is_empty() {
                Ok(RuleCheck::violation(
                    "Document <title> is empty",
                    vec![NodeRef::capture(facade, title)],
                ))
            } else {
                Ok(RuleCheck::pass(format!("Page title: \"{}\"", text.trim()))
                    .with_nodes(vec![NodeRef::capture(facade, title)]))
            }
        }
    }
}

fn html_has_lang(ctx: &StructuralContext<'_>) -> Result<RuleCheck, RuleError> {
    let facade = ctx.facade;
    let html = facade
        .find_all("html")?
        .into_iter()
        .next()
        .ok_or_else(|| RuleError::check("document has no root element"))?;

    match facade.attribute(html, "lang")? {
        Some(lang) if !lang.trim().is_empty() => {
            Ok(RuleCheck::pass(format!("Document language: {}", lang)))
        }
        _ => Ok(RuleCheck::violation(
            "The <html> element has no lang attribute",
            vec![NodeRef::synthetic("html", "<html>")],
        )
        .with_fix("Add lang=\"en\" (or the page's language) to <html>")),
    }
}

fn images_have_alt(ctx: &StructuralContext<'_>) -> Result<RuleCheck, RuleError> {
    let facade = ctx.facade;
    let mut violations = Vec::new();
    let mut passes = Vec::new();
    let mut unreadable = 0usize;

    let images = facade.find_all("img")?;
    let total = images.len();
    for img in images {
        match facade.attribute(img, "alt") {
            Ok(Some(_)) => passes.push(NodeRef::capture(facade, img)),
            Ok(None) => violations.push(NodeRef::capture(facade, img)),
            Err(_) => unreadable += 1,
        }
    }

    if unreadable == total && total > 0 {
        return Ok(RuleCheck::incomplete("no <img> element could be read"));
    }

    if violations.is_empty() {
        Ok(RuleCheck::pass(format!("All {} images carry alt attributes", passes.len()))
            .with_nodes(passes))
    } else {
        Ok(RuleCheck::violation(
            format!("{} of {} images lack an alt attribute", violations.len(), total),
            violations,
        )
        .with_passed_nodes(passes)
        .with_details(json!({ "unreadable_elements": unreadable }))
        .with_fix("Add alt=\"description\" for informative images or alt=\"\" for decorative ones"))
    }
}

fn links_have_text(ctx: &StructuralContext<'_>) -> Result<RuleCheck, RuleError> {
    let facade = ctx.facade;
    let mut violations = Vec::new();
    let mut passes = Vec::new();

    for link in facade.find_all("a[href]")? {
        let text = facade.text(link).unwrap_or_default();
        let aria_label = facade.attribute(link, "aria-label").unwrap_or(None);
        let title = facade.attribute(link, "title").unwrap_or(None);

        let named = !text.trim().is_empty()
            || aria_label.map(|l| !l.trim().is_empty()).unwrap_or(false)
            || title.map(|t| !t.trim().is_empty()).unwrap_or(false);

        if named {
            passes.push(NodeRef::capture(facade, link));
        } else {
            violations.push(NodeRef::capture(facade, link));
        }
    }

    if violations.is_empty() {
        Ok(RuleCheck::pass(format!("{} links expose a name", passes.len())).with_nodes(passes))
    } else {
        Ok(RuleCheck::violation(
            format!("{} links have no discernible text", violations.len()),
            violations,
        )
        .with_passed_nodes(passes))
    }
}

fn buttons_have_text(ctx: &StructuralContext<'_>) -> Result<RuleCheck, RuleError> {
    let facade = ctx.facade;
    let mut violations = Vec::new();
    let mut passes = Vec::new();

    for button in facade.find_all("button, input[type=\"button\"], input[type=\"submit\"]")? {
        let text = facade.text(button).unwrap_or_default();
        let aria_label = facade.attribute(button, "aria-label").unwrap_or(None);
        let value = facade.attribute(button, "value").unwrap_or(None);

        let named = !text.trim().is_empty()
            || aria_label.map(|l| !l.trim().is_empty()).unwrap_or(false)
            || value.map(|v| !v.trim().is_empty()).unwrap_or(false);

        if named {
            passes.push(NodeRef::capture(facade, button));
        } else {
            violations.push(NodeRef::capture(facade, button));
        }
    }

    if violations.is_empty() {
        Ok(RuleCheck::pass(format!("{} buttons expose a name", passes.len())).with_nodes(passes))
    } else {
        Ok(RuleCheck::violation(
            format!("{} buttons have no accessible name", violations.len()),
            violations,
        )
        .with_passed_nodes(passes))
    }
}

/// Fields that need a label: text-entry inputs, selects, textareas.
fn needs_label(facade: &dyn DomFacade, el: crate::facade::ElementHandle) -> bool {
    match facade.tag_name(el).as_deref() {
        Ok("select") | Ok("textarea") => true,
        Ok("input") => {
            let input_type = facade
                .attribute(el, "type")
                .unwrap_or(None)
                .unwrap_or_else(|| "text".to_string())
                .to_lowercase();
            !matches!(
                input_type.as_str(),
                "hidden" | "submit" | "button" | "reset" | "image"
            )
        }
        _ => false,
    }
}

fn form_labels(ctx: &StructuralContext<'_>) -> Result<RuleCheck, RuleError> {
    let facade = ctx.facade;
    let mut violations = Vec::new();
    let mut passes = Vec::new();

    for field in facade.find_all("input, select, textarea")? {
        if !needs_label(facade, field) {
            continue;
        }

        let has_aria = facade.attribute(field, "aria-label").unwrap_or(None).is_some()
            || facade.attribute(field, "aria-labelledby").unwrap_or(None).is_some()
            || facade.attribute(field, "title").unwrap_or(None).is_some();

        let has_label_for = match facade.attribute(field, "id").unwrap_or(None) {
            Some(id) if !id.is_empty() => {
                !facade.find_all(&format!("label[for=\"{}\"]", id))?.is_empty()
            }
            _ => false,
        };

        if has_aria || has_label_for {
            passes.push(NodeRef::capture(facade, field));
        } else {
            violations.push(NodeRef::capture(facade, field));
        }
    }

    if violations.is_empty() {
        Ok(RuleCheck::pass(format!("{} form fields are labelled", passes.len()))
            .with_nodes(passes))
    } else {
        Ok(RuleCheck::violation(
            format!("{} form fields have no label", violations.len()),
            violations,
        )
        .with_passed_nodes(passes)
        .with_fix("Associate a <label for> with each field or add aria-label"))
    }
}

fn heading_order(ctx: &StructuralContext<'_>) -> Result<RuleCheck, RuleError> {
    let facade = ctx.facade;
    let headings = facade.find_all("h1, h2, h3, h4, h5, h6")?;
    if headings.is_empty() {
        return Ok(RuleCheck::pass("No headings to order"));
    }

    let mut violations = Vec::new();
    let mut previous_level: Option<u32> = None;
    for heading in &headings {
        let tag = facade.tag_name(*heading)?;
        let level = tag
            .strip_prefix('h')
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(|| RuleError::check(format!("unexpected heading tag {}", tag)))?;
        if let Some(prev) = previous_level {
            if level > prev + 1 {
                violations.push(NodeRef::capture(facade, *heading).with_details(json!({
                    "previous_level": prev,
                    "level": level,
                })));
            }
        }
        previous_level = Some(level);
    }

    if violations.is_empty() {
        Ok(RuleCheck::pass(format!("{} headings descend in order", headings.len())))
    } else {
        Ok(RuleCheck::violation(
            format!("{} headings skip a level", violations.len()),
            violations,
        ))
    }
}

fn duplicate_ids(ctx: &StructuralContext<'_>) -> Result<RuleCheck, RuleError> {
    let facade = ctx.facade;
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut violations = Vec::new();

    for el in facade.find_all("[id]")? {
        let Some(id) = facade.attribute(el, "id").unwrap_or(None) else { continue };
        if id.is_empty() {
            continue;
        }
        let count = seen.entry(id.clone()).or_insert(0);
        *count += 1;
        if *count == 2 {
            violations.push(
                NodeRef::capture(facade, el).with_details(json!({ "duplicated_id": id })),
            );
        }
    }

    if violations.is_empty() {
        Ok(RuleCheck::pass(format!("{} ids are unique", seen.len())))
    } else {
        Ok(RuleCheck::violation(
            format!("{} id values are duplicated", violations.len()),
            violations,
        ))
    }
}

fn meta_viewport_scalable(ctx: &StructuralContext<'_>) -> Result<RuleCheck, RuleError> {
    let facade = ctx.facade;
    let metas = facade.find_all("meta[name=\"viewport\"]")?;
    let Some(&meta) = metas.first() else {
        return Ok(RuleCheck::pass("No viewport meta tag restricts zooming"));
    };

    let content = facade
        .attribute(meta, "content")?
        .unwrap_or_default()
        .to_lowercase()
        .replace(' ', "");
    let blocks_zoom = content.contains("user-scalable=no")
        || content.contains("user-scalable=0")
        || content.contains("maximum-scale=1.0")
        || content.contains("maximum-scale=1,")
        || content.ends_with("maximum-scale=1");

    if blocks_zoom {
        Ok(RuleCheck::violation(
            "Viewport meta tag disables pinch zoom",
            vec![NodeRef::capture(facade, meta)],
        )
        .with_fix("Remove user-scalable=no and allow maximum-scale of at least 2"))
    } else {
        Ok(RuleCheck::pass("Viewport allows user scaling"))
    }
}

fn frames_have_title(ctx: &StructuralContext<'_>) -> Result<RuleCheck, RuleError> {
    let facade = ctx.facade;
    let mut violations = Vec::new();
    let mut passes = Vec::new();

    for frame in facade.find_all("iframe, frame")? {
        match facade.attribute(frame, "title").unwrap_or(None) {
            Some(title) if !title.trim().is_empty() => {
                passes.push(NodeRef::capture(facade, frame))
            }
            _ => violations.push(NodeRef::capture(facade, frame)),
        }
    }

    if violations.is_empty() {
        Ok(RuleCheck::pass(format!("{} frames are titled", passes.len())))
    } else {
        Ok(RuleCheck::violation(
            format!("{} frames have no title", violations.len()),
            violations,
        )
        .with_passed_nodes(passes))
    }
}

fn skip_link(ctx: &StructuralContext<'_>) -> Result<RuleCheck, RuleError> {
    let facade = ctx.facade;
    // Only meaningful on pages with real navigation.
    if facade.find_all("nav")?.is_empty() {
        return Ok(RuleCheck::pass("Page has no navigation to bypass"));
    }

    let has_skip = facade.find_all("a[href^=\"#\"]")?.into_iter().any(|link| {
        let href = facade.attribute(link, "href").unwrap_or(None).unwrap_or_default();
        let text = facade.text(link).unwrap_or_default().to_lowercase();
        href == "#main" || href == "#content" || href == "#main-content" || text.contains("skip")
    });

    if has_skip {
        Ok(RuleCheck::pass("Skip navigation link present"))
    } else {
        Ok(RuleCheck::violation(
            "Page has navigation but no skip link",
            vec![NodeRef::synthetic("body", "<body>")],
        )
        .with_fix("Add <a href=\"#main\" class=\"sr-only\">Skip to main content</a> as the first child of <body>"))
    }
}
