//! Document context for grounded articles.
//!
//! An article can be grounded in pages of a source document. Page extraction
//! itself (PDF rasterising, vision calls) happens elsewhere; this module
//! reads its saved JSON output and flattens it into the context text the
//! planner prompt carries.
//!
//! The flattened form keeps the page's reading order, which the model needs
//! to follow the document's narrative:
//!
//! ```text
//! # Page 3: Volumes of Revolution
//!
//! ## Summary
//! Introduces the disc method.
//!
//! ## Key Definitions
//! - Disc method: ...
//!
//! ## Content (in reading order)
//!
//! ### [0] TEXT
//! **Heading:** The disc method
//! **Type:** paragraph
//! **Content:** ...
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid page extraction JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Structured content of one document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageExtraction {
    pub page_number: u32,
    pub main_topic: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_definitions: Vec<String>,
    #[serde(default)]
    pub content_flow: Vec<ContentElement>,
}

/// One element of a page. Exactly one of the payload fields is expected to
/// match `element_type`; elements whose payload is missing still appear in
/// the flattened output as a bare heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentElement {
    /// `"text"`, `"equation"` or `"diagram"`.
    pub element_type: String,
    /// Reading-order position (0-indexed).
    pub position: u32,
    #[serde(default)]
    pub text_section: Option<TextSection>,
    #[serde(default)]
    pub equation: Option<Equation>,
    #[serde(default)]
    pub diagram: Option<Diagram>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSection {
    #[serde(default)]
    pub heading: Option<String>,
    pub content: String,
    /// paragraph, definition, theorem, example, ...
    #[serde(default)]
    pub text_type: String,
    #[serde(default)]
    pub is_highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equation {
    pub latex: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub equation_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    pub description: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub figure_number: Option<String>,
    #[serde(default)]
    pub diagram_type: String,
    #[serde(default)]
    pub key_elements: Vec<String>,
}

/// Flatten one page into reading-order context text.
pub fn context_from_extraction(page: &PageExtraction) -> String {
    let mut lines = vec![
        format!("# Page {}: {}", page.page_number, page.main_topic),
        String::new(),
        "## Summary".to_string(),
        page.summary.clone(),
        String::new(),
    ];

    if !page.key_definitions.is_empty() {
        lines.push("## Key Definitions".to_string());
        lines.extend(page.key_definitions.iter().map(|d| format!("- {d}")));
        lines.push(String::new());
    }

    lines.push("## Content (in reading order)".to_string());
    lines.push(String::new());

    let mut elements: Vec<&ContentElement> = page.content_flow.iter().collect();
    // Stable sort: equal positions keep their document order.
    elements.sort_by_key(|e| e.position);

    for (i, element) in elements.iter().enumerate() {
        lines.push(format!("### [{i}] {}", element.element_type.to_uppercase()));
        element_lines(element, &mut lines);
        lines.push(String::new());
    }

    lines.join("\n")
}

fn element_lines(element: &ContentElement, lines: &mut Vec<String>) {
    match element.element_type.as_str() {
        "text" => {
            if let Some(section) = &element.text_section {
                if let Some(heading) = &section.heading {
                    lines.push(format!("**Heading:** {heading}"));
                }
                lines.push(format!("**Type:** {}", section.text_type));
                if section.is_highlighted {
                    lines.push("**Highlighted:** Yes".to_string());
                }
                lines.push(format!("**Content:** {}", section.content));
            }
        }
        "equation" => {
            if let Some(eq) = &element.equation {
                let number = eq
                    .equation_number
                    .as_ref()
                    .map(|n| format!(" ({n})"))
                    .unwrap_or_default();
                lines.push(format!("**LaTeX{number}:** {}", eq.latex));
                lines.push(format!("**Context:** {}", eq.context));
            }
        }
        "diagram" => {
            if let Some(diagram) = &element.diagram {
                let mut kind = Vec::new();
                if let Some(fig) = &diagram.figure_number {
                    kind.push(format!("Figure {fig}"));
                }
                kind.push(diagram.diagram_type.clone());
                lines.push(format!("**Type:** {}", kind.join(" - ")));
                if let Some(caption) = &diagram.caption {
                    lines.push(format!("**Caption:** {caption}"));
                }
                lines.push(format!("**Description:** {}", diagram.description));
                if !diagram.key_elements.is_empty() {
                    lines.push(format!(
                        "**Key elements:** {}",
                        diagram.key_elements.join(", ")
                    ));
                }
            }
        }
        other => {
            tracing::debug!(element_type = other, "skipping unknown page element type");
        }
    }
}

/// Flatten several pages, in the order given.
pub fn context_from_pages(pages: &[PageExtraction]) -> String {
    pages
        .iter()
        .map(context_from_extraction)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Load context from a file.
///
/// `.json` files are page extractions, either a single page object or an
/// array of pages. Any other file is used verbatim as context text.
pub fn load_context(path: &Path) -> Result<String, ContextError> {
    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if !is_json {
        return Ok(content);
    }

    let pages: Vec<PageExtraction> = if content.trim_start().starts_with('[') {
        serde_json::from_str(&content)?
    } else {
        vec![serde_json::from_str(&content)?]
    };
    tracing::debug!(pages = pages.len(), path = %path.display(), "loaded page extraction");
    Ok(context_from_pages(&pages))
}
