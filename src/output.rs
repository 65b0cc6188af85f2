//! CLI output formatting for all pipeline stages.
//!
//! # Information-First Display
//!
//! Output is **content-centric, not file-centric**. The primary display for
//! every component is its position in the article, its kind and its caption
//! (or the opening of its prose). Details such as descriptions, attempt
//! counts and renderer errors are shown as indented context lines.
//!
//! # Entity Display Contract
//!
//! Every component follows the same two-level pattern across all stages:
//!
//! 1. **Header line**: 1-based positional index + kind + label
//! 2. **Context lines**: indented `Description:`, attempt status, errors
//!
//! # Output Format
//!
//! ## Plan
//!
//! ```text
//! The Derivative
//!     Subtitle: Instantaneous rates of change
//!     Subject: Calculus
//!
//! Components
//! 001 text  The derivative measures how a function changes...
//! 002 image Tangent line at a point
//!     Description: Axes with a parabola and its tangent at x=1
//! 003 video Secant lines approach the tangent (12s)
//!     Description: A secant through two points slides until...
//! ```
//!
//! ## Code (progress)
//!
//! ```text
//! 002 image Tangent line at a point
//! 003 video Secant lines approach the tangent
//!     002 planned
//!     003 planned
//!     003 attempt 1 failed: NameError: name 'Cirle' is not defined
//!     002 validated (1 attempt)
//!     003 validated (2 attempts)
//! ```
//!
//! ## Assemble
//!
//! ```text
//! The Derivative → the-derivative.html
//!     Blocks: 5
//!     Media: 2 reused, 0 rendered, 0 unavailable (2 visuals)
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure —
//! no I/O, no side effects.

use crate::cache::CacheStats;
use crate::coordinator::CodedManifest;
use crate::pipeline::PipelineEvent;
use crate::planner::PlanManifest;
use crate::types::{ArticleHeader, ComponentDescriptor, ComponentKind, PipelineReport};
use std::path::Path;

const LABEL_WIDTH: usize = 60;
const ERROR_WIDTH: usize = 100;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 0-based component index as a 1-based, 3-digit zero-padded label.
fn format_index(index: usize) -> String {
    format!("{:0>3}", index + 1)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format a component header: positional index + kind + label.
///
/// ```text
/// 001 text  The derivative measures...
/// 002 image Tangent line
/// ```
fn entity_header(index: usize, kind: ComponentKind, label: &str) -> String {
    format!(
        "{} {:<5} {}",
        format_index(index),
        kind.to_string(),
        truncate_desc(&first_line(label), LABEL_WIDTH)
    )
}

/// First non-empty line, with markdown heading markers removed.
fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .trim_start_matches('#')
        .trim()
        .to_string()
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

fn attempts_label(n: u32) -> String {
    if n == 1 {
        "1 attempt".to_string()
    } else {
        format!("{} attempts", n)
    }
}

// ============================================================================
// Stage 1: Plan output
// ============================================================================

fn header_lines(header: &ArticleHeader) -> Vec<String> {
    vec![
        header.title.clone(),
        format!("{}Subtitle: {}", indent(1), header.subtitle),
        format!("{}Subject: {}", indent(1), header.subject),
    ]
}

/// Format plan stage output: header block, then one entry per component.
pub fn format_plan_output(plan: &PlanManifest) -> Vec<String> {
    let mut lines = header_lines(&plan.header);
    lines.push(String::new());
    lines.push("Components".to_string());

    for (index, component) in plan.components.iter().enumerate() {
        match component {
            ComponentDescriptor::Text { text } => {
                lines.push(entity_header(index, ComponentKind::Text, text));
            }
            ComponentDescriptor::Image {
                description,
                caption,
            } => {
                lines.push(entity_header(index, ComponentKind::Image, caption));
                lines.push(format!(
                    "{}Description: {}",
                    indent(1),
                    truncate_desc(description, LABEL_WIDTH)
                ));
            }
            ComponentDescriptor::Video {
                description,
                caption,
                approx_length,
            } => {
                let mut header = entity_header(index, ComponentKind::Video, caption);
                if !approx_length.is_empty() {
                    header.push_str(&format!(" ({})", approx_length));
                }
                lines.push(header);
                lines.push(format!(
                    "{}Description: {}",
                    indent(1),
                    truncate_desc(description, LABEL_WIDTH)
                ));
            }
        }
    }
    lines
}

/// Print plan output to stdout.
pub fn print_plan_output(plan: &PlanManifest) {
    for line in format_plan_output(plan) {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 2: Code output
// ============================================================================

/// Format a single pipeline progress event as display lines.
///
/// `Started` leads with the component header; later events are indented and
/// carry the index so interleaved parallel output stays attributable.
pub fn format_pipeline_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::Started {
            index,
            kind,
            summary,
        } => vec![entity_header(*index, *kind, summary)],
        PipelineEvent::Planned { index } => {
            vec![format!("{}{} planned", indent(1), format_index(*index))]
        }
        PipelineEvent::AttemptFailed {
            index,
            attempt,
            error,
        } => vec![format!(
            "{}{} attempt {} failed: {}",
            indent(1),
            format_index(*index),
            attempt,
            truncate_desc(&last_line(error), ERROR_WIDTH)
        )],
        PipelineEvent::Finished { report } => match report.kind {
            // Text finishes immediately; its header line already says enough.
            ComponentKind::Text => Vec::new(),
            ComponentKind::Image | ComponentKind::Video => {
                vec![format!(
                    "{}{} {}",
                    indent(1),
                    format_index(report.index),
                    report_status(report)
                )]
            }
        },
    }
}

/// Renderer tracebacks end with the actual exception; show that line.
fn last_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn report_status(report: &PipelineReport) -> String {
    if report.succeeded {
        format!("validated ({})", attempts_label(report.attempts))
    } else {
        format!("failed after {}", attempts_label(report.attempts))
    }
}

/// Format the code stage summary from the written manifest.
pub fn format_code_output(coded: &CodedManifest) -> Vec<String> {
    let visuals: Vec<&PipelineReport> = coded
        .reports
        .iter()
        .filter(|r| r.kind != ComponentKind::Text)
        .collect();
    let failed = visuals.iter().filter(|r| !r.succeeded).count();

    let mut lines = vec![format!(
        "Coded {} components: {} visuals validated, {} failed",
        coded.artifacts.len(),
        visuals.len() - failed,
        failed
    )];
    for report in visuals {
        let label = coded
            .artifacts
            .get(report.index)
            .and_then(|a| a.caption())
            .unwrap_or_default();
        lines.push(format!(
            "{} \u{2014} {}",
            entity_header(report.index, report.kind, label),
            report_status(report)
        ));
        if let Some(error) = &report.last_error {
            lines.push(format!(
                "{}Last error: {}",
                indent(1),
                truncate_desc(&last_line(error), ERROR_WIDTH)
            ));
        }
    }
    lines
}

/// Print code stage summary to stdout.
pub fn print_code_output(coded: &CodedManifest) {
    for line in format_code_output(coded) {
        println!("{}", line);
    }
}

// ============================================================================
// Stage 3: Assemble output
// ============================================================================

/// Format assemble stage output: title → output file, with block and media
/// counts as context.
pub fn format_assemble_output(
    header: &ArticleHeader,
    output: &Path,
    blocks: usize,
    stats: &CacheStats,
) -> Vec<String> {
    vec![
        format!("{} \u{2192} {}", header.title, output.display()),
        format!("{}Blocks: {}", indent(1), blocks),
        format!("{}Media: {}", indent(1), stats),
    ]
}

/// Print assemble output to stdout.
pub fn print_assemble_output(
    header: &ArticleHeader,
    output: &Path,
    blocks: usize,
    stats: &CacheStats,
) {
    for line in format_assemble_output(header, output, blocks, stats) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{image, sample_header, text, video};
    use crate::types::CodedArtifact;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn truncate_desc_short() {
        assert_eq!(truncate_desc("Short text", 40), "Short text");
    }

    #[test]
    fn truncate_desc_exact() {
        let text = "a".repeat(40);
        assert_eq!(truncate_desc(&text, 40), text);
    }

    #[test]
    fn truncate_desc_long() {
        let text = "a".repeat(50);
        let expected = format!("{}...", "a".repeat(40));
        assert_eq!(truncate_desc(&text, 40), expected);
    }

    #[test]
    fn truncate_desc_multibyte() {
        assert_eq!(truncate_desc("∫∫∫∫", 2), "∫∫...");
    }

    #[test]
    fn format_index_is_one_based() {
        assert_eq!(format_index(0), "001");
        assert_eq!(format_index(41), "042");
        assert_eq!(format_index(99), "100");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn entity_header_pads_kind() {
        assert_eq!(
            entity_header(0, ComponentKind::Text, "## Intro\n\nMore"),
            "001 text  Intro"
        );
        assert_eq!(
            entity_header(1, ComponentKind::Video, "Limit"),
            "002 video Limit"
        );
    }

    #[test]
    fn last_line_picks_exception() {
        let tb = "Traceback (most recent call last):\n  File \"x.py\"\nNameError: Cirle\n\n";
        assert_eq!(last_line(tb), "NameError: Cirle");
    }

    // =========================================================================
    // Stage output tests
    // =========================================================================

    #[test]
    fn plan_output_lists_components() {
        let plan = PlanManifest {
            topic: "Derivatives".into(),
            context: String::new(),
            max_components: 5,
            header: sample_header(),
            components: vec![
                text("The derivative measures change."),
                image("axes with tangent", "Tangent line"),
                video("secant slides", "Limit"),
            ],
        };

        let lines = format_plan_output(&plan);

        assert_eq!(lines[0], "The Derivative");
        assert_eq!(lines[1], "    Subtitle: Instantaneous rates of change");
        assert!(lines.contains(&"001 text  The derivative measures change.".to_string()));
        assert!(lines.contains(&"002 image Tangent line".to_string()));
        assert!(lines.contains(&"    Description: axes with tangent".to_string()));
        assert!(lines.contains(&"003 video Limit (10s)".to_string()));
    }

    #[test]
    fn pipeline_events_formatted() {
        let started = PipelineEvent::Started {
            index: 2,
            kind: ComponentKind::Image,
            summary: "Plane".into(),
        };
        assert_eq!(format_pipeline_event(&started), vec!["003 image Plane"]);

        let failed = PipelineEvent::AttemptFailed {
            index: 2,
            attempt: 1,
            error: "Traceback\nNameError: Cirle".into(),
        };
        assert_eq!(
            format_pipeline_event(&failed),
            vec!["    003 attempt 1 failed: NameError: Cirle"]
        );

        let finished = PipelineEvent::Finished {
            report: PipelineReport {
                index: 2,
                kind: ComponentKind::Image,
                attempts: 2,
                succeeded: true,
                last_error: None,
            },
        };
        assert_eq!(
            format_pipeline_event(&finished),
            vec!["    003 validated (2 attempts)"]
        );
    }

    #[test]
    fn text_finish_is_silent() {
        let finished = PipelineEvent::Finished {
            report: PipelineReport {
                index: 0,
                kind: ComponentKind::Text,
                attempts: 0,
                succeeded: true,
                last_error: None,
            },
        };
        assert!(format_pipeline_event(&finished).is_empty());
    }

    #[test]
    fn code_output_summarizes_reports() {
        let coded = CodedManifest {
            topic: "t".into(),
            header: sample_header(),
            artifacts: vec![
                CodedArtifact::Text { text: "x".into() },
                CodedArtifact::Video {
                    description: "d".into(),
                    caption: "Limit".into(),
                    code: String::new(),
                },
            ],
            reports: vec![
                PipelineReport {
                    index: 0,
                    kind: ComponentKind::Text,
                    attempts: 0,
                    succeeded: true,
                    last_error: None,
                },
                PipelineReport {
                    index: 1,
                    kind: ComponentKind::Video,
                    attempts: 3,
                    succeeded: false,
                    last_error: Some("boom".into()),
                },
            ],
        };

        let lines = format_code_output(&coded);

        assert_eq!(lines[0], "Coded 2 components: 0 visuals validated, 1 failed");
        assert_eq!(lines[1], "002 video Limit \u{2014} failed after 3 attempts");
        assert_eq!(lines[2], "    Last error: boom");
    }

    #[test]
    fn assemble_output_lines() {
        let stats = CacheStats {
            reused: 1,
            rendered: 1,
            unavailable: 0,
        };
        let lines = format_assemble_output(&sample_header(), Path::new("out/a.html"), 4, &stats);
        assert_eq!(lines[0], "The Derivative \u{2192} out/a.html");
        assert_eq!(lines[1], "    Blocks: 4");
        assert_eq!(lines[2], "    Media: 1 reused, 1 rendered, 0 unavailable (2 visuals)");
    }
}
