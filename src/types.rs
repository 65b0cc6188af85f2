//! Shared types used across all pipeline stages.
//!
//! These types are serialized to JSON between stages (plan → code → assemble)
//! and must be identical across all three modules. Descriptors and artifacts
//! are closed sum types: every consumer matches them exhaustively.

use serde::{Deserialize, Serialize};

/// Planner-produced intent record for one article component.
///
/// Immutable once planned. `Text` never enters the code pipeline; `Image`
/// and `Video` each get their own plan → code → render loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentDescriptor {
    /// Markdown prose (may contain `$...$` / `$$...$$` LaTeX).
    Text { text: String },
    /// A static still-image visualization.
    Image { description: String, caption: String },
    /// A short (≤15s) animation.
    Video {
        description: String,
        caption: String,
        #[serde(default, alias = "length")]
        approx_length: String,
    },
}

impl ComponentDescriptor {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentDescriptor::Text { .. } => ComponentKind::Text,
            ComponentDescriptor::Image { .. } => ComponentKind::Image,
            ComponentDescriptor::Video { .. } => ComponentKind::Video,
        }
    }

    /// One-line label for CLI output and log fields.
    pub fn summary(&self) -> &str {
        match self {
            ComponentDescriptor::Text { text } => text,
            ComponentDescriptor::Image { caption, .. } => caption,
            ComponentDescriptor::Video { caption, .. } => caption,
        }
    }
}

/// Pipeline-produced final record for one component.
///
/// Visual variants carry the last generated script, which may still be
/// broken if every repair attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodedArtifact {
    Text {
        text: String,
    },
    Image {
        description: String,
        caption: String,
        code: String,
    },
    Video {
        description: String,
        caption: String,
        code: String,
    },
}

impl CodedArtifact {
    pub fn kind(&self) -> ComponentKind {
        match self {
            CodedArtifact::Text { .. } => ComponentKind::Text,
            CodedArtifact::Image { .. } => ComponentKind::Image,
            CodedArtifact::Video { .. } => ComponentKind::Video,
        }
    }

    /// The generated script, `None` for text.
    pub fn code(&self) -> Option<&str> {
        match self {
            CodedArtifact::Text { .. } => None,
            CodedArtifact::Image { code, .. } | CodedArtifact::Video { code, .. } => Some(code),
        }
    }

    pub fn caption(&self) -> Option<&str> {
        match self {
            CodedArtifact::Text { .. } => None,
            CodedArtifact::Image { caption, .. } | CodedArtifact::Video { caption, .. } => {
                Some(caption)
            }
        }
    }
}

/// Variant tag shared by descriptors, artifacts and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Text,
    Image,
    Video,
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ComponentKind::Text => "text",
            ComponentKind::Image => "image",
            ComponentKind::Video => "video",
        };
        f.write_str(label)
    }
}

/// Title block shown at the top of the article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleHeader {
    #[serde(alias = "article_title")]
    pub title: String,
    pub subtitle: String,
    /// One or two word subject area ("Calculus", "Linear Algebra").
    pub subject: String,
}

/// Everything the page assembler needs: the header plus artifacts in
/// original descriptor order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleAssembly {
    pub header: ArticleHeader,
    pub artifacts: Vec<CodedArtifact>,
}

/// Per-component diagnostics from one pipeline run.
///
/// Written next to the artifacts in the code manifest. A failed report does
/// not change the artifact: the page still embeds the last generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Position in the planned component list.
    pub index: usize,
    pub kind: ComponentKind,
    /// Execute/validate cycles performed (0 for text).
    pub attempts: u32,
    /// Whether the final validation passed.
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_json_uses_kind_tag() {
        let d = ComponentDescriptor::Image {
            description: "axes".into(),
            caption: "a plane".into(),
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "image");
        assert_eq!(json["caption"], "a plane");
    }

    #[test]
    fn video_descriptor_accepts_length_alias() {
        let json = r#"{"kind": "video", "description": "d", "caption": "c", "length": "10s"}"#;
        let d: ComponentDescriptor = serde_json::from_str(json).unwrap();
        assert!(matches!(
            d,
            ComponentDescriptor::Video { ref approx_length, .. } if approx_length == "10s"
        ));
    }

    #[test]
    fn unknown_kind_rejected() {
        let json = r#"{"kind": "audio", "text": "beep"}"#;
        assert!(serde_json::from_str::<ComponentDescriptor>(json).is_err());
    }

    #[test]
    fn artifact_code_accessor() {
        let text = CodedArtifact::Text { text: "hi".into() };
        let video = CodedArtifact::Video {
            description: "d".into(),
            caption: "c".into(),
            code: "from manim import *".into(),
        };
        assert_eq!(text.code(), None);
        assert_eq!(video.code(), Some("from manim import *"));
        assert_eq!(video.caption(), Some("c"));
    }

    #[test]
    fn header_accepts_article_title_alias() {
        let json = r#"{"article_title": "Derivatives", "subtitle": "Rates", "subject": "Calculus"}"#;
        let h: ArticleHeader = serde_json::from_str(json).unwrap();
        assert_eq!(h.title, "Derivatives");
    }

    #[test]
    fn kind_display() {
        assert_eq!(ComponentKind::Video.to_string(), "video");
    }
}
