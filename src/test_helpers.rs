//! Shared test utilities for the explainer test suite.
//!
//! Provides descriptor constructors and canned scripts so tests read as the
//! scenario they exercise. The scripted backends themselves live next to
//! their traits ([`MockModel`](crate::model::backend::tests::MockModel),
//! [`MockRenderer`](crate::render::backend::tests::MockRenderer)).
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let descriptors = vec![text("## Intro"), video("secant approaches tangent", "Limit")];
//! let model = MockModel::new().reply("Generate runnable Manim code", &code_for("Tangent"));
//! ```

use crate::types::{ArticleHeader, CodedArtifact, ComponentDescriptor};

// =========================================================================
// Descriptors
// =========================================================================

pub fn text(text: &str) -> ComponentDescriptor {
    ComponentDescriptor::Text {
        text: text.to_string(),
    }
}

pub fn image(description: &str, caption: &str) -> ComponentDescriptor {
    ComponentDescriptor::Image {
        description: description.to_string(),
        caption: caption.to_string(),
    }
}

pub fn video(description: &str, caption: &str) -> ComponentDescriptor {
    ComponentDescriptor::Video {
        description: description.to_string(),
        caption: caption.to_string(),
        approx_length: "10s".to_string(),
    }
}

pub fn sample_header() -> ArticleHeader {
    ArticleHeader {
        title: "The Derivative".to_string(),
        subtitle: "Instantaneous rates of change".to_string(),
        subject: "Calculus".to_string(),
    }
}

// =========================================================================
// Scripts
// =========================================================================

/// A clean, minimal script whose scene class is `scene`.
///
/// Already in extracted form, so `extract_script(&code_for(x)) == code_for(x)`.
pub fn code_for(scene: &str) -> String {
    format!(
        "from manim import *\n\nclass {scene}(Scene):\n    def construct(self):\n        self.add(Dot())"
    )
}

/// Assert that every descriptor kind matches the artifact at the same index.
pub fn assert_same_shape(
    descriptors: &[ComponentDescriptor],
    artifacts: &[CodedArtifact],
) {
    assert_eq!(
        descriptors.len(),
        artifacts.len(),
        "artifact count differs from descriptor count"
    );
    for (i, (d, a)) in descriptors.iter().zip(artifacts).enumerate() {
        assert_eq!(d.kind(), a.kind(), "kind mismatch at index {i}");
    }
}
