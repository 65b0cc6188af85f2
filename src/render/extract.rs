//! Script extraction from raw model output.
//!
//! Models wrap code in prose and markdown fences despite being told not to.
//! Extraction keeps everything from the first [`SCRIPT_MARKER`] onward, drops
//! fence lines, and trims. Running it on already-clean text is a no-op.

use crate::model::prompts::SCRIPT_MARKER;
use regex::Regex;
use std::sync::LazyLock;

/// Scene name used when no scene class declaration is found.
pub const DEFAULT_SCENE: &str = "Scene";

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```+.*").expect("fence pattern is valid"));

static SCENE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+(\w+)\s*\(\s*(?:Scene|ThreeDScene|MovingCameraScene)\s*\)")
        .expect("scene pattern is valid")
});

/// Extract the runnable script from raw model output.
///
/// Returns `None` when the output has no script marker; the caller treats
/// that as a validation failure.
pub fn extract_script(raw: &str) -> Option<String> {
    let start = raw.find(SCRIPT_MARKER)?;
    let tail = &raw[start..];
    Some(FENCE_RE.replace_all(tail, "").trim().to_string())
}

/// Find the scene class to render, defaulting to [`DEFAULT_SCENE`].
pub fn detect_scene_name(code: &str) -> &str {
    SCENE_RE
        .captures(code)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(DEFAULT_SCENE)
}

/// Error text recorded when extraction fails.
pub fn missing_marker_message() -> String {
    format!("Could not find '{SCRIPT_MARKER}' in model output.")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = "from manim import *\n\nclass Tangent(Scene):\n    def construct(self):\n        self.add(Dot())";

    #[test]
    fn extract_strips_prose_and_fences() {
        let raw = format!("Here is your script:\n```python\n{CLEAN}\n```\nEnjoy!");
        let script = extract_script(&raw).unwrap();
        assert!(script.starts_with(SCRIPT_MARKER));
        assert!(!script.contains("```"));
        // Trailing prose after the closing fence is kept; the renderer reports it.
        assert!(script.ends_with("Enjoy!"));
    }

    #[test]
    fn extract_drops_fence_lines_only() {
        let raw = format!("```python\n{CLEAN}\n```");
        assert_eq!(extract_script(&raw).unwrap(), CLEAN);
    }

    #[test]
    fn extract_is_idempotent_on_clean_script() {
        let once = extract_script(CLEAN).unwrap();
        assert_eq!(once, CLEAN);
        assert_eq!(extract_script(&once).unwrap(), once);
    }

    #[test]
    fn extract_without_marker_is_none() {
        assert_eq!(extract_script("import manim\nclass A(Scene): pass"), None);
        assert_eq!(extract_script(""), None);
    }

    #[test]
    fn scene_name_detected() {
        assert_eq!(detect_scene_name(CLEAN), "Tangent");
    }

    #[test]
    fn scene_name_three_d() {
        let code = "from manim import *\nclass Surface(ThreeDScene):\n    pass";
        assert_eq!(detect_scene_name(code), "Surface");
    }

    #[test]
    fn scene_name_first_match_wins() {
        let code = "class Helper(VGroup):\n    pass\nclass Main(Scene):\n    pass\nclass Other(Scene):\n    pass";
        assert_eq!(detect_scene_name(code), "Main");
    }

    #[test]
    fn scene_name_defaults() {
        assert_eq!(detect_scene_name("from manim import *\nx = 1"), DEFAULT_SCENE);
        assert_eq!(detect_scene_name("class Helper(VGroup): pass"), DEFAULT_SCENE);
    }

    #[test]
    fn missing_marker_message_names_marker() {
        assert!(missing_marker_message().contains(SCRIPT_MARKER));
    }
}
