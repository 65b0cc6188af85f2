//! Prompt text for every model call site.
//!
//! The wording lives here so the planner and pipeline read as control flow.
//! Task builders are pure functions; tests assert on the pieces the workflow
//! depends on (plan, previous code, previous error), not on phrasing.

/// Marker every generated script must start from.
pub const SCRIPT_MARKER: &str = "from manim import *";

pub const PLAN_IMAGE_SYSTEM_PROMPT: &str = "\
You plan static Manim still images for an educational article.

Produce a concrete plan a programmer can implement directly:
1. Objects: every shape, axis, label and formula, with color and size.
2. Layout: positions in Manim coordinates (ORIGIN, UP*2, LEFT*3 ...).
3. Emphasis: what the viewer should notice first.
4. Purpose: the single idea the image conveys.

Rules: nothing may overlap unless intended, nothing may leave the frame,
keep labels to a few words, prefer Axes, NumberPlane, Dot, Line, Circle,
Rectangle, Arrow, MathTex and Text. There is no motion in a still image.";

pub const PLAN_VIDEO_SYSTEM_PROMPT: &str = "\
You plan short Manim animations (10-15 seconds) for an educational article.

Produce a concrete plan a programmer can implement directly:
1. Scene setup: initial objects with positions, colors and sizes.
2. Sequence: numbered steps, each with an approximate duration (2-3s) and a
   verb (create, transform, move, fade, trace, grow).
3. Emphasis: what the viewer should follow at each step.
4. Purpose: the insight each step reveals.

Rules: nothing may overlap unless intended, nothing may leave the frame,
keep the object count small, use basic Manim objects only.";

pub const EXECUTE_IMAGE_SYSTEM_PROMPT: &str = "\
You write complete, runnable Manim Community Edition scripts that render a
single still image.

Requirements:
- Start with `from manim import *` and define exactly one class deriving
  from Scene whose construct() adds all objects.
- Call self.add(...) for the final frame; do not animate.
- Use only standard Manim objects; no external files, no network access.
- Output code only, no explanations and no markdown fences.";

pub const EXECUTE_VIDEO_SYSTEM_PROMPT: &str = "\
You write complete, runnable Manim Community Edition scripts that render a
short animation.

Requirements:
- Start with `from manim import *` and define exactly one class deriving
  from Scene (or ThreeDScene) whose construct() plays the animation.
- Keep the total run time between 10 and 15 seconds using self.play and
  self.wait.
- Use only standard Manim objects; no external files, no network access.
- Output code only, no explanations and no markdown fences.";

pub const HEADER_SYSTEM_PROMPT: &str = "\
You title educational articles. Given a topic and optional reference
material, reply with one JSON object and nothing else:
{\"title\": string, \"subtitle\": string, \"subject\": string}
The subject is a one or two word subject area.";

/// Context placeholder used when the caller supplied none.
pub const NO_CONTEXT: &str = "No additional context provided";

/// System prompt for the component planner.
pub fn outline_system_prompt(topic: &str, context: &str, max_components: usize) -> String {
    let context = if context.trim().is_empty() {
        NO_CONTEXT
    } else {
        context
    };
    format!(
        "\
You are an expert educator who explains topics with prose, static Manim
diagrams and short Manim animations.

Produce an ordered list of components that explains the topic from first
principles: introduction, core ideas, examples, conclusion.

Component count: aim for 3-5, use 6-8 only for topics that need depth, and
never exceed {max_components}. Fewer, stronger components beat many weak ones.

Component kinds:
- text: a markdown paragraph. Use **bold**, *italic*, ## subheaders, lists,
  > definitions, inline LaTeX $...$ and display LaTeX $$...$$.
- image: a STATIC diagram. Use only when nothing moves or changes. Give a
  detailed description of objects and layout, and a short caption.
- video: an ANIMATION of at most 15 seconds. Anything that moves, morphs,
  approaches a limit or changes over time MUST be a video. Describe the
  sequence of events, give a short caption and an approximate length.

Mix kinds; avoid several visuals in a row; no redundant components.

Reply with one JSON object and nothing else:
{{\"components\": [
  {{\"kind\": \"text\", \"text\": \"...\"}},
  {{\"kind\": \"image\", \"description\": \"...\", \"caption\": \"...\"}},
  {{\"kind\": \"video\", \"description\": \"...\", \"caption\": \"...\", \"approx_length\": \"10s\"}}
]}}

Topic: {topic}
Maximum components: {max_components}
Additional context: {context}"
    )
}

pub const OUTLINE_TASK: &str = "Generate the complete set of components for this topic.";

/// User message for header generation.
pub fn header_task(topic: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        NO_CONTEXT
    } else {
        context
    };
    format!("Generate the article header.\n\nTopic: {topic}\nAdditional context: {context}")
}

/// User message for the Plan stage of an image component.
pub fn plan_image_task(description: &str) -> String {
    format!(
        "Create a plan to visualize this prompt: '{description}'. \
         You are generating a still image, state that clearly in the plan. \
         Be specific about objects, layout and color. Make sure everything fits \
         the screen, nothing overlaps and nothing touches the edges."
    )
}

/// User message for the Plan stage of a video component.
pub fn plan_video_task(description: &str) -> String {
    format!(
        "Create a plan to visualize this prompt: '{description}'. \
         You are generating a video, not a still image, state that clearly in the plan. \
         Be specific about objects, layout, color and motion. The video is a few \
         scenes and no more than 10-15 seconds long. Make sure nothing overlaps \
         and nothing leaves the screen."
    )
}

/// User message for the first Execute attempt.
pub fn generate_code_task(plan: &str) -> String {
    format!(
        "Generate runnable Manim code for this plan:\n\n{plan}\n\n\
         Return ONLY the Manim script starting with: {SCRIPT_MARKER}"
    )
}

/// User message for a repair attempt after a failed validation.
pub fn repair_code_task(previous_code: &str, error: &str, plan: &str) -> String {
    format!(
        "This was the code you previously generated:\n\n{previous_code}\n\n\
         The previous generated Manim code failed with this error:\n\n{error}\n\n\
         Plan:\n{plan}\n\n\
         Fix the code. Output ONLY corrected code from the first line."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_prompt_carries_bound_and_topic() {
        let p = outline_system_prompt("Derivatives", "", 5);
        assert!(p.contains("never exceed 5"));
        assert!(p.contains("Topic: Derivatives"));
        assert!(p.contains(NO_CONTEXT));
    }

    #[test]
    fn outline_prompt_keeps_context() {
        let p = outline_system_prompt("Disc method", "# Page 3: Volumes", 3);
        assert!(p.contains("# Page 3: Volumes"));
        assert!(!p.contains(NO_CONTEXT));
    }

    #[test]
    fn repair_task_includes_code_error_and_plan() {
        let t = repair_code_task("OLD CODE", "NameError: foo", "THE PLAN");
        assert!(t.contains("OLD CODE"));
        assert!(t.contains("NameError: foo"));
        assert!(t.contains("THE PLAN"));
    }

    #[test]
    fn first_attempt_task_has_plan_only() {
        let t = generate_code_task("THE PLAN");
        assert!(t.contains("THE PLAN"));
        assert!(t.contains(SCRIPT_MARKER));
        assert!(!t.contains("failed with this error"));
    }

    #[test]
    fn plan_tasks_differ_by_kind() {
        assert!(plan_video_task("x").contains("video"));
        assert!(plan_image_task("x").contains("still image"));
    }
}
