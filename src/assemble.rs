//! Stage 3: page assembly.
//!
//! Takes the ordered artifacts from the code stage and produces one
//! self-contained HTML document.
//!
//! ## Page structure
//!
//! ```text
//! header.article-header    subject breadcrumb, title, subtitle
//! main.article
//!   section.block.text-block     one per text artifact (markdown → HTML)
//!   section.block.visual         one per image/video artifact
//! ```
//!
//! Every artifact produces exactly one `section.block`, in artifact order.
//!
//! ## Text
//!
//! Prose is markdown with LaTeX. Math spans are swapped for placeholders
//! before markdown conversion (so `_` and `*` inside formulas survive) and
//! restored afterwards, HTML-escaped and wrapped in
//! `<div class="math-display">$$…$$</div>` (a span when the formula shares
//! its paragraph with prose) or `<span class="math-inline">$…$</span>`.
//! KaTeX's auto-render typesets them in the browser; it is loaded from a
//! CDN, so offline readers see the TeX source.
//!
//! ## Visuals
//!
//! Media are embedded as base64 data URIs so the page is a single file. The
//! file comes from the render cache when validation already produced it;
//! otherwise the script is rendered again here. The block follows the media
//! type, not the component kind: an image component whose scene animates
//! renders to MP4 and is shown as a video. A visual that cannot be
//! rendered becomes a "Visualization unavailable" figure: one broken
//! animation never costs the whole article.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! All interpolation is escaped; only converted markdown is inserted raw.

use crate::cache::{CacheStats, RenderCache};
use crate::render::{self, RenderOutcome, Renderer, extract};
use crate::types::{ArticleAssembly, ArticleHeader, CodedArtifact};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Options, Parser, html as md_html};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(PathBuf),
}

const CSS: &str = include_str!("../static/article.css");

static DISPLAY_MATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\$\$(.*?)\$\$").expect("display math pattern is valid"));

static INLINE_MATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([^$]+?)\$").expect("inline math pattern is valid"));

const KATEX_CSS: &str = "https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.css";
const KATEX_JS: &str = "https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.js";
const KATEX_AUTO_RENDER: &str =
    "https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/contrib/auto-render.min.js";

const KATEX_INIT: &str = r#"document.addEventListener("DOMContentLoaded", function () {
  renderMathInElement(document.body, {
    delimiters: [
      {left: "$$", right: "$$", display: true},
      {left: "\\[", right: "\\]", display: true},
      {left: "$", right: "$", display: false},
      {left: "\\(", right: "\\)", display: false}
    ],
    throwOnError: false,
    ignoredTags: ["script", "noscript", "style", "textarea", "pre", "code"]
  });
});"#;

const DISPLAY_PLACEHOLDER: &str = "XDISPLAYMATHX";
const INLINE_PLACEHOLDER: &str = "XINLINEMATHX";

/// An assembled page plus how its media were obtained.
#[derive(Debug)]
pub struct AssembledArticle {
    pub markup: Markup,
    pub stats: CacheStats,
}

/// Build the article page.
pub fn assemble(
    assembly: &ArticleAssembly,
    renderer: &dyn Renderer,
    cache: &RenderCache,
) -> Result<Markup, AssembleError> {
    Ok(assemble_with_stats(assembly, renderer, cache)?.markup)
}

/// Build the article page and report cache use.
pub fn assemble_with_stats(
    assembly: &ArticleAssembly,
    renderer: &dyn Renderer,
    cache: &RenderCache,
) -> Result<AssembledArticle, AssembleError> {
    let mut stats = CacheStats::default();
    let mut blocks = Vec::with_capacity(assembly.artifacts.len());

    for (index, artifact) in assembly.artifacts.iter().enumerate() {
        let block = match artifact {
            CodedArtifact::Text { text } => text_block(text),
            CodedArtifact::Image { caption, code, .. }
            | CodedArtifact::Video { caption, code, .. } => {
                match embed_media(code, renderer, cache, &mut stats)? {
                    Some(media) if media.is_video() => video_block(&media.uri, caption),
                    Some(media) => image_block(&media.uri, caption),
                    None => unavailable_block(caption),
                }
            }
        };
        tracing::debug!(index, kind = %artifact.kind(), "assembled block");
        blocks.push(block);
    }

    tracing::info!(blocks = blocks.len(), %stats, "assembled article");
    let markup = base_document(&assembly.header, html! {
        (header_block(&assembly.header))
        main.article {
            @for block in &blocks {
                (block)
            }
        }
    });
    Ok(AssembledArticle { markup, stats })
}

/// Write a page to disk, creating parent directories.
pub fn write_article(markup: &Markup, output: &Path) -> Result<(), AssembleError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &markup.0)?;
    Ok(())
}

/// A media file encoded for inline embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EmbeddedMedia {
    mime: &'static str,
    uri: String,
}

impl EmbeddedMedia {
    fn is_video(&self) -> bool {
        self.mime.starts_with("video/")
    }
}

/// Find or produce the media file for a script and encode it.
///
/// `Ok(None)` means the visual is unavailable; the reason is logged.
fn embed_media(
    code: &str,
    renderer: &dyn Renderer,
    cache: &RenderCache,
    stats: &mut CacheStats,
) -> Result<Option<EmbeddedMedia>, AssembleError> {
    let Some(script) = extract::extract_script(code) else {
        tracing::warn!("visual has no runnable script");
        stats.unavailable += 1;
        return Ok(None);
    };

    let path = match cache.find(&script) {
        Some(path) => {
            stats.reused += 1;
            path.to_path_buf()
        }
        None => match render_now(&script, renderer) {
            Ok(path) => {
                stats.rendered += 1;
                path
            }
            Err(reason) => {
                tracing::warn!(%reason, "visual could not be rendered");
                stats.unavailable += 1;
                return Ok(None);
            }
        },
    };

    let Some(mime) = media_mime(&path) else {
        tracing::warn!(path = %path.display(), "rendered file cannot be embedded");
        stats.unavailable += 1;
        return Ok(None);
    };
    let uri = data_uri(&path)?;
    Ok(Some(EmbeddedMedia { mime, uri }))
}

fn render_now(script: &str, renderer: &dyn Renderer) -> Result<PathBuf, String> {
    let job = render::stage_script(renderer, script).map_err(|e| e.to_string())?;
    match renderer.render(&job) {
        Ok(RenderOutcome::Rendered {
            output: Some(path),
        }) => Ok(path),
        Ok(RenderOutcome::Rendered { output: None }) => {
            Err(render::RenderError::NoOutput.to_string())
        }
        Ok(RenderOutcome::Failed { diagnostics }) => Err(diagnostics),
        Err(e) => Err(e.to_string()),
    }
}

/// MIME type for an embeddable media file, by extension.
pub fn media_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "mp4" | "mov" | "m4v" => Some("video/mp4"),
        _ => None,
    }
}

/// Read a media file as a `data:` URI.
pub fn data_uri(path: &Path) -> Result<String, AssembleError> {
    let mime = media_mime(path).ok_or_else(|| AssembleError::UnsupportedMedia(path.to_path_buf()))?;
    let bytes = fs::read(path)?;
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

/// Convert markdown prose with LaTeX to HTML.
pub fn render_text(text: &str) -> String {
    let mut display = Vec::new();
    let protected = DISPLAY_MATH_RE.replace_all(text, |caps: &regex::Captures| {
        display.push(caps[1].to_string());
        format!("{DISPLAY_PLACEHOLDER}{}{DISPLAY_PLACEHOLDER}", display.len() - 1)
    });

    let mut inline = Vec::new();
    let protected = INLINE_MATH_RE.replace_all(&protected, |caps: &regex::Captures| {
        inline.push(caps[1].to_string());
        format!("{INLINE_PLACEHOLDER}{}{INLINE_PLACEHOLDER}", inline.len() - 1)
    });

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(&protected, options);
    let mut body = String::new();
    md_html::push_html(&mut body, parser);

    // A formula alone in its paragraph replaces the paragraph; one that shares
    // a paragraph (or a list item, table cell) stays phrasing content.
    for (i, equation) in display.iter().enumerate() {
        let placeholder = format!("{DISPLAY_PLACEHOLDER}{i}{DISPLAY_PLACEHOLDER}");
        let block = html! { div.math-display { "$$" (equation) "$$" } };
        body = body.replace(&format!("<p>{placeholder}</p>"), &block.into_string());
        let span = html! { span.math-display { "$$" (equation) "$$" } };
        body = body.replace(&placeholder, &span.into_string());
    }
    for (i, equation) in inline.iter().enumerate() {
        let restored = html! { span.math-inline { "$" (equation) "$" } };
        body = body.replace(
            &format!("{INLINE_PLACEHOLDER}{i}{INLINE_PLACEHOLDER}"),
            &restored.into_string(),
        );
    }
    body
}

// ============================================================================
// HTML Components
// ============================================================================

fn base_document(header: &ArticleHeader, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (header.title) }
                link rel="stylesheet" href=(KATEX_CSS);
                style { (PreEscaped(CSS)) }
            }
            body {
                (content)
                script src=(KATEX_JS) {}
                script src=(KATEX_AUTO_RENDER) {}
                script { (PreEscaped(KATEX_INIT)) }
            }
        }
    }
}

fn header_block(header: &ArticleHeader) -> Markup {
    html! {
        header.article-header {
            nav.breadcrumb {
                a href="#" { (header.subject) }
                " / "
            }
            h1 { (header.title) }
            p.subtitle { (header.subtitle) }
        }
    }
}

fn text_block(text: &str) -> Markup {
    html! {
        section.block.text-block {
            (PreEscaped(render_text(text)))
        }
    }
}

fn image_block(uri: &str, caption: &str) -> Markup {
    html! {
        section.block.visual {
            figure {
                img src=(uri) alt=(caption);
                figcaption { (caption) }
            }
        }
    }
}

fn video_block(uri: &str, caption: &str) -> Markup {
    html! {
        section.block.visual {
            figure {
                video controls playsinline preload="metadata" {
                    source src=(uri) type="video/mp4";
                }
                figcaption { (caption) }
            }
        }
    }
}

fn unavailable_block(caption: &str) -> Markup {
    html! {
        section.block.visual.unavailable {
            figure {
                div.placeholder { p { "Visualization unavailable" } }
                figcaption { (caption) }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
