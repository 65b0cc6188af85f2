//! File naming for generated scripts and articles.
//!
//! ## Scripts
//!
//! Every validation attempt writes its script to `manim_scene_<id>.py`, where
//! `<id>` is the first 8 hex digits of a random UUID. Manim nests its output
//! under a directory named after the script stem, so the id also keeps
//! concurrent renders apart in the shared media directory.
//!
//! ## Articles
//!
//! When no output path is given, the article is named after its title:
//! - `"The Derivative: Rates of Change"` → `the-derivative-rates-of-change.html`
//! - `"Σ & ∫ basics"` → `basics.html`
//! - `"!!!"` → `article.html`

/// Prefix shared by all generated script files.
pub const SCRIPT_PREFIX: &str = "manim_scene_";

/// A fresh, collision-avoiding script file name.
pub fn script_filename() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{SCRIPT_PREFIX}{}.py", &id[..8])
}

/// Lowercase ASCII slug: alphanumerics kept, every other run collapsed to `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Default article file name for a title.
pub fn article_filename(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        "article.html".to_string()
    } else {
        format!("{slug}.html")
    }
}
