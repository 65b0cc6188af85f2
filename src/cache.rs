//! Render cache shared by the code and assemble stages.
//!
//! A visual component is rendered during validation to prove its script runs.
//! Assembly needs the same media file to embed it, and rendering a 15-second
//! animation twice is the slowest thing the tool does. This module records
//! each successful render so assembly can reuse the file instead.
//!
//! # Design
//!
//! The cache is **content-addressed**: lookups are by the combination of
//! `script_hash` and `params_hash`, never by component position. Reordering
//! components or re-planning an article with an identical script still hits.
//!
//! - **`script_hash`**: SHA-256 of the extracted script text (after fence
//!   stripping, so cosmetic model output differences don't matter).
//! - **`params_hash`**: SHA-256 of the renderer program and quality flag. A
//!   different quality produces a different file and must miss.
//!
//! A cache hit requires:
//! 1. An entry with matching `script_hash` and `params_hash` exists
//! 2. The recorded output file still exists on disk
//!
//! ## Storage
//!
//! The cache manifest is a JSON file at `<temp_dir>/.render-cache.json`,
//! next to the stage manifests, so separate `code` and `assemble` runs share
//! it. Loading tolerates a missing or corrupt file by starting empty.

use crate::config::RendererConfig;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the temp directory.
const MANIFEST_FILENAME: &str = ".render-cache.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// A single cached render.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub script_hash: String,
    pub params_hash: String,
    pub output: PathBuf,
}

/// On-disk render cache keyed by `"{script_hash}:{params_hash}"`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RenderCache {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
    /// Hash of the renderer settings new entries are recorded under.
    #[serde(skip)]
    params_hash: String,
}

impl RenderCache {
    /// Create an empty cache for the given renderer settings.
    pub fn empty(renderer: &RendererConfig) -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
            params_hash: hash_render_params(renderer),
        }
    }

    /// Load from the temp directory. Returns an empty cache if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(dir: &Path, renderer: &RendererConfig) -> Self {
        let path = manifest_path(dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(renderer),
        };
        let mut cache: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::empty(renderer),
        };
        if cache.version != MANIFEST_VERSION {
            return Self::empty(renderer);
        }
        cache.params_hash = hash_render_params(renderer);
        cache
    }

    /// Save to the temp directory.
    pub fn save(&self, dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(manifest_path(dir), json)
    }

    /// Look up the rendered file for a script under the current renderer
    /// settings. Entries whose file disappeared are treated as misses.
    pub fn find(&self, script: &str) -> Option<&Path> {
        let key = content_key(&hash_script(script), &self.params_hash);
        let entry = self.entries.get(&key)?;
        entry.output.exists().then_some(entry.output.as_path())
    }

    /// Record the output of a successful render.
    pub fn insert(&mut self, script: &str, output: PathBuf) {
        let script_hash = hash_script(script);
        let key = content_key(&script_hash, &self.params_hash);
        self.entries.insert(
            key,
            CacheEntry {
                script_hash,
                params_hash: self.params_hash.clone(),
                output,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn content_key(script_hash: &str, params_hash: &str) -> String {
    format!("{}:{}", script_hash, params_hash)
}

/// SHA-256 of the script text, as a hex string.
pub fn hash_script(script: &str) -> String {
    format!("{:x}", Sha256::digest(script.as_bytes()))
}

/// SHA-256 of the renderer settings that change the output file.
///
/// Inputs: program and quality flag. Verbosity and timeouts don't affect
/// the rendered media and are left out.
pub fn hash_render_params(renderer: &RendererConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"render\0");
    hasher.update(renderer.program.as_bytes());
    hasher.update(b"\0");
    hasher.update(renderer.quality.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Summary of cache use during assembly.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub reused: u32,
    pub rendered: u32,
    pub unavailable: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.reused + self.rendered + self.unavailable
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reused, {} rendered, {} unavailable ({} visuals)",
            self.reused,
            self.rendered,
            self.unavailable,
            self.total()
        )
    }
}

/// Resolve the cache manifest path for a temp directory.
pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILENAME)
}
