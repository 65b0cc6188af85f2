//! Generator configuration module.
//!
//! Handles loading, validating, and merging `explainer.toml`. Stock defaults
//! are overridden by the user file, which in turn is overridden by CLI flags
//! (the binary applies those after loading).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [model]
//! model = "claude-sonnet-4-5-20250929"
//! api_key_env = "ANTHROPIC_API_KEY"   # Environment variable holding the key
//! base_url = "https://api.anthropic.com"
//! max_tokens_plan = 4096
//! max_tokens_code = 8192
//! temperature_outline = 0.7           # Component list and header
//! temperature_plan = 0.5              # Per-component rendering plan
//! temperature_code = 0.5              # Script generation and repair
//! timeout_secs = 300                  # 0 = no timeout
//!
//! [renderer]
//! program = "manim"
//! quality = "-qm"
//! verbosity = "WARNING"
//! media_dir = "media"                 # Where manim writes its output
//! script_dir = "."                    # Where generated scripts are saved
//! timeout_secs = 600                  # 0 = no timeout
//!
//! [pipeline]
//! max_attempts = 3                    # Execute/validate cycles per component
//! max_workers = 4                     # Parallel pipelines (omit for auto = CPU cores)
//!
//! [article]
//! max_components = 15
//! output = "article.html"            # Omit to name the file after the title
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILENAME: &str = "explainer.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Generator configuration loaded from `explainer.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExplainerConfig {
    /// Generative model connection and sampling settings.
    pub model: ModelConfig,
    /// External rendering tool invocation.
    pub renderer: RendererConfig,
    /// Retry cap and parallelism of the per-component pipelines.
    pub pipeline: PipelineConfig,
    /// Article-level defaults.
    pub article: ArticleConfig,
}

impl ExplainerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_attempts == 0 || self.pipeline.max_attempts > 10 {
            return Err(ConfigError::Validation(
                "pipeline.max_attempts must be 1-10".into(),
            ));
        }
        if self.article.max_components == 0 {
            return Err(ConfigError::Validation(
                "article.max_components must be at least 1".into(),
            ));
        }
        for (key, t) in [
            ("model.temperature_outline", self.model.temperature_outline),
            ("model.temperature_plan", self.model.temperature_plan),
            ("model.temperature_code", self.model.temperature_code),
        ] {
            if !(0.0..=1.0).contains(&t) {
                return Err(ConfigError::Validation(format!("{key} must be 0.0-1.0")));
            }
        }
        if self.model.model.trim().is_empty() {
            return Err(ConfigError::Validation("model.model must not be empty".into()));
        }
        if self.renderer.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "renderer.program must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Generative model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Model identifier sent with every request.
    pub model: String,
    /// Environment variable the API key is read from.
    pub api_key_env: String,
    /// API base URL (no trailing slash).
    pub base_url: String,
    /// Token limit for outline, header and plan requests.
    pub max_tokens_plan: u32,
    /// Token limit for script generation and repair requests.
    pub max_tokens_code: u32,
    /// Sampling temperature for the component list and header.
    pub temperature_outline: f32,
    /// Sampling temperature for per-component plans.
    pub temperature_plan: f32,
    /// Sampling temperature for script generation.
    pub temperature_code: f32,
    /// Per-request timeout in seconds. `0` disables the timeout.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250929".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens_plan: 4096,
            max_tokens_code: 8192,
            temperature_outline: 0.7,
            temperature_plan: 0.5,
            temperature_code: 0.5,
            timeout_secs: 300,
        }
    }
}

/// External rendering tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Program name or path.
    pub program: String,
    /// Quality flag passed verbatim (`-ql`, `-qm`, `-qh`).
    pub quality: String,
    /// Value for `-v`.
    pub verbosity: String,
    /// Directory the renderer writes its media into; scanned for new files.
    pub media_dir: PathBuf,
    /// Directory generated scripts are written to.
    pub script_dir: PathBuf,
    /// Subprocess timeout in seconds. `0` disables the timeout.
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: "manim".to_string(),
            quality: "-qm".to_string(),
            verbosity: "WARNING".to_string(),
            media_dir: PathBuf::from("media"),
            script_dir: PathBuf::from("."),
            timeout_secs: 600,
        }
    }
}

/// Per-component pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Hard cap on execute/validate cycles per component.
    pub max_attempts: u32,
    /// Maximum number of pipelines running at once.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_workers: None,
        }
    }
}

/// Article-level defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArticleConfig {
    /// Upper bound on planned components.
    pub max_components: usize,
    /// Output HTML path used when `--output` is not given.
    /// When absent, the file is named after the article title.
    pub output: Option<PathBuf>,
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            max_components: 15,
            output: None,
        }
    }
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_workers(config: &PipelineConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_workers
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ExplainerConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ExplainerConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ExplainerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, falling back to stock defaults when it
/// does not exist.
pub fn load_config(path: &Path) -> Result<ExplainerConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock `explainer.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Explainer Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Generative model
# ---------------------------------------------------------------------------
[model]
# Model identifier sent with every request.
model = "claude-sonnet-4-5-20250929"

# Environment variable the API key is read from.
api_key_env = "ANTHROPIC_API_KEY"

# API base URL.
base_url = "https://api.anthropic.com"

# Token limits: outline/header/plan requests, and script requests.
max_tokens_plan = 4096
max_tokens_code = 8192

# Sampling temperatures (0.0-1.0).
temperature_outline = 0.7
temperature_plan = 0.5
temperature_code = 0.5

# Per-request timeout in seconds (0 = wait forever).
timeout_secs = 300

# ---------------------------------------------------------------------------
# Rendering tool
# ---------------------------------------------------------------------------
[renderer]
# Invoked as: <program> <quality> -v <verbosity> <script.py> <SceneName>
program = "manim"
quality = "-qm"
verbosity = "WARNING"

# Directory the renderer writes into. New files here are the render output.
media_dir = "media"

# Directory generated scripts (manim_scene_<id>.py) are written to.
script_dir = "."

# Subprocess timeout in seconds (0 = wait forever).
timeout_secs = 600

# ---------------------------------------------------------------------------
# Component pipelines
# ---------------------------------------------------------------------------
[pipeline]
# Execute/validate cycles per visual component (1-10). After the last
# attempt the component keeps its most recent code, even if it failed.
max_attempts = 3

# Maximum pipelines running in parallel. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_workers = 4

# ---------------------------------------------------------------------------
# Article
# ---------------------------------------------------------------------------
[article]
# Upper bound on planned components. The planner usually picks 3-8.
max_components = 15

# Output file used when --output is not given. When unset, the file is
# named after the article title (e.g. the-derivative.html).
# output = "article.html"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ExplainerConfig::default();
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.pipeline.max_workers, None);
        assert_eq!(config.article.max_components, 15);
        assert_eq!(config.renderer.program, "manim");
        assert_eq!(config.renderer.quality, "-qm");
        assert_eq!(config.model.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[pipeline]
max_attempts = 5
"#;
        let config: ExplainerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.pipeline.max_attempts, 5);
        assert_eq!(config.renderer.verbosity, "WARNING");
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: ExplainerConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = ExplainerConfig::default();
        assert_eq!(config.model.model, defaults.model.model);
        assert_eq!(config.renderer.media_dir, defaults.renderer.media_dir);
        assert_eq!(config.pipeline.max_attempts, defaults.pipeline.max_attempts);
        assert_eq!(config.article.output, defaults.article.output);
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.pipeline.max_attempts, 3);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"
[renderer]
quality = "-ql"

[article]
max_components = 5
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.renderer.quality, "-ql");
        assert_eq!(config.renderer.program, "manim");
        assert_eq!(config.article.max_components, 5);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[pipeline\nmax_attempts = ").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let toml = r#"
[pipeline]
max_retries = 3
"#;
        assert!(toml::from_str::<ExplainerConfig>(toml).is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(toml::from_str::<ExplainerConfig>("[database]\nurl = \"x\"").is_err());
    }

    // =========================================================================
    // Merging
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value =
            toml::from_str("[renderer]\nprogram = \"manim\"\nquality = \"-qm\"").unwrap();
        let overlay: toml::Value = toml::from_str("[renderer]\nquality = \"-qh\"").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["renderer"]["program"].as_str(), Some("manim"));
        assert_eq!(merged["renderer"]["quality"].as_str(), Some("-qh"));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(ExplainerConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_attempts_zero() {
        let mut config = ExplainerConfig::default();
        config.pipeline.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_temperature_out_of_range() {
        let mut config = ExplainerConfig::default();
        config.model.temperature_code = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("temperature_code"));
    }

    #[test]
    fn validate_max_components_zero() {
        let mut config = ExplainerConfig::default();
        config.article.max_components = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[pipeline]\nmax_attempts = 50\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // Workers
    // =========================================================================

    #[test]
    fn effective_workers_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_workers(&PipelineConfig::default()), cores);
    }

    #[test]
    fn effective_workers_clamped() {
        let config = PipelineConfig {
            max_workers: Some(100_000),
            ..Default::default()
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_workers(&config), cores);

        let zero = PipelineConfig {
            max_workers: Some(0),
            ..Default::default()
        };
        assert_eq!(effective_workers(&zero), 1);
    }
}
