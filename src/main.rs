use clap::{Parser, Subcommand};
use explainer::cache::RenderCache;
use explainer::coordinator::{self, CodedManifest, CoordinatorError};
use explainer::model::AnthropicBackend;
use explainer::pipeline::PipelineContext;
use explainer::planner::{self, PlanManifest};
use explainer::render::ManimRenderer;
use explainer::{assemble, config, context, naming, output};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const PLAN_MANIFEST: &str = "plan.json";
const CODED_MANIFEST: &str = "coded.json";

/// Flags shared by the commands that plan an article.
#[derive(clap::Args, Clone)]
struct PlanArgs {
    /// What the article should explain
    topic: String,

    /// Reference material: plain text, or a page extraction (.json)
    #[arg(long)]
    context_file: Option<PathBuf>,

    /// Upper bound on planned components (overrides article.max_components)
    #[arg(long)]
    max_components: Option<usize>,
}

#[derive(Parser)]
#[command(name = "explainer")]
#[command(about = "Generates illustrated educational articles from a topic")]
#[command(long_about = "\
Generates illustrated educational articles from a topic

An article is planned as an ordered list of components: markdown prose,
static diagrams and short animations. Every visual is written as a Manim
script, rendered to prove it works, repaired from the renderer's error when
it doesn't, and finally embedded in a single self-contained HTML file.

Stages (each can be run on its own):

  plan      topic            → .explainer-temp/plan.json
  code      plan.json        → .explainer-temp/coded.json
  assemble  coded.json       → <title>.html

Requirements:
  ANTHROPIC_API_KEY   API key for the model (variable name configurable)
  manim               Manim Community Edition on PATH

Run 'explainer gen-config' to generate a documented explainer.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Output HTML file (default: article.output, else named after the title)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Directory for intermediate files (manifests, render cache)
    #[arg(long, default_value = ".explainer-temp", global = true)]
    temp_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan the article header and components
    Plan(PlanArgs),
    /// Generate and validate a script for every visual component
    Code,
    /// Render media and produce the final HTML page
    Assemble,
    /// Run the full pipeline: plan → code → assemble
    Build(PlanArgs),
    /// Check that the renderer runs and the API key is set
    Check,
    /// Print a stock explainer.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let load = || config::load_config(&cli.config);

    match &cli.command {
        Command::Plan(args) => {
            let cfg = load()?;
            let plan = run_plan(&cfg, &cli.temp_dir, args)?;
            output::print_plan_output(&plan);
        }
        Command::Code => {
            let cfg = load()?;
            let plan: PlanManifest = read_manifest(&cli.temp_dir.join(PLAN_MANIFEST))?;
            let coded = run_code(&cfg, &cli.temp_dir, &plan)?;
            output::print_code_output(&coded);
        }
        Command::Assemble => {
            let cfg = load()?;
            let coded: CodedManifest = read_manifest(&cli.temp_dir.join(CODED_MANIFEST))?;
            run_assemble(&cfg, &cli.temp_dir, cli.output.as_deref(), &coded)?;
        }
        Command::Build(args) => {
            let cfg = load()?;
            println!("==> Stage 1: Planning \"{}\"", args.topic);
            let plan = run_plan(&cfg, &cli.temp_dir, args)?;
            output::print_plan_output(&plan);

            println!("==> Stage 2: Generating code");
            let coded = run_code(&cfg, &cli.temp_dir, &plan)?;
            output::print_code_output(&coded);

            println!("==> Stage 3: Assembling article");
            let path = run_assemble(&cfg, &cli.temp_dir, cli.output.as_deref(), &coded)?;
            println!("==> Build complete: {}", path.display());
        }
        Command::Check => {
            let cfg = load()?;
            run_check(&cfg)?;
            println!("==> Environment is ready");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default: warnings only).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_plan(
    cfg: &config::ExplainerConfig,
    temp_dir: &Path,
    args: &PlanArgs,
) -> Result<PlanManifest, Box<dyn std::error::Error>> {
    let context = match &args.context_file {
        Some(path) => context::load_context(path)?,
        None => String::new(),
    };
    let max_components = args.max_components.unwrap_or(cfg.article.max_components);
    let model = AnthropicBackend::from_config(&cfg.model)?;

    let plan = planner::plan_article(&model, &cfg.model, &args.topic, &context, max_components)?;
    write_manifest(&temp_dir.join(PLAN_MANIFEST), &plan)?;
    Ok(plan)
}

fn run_code(
    cfg: &config::ExplainerConfig,
    temp_dir: &Path,
    plan: &PlanManifest,
) -> Result<CodedManifest, Box<dyn std::error::Error>> {
    let model = AnthropicBackend::from_config(&cfg.model)?;
    let renderer = ManimRenderer::from_config(&cfg.renderer);
    let cache = Mutex::new(RenderCache::load(temp_dir, &cfg.renderer));

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_pipeline_event(&event) {
                println!("{}", line);
            }
        }
    });

    let ctx = PipelineContext {
        model: &model,
        renderer: &renderer,
        cache: &cache,
        model_config: &cfg.model,
        max_attempts: cfg.pipeline.max_attempts,
        events: Some(tx),
    };
    let result = coordinator::code_article(&ctx, plan, config::effective_workers(&cfg.pipeline));
    // Dropping the context closes the channel so the printer can finish.
    drop(ctx);
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;

    let cache = cache
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    save_code_stage(result, &cache, temp_dir)
}

/// Persist the render cache, then surface the coordinator result.
///
/// The cache is written even when a component failed: its siblings' renders
/// stay reusable on the next run.
fn save_code_stage(
    result: Result<CodedManifest, CoordinatorError>,
    cache: &RenderCache,
    temp_dir: &Path,
) -> Result<CodedManifest, Box<dyn std::error::Error>> {
    cache.save(temp_dir)?;
    let coded = result?;
    write_manifest(&temp_dir.join(CODED_MANIFEST), &coded)?;
    Ok(coded)
}

fn run_assemble(
    cfg: &config::ExplainerConfig,
    temp_dir: &Path,
    cli_output: Option<&Path>,
    coded: &CodedManifest,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let renderer = ManimRenderer::from_config(&cfg.renderer);
    let cache = RenderCache::load(temp_dir, &cfg.renderer);
    let assembly = coded.assembly();

    let article = assemble::assemble_with_stats(&assembly, &renderer, &cache)?;
    let path = resolve_output(cli_output, cfg, &coded.header.title);
    assemble::write_article(&article.markup, &path)?;
    output::print_assemble_output(
        &coded.header,
        &path,
        assembly.artifacts.len(),
        &article.stats,
    );
    Ok(path)
}

fn run_check(cfg: &config::ExplainerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let renderer = ManimRenderer::from_config(&cfg.renderer);
    if !renderer.is_available() {
        return Err(format!("renderer '{}' could not be started", cfg.renderer.program).into());
    }
    println!("Renderer: {} OK", cfg.renderer.program);

    AnthropicBackend::from_config(&cfg.model)?;
    println!("API key: ${} set", cfg.model.api_key_env);
    println!("Model: {}", cfg.model.model);
    Ok(())
}

/// `--output` wins, then `article.output`, then a name derived from the title.
fn resolve_output(cli_output: Option<&Path>, cfg: &config::ExplainerConfig, title: &str) -> PathBuf {
    cli_output
        .map(Path::to_path_buf)
        .or_else(|| cfg.article.output.clone())
        .unwrap_or_else(|| PathBuf::from(naming::article_filename(title)))
}

fn read_manifest<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<T, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e} (run the previous stage first)", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}

fn write_manifest<T: serde::Serialize>(
    path: &Path,
    manifest: &T,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(manifest)?;
    std::fs::write(path, json)?;
    Ok(())
}
