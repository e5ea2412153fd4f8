//! Pagecraft - build a static web page from a reference image.
//!
//! Plans the page as a checklist of milestones, then implements them one
//! at a time into `index.html` and `styles.css`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pagecraft::ai::{provider_from_config, ChatProvider, Conversation};
use pagecraft::core::Config;
use pagecraft::workflow::{
    find_next_pending, mark_done, ArtifactPaths, Checklist, ChecklistStore, ConsoleProgress,
    EngineLimits, GenerativePlanAuthor, MilestoneEngine, PlanAuthor, ProgressEvent, ProgressSink,
    StoredPlan, Supervisor, WorkflowError, IMPLEMENTATION_PROMPT,
};

const DEFAULT_PROMPT: &str = "Build the web page shown in this image.";

/// Build a static web page from a reference image
#[derive(Parser)]
#[command(name = "pagecraft")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding plan.md, index.html and styles.css
    #[arg(long, global = true, env = "PAGECRAFT_ARTIFACTS_DIR")]
    artifacts_dir: Option<PathBuf>,

    /// Model to use (overrides config)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Model provider: openai or ollama (overrides config)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Maximum milestones to implement in one run
    #[arg(long, global = true)]
    max_milestones: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a milestone plan from a reference image
    Plan {
        /// Reference image of the page
        #[arg(short, long)]
        image: PathBuf,

        /// Message sent along with the image
        #[arg(short, long, default_value = DEFAULT_PROMPT)]
        prompt: String,
    },

    /// Implement the pending milestones of the saved plan
    Run {
        /// Reference image of the page
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Message sent along with the image
        #[arg(short, long, default_value = DEFAULT_PROMPT)]
        prompt: String,
    },

    /// Plan (when an image is given) and then implement every milestone
    Supervise {
        /// Reference image of the page; without it the saved plan is reused
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Message sent along with the image
        #[arg(short, long, default_value = DEFAULT_PROMPT)]
        prompt: String,
    },

    /// Show plan progress and artifact locations (default)
    Status,

    /// Print the next pending milestone
    Next,

    /// Mark a milestone done without implementing it
    Done {
        /// Milestone label, or a full `- [ ] ...` line to flip every identical line
        #[arg(allow_hyphen_values = true)]
        milestone: String,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,

        /// Write the effective configuration to the global config file
        #[arg(long, conflicts_with = "path")]
        save: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    // Handle commands
    match &cli.command {
        Some(Commands::Plan { image, prompt }) => cmd_plan(&cli, image, prompt)?,
        Some(Commands::Run { image, prompt }) => cmd_run(&cli, image.as_deref(), prompt)?,
        Some(Commands::Supervise { image, prompt }) => {
            cmd_supervise(&cli, image.as_deref(), prompt)?;
        }
        None | Some(Commands::Status) => cmd_status(&cli)?,
        Some(Commands::Next) => cmd_next(&cli)?,
        Some(Commands::Done { milestone }) => cmd_done(&cli, milestone)?,
        Some(Commands::Config { path, save }) => cmd_config(&cli, *path, *save)?,
        Some(Commands::Completions { shell }) => cmd_completions(*shell),
    }

    Ok(())
}

/// Load the config file and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load()?;

    if let Some(dir) = &cli.artifacts_dir {
        config.artifacts.dir.clone_from(dir);
    }
    if let Some(provider) = &cli.provider {
        config.ai.provider.clone_from(provider);
    }
    if let Some(model) = &cli.model {
        if config.ai.provider.eq_ignore_ascii_case("ollama") {
            config.ai.ollama.model.clone_from(model);
        } else {
            config.ai.model.clone_from(model);
        }
    }
    if let Some(max) = cli.max_milestones {
        config.engine.max_milestones = max;
    }

    tracing::debug!(
        provider = %config.ai.provider,
        artifacts = %config.artifacts.dir.display(),
        "Configuration loaded"
    );
    Ok(config)
}

fn image_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// Conversation used for generation: system prompt plus the reference image.
fn build_context(image: Option<&Path>, prompt: &str) -> Result<Conversation> {
    let mut context = Conversation::with_system(IMPLEMENTATION_PROMPT);
    match image {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            context.push_user_image(prompt, &bytes, image_mime(path));
        }
        None => context.push_user(prompt),
    }
    Ok(context)
}

fn require_checklist(paths: &ArtifactPaths) -> Result<ChecklistStore> {
    let store = ChecklistStore::new(&paths.plan);
    if !store.exists() {
        return Err(WorkflowError::MissingChecklist(paths.plan.clone()).into());
    }
    Ok(store)
}

fn build_engine(
    config: &Config,
    provider: Arc<dyn ChatProvider>,
    paths: &ArtifactPaths,
    progress: Arc<dyn ProgressSink>,
) -> MilestoneEngine {
    MilestoneEngine::with_provider(provider, paths, progress)
        .with_limits(EngineLimits::from_config(&config.engine))
        .with_empty_merge(config.engine.empty_merge)
}

/// Write a plan from a reference image.
fn cmd_plan(cli: &Cli, image: &Path, prompt: &str) -> Result<()> {
    let config = load_config(cli)?;
    let paths = ArtifactPaths::from_config(&config.artifacts);
    let provider = provider_from_config(&config.ai)?;
    let context = build_context(Some(image), prompt)?;

    println!("Writing plan with {} ({})...\n", provider.name(), provider.model());

    let rt = tokio::runtime::Runtime::new()?;
    let plan = rt.block_on(GenerativePlanAuthor::new(provider).author(&context))?;

    ChecklistStore::new(&paths.plan).save(&plan)?;

    println!("{plan}\n");
    let milestones = Checklist::parse(&plan).milestones().len();
    println!("{}", ProgressEvent::PlanAuthored { milestones });
    println!("Saved to {}", paths.plan.display());
    Ok(())
}

/// Implement pending milestones.
fn cmd_run(cli: &Cli, image: Option<&Path>, prompt: &str) -> Result<()> {
    let config = load_config(cli)?;
    let paths = ArtifactPaths::from_config(&config.artifacts);
    require_checklist(&paths)?;

    let provider = provider_from_config(&config.ai)?;
    let progress = Arc::new(ConsoleProgress::new(config.engine.echo_code));
    let mut engine = build_engine(&config, provider, &paths, progress);
    let context = build_context(image, prompt)?;

    let rt = tokio::runtime::Runtime::new()?;
    let run = rt.block_on(engine.run_with_plan(&context))?;

    if !run.outcome.milestones().is_empty() {
        println!("\nOpen {} to see the result.", paths.html.display());
    }
    Ok(())
}

/// Plan, then implement every milestone.
fn cmd_supervise(cli: &Cli, image: Option<&Path>, prompt: &str) -> Result<()> {
    let config = load_config(cli)?;
    let paths = ArtifactPaths::from_config(&config.artifacts);

    let author: Arc<dyn PlanAuthor> = if image.is_some() {
        let provider = provider_from_config(&config.ai)?;
        Arc::new(GenerativePlanAuthor::new(provider))
    } else {
        Arc::new(StoredPlan::new(require_checklist(&paths)?))
    };

    let provider = provider_from_config(&config.ai)?;
    let progress: Arc<dyn ProgressSink> = Arc::new(ConsoleProgress::new(config.engine.echo_code));
    let engine = build_engine(&config, provider, &paths, Arc::clone(&progress));
    let mut supervisor = Supervisor::new(author, engine, progress);
    let context = build_context(image, prompt)?;

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(supervisor.execute(&context))?;

    if !report.outcome.milestones().is_empty() {
        println!("\nOpen {} to see the result.", paths.html.display());
    }
    Ok(())
}

/// Show plan progress.
fn cmd_status(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let paths = ArtifactPaths::from_config(&config.artifacts);
    let store = ChecklistStore::new(&paths.plan);

    if !store.exists() {
        println!("No plan yet at {}", paths.plan.display());
        println!("Run `pagecraft plan --image <file>` to create one.");
        return Ok(());
    }

    let checklist = store.load_checklist()?;
    println!("Plan: {}", paths.plan.display());
    println!(
        "Milestones: {} done, {} pending, {} total",
        checklist.done_count(),
        checklist.pending_count(),
        checklist.milestones().len()
    );
    if let Some(next) = checklist.next_pending() {
        println!("Next: {next}");
    }

    for (label, path) in [("HTML", &paths.html), ("CSS", &paths.css)] {
        let state = if path.exists() { "" } else { " (not generated yet)" };
        println!("{label}: {}{state}", path.display());
    }
    Ok(())
}

/// Print the next pending milestone.
fn cmd_next(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let paths = ArtifactPaths::from_config(&config.artifacts);
    let document = require_checklist(&paths)?.load()?;

    match find_next_pending(&document) {
        Some(milestone) => println!("{milestone}"),
        None => println!("All milestones are complete."),
    }
    Ok(())
}

/// Mark a milestone done by hand.
fn cmd_done(cli: &Cli, milestone: &str) -> Result<()> {
    let config = load_config(cli)?;
    let paths = ArtifactPaths::from_config(&config.artifacts);
    let store = require_checklist(&paths)?;
    let document = store.load()?;
    let milestone = milestone.trim();

    if milestone.starts_with("- [ ]") {
        let updated = mark_done(&document, milestone);
        if updated == document {
            anyhow::bail!("No pending milestone line matches '{milestone}'");
        }
        store.save(&updated)?;
    } else {
        let mut checklist = Checklist::parse(&document);
        let id = checklist
            .milestones()
            .iter()
            .find(|m| m.is_pending() && m.label == milestone)
            .map(|m| m.id)
            .ok_or_else(|| anyhow::anyhow!("No pending milestone labelled '{milestone}'"))?;
        checklist.mark_done(id);
        store.save_checklist(&checklist)?;
    }

    println!("Marked done: {milestone}");
    Ok(())
}

/// Show configuration.
fn cmd_config(cli: &Cli, show_path: bool, save: bool) -> Result<()> {
    if show_path {
        match Config::locate().or_else(|| Config::config_dir().map(|d| d.join("config.toml"))) {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("Could not determine config directory"),
        }
        return Ok(());
    }

    let config = load_config(cli)?;
    if save {
        let path = config.save()?;
        println!("Saved configuration to {}", path.display());
        return Ok(());
    }

    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "pagecraft", &mut io::stdout());
}
