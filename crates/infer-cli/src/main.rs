mod batch;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use infer_core::{InferError, SessionLayout};
use infer_session::{
    DockerCli, LearnerPlan, RunPlan, SessionLock, SessionOrchestrator, TargetPlan,
};

#[derive(Parser)]
#[command(
    name = "fsm-infer",
    version,
    about = "Infer the state machine of a server over disposable container replicas"
)]
struct Cli {
    /// Path to the session configuration (TOML)
    #[arg(short = 'f', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision replicas, run the learner and collect its results.
    ///
    /// The run waits for the learner without a time limit. If it is
    /// interrupted (Ctrl-C), clean up with `fsm-infer teardown -i <id>`
    /// before starting the same session again.
    Run {
        /// Output directory (default: result/<implementation>.<version>mode_<mode>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Session id when running in parallel; a non-zero id implies --skip-learner
        #[arg(short = 'i', long)]
        id: Option<u8>,

        /// Reuse the existing target image instead of building it
        #[arg(long)]
        skip_target: bool,

        /// Reuse the existing learner image instead of building it
        #[arg(long)]
        skip_learner: bool,

        /// Restart the target replica after each query
        #[arg(short = 'r', long)]
        restart_server: bool,
    },

    /// Remove the containers and network of a session
    Teardown {
        /// Session id
        #[arg(short = 'i', long)]
        id: u8,

        /// Target image to remove as well
        #[arg(long)]
        image: Option<String>,
    },

    /// Generate one configuration per tag from a base configuration
    Batch {
        /// Base configuration
        #[arg(short = 'c', long)]
        base: PathBuf,

        /// File with one tag per line (`git tag > tags`)
        #[arg(short, long)]
        tags: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Only the newest N tags
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show current configuration
    Config,

    /// Print an annotated example configuration
    Template,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli) {
        eprintln!("error: {e:#}");
        let code = e
            .downcast_ref::<InferError>()
            .map(InferError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            output,
            id,
            skip_target,
            skip_learner,
            restart_server,
        } => cmd_run(
            cli.config,
            output,
            id,
            skip_target,
            skip_learner,
            restart_server,
        ),
        Commands::Teardown { id, image } => cmd_teardown(cli.config, id, image),
        Commands::Batch {
            base,
            tags,
            output,
            limit,
        } => cmd_batch(&base, &tags, &output, limit),
        Commands::Config => cmd_config(cli.config),
        Commands::Template => {
            print!("{}", config::EXAMPLE_CONFIG);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Session commands
// ---------------------------------------------------------------------------

fn cmd_run(
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
    id: Option<u8>,
    skip_target: bool,
    skip_learner: bool,
    restart_server: bool,
) -> Result<()> {
    let mut config = config::load_config(config_path.as_deref())?;
    if let Some(id) = id {
        config.session.id = id;
    }
    if restart_server {
        config.learner.restart_server = true;
    }
    // Parallel sessions share one learner image, built by session 0.
    let skip_learner = skip_learner || config.session.id != 0;
    config.validate()?;

    let layout = config.layout()?;
    let target_build = if skip_target {
        None
    } else {
        config.target.build_context.as_ref().map(PathBuf::from)
    };
    let learner_build = if skip_learner {
        None
    } else {
        config.learner.build_context.as_ref().map(PathBuf::from)
    };
    let output_dir = output.unwrap_or_else(|| config.output_dir());

    let plan = RunPlan {
        target: TargetPlan {
            image: config.target_image(),
            build_args: vec![("VersionSUT".into(), config.target.version.clone())],
            command: config.target.command.clone(),
            build_context: target_build.clone(),
        },
        learner: LearnerPlan {
            image: config.learner.image.clone(),
            build_context: learner_build,
            command: config.learner_command(),
            mount_point: config.learner.mount_point.clone(),
        },
        output_dir: output_dir.clone(),
        readiness: config.readiness(target_build.is_some()),
        supervision: config.supervision(),
        lock_dir: Some(config::lock_dir()),
        configuration: Some(
            toml::to_string_pretty(&config).context("serializing resolved config")?,
        ),
    };

    info!(
        "session {}: {} replicas of {} on {}",
        layout.id(),
        layout.replicas(),
        plan.target.image,
        layout.subnet()
    );
    let orchestrator = SessionOrchestrator::new(DockerCli::default(), layout);
    let summary = orchestrator.run(&plan)?;

    println!(
        "Inference finished in {}s, results in {}",
        summary.duration_secs(),
        output_dir.display()
    );
    Ok(())
}

fn cmd_teardown(config_path: Option<PathBuf>, id: u8, image: Option<String>) -> Result<()> {
    let config = config::load_config(config_path.as_deref())?;
    let layout = SessionLayout::new(id, &config.session.network_base, 1)?;
    let orchestrator = SessionOrchestrator::new(DockerCli::default(), layout);

    let report = orchestrator.teardown(image.as_deref());
    if SessionLock::release_stale(&config::lock_dir(), id)? {
        println!("Released stale lock of session {id}");
    }
    println!(
        "Removed {} containers{}",
        report.containers_removed,
        if report.network_removed {
            " and the session network"
        } else {
            ""
        }
    );
    if report.failures > 0 {
        println!("{} cleanup steps failed (see log)", report.failures);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_batch(
    base: &std::path::Path,
    tags: &std::path::Path,
    output: &std::path::Path,
    limit: Option<usize>,
) -> Result<()> {
    let written = batch::generate(base, tags, output, limit)?;
    for path in &written {
        println!("{}", path.display());
    }
    println!("{} configurations written", written.len());
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>) -> Result<()> {
    println!("Config: {}", config::show_config_path(config_path.as_deref()));
    let config = config::load_config(config_path.as_deref())?;
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("serializing config")?
    );
    Ok(())
}
