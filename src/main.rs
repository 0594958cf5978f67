use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use prodh::config::{get_config_path, get_log_path, load_or_create_config};
use prodh::integrations::docker;
use prodh::process::{HostProbe, kill_port};
use prodh::ui::menu::kill_status_message;
use prodh::ui::render::info_lines;
use prodh::{AppContext, StartScreen, project};

#[derive(Parser, Debug)]
#[command(
    name = "prodh",
    version,
    about = "Terminal dashboard for local web projects: run scripts, watch processes, free ports."
)]
struct Args {
    /// Project directory to inspect.
    #[arg(long, value_name = "PATH", default_value = ".")]
    dir: PathBuf,

    /// Config file (defaults to ~/.prodh.json).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the detected project descriptor.
    Info {
        #[arg(long)]
        json: bool,
    },
    /// Open the dashboard directly on the process monitor.
    Monitor,
    /// Kill whatever listens on PORT.
    Kill {
        #[arg(value_name = "PORT")]
        port: u16,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging();

    let config_path = args.config.clone().unwrap_or_else(get_config_path);
    let config = load_or_create_config(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    let project = project::detect(&args.dir);
    info!(
        "Detected {} project using {} in {}",
        project.project_type.as_str(),
        project.package_manager,
        args.dir.display()
    );

    match args.command {
        Some(Command::Info { json }) => {
            if json {
                let out = serde_json::to_string_pretty(&project)
                    .context("failed to serialize project descriptor")?;
                println!("{}", out);
            } else {
                let docker = if project.has_docker {
                    Some(docker::status().await)
                } else {
                    None
                };
                for line in info_lines(&project, docker.as_ref()) {
                    println!("{}", line);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Kill { port }) => {
            let probe = HostProbe::new(config.monitoring.process_filter.clone());
            let outcome = kill_port(&probe, port).await;
            println!("{}", kill_status_message(port, outcome.succeeded));
            Ok(if outcome.succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        command => {
            let start = match command {
                Some(Command::Monitor) => StartScreen::Monitor,
                _ => StartScreen::Menu,
            };
            let ctx = AppContext {
                probe: Arc::new(HostProbe::new(config.monitoring.process_filter.clone())),
                scripts: project::available_scripts(&args.dir),
                project_dir: args.dir,
                project,
                config,
            };
            prodh::run(ctx, start).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// The terminal belongs to the dashboard, so records go to a log file.
/// Falls back to stderr when the file cannot be opened.
fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    let path = get_log_path();
    let file = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));
    let file_error = match file {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
            None
        }
        Err(err) => Some(err),
    };
    builder.init();
    if let Some(err) = file_error {
        warn!("Logging to stderr, cannot open {}: {}", path.display(), err);
    }
}
