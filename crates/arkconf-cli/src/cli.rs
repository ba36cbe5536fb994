//! arkconf - keep ARK server configuration in sync with version control
//!
//! Usage:
//!   arkconf pull --servers Island Ragnarok
//!   arkconf load
//!   arkconf dump -s Island
//!   arkconf push --format json

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use arkconf_core::{
    select_names, Environment, Error, FsStorage, Pipeline, ProjectConfig, ServerRegistry,
    Storage, CONFIG_FILE,
};
use arkconf_sync::{Operation, SftpTransport, SyncEngine, Transport};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::render;

const EXIT_FAILED: u8 = 1;
const EXIT_SETUP: u8 = 2;

/// arkconf - Sync ARK server configuration between servers, INI and YAML
#[derive(Parser, Debug)]
#[command(name = "arkconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root holding arkconf.yml and the config stores
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Project configuration file [default: <root>/arkconf.yml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Variables file [default: <root>/.env if present]
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Log progress and debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch flat files from the servers into the flat store
    Pull(Selection),

    /// Upload the flat store to the servers
    Push(Selection),

    /// Convert flat files into YAML documents and shared includes
    Load(Selection),

    /// Render YAML documents back into flat files
    Dump(Selection),
}

#[derive(Args, Debug)]
struct Selection {
    /// Only these servers (default: all)
    #[arg(short, long, num_args = 1..)]
    servers: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Text,
    Json,
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    ExitCode::from(execute(&cli, Environment::from_process()))
}

/// `warn` by default, `debug` with `-v`; `RUST_LOG` wins over both
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

struct Project {
    root: PathBuf,
    config: ProjectConfig,
    env: Environment,
}

fn open_project(cli: &Cli, process_env: Environment) -> Result<Project, Error> {
    let config = match &cli.config {
        Some(path) => ProjectConfig::from_file(path)?,
        None => ProjectConfig::load_or_default(cli.root.join(CONFIG_FILE))?,
    };

    let env_file = match &cli.env_file {
        Some(path) => Some(path.clone()),
        None => Some(cli.root.join(".env")).filter(|p| p.is_file()),
    };
    let env = match env_file {
        Some(path) => {
            log::debug!("Reading variables from {}", path.display());
            let text = read_text(&path)?;
            process_env
                .with_dotenv(&text)
                .map_err(|e| e.in_file(path.display().to_string()))?
        }
        None => process_env,
    };

    Ok(Project {
        root: cli.root.clone(),
        config,
        env,
    })
}

fn read_text(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))
}

fn execute(cli: &Cli, process_env: Environment) -> u8 {
    let project = match open_project(cli, process_env) {
        Ok(p) => p,
        Err(e) => {
            render::setup_error(&e);
            return EXIT_SETUP;
        }
    };

    match &cli.command {
        Commands::Pull(selection) => cmd_sync(&project, Operation::Pull, selection),
        Commands::Push(selection) => cmd_sync(&project, Operation::Push, selection),
        Commands::Load(selection) => cmd_convert(&project, "load", selection),
        Commands::Dump(selection) => cmd_convert(&project, "dump", selection),
    }
}

fn cmd_sync(project: &Project, operation: Operation, selection: &Selection) -> u8 {
    let transport = Arc::new(SftpTransport::from_config(&project.config));
    sync_with(project, operation, selection, transport)
}

fn sync_with(
    project: &Project,
    operation: Operation,
    selection: &Selection,
    transport: Arc<dyn Transport>,
) -> u8 {
    let servers = match ServerRegistry::from_env(&project.config.servers, &project.env)
        .and_then(|registry| registry.select(&selection.servers))
    {
        Ok(servers) => servers,
        Err(e) => {
            render::setup_error(&e);
            return EXIT_SETUP;
        }
    };
    if servers.is_empty() {
        eprintln!(
            "{} no server has connection settings (<NAME>_HOST, <NAME>_USER, <NAME>_PASS)",
            "warning:".yellow()
        );
        return 0;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: failed to start async runtime: {}", "Error".red(), e);
            return EXIT_SETUP;
        }
    };

    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new(&project.root));
    let engine = SyncEngine::new(project.config.clone(), transport, storage);
    let report = runtime.block_on(async {
        engine.cancel_on_ctrl_c();
        engine.run(operation, servers).await
    });

    render::sync_report(&report, selection.format);
    if report.has_failures() {
        EXIT_FAILED
    } else {
        0
    }
}

fn cmd_convert(project: &Project, command: &str, selection: &Selection) -> u8 {
    let names = match select_names(&project.config.servers, &selection.servers) {
        Ok(names) => names,
        Err(e) => {
            render::setup_error(&e);
            return EXIT_SETUP;
        }
    };

    let storage = FsStorage::new(&project.root);
    let pipeline = Pipeline::new(&project.config, &storage);
    let report = if command == "load" {
        pipeline.load(&names)
    } else {
        pipeline.dump(&names, &project.env)
    };

    render::conversion_report(command, &report, selection.format);
    if report.has_failures() {
        EXIT_FAILED
    } else {
        0
    }
}
