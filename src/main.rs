//! podtree entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, error, info};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::interval;

mod actions;
mod compose;
mod config;
mod discover;
mod labels;
mod parse;
mod query;
mod refresh;
mod render;
mod report;
mod runtime;
mod store;
mod tree;
mod types;

use actions::{Actions, ComposeSettings, ComposeVerb, Lifecycle, MachineAction, Prune};
use config::Config;
use refresh::RefreshState;
use report::{LogReporter, Reporter};
use runtime::{Engine, Podman, ProcessEngine};
use store::{ComposePathStore, JsonFileStore, MemoryStore};
use tree::{ProviderSettings, TreeProvider};

#[derive(Parser)]
#[command(name = "podtree")]
#[command(about = "Browse and manage Podman containers, pods and compose projects")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// How many levels below the categories to expand
    #[arg(short, long, default_value_t = 2)]
    depth: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resource tree once
    Tree,
    /// Print the tree and reprint it after every refresh
    Watch,
    /// Container lifecycle
    Container {
        action: LifecycleArg,
        id: String,
    },
    /// Create a pod or change its state
    Pod {
        #[command(subcommand)]
        action: PodCommand,
    },
    /// Remove an image
    Image {
        #[command(subcommand)]
        action: RemoveCommand,
    },
    /// Create or remove a volume
    Volume {
        #[command(subcommand)]
        action: ResourceCommand,
    },
    /// Create or remove a network
    Network {
        #[command(subcommand)]
        action: ResourceCommand,
    },
    /// Run a compose command for a project
    Compose {
        verb: ComposeArg,
        project: String,
        /// Compose file, when it cannot be inferred from container labels
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Build an image from a Dockerfile
    Build {
        /// Name and tag for the image
        #[arg(short, long)]
        tag: String,
        #[arg(short, long, default_value = "Dockerfile")]
        file: PathBuf,
    },
    /// Start or stop a Podman machine
    Machine {
        action: MachineArg,
        /// Defaults to the configured machine name
        name: Option<String>,
    },
    /// Reclaim disk space
    Prune { what: PruneArg },
    /// Print a container's logs
    Logs { container: String },
}

#[derive(Subcommand)]
enum PodCommand {
    Create {
        #[arg(long)]
        name: Option<String>,
    },
    Start { id: String },
    Stop { id: String },
    Restart { id: String },
    Rm { id: String },
}

#[derive(Subcommand)]
enum RemoveCommand {
    Rm { id: String },
}

#[derive(Subcommand)]
enum ResourceCommand {
    Create { name: String },
    Rm { name: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum LifecycleArg {
    Start,
    Stop,
    Restart,
    Rm,
}

impl From<LifecycleArg> for Lifecycle {
    fn from(arg: LifecycleArg) -> Self {
        match arg {
            LifecycleArg::Start => Lifecycle::Start,
            LifecycleArg::Stop => Lifecycle::Stop,
            LifecycleArg::Restart => Lifecycle::Restart,
            LifecycleArg::Rm => Lifecycle::Remove,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MachineArg {
    Start,
    Stop,
}

impl From<MachineArg> for MachineAction {
    fn from(arg: MachineArg) -> Self {
        match arg {
            MachineArg::Start => MachineAction::Start,
            MachineArg::Stop => MachineAction::Stop,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ComposeArg {
    Up,
    Down,
    Start,
    Stop,
    Restart,
}

impl From<ComposeArg> for ComposeVerb {
    fn from(arg: ComposeArg) -> Self {
        match arg {
            ComposeArg::Up => ComposeVerb::Up,
            ComposeArg::Down => ComposeVerb::Down,
            ComposeArg::Start => ComposeVerb::Start,
            ComposeArg::Stop => ComposeVerb::Stop,
            ComposeArg::Restart => ComposeVerb::Restart,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PruneArg {
    Images,
    AllImages,
    Builder,
}

impl From<PruneArg> for Prune {
    fn from(arg: PruneArg) -> Self {
        match arg {
            PruneArg::Images => Prune::DanglingImages,
            PruneArg::AllImages => Prune::UnusedImages,
            PruneArg::Builder => Prune::BuilderCache,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Load configuration
    let cfg = Config::load()?;
    info!("Starting podtree with config: {:?}", cfg);

    let engine: Arc<dyn Engine> = Arc::new(ProcessEngine::new());
    let podman = Podman::new(&cfg.podman_path);
    let reporter: Arc<dyn Reporter> = Arc::new(LogReporter);
    let store: Arc<dyn ComposePathStore> = match &cfg.compose_store {
        Some(path) => Arc::new(JsonFileStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };
    debug!("Remembered compose files: {:?}", store.all());

    let tree = Arc::new(TreeProvider::new(
        Arc::clone(&engine),
        podman.clone(),
        Arc::clone(&reporter),
        Arc::clone(&store),
        ProviderSettings {
            debounce: cfg.refresh_debounce(),
            ledger_scope: cfg.ledger_scope,
        },
    ));
    let actions = Actions::new(
        engine,
        podman,
        ComposeSettings::from(&cfg),
        reporter,
        store,
        Arc::clone(&tree),
    );

    match cli.command.unwrap_or(Commands::Tree) {
        Commands::Tree => print!("{}", render::render(&tree, cli.depth).await),
        Commands::Watch => watch(&tree, &cfg, cli.depth).await,
        Commands::Container { action, id } => {
            actions.container(action.into(), &id).await?;
        }
        Commands::Pod { action } => match action {
            PodCommand::Create { name } => {
                print!("{}", actions.create_pod(name.as_deref()).await?.stdout);
            }
            PodCommand::Start { id } => {
                actions.pod(Lifecycle::Start, &id).await?;
            }
            PodCommand::Stop { id } => {
                actions.pod(Lifecycle::Stop, &id).await?;
            }
            PodCommand::Restart { id } => {
                actions.pod(Lifecycle::Restart, &id).await?;
            }
            PodCommand::Rm { id } => {
                actions.pod(Lifecycle::Remove, &id).await?;
            }
        },
        Commands::Image {
            action: RemoveCommand::Rm { id },
        } => {
            actions.remove_image(&id).await?;
        }
        Commands::Volume { action } => match action {
            ResourceCommand::Create { name } => {
                actions.create_volume(&name).await?;
            }
            ResourceCommand::Rm { name } => {
                actions.remove_volume(&name).await?;
            }
        },
        Commands::Network { action } => match action {
            ResourceCommand::Create { name } => {
                actions.create_network(&name).await?;
            }
            ResourceCommand::Rm { name } => {
                actions.remove_network(&name).await?;
            }
        },
        Commands::Compose {
            verb,
            project,
            file,
        } => {
            let output = actions
                .compose(verb.into(), &project, file.as_deref())
                .await?;
            print!("{}", output.stdout);
        }
        Commands::Build { tag, file } => {
            print!("{}", actions.build_image(&tag, &file).await?.stdout);
        }
        Commands::Machine { action, name } => {
            let name = name.unwrap_or_else(|| cfg.machine_name.clone());
            actions.machine(action.into(), &name).await?;
        }
        Commands::Prune { what } => {
            let output = actions.prune(what.into()).await?;
            print!("{}", output.stdout);
        }
        Commands::Logs { container } => print!("{}", actions.logs(&container).await?),
    }

    Ok(())
}

/// Reprint the tree after each completed refresh until Ctrl+C.
async fn watch(tree: &TreeProvider, cfg: &Config, depth: usize) {
    let mut changes = tree.subscribe();
    let mut ticker = interval(cfg.watch_interval());
    print!("{}", render::render(tree, depth).await);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if tree.refresh_state() == RefreshState::PendingRefresh {
                    debug!("Refresh already pending");
                }
                tree.refresh();
            }
            changed = changes.recv() => {
                if let Err(RecvError::Closed) = changed {
                    error!("Refresh notifications stopped");
                    break;
                }
                println!();
                print!("{}", render::render(tree, depth).await);
            }
            res = signal::ctrl_c() => {
                if let Err(err) = res {
                    error!("Unable to listen for shutdown signal: {}", err);
                }
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }
}
