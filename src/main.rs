mod commands;

use brewc::{BuildOptions, Config, InstallOptions, PackageManager, UninstallMode};
use clap::{Parser, Subcommand};
use indicatif::MultiProgress;

#[derive(Parser)]
#[command(name = "brewc")]
#[command(author, version, about = "Concurrent dependency resolution and bottle prefetching for Homebrew", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Number of concurrent metadata requests and downloads
    #[arg(short, long, global = true, default_value_t = brewc::config::DEFAULT_THREADS)]
    threads: usize,

    /// Enable verbose output (debug logs, brew output)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// GitHub token used for ghcr.io manifest and bottle requests
    #[arg(long, global = true, env = "HOMEBREW_GITHUB_API_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Prefetch bottles concurrently, then install with brew
    Install {
        /// Formula names
        #[arg(required = true)]
        formulae: Vec<String>,

        /// Maximum dependency depth (-1 for unlimited)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        depth: i64,

        /// Also resolve dependencies of already installed formulae
        #[arg(long)]
        include_installed: bool,
    },

    /// Uninstall formulae
    Uninstall {
        /// Formula names
        #[arg(required = true)]
        formulae: Vec<String>,

        /// Also remove direct dependencies that nothing else needs
        #[arg(short, long)]
        delete_unused_dependencies: bool,

        /// Also remove every nested dependency that nothing else needs
        #[arg(short = 'D', long)]
        delete_all_nested_dependencies: bool,
    },

    /// Reinstall formulae, prefetching missing dependencies first
    Reinstall {
        /// Formula names
        #[arg(required = true)]
        formulae: Vec<String>,
    },

    /// Download bottles and manifests into the Homebrew cache
    Fetch {
        /// Formula names
        #[arg(required = true)]
        formulae: Vec<String>,

        /// Maximum dependency depth (-1 for unlimited)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        depth: i64,

        /// Also resolve dependencies of already installed formulae
        #[arg(long)]
        include_installed: bool,
    },

    /// Show the dependencies brewc would install
    Deps {
        /// Formula name
        formula: String,

        /// Show as tree
        #[arg(long)]
        tree: bool,

        /// Maximum dependency depth (-1 for unlimited)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        depth: i64,

        /// Also resolve dependencies of already installed formulae
        #[arg(long)]
        include_installed: bool,
    },
}

fn install_options(depth: i64, include_installed: bool) -> InstallOptions {
    InstallOptions {
        max_depth: BuildOptions::depth_from_flag(depth),
        include_installed,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::from_env()?.threads(cli.threads);
    if let Some(token) = cli.github_token.filter(|t| !t.is_empty()) {
        config = config.github_token(token);
    }

    let pm = PackageManager::new(config)?
        .verbose(cli.verbose)
        .with_progress(MultiProgress::new());

    let failed = match cli.command {
        Commands::Install {
            formulae,
            depth,
            include_installed,
        } => commands::install(&pm, &formulae, &install_options(depth, include_installed)).await,
        Commands::Uninstall {
            formulae,
            delete_unused_dependencies,
            delete_all_nested_dependencies,
        } => {
            let mode = if delete_all_nested_dependencies {
                UninstallMode::AllNestedDependencies
            } else if delete_unused_dependencies {
                UninstallMode::UnusedDependencies
            } else {
                UninstallMode::Only
            };
            commands::uninstall(&pm, &formulae, mode).await
        }
        Commands::Reinstall { formulae } => commands::reinstall(&pm, &formulae).await,
        Commands::Fetch {
            formulae,
            depth,
            include_installed,
        } => commands::fetch(&pm, &formulae, &install_options(depth, include_installed)).await,
        Commands::Deps {
            formula,
            tree,
            depth,
            include_installed,
        } => commands::deps(&pm, &formula, tree, &install_options(depth, include_installed)).await,
    };

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
