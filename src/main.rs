// src/main.rs
//! Neo Package Manager - CLI Entry Point

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

mod commands;

// =============================================================================
// CLI Definitions
// =============================================================================

#[derive(Parser)]
#[command(name = "neopkg")]
#[command(author = "Neo Package Project")]
#[command(version)]
#[command(about = "Package manager for the neo server ecosystem", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search package info
    Search {
        /// Package name to search for
        package: String,

        /// Path to the package base directory
        #[arg(short, long)]
        dir: PathBuf,

        /// Include alpha releases in results
        #[arg(long)]
        experimental: bool,
    },

    /// Update the package rosters and report upgradable packages
    Update {
        /// Path to the package base directory
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Install packages
    Install {
        /// Package names
        #[arg(required = true)]
        packages: Vec<String>,

        /// Path to the package base directory
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Uninstall a package
    Uninstall {
        /// Package name
        package: String,

        /// Path to the package base directory
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Audit a package descriptor
    Audit {
        /// Path to package.yml, or a package name under $PKGS_PATH
        descriptor: String,
    },

    /// Audit packages and emit their build matrix
    Plan {
        /// Package names under $PKGS_PATH
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Build a package's release archive
    Build {
        /// Path to package.yml
        descriptor: PathBuf,

        /// Specific release tag to build (defaults to the latest)
        #[arg(long)]
        version: Option<String>,

        /// Working directory for the build
        #[arg(long, default_value = "./tmp")]
        dest: PathBuf,
    },

    /// Refresh caches, probe availability and plan unavailable packages
    RebuildPlan {
        /// Path to the package base directory
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Refresh caches and availability, then push them to the catalog
    RebuildCache {
        /// Path to the package base directory
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Search {
            package,
            dir,
            experimental,
        }) => commands::search(&dir, &package, experimental),
        Some(Commands::Update { dir }) => commands::update(&dir),
        Some(Commands::Install { packages, dir }) => commands::install(&dir, &packages),
        Some(Commands::Uninstall { package, dir }) => commands::uninstall(&dir, &package),
        Some(Commands::Audit { descriptor }) => commands::audit(&descriptor),
        Some(Commands::Plan { packages }) => commands::plan(&packages),
        Some(Commands::Build {
            descriptor,
            version,
            dest,
        }) => commands::build(&descriptor, version.as_deref(), &dest),
        Some(Commands::RebuildPlan { dir }) => commands::rebuild_plan(&dir),
        Some(Commands::RebuildCache { dir }) => commands::rebuild_cache(&dir),
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
