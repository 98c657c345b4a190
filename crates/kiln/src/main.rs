//! Kiln CLI - static site builder driven by JSON data trees.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use commands::build::BuildMode;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Static site builder driven by JSON data trees and Jinja templates")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to kiln.toml config file
    #[arg(short, long, default_value = "kiln.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a site in the current project
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Build the site
    Build {
        /// Minify styles and HTML
        #[arg(short, long)]
        production: bool,

        /// Serve the build from memory
        #[arg(short, long)]
        serve: bool,

        /// Rebuild on source changes
        #[arg(short, long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    // Execute command
    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(&cli.config, yes).await?;
        }
        Commands::Build {
            production,
            serve,
            watch,
        } => {
            let config = config::load_config(&cli.config)?;
            let mode = BuildMode {
                production,
                serve,
                watch,
            };
            commands::build::run(&config, project_dir(&cli.config), mode).await?;
        }
    }

    Ok(())
}

/// The directory holding the config file.
fn project_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_dir_defaults_to_current() {
        assert_eq!(project_dir(Path::new("kiln.toml")), PathBuf::from("."));
        assert_eq!(
            project_dir(Path::new("sites/blog/kiln.toml")),
            PathBuf::from("sites/blog")
        );
    }

    #[test]
    fn parses_build_flags() {
        let cli = Cli::parse_from(["kiln", "build", "--production", "--serve", "--watch"]);

        match cli.command {
            Commands::Build {
                production,
                serve,
                watch,
            } => assert!(production && serve && watch),
            Commands::Init { .. } => panic!("Expected build command"),
        }
        assert_eq!(cli.config, PathBuf::from("kiln.toml"));
    }
}
