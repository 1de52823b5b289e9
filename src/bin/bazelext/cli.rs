//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell as CompletionShell;

use bazelext::builder::BuildOverrides;

/// Bazelext - build native extension modules with Bazel
#[derive(Parser)]
#[command(name = "bazelext")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format for messages
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    /// Path to Bazelext.toml (default: search upward from the cwd)
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every extension and copy it into the packaging tree
    Build(BuildArgs),

    /// Point the workspace descriptor at the host runtime headers
    Configure(ConfigureArgs),

    /// Show the package name, version and requirements
    Metadata,

    /// Check that Bazel, the host runtime and the workspace are usable
    Doctor,

    /// Remove the Bazel output root
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Build with --compilation_mode=dbg
    #[arg(long)]
    pub debug: bool,

    /// Import library directory (repeatable, used on Windows)
    #[arg(short = 'L', long = "library-dir", value_name = "DIR")]
    pub library_dirs: Vec<PathBuf>,

    /// Host runtime include directory
    #[arg(long, value_name = "DIR")]
    pub include_dir: Option<PathBuf>,

    /// Directory for Bazel's output symlinks
    #[arg(long, value_name = "DIR")]
    pub output_root: Option<PathBuf>,

    /// Root of the packaging tree
    #[arg(long, value_name = "DIR")]
    pub build_lib: Option<PathBuf>,

    /// Print the Bazel command lines and paths as JSON without building
    #[arg(long)]
    pub plan: bool,
}

impl BuildArgs {
    pub fn overrides(&self) -> BuildOverrides {
        BuildOverrides {
            debug: self.debug,
            library_dirs: self.library_dirs.clone(),
            include_dir: self.include_dir.clone(),
            output_root: self.output_root.clone(),
            build_lib: self.build_lib.clone(),
        }
    }
}

#[derive(Args)]
pub struct ConfigureArgs {
    /// Host runtime include directory (default: probe the interpreter)
    #[arg(long, value_name = "DIR")]
    pub include_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Output root to remove (default: from config, else build/temp)
    #[arg(long, value_name = "DIR")]
    pub output_root: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: CompletionShell,
}
