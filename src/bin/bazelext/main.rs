//! Bazelext CLI - build native extension modules with Bazel

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bazelext::builder::{BuildError, ConfigurationError};
use bazelext::core::manifest::ManifestError;
use bazelext::util::diagnostic::{suggestions, AmbiguousMarkerReport, Diagnostic};
use bazelext::util::shell::ColorChoice;
use bazelext::util::{GlobalContext, Shell};

mod cli;
mod commands;

use cli::{Cli, Commands, MessageFormat};

fn main() {
    let cli = Cli::parse();

    let shell = Shell::from_flags(
        cli.quiet,
        cli.verbose,
        ColorChoice::Auto,
        cli.message_format == MessageFormat::Json,
    );

    if let Err(e) = run(cli, &shell) {
        report_error(&shell, &e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, shell: &Shell) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("bazelext=debug")
    } else if cli.quiet {
        EnvFilter::new("bazelext=error")
    } else {
        EnvFilter::new("bazelext=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let mut ctx = GlobalContext::new()?;
    ctx.set_manifest_path(cli.manifest_path);

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &ctx, shell),
        Commands::Configure(args) => commands::configure::execute(args, &ctx, shell),
        Commands::Metadata => commands::metadata::execute(&ctx, shell),
        Commands::Doctor => commands::doctor::execute(&ctx, shell),
        Commands::Clean(args) => commands::clean::execute(args, &ctx, shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

fn report_error(shell: &Shell, err: &anyhow::Error) {
    if shell.is_json() {
        shell.error(format!("{:#}", err));
        return;
    }

    if let Some(build_err) = err.downcast_ref::<BuildError>() {
        if let BuildError::Configuration(ConfigurationError::MarkerAmbiguous {
            path,
            marker,
            spans,
            ..
        }) = build_err
        {
            if let Ok(content) = std::fs::read_to_string(path) {
                let report = AmbiguousMarkerReport::new(
                    path.display().to_string(),
                    content,
                    marker,
                    spans,
                );
                eprintln!("{:?}", miette::Report::new(report));
                return;
            }
        }
        eprint!("{}", build_err.to_diagnostic().format(shell.use_color()));
        return;
    }

    if let Some(ManifestError::NotFound { .. }) = err.downcast_ref::<ManifestError>() {
        let diag = Diagnostic::error(err.to_string()).with_suggestion(suggestions::NO_MANIFEST);
        eprint!("{}", diag.format(shell.use_color()));
        return;
    }

    eprintln!("error: {:#}", err);
}
