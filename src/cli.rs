use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "breakwatch",
    about = "Breakwatch runs your test suite after every repository update and blames the commit that broke it.",
    long_about = "Breakwatch is meant to be invoked from a version-control post-update hook. It runs the configured test commands against the current commit, enforces a per-command timeout, and notifies recipients only when the repository breaks or recovers.\n\nThe process exit code (0 passed, 1 failed) lets the hook accept or reject the update.",
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    /// Load configuration from PATH instead of ~/.config/breakwatch.yml.
    #[arg(
        short = 'c',
        long = "config",
        global = true,
        value_name = "PATH",
        help = "Load configuration from PATH instead of ~/.config/breakwatch.yml."
    )]
    pub(crate) config: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum CliCommand {
    #[command(about = "Validate configuration and environment without running tests.")]
    Doctor,
}
