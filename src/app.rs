use clap::Parser;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cli::{Cli, CliCommand};
use crate::commit::current_commit;
use crate::config::load_config;
use crate::doctor::run_doctor_mode;
use crate::logger::Logger;
use crate::notify::{CommandNotifier, Notify};
use crate::orchestrate::{quit, run, validate_config, Quit, RunContext};

const DEFAULT_CONFIG_REL: &str = ".config/breakwatch.yml";

fn home_dir() -> Result<PathBuf, String> {
    env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| "Missing HOME environment variable".to_string())
}

fn run_with_cli(cli: Cli) -> Result<i32, Quit> {
    let config_path = match cli.config {
        Some(path) => path,
        None => {
            let home = home_dir().map_err(|message| {
                eprintln!("{}", message);
                Quit {
                    code: 1,
                    reason: message,
                }
            })?;
            home.join(DEFAULT_CONFIG_REL)
        }
    };

    if !config_path.is_file() {
        eprintln!("Missing config file: {}", config_path.display());
        return Err(Quit {
            code: 1,
            reason: format!("missing_config:{}", config_path.display()),
        });
    }

    let loaded = load_config(&config_path).map_err(|message| {
        eprintln!("{}", message);
        Quit {
            code: 1,
            reason: message,
        }
    })?;

    let logger = Logger::new(Some(PathBuf::from(&loaded.config.log_path)));

    if matches!(cli.command, Some(CliCommand::Doctor)) {
        run_doctor_mode(&loaded.config, &config_path, &logger)?;
        return Ok(0);
    }

    if let Err(message) = validate_config(&loaded.config) {
        eprintln!("{}", message);
        return Err(quit(&logger, &message, 1));
    }

    // The commit under test is fixed before any command runs; a repository
    // that git cannot describe yields no verdict and no notification.
    let commit = current_commit(&loaded.config.repository_path).map_err(|message| {
        eprintln!("{}", message);
        quit(&logger, &format!("commit_info_failed:{message}"), 1)
    })?;

    let interrupt_flag = Arc::new(AtomicBool::new(false));
    if let Err(err) = ctrlc::set_handler({
        let interrupt_flag = Arc::clone(&interrupt_flag);
        move || {
            interrupt_flag.store(true, Ordering::SeqCst);
        }
    }) {
        eprintln!("Failed to set interrupt handler: {}", err);
    }

    let notifier = loaded.config.notification.clone().map(CommandNotifier::new);
    let ctx = RunContext {
        config: loaded.config,
        logger,
        interrupt_flag,
    };

    let result = run(
        &ctx,
        &commit,
        notifier.as_ref().map(|notifier| notifier as &dyn Notify),
    )?;
    Ok(result.exit_code)
}

pub(crate) fn run_with_args(args: Vec<OsString>) -> Result<i32, Quit> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            // clap's `Error::print()` uses termcolor and can bypass Rust's test
            // output capturing. Rendering it ourselves keeps CLI errors
            // capture-friendly.
            eprintln!("{err}");
            return Err(Quit {
                code: err.exit_code(),
                reason: "cli_parse".to_string(),
            });
        }
    };
    run_with_cli(cli)
}

pub(crate) fn main_with_args(args: Vec<OsString>) -> ExitCode {
    match run_with_args(args) {
        Ok(code) => ExitCode::from(code as u8),
        Err(quit) => quit.exit_code(),
    }
}

pub(crate) fn main() -> ExitCode {
    main_with_args(env::args_os().collect())
}
