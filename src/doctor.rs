use std::path::Path;

use crate::commit::current_commit;
use crate::config::Config;
use crate::logger::Logger;
use crate::orchestrate::{quit, validate_config, Quit};
use crate::shell::command_exists;

/// Validate configuration and environment without running any test
/// command. Never touches the persisted state.
pub(crate) fn run_doctor_mode(
    config: &Config,
    config_path: &Path,
    logger: &Logger,
) -> Result<(), Quit> {
    println!("breakwatch doctor");
    println!("config: {}", config_path.display());

    let mut checks: Vec<(&str, Result<(), String>)> = Vec::new();
    checks.push(("configuration values", validate_config(config)));
    checks.push((
        "git available on PATH",
        if command_exists("git") {
            Ok(())
        } else {
            Err("git not found".to_string())
        },
    ));
    checks.push((
        "repository reachable",
        current_commit(&config.repository_path).map(|_| ()),
    ));
    checks.push((
        "test directory exists",
        if config.test_directory.is_dir() {
            Ok(())
        } else {
            Err(format!(
                "{} is not a directory",
                config.test_directory.display()
            ))
        },
    ));
    if let Some(notification) = &config.notification {
        checks.push((
            "notification command resolvable",
            notification_command_resolvable(&notification.command),
        ));
    }

    let mut failures = 0usize;
    for (label, result) in checks {
        match result {
            Ok(()) => println!("ok   - {}", label),
            Err(err) => {
                failures += 1;
                println!("fail - {}: {}", label, err);
            }
        }
    }

    if failures > 0 {
        eprintln!("doctor found {} problem(s).", failures);
        return Err(quit(logger, &format!("doctor_failed:{failures}"), 1));
    }
    logger.record("doctor ok");
    println!("All checks passed.");
    Ok(())
}

/// Best effort: resolve the first word of the transport command line.
fn notification_command_resolvable(command: &str) -> Result<(), String> {
    let Some(first) = command.split_whitespace().next() else {
        return Err("notification command is empty".to_string());
    };
    let resolvable = if first.contains('/') {
        Path::new(first).is_file()
    } else {
        command_exists(first)
    };
    if resolvable {
        Ok(())
    } else {
        Err(format!("'{}' not found on PATH", first))
    }
}
