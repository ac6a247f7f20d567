use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::commit::CommitInfo;
use crate::config::Config;
use crate::logger::{sanitize_log_value, Logger};
use crate::notify::Notify;
use crate::runner::{run_test_command, RunnerError, TestOutcome, TestStatus};
use crate::shell::render_command;
use crate::state::{load_state, save_state, PersistentState};
use crate::transition::{evaluate, normal_log_due, Action};

#[derive(Debug)]
pub(crate) struct RunContext {
    pub(crate) config: Config,
    pub(crate) logger: Logger,
    pub(crate) interrupt_flag: Arc<AtomicBool>,
}

#[derive(Debug)]
pub(crate) struct Quit {
    pub(crate) code: i32,
    #[allow(dead_code)]
    pub(crate) reason: String,
}

impl Quit {
    pub(crate) fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code as u8)
    }
}

pub(crate) fn quit(logger: &Logger, reason: &str, code: i32) -> Quit {
    let sanitized = if reason.trim().is_empty() {
        "unknown".to_string()
    } else {
        sanitize_log_value(reason)
    };
    logger.record(&format!("quit reason={}", sanitized));
    Quit {
        code,
        reason: reason.to_string(),
    }
}

/// Healthy/broken transition of one run, reported to the caller alongside
/// the exit code. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    None,
    NewBreakage,
    Fix,
}

#[derive(Debug)]
pub(crate) struct RunResult {
    pub(crate) exit_code: i32,
    pub(crate) transition: Transition,
}

pub(crate) fn validate_config(config: &Config) -> Result<(), String> {
    if config.timeout_seconds < 1 {
        return Err(format!(
            "timeout_seconds must be a positive integer (got {}).",
            config.timeout_seconds
        ));
    }
    if config.test_commands.is_empty() {
        return Err("test_commands must not be empty.".to_string());
    }
    if config.test_commands.iter().any(|command| command.is_empty()) {
        return Err("every test command must name a program.".to_string());
    }
    Ok(())
}

fn check_interrupted(ctx: &RunContext) -> Result<(), Quit> {
    if ctx.interrupt_flag.load(Ordering::SeqCst) {
        return Err(quit(&ctx.logger, "interrupted", 130));
    }
    Ok(())
}

fn status_label(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Success => "success",
        TestStatus::Failure => "failure",
        TestStatus::TimedOut => "timeout",
    }
}

/// Run the configured command sequence against `commit` and reconcile the
/// result with the persisted break state.
///
/// The first failing or timed-out command stops the sequence; the remaining
/// commands are skipped. Test failures produce `Ok` with exit code 1 — only
/// conditions with no commit-level verdict (missing test directory, runner
/// I/O errors, interruption) surface as `Quit`.
pub(crate) fn run(
    ctx: &RunContext,
    commit: &CommitInfo,
    notifier: Option<&dyn Notify>,
) -> Result<RunResult, Quit> {
    check_interrupted(ctx)?;

    if !ctx.config.test_directory.is_dir() {
        eprintln!(
            "Test directory does not exist: {}",
            ctx.config.test_directory.display()
        );
        return Err(quit(
            &ctx.logger,
            &format!(
                "test_directory_missing:{}",
                ctx.config.test_directory.display()
            ),
            1,
        ));
    }

    let state_path = PathBuf::from(&ctx.config.state_path);
    let state = match load_state(&state_path) {
        Ok(state) => state,
        Err(err) => {
            eprintln!("Warning: {}; starting from a clean state", err);
            ctx.logger
                .record(&format!("state_load_failed err={}", sanitize_log_value(&err)));
            PersistentState::default()
        }
    };

    let timeout = Duration::from_secs(ctx.config.timeout_seconds);
    let mut failed: Option<TestOutcome> = None;

    for command in &ctx.config.test_commands {
        check_interrupted(ctx)?;
        let line = render_command(command);
        println!("{}", line);
        ctx.logger
            .record(&format!("test start command={}", sanitize_log_value(&line)));

        let outcome = match run_test_command(
            command,
            &ctx.config.test_directory,
            timeout,
            &ctx.interrupt_flag,
        ) {
            Ok(outcome) => outcome,
            Err(RunnerError::Interrupted) => {
                return Err(quit(&ctx.logger, "interrupted", 130));
            }
            Err(RunnerError::Io(err)) => {
                eprintln!("{}", err);
                return Err(quit(&ctx.logger, &format!("runner_failed:{err}"), 1));
            }
        };

        ctx.logger.record(&format!(
            "test exit command={} status={}",
            sanitize_log_value(&line),
            status_label(outcome.status)
        ));

        match outcome.status {
            TestStatus::Success => {}
            TestStatus::TimedOut => {
                println!(
                    "Time out - the test took longer than {} seconds.",
                    ctx.config.timeout_seconds
                );
                print!("{}", outcome.output);
                failed = Some(outcome);
                break;
            }
            TestStatus::Failure => {
                print!("{}", outcome.output);
                failed = Some(outcome);
                break;
            }
        }
    }

    // All commands passed: evaluate a single synthetic success standing for
    // the whole sequence.
    let outcome = failed.unwrap_or_else(|| TestOutcome {
        command: Vec::new(),
        status: TestStatus::Success,
        output: String::new(),
    });
    let exit_code = if outcome.status == TestStatus::Success {
        0
    } else {
        1
    };

    let (mut new_state, action) = evaluate(&outcome, &state, commit);
    let transition = match action {
        Action::LogAndNotifyBreak => Transition::NewBreakage,
        Action::LogAndNotifyFix => Transition::Fix,
        Action::LogNormal => Transition::None,
    };

    match action {
        Action::LogAndNotifyBreak => {
            ctx.logger.record(&format!("broken commit: {}", commit.id));
            ctx.logger
                .record(&format!("broken commit author: {}", commit.author));
            let subject = format!("tests failed - blame {} [{}]", commit.author, commit.id);
            let body = break_body(&outcome, commit, ctx.config.timeout_seconds);
            dispatch_notification(ctx, notifier, &subject, &body);
        }
        Action::LogAndNotifyFix => {
            ctx.logger.record(&format!("fix commit: {}", commit.id));
            ctx.logger
                .record(&format!("fix commit author: {}", commit.author));
            let subject = format!("tests passed - praise {} [{}]", commit.author, commit.id);
            let body = fix_body(commit);
            dispatch_notification(ctx, notifier, &subject, &body);
        }
        Action::LogNormal => {
            if normal_log_due(&state, commit) {
                ctx.logger.record(&format!("normal commit: {}", commit.id));
                ctx.logger
                    .record(&format!("normal commit author: {}", commit.author));
            }
        }
    }

    new_state.last_tested_commit = commit.id.clone();
    if let Err(err) = save_state(&state_path, &new_state) {
        eprintln!("Warning: {}; the next run may re-send notifications", err);
        ctx.logger
            .record(&format!("state_save_failed err={}", sanitize_log_value(&err)));
    }

    Ok(RunResult {
        exit_code,
        transition,
    })
}

fn break_body(outcome: &TestOutcome, commit: &CommitInfo, timeout_seconds: u64) -> String {
    let mut body = format!(
        "broken commit: {}\nbroken commit author: {}\ntest command: {}\n",
        commit.id,
        commit.author,
        render_command(&outcome.command)
    );
    if outcome.status == TestStatus::TimedOut {
        body.push_str(&format!(
            "test result: timed out after {} seconds\n",
            timeout_seconds
        ));
    }
    body.push_str("test output:\n");
    body.push_str(&outcome.output);
    body
}

fn fix_body(commit: &CommitInfo) -> String {
    format!(
        "fix commit: {}\nfix commit author: {}\n",
        commit.id, commit.author
    )
}

fn dispatch_notification(
    ctx: &RunContext,
    notifier: Option<&dyn Notify>,
    subject: &str,
    body: &str,
) {
    let Some(notifier) = notifier else {
        return;
    };
    match notifier.send(subject, body) {
        Ok(()) => ctx
            .logger
            .record(&format!("notified subject={}", sanitize_log_value(subject))),
        Err(err) => {
            eprintln!("Warning: failed to send notification: {}", err);
            ctx.logger
                .record(&format!("notify_failed err={}", sanitize_log_value(&err)));
        }
    }
}
