use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;

use crate::shell::render_command;

/// Liveness poll cadence; timeouts are enforced at this granularity.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Time the process group gets to honor SIGTERM before SIGKILL.
pub(crate) const TERM_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TestStatus {
    Success,
    Failure,
    TimedOut,
}

/// Result of one test command, including combined stdout/stderr captured
/// up to the moment the command exited or was torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TestOutcome {
    pub(crate) command: Vec<String>,
    pub(crate) status: TestStatus,
    pub(crate) output: String,
}

#[derive(Debug)]
pub(crate) enum RunnerError {
    /// Ctrl-C observed mid-run; the command's process group was torn down.
    Interrupted,
    Io(String),
}

/// Run one test command in `cwd`, polling for completion once per second.
///
/// The command is started as a process group leader so that everything it
/// spawns can be signaled together. Past `timeout` the whole group gets
/// SIGTERM, a fixed grace period, then SIGKILL. A failed or timed-out test
/// is an ordinary outcome, not an error.
pub(crate) fn run_test_command(
    command: &[String],
    cwd: &Path,
    timeout: Duration,
    interrupt_flag: &Arc<AtomicBool>,
) -> Result<TestOutcome, RunnerError> {
    let line = render_command(command);
    let mut cmd = Command::new("bash");
    cmd.arg("-lc").arg(&line);
    cmd.current_dir(cwd);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .map_err(|err| RunnerError::Io(format!("Failed to run command '{}': {}", line, err)))?;

    let captured: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let mut drains = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        drains.push(spawn_drain(stdout, Arc::clone(&captured)));
    }
    if let Some(stderr) = child.stderr.take() {
        drains.push(spawn_drain(stderr, Arc::clone(&captured)));
    }

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(exit_status)) => {
                break if exit_status.success() {
                    TestStatus::Success
                } else {
                    TestStatus::Failure
                };
            }
            Ok(None) => {}
            Err(err) => {
                terminate_group(&mut child);
                join_drains(drains);
                return Err(RunnerError::Io(format!(
                    "Failed to poll command '{}': {}",
                    line, err
                )));
            }
        }
        if interrupt_flag.load(Ordering::SeqCst) {
            terminate_group(&mut child);
            join_drains(drains);
            return Err(RunnerError::Interrupted);
        }
        if started.elapsed() > timeout {
            terminate_group(&mut child);
            break TestStatus::TimedOut;
        }
        thread::sleep(POLL_INTERVAL);
    };

    join_drains(drains);

    let output = {
        let bytes = captured.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&bytes).to_string()
    };

    Ok(TestOutcome {
        command: command.to_vec(),
        status,
        output,
    })
}

/// SIGTERM the group, give it the grace period, SIGKILL whatever is left,
/// and reap the direct child.
fn terminate_group(child: &mut Child) {
    let group = Pid::from_raw(child.id() as i32);
    let _ = killpg(group, Signal::SIGTERM);
    thread::sleep(TERM_GRACE);
    match child.try_wait() {
        Ok(Some(_)) => {}
        _ => {
            let _ = killpg(group, Signal::SIGKILL);
        }
    }
    let _ = child.wait();
}

fn spawn_drain<R: Read + Send + 'static>(
    mut reader: R,
    sink: Arc<Mutex<Vec<u8>>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let mut sink = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    sink.extend_from_slice(&chunk[..n]);
                }
            }
        }
    })
}

fn join_drains(drains: Vec<thread::JoinHandle<()>>) {
    for drain in drains {
        let _ = drain.join();
    }
}
