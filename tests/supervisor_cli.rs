use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

struct Harness {
    _temp: tempfile::TempDir,
    root: PathBuf,
    stub_path: String,
}

impl Harness {
    /// Temp workspace with a PATH-stubbed `git` (reading the current commit
    /// from commit.txt) and a notification transport that appends subjects
    /// to notifications.log.
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = temp.path().to_path_buf();

        let stub_dir = root.join("stubs");
        fs::create_dir(&stub_dir).expect("create stub dir");
        write_script(
            &stub_dir.join("git"),
            &format!("#!/bin/sh\ncat '{}'\n", root.join("commit.txt").display()),
        );
        write_script(
            &stub_dir.join("record-notification"),
            &format!(
                "#!/bin/sh\nprintf '%s\\n' \"$BREAKWATCH_SUBJECT\" >> '{}'\n",
                root.join("notifications.log").display()
            ),
        );

        let system_path = env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".to_string());
        let stub_path = format!("{}:{}", stub_dir.display(), system_path);

        let harness = Harness {
            _temp: temp,
            root,
            stub_path,
        };
        harness.set_commit("c1", "Alice Example");
        harness
    }

    fn set_commit(&self, id: &str, author: &str) {
        fs::write(self.root.join("commit.txt"), format!("{}|{}", id, author))
            .expect("write commit.txt");
    }

    fn write_config(&self, test_commands_yaml: &str, timeout_seconds: u64) -> PathBuf {
        let config_path = self.root.join("breakwatch.yml");
        let config = format!(
            r#"repository_path: "{root}"
test_directory: "{root}"
test_commands:
{test_commands_yaml}
timeout_seconds: {timeout_seconds}
log_path: "{log}"
state_path: "{state}"
notification:
  command: "record-notification"
  recipients:
    - {{ name: "Dev Team", email: "dev@example.org" }}
  from: "breakwatch <noreply@example.org>"
  subject_prefix: "[breakwatch]"
"#,
            root = self.root.display(),
            log = self.root.join("run.log").display(),
            state = self.root.join("state.json").display(),
        );
        fs::write(&config_path, config).expect("write config");
        config_path
    }

    fn run(&self, args: &[&str]) -> Output {
        let binary = option_env!("CARGO_BIN_EXE_breakwatch").expect("CARGO_BIN_EXE_breakwatch");
        Command::new(binary)
            .args(args)
            .env("PATH", &self.stub_path)
            .output()
            .expect("run breakwatch")
    }

    fn notifications(&self) -> Vec<String> {
        match fs::read_to_string(self.root.join("notifications.log")) {
            Ok(content) => content.lines().map(|line| line.to_string()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn state(&self) -> serde_json::Value {
        let raw = fs::read_to_string(self.root.join("state.json")).expect("read state.json");
        serde_json::from_str(&raw).expect("parse state.json")
    }

    fn run_log(&self) -> String {
        fs::read_to_string(self.root.join("run.log")).unwrap_or_default()
    }
}

fn write_script(path: &Path, contents: &str) {
    fs::write(path, contents).expect("write script");
    #[cfg(unix)]
    {
        let mut perms = fs::metadata(path).expect("script metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("chmod script");
    }
}

#[test]
fn break_fix_cycle_notifies_once_per_transition() {
    let harness = Harness::new();

    // First run against c1: `true` passes, `false` breaks the tree.
    let config = harness.write_config("  - [\"true\"]\n  - [\"false\"]", 10);
    let output = harness.run(&["-c", config.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(1));

    let notifications = harness.notifications();
    assert_eq!(notifications.len(), 1, "got: {notifications:?}");
    assert_eq!(
        notifications[0],
        "[breakwatch] tests failed - blame Alice Example [c1]"
    );
    assert_eq!(harness.state()["broken_commit"], "c1");
    assert_eq!(harness.state()["broken_commit_author"], "Alice Example");
    assert_eq!(harness.state()["last_tested_commit"], "c1");
    assert!(
        harness.run_log().contains("broken commit: c1"),
        "got log: {}",
        harness.run_log()
    );

    // Second run against the unchanged tree: still failing, no new message.
    let output = harness.run(&["-c", config.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(harness.notifications().len(), 1, "no re-notification");
    assert_eq!(harness.state()["broken_commit"], "c1");

    // Third run against c2 with passing commands: the fix.
    harness.set_commit("c2", "Bob Fixer");
    let config = harness.write_config("  - [\"true\"]\n  - [\"true\"]", 10);
    let output = harness.run(&["-c", config.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(0));

    let notifications = harness.notifications();
    assert_eq!(notifications.len(), 2, "got: {notifications:?}");
    assert_eq!(
        notifications[1],
        "[breakwatch] tests passed - praise Bob Fixer [c2]"
    );
    assert_eq!(harness.state()["broken_commit"], "");
    assert_eq!(harness.state()["broken_commit_author"], "");
    assert_eq!(harness.state()["last_tested_commit"], "c2");
    assert!(
        harness.run_log().contains("fix commit: c2"),
        "got log: {}",
        harness.run_log()
    );
}

#[test]
fn first_failure_stops_the_sequence() {
    let harness = Harness::new();
    let config = harness.write_config("  - [\"false\"]\n  - [\"touch\", \"marker\"]", 10);

    let output = harness.run(&["-c", config.to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(1));
    assert!(
        !harness.root.join("marker").exists(),
        "later commands must not run after a failure"
    );
}

#[test]
fn failing_command_output_reaches_stdout() {
    let harness = Harness::new();
    let config = harness.write_config(
        "  - [\"bash\", \"-c\", \"echo diagnostic-line; exit 1\"]",
        10,
    );

    let output = harness.run(&["-c", config.to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("diagnostic-line"), "got stdout: {stdout}");
}

#[test]
fn missing_config_file_reports_error() {
    let harness = Harness::new();
    let missing = harness.root.join("nope.yml");

    let output = harness.run(&["-c", missing.to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Missing config file"),
        "got stderr: {stderr}"
    );
}

#[test]
fn doctor_passes_on_a_healthy_setup() {
    let harness = Harness::new();
    let config = harness.write_config("  - [\"true\"]", 10);

    let output = harness.run(&["-c", config.to_str().expect("utf-8 path"), "doctor"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(0), "got stdout: {stdout}");
    assert!(stdout.contains("All checks passed."), "got stdout: {stdout}");
    assert!(
        !harness.root.join("state.json").exists(),
        "doctor must not touch persisted state"
    );
}

#[test]
fn doctor_flags_a_missing_test_directory() {
    let harness = Harness::new();
    let config_path = harness.root.join("breakwatch.yml");
    let config = format!(
        r#"repository_path: "{root}"
test_directory: "{root}/not-there"
test_commands:
  - ["true"]
timeout_seconds: 10
log_path: "{log}"
state_path: "{state}"
"#,
        root = harness.root.display(),
        log = harness.root.join("run.log").display(),
        state = harness.root.join("state.json").display(),
    );
    fs::write(&config_path, config).expect("write config");

    let output = harness.run(&["-c", config_path.to_str().expect("utf-8 path"), "doctor"]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("fail - test directory exists"),
        "got stdout: {stdout}"
    );
}

#[test]
fn timeout_is_reported_and_bounded() {
    let harness = Harness::new();
    let config = harness.write_config("  - [\"sleep\", \"30\"]", 1);

    let started = std::time::Instant::now();
    let output = harness.run(&["-c", config.to_str().expect("utf-8 path")]);
    let elapsed = started.elapsed();

    assert_eq!(output.status.code(), Some(1));
    assert!(
        elapsed < std::time::Duration::from_secs(20),
        "teardown took {:?}",
        elapsed
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Time out - the test took longer than 1 seconds."),
        "got stdout: {stdout}"
    );
    assert_eq!(harness.state()["broken_commit"], "c1");
}
