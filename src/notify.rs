use serde::Serialize;
use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;

use crate::config::NotificationConfig;

/// Delivery capability for break/fix messages. Failures are reported to the
/// caller, which logs them; they never affect the run's exit code.
pub(crate) trait Notify {
    fn send(&self, subject: &str, body: &str) -> Result<(), String>;
}

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    subject: &'a str,
    body: &'a str,
    from: &'a str,
    recipients: &'a [String],
}

fn write_payload(payload: &MessagePayload<'_>) -> Result<NamedTempFile, String> {
    let mut payload_file = NamedTempFile::new()
        .map_err(|err| format!("failed to create notification payload file: {err}"))?;
    serde_json::to_writer(&mut payload_file, payload)
        .map_err(|err| format!("failed to serialize notification payload: {err}"))?;
    payload_file
        .write_all(b"\n")
        .map_err(|err| format!("failed to finalize notification payload file: {err}"))?;
    Ok(payload_file)
}

/// Runs the configured transport command with the message in its
/// environment and a JSON payload file on disk. Addressing and transport
/// settings (recipients, from, host, port, credentials, TLS flag) travel
/// the same way; composing and delivering the actual message is the
/// transport command's job.
#[derive(Debug)]
pub(crate) struct CommandNotifier {
    config: NotificationConfig,
}

impl CommandNotifier {
    pub(crate) fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    fn subject_with_prefix(&self, subject: &str) -> String {
        if self.config.subject_prefix.trim().is_empty() {
            subject.to_string()
        } else {
            format!("{} {}", self.config.subject_prefix, subject)
        }
    }
}

impl Notify for CommandNotifier {
    fn send(&self, subject: &str, body: &str) -> Result<(), String> {
        let subject = self.subject_with_prefix(subject);
        let recipients: Vec<String> = self
            .config
            .recipients
            .iter()
            .map(|recipient| recipient.address())
            .collect();
        let payload = MessagePayload {
            subject: &subject,
            body,
            from: &self.config.from,
            recipients: &recipients,
        };
        // Keep the payload file alive until the transport command returns.
        let payload_file = write_payload(&payload)?;

        let mut cmd = Command::new("bash");
        cmd.arg("-lc").arg(&self.config.command);
        cmd.stdin(Stdio::null());
        cmd.env("BREAKWATCH_SUBJECT", &subject);
        cmd.env("BREAKWATCH_BODY", body);
        cmd.env("BREAKWATCH_FROM", &self.config.from);
        cmd.env("BREAKWATCH_RECIPIENTS", recipients.join(","));
        cmd.env("BREAKWATCH_PAYLOAD", payload_file.path());
        cmd.env("BREAKWATCH_MAIL_HOST", &self.config.host);
        cmd.env(
            "BREAKWATCH_MAIL_PORT",
            self.config
                .port
                .map(|port| port.to_string())
                .unwrap_or_default(),
        );
        cmd.env("BREAKWATCH_MAIL_USERNAME", &self.config.username);
        cmd.env("BREAKWATCH_MAIL_PASSWORD", &self.config.password);
        cmd.env(
            "BREAKWATCH_MAIL_USE_TLS",
            if self.config.use_tls { "1" } else { "0" },
        );

        let status = cmd.status().map_err(|err| {
            format!(
                "Failed to run notification command '{}': {}",
                self.config.command, err
            )
        })?;
        let exit_code = status.code().unwrap_or(1);
        if exit_code != 0 {
            return Err(format!(
                "notification command '{}' exited with code {}",
                self.config.command, exit_code
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Recipient;
    use tempfile::TempDir;

    fn notification_config(command: String) -> NotificationConfig {
        NotificationConfig {
            command,
            recipients: vec![Recipient {
                name: "Dev Team".to_string(),
                email: "dev@example.org".to_string(),
            }],
            from: "watcher <noreply@example.org>".to_string(),
            subject_prefix: "[ci]".to_string(),
            host: "smtp.example.org".to_string(),
            port: Some(587),
            username: String::new(),
            password: String::new(),
            use_tls: true,
        }
    }

    #[test]
    fn transport_command_sees_message_environment() {
        let temp = TempDir::new().expect("temp dir");
        let out = temp.path().join("sent.txt");
        let command = format!(
            "printf '%s\\n%s\\n%s\\n' \"$BREAKWATCH_SUBJECT\" \"$BREAKWATCH_RECIPIENTS\" \"$BREAKWATCH_MAIL_PORT\" > '{}'",
            out.display()
        );
        let notifier = CommandNotifier::new(notification_config(command));

        notifier.send("tests failed", "body text").expect("send");

        let sent = std::fs::read_to_string(&out).expect("read sent");
        let mut lines = sent.lines();
        assert_eq!(lines.next(), Some("[ci] tests failed"));
        assert_eq!(lines.next(), Some("Dev Team <dev@example.org>"));
        assert_eq!(lines.next(), Some("587"));
    }

    #[test]
    fn payload_file_carries_full_message() {
        let temp = TempDir::new().expect("temp dir");
        let out = temp.path().join("payload.json");
        let command = format!("cat \"$BREAKWATCH_PAYLOAD\" > '{}'", out.display());
        let notifier = CommandNotifier::new(notification_config(command));

        notifier.send("tests failed", "line one\nline two").expect("send");

        let payload: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).expect("read payload"))
                .expect("parse payload");
        assert_eq!(payload["subject"], "[ci] tests failed");
        assert_eq!(payload["body"], "line one\nline two");
        assert_eq!(payload["from"], "watcher <noreply@example.org>");
        assert_eq!(payload["recipients"][0], "Dev Team <dev@example.org>");
    }

    #[test]
    fn failing_transport_command_reports_exit_code() {
        let notifier = CommandNotifier::new(notification_config("exit 3".to_string()));
        let err = notifier.send("s", "b").expect_err("should fail");
        assert!(err.contains("exited with code 3"), "got: {err}");
    }

    #[test]
    fn empty_prefix_leaves_subject_untouched() {
        let mut config = notification_config("true".to_string());
        config.subject_prefix = String::new();
        let notifier = CommandNotifier::new(config);
        assert_eq!(notifier.subject_with_prefix("tests failed"), "tests failed");
    }
}
