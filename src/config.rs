use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub repository_path: PathBuf,
    pub test_directory: PathBuf,
    pub test_commands: Vec<Vec<String>>,
    pub timeout_seconds: u64,
    pub log_path: String,
    pub state_path: String,
    #[serde(default)]
    pub notification: Option<NotificationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub command: String,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub subject_prefix: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub use_tls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Recipient {
    #[serde(default)]
    pub name: String,
    pub email: String,
}

impl Recipient {
    pub fn address(&self) -> String {
        if self.name.trim().is_empty() {
            self.email.clone()
        } else {
            format!("{} <{}>", self.name, self.email)
        }
    }
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub warnings: Vec<String>,
}

pub fn load_config(path: &Path) -> Result<LoadedConfig, String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config {}: {}", path.display(), err))?;
    let value: Value = serde_yaml::from_str(&content)
        .map_err(|err| format!("Failed to parse config {}: {}", path.display(), err))?;
    let mapping = match value {
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(format!(
                "Config {} must be a YAML mapping",
                path.display()
            ))
        }
    };

    let warnings = unknown_top_level_keys(&mapping);
    emit_unknown_key_warnings(&warnings);
    validate_required_fields(&mapping)?;

    let config: Config = serde_yaml::from_value(Value::Mapping(mapping))
        .map_err(|err| format!("Failed to parse config {}: {}", path.display(), err))?;

    Ok(LoadedConfig { config, warnings })
}

fn emit_unknown_key_warnings(keys: &[String]) {
    for key in keys {
        eprintln!("Warning: unknown config key: {}", key);
    }
}

fn unknown_top_level_keys(mapping: &Mapping) -> Vec<String> {
    let allowed = [
        "repository_path",
        "test_directory",
        "test_commands",
        "timeout_seconds",
        "log_path",
        "state_path",
        "notification",
    ];

    mapping
        .keys()
        .filter_map(|key| key.as_str().map(|value| value.to_string()))
        .filter(|key| !allowed.contains(&key.as_str()))
        .collect()
}

fn validate_required_fields(mapping: &Mapping) -> Result<(), String> {
    require_non_empty_string(mapping, "repository_path", "repository_path")?;
    require_non_empty_string(mapping, "test_directory", "test_directory")?;
    require_non_empty_string(mapping, "log_path", "log_path")?;
    require_non_empty_string(mapping, "state_path", "state_path")?;
    require_non_null(mapping, "timeout_seconds", "timeout_seconds")?;
    validate_test_commands(mapping)?;

    let key = Value::String("notification".to_string());
    match mapping.get(&key) {
        None | Some(Value::Null) => {}
        Some(Value::Mapping(notification)) => {
            require_non_empty_string(notification, "command", "notification.command")?;
        }
        Some(_) => return Err("notification must be a mapping".to_string()),
    }

    Ok(())
}

fn validate_test_commands(mapping: &Mapping) -> Result<(), String> {
    let key = Value::String("test_commands".to_string());
    let commands = match mapping.get(&key) {
        None => return Err("Missing required config value: test_commands".to_string()),
        Some(Value::Null) => return Err("test_commands must not be null".to_string()),
        Some(Value::Sequence(commands)) => commands,
        Some(_) => return Err("test_commands must be a sequence".to_string()),
    };
    if commands.is_empty() {
        return Err("test_commands must not be empty".to_string());
    }
    for (index, command) in commands.iter().enumerate() {
        let words = match command {
            Value::Sequence(words) => words,
            _ => {
                return Err(format!(
                    "test_commands[{}] must be a sequence of strings",
                    index
                ))
            }
        };
        if words.is_empty() {
            return Err(format!("test_commands[{}] must not be empty", index));
        }
        for word in words {
            match word {
                Value::String(word) if !word.trim().is_empty() => {}
                _ => {
                    return Err(format!(
                        "test_commands[{}] must contain only non-empty strings",
                        index
                    ))
                }
            }
        }
    }
    Ok(())
}

fn require_non_null(mapping: &Mapping, key_name: &str, label: &str) -> Result<(), String> {
    let key = Value::String(key_name.to_string());
    match mapping.get(&key) {
        None => Err(format!("Missing required config value: {}", label)),
        Some(Value::Null) => Err(format!("{} must not be null", label)),
        Some(_) => Ok(()),
    }
}

fn require_non_empty_string(mapping: &Mapping, key_name: &str, label: &str) -> Result<(), String> {
    let key = Value::String(key_name.to_string());
    match mapping.get(&key) {
        None => Err(format!("Missing required config value: {}", label)),
        Some(Value::Null) => Err(format!("{} must not be null", label)),
        Some(Value::String(value)) => {
            if value.trim().is_empty() {
                Err(format!("{} must not be empty", label))
            } else {
                Ok(())
            }
        }
        Some(_) => Err(format!("{} must be a string", label)),
    }
}
