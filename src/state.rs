use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Break/fix record carried across invocations. `broken_commit` is empty
/// exactly when the repository is considered healthy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PersistentState {
    #[serde(default)]
    pub(crate) broken_commit: String,
    #[serde(default)]
    pub(crate) broken_commit_author: String,
    #[serde(default)]
    pub(crate) last_tested_commit: String,
}

impl PersistentState {
    pub(crate) fn is_broken(&self) -> bool {
        !self.broken_commit.is_empty()
    }
}

/// An absent state file is the healthy default. Unreadable or unparsable
/// files surface as errors so the caller can log before falling back to the
/// default (a lost state record causes a duplicate notification later).
pub(crate) fn load_state(path: &Path) -> Result<PersistentState, String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(PersistentState::default());
        }
        Err(err) => {
            return Err(format!("Failed to read state {}: {}", path.display(), err));
        }
    };
    serde_json::from_str(&content)
        .map_err(|err| format!("Failed to parse state {}: {}", path.display(), err))
}

/// Replace the state file atomically: serialize into a temp file in the
/// destination directory, then rename over the old record. A concurrent
/// reader sees either the previous or the new state, never a torn write.
pub(crate) fn save_state(path: &Path, state: &PersistentState) -> Result<(), String> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(|err| {
        format!(
            "Failed to create temporary state file in {}: {}",
            dir.display(),
            err
        )
    })?;
    serde_json::to_writer(&mut file, state)
        .map_err(|err| format!("Failed to serialize state: {}", err))?;
    file.write_all(b"\n")
        .map_err(|err| format!("Failed to finalize state file: {}", err))?;
    file.persist(path)
        .map_err(|err| format!("Failed to replace state {}: {}", path.display(), err))?;
    Ok(())
}
