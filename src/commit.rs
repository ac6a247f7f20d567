use std::path::Path;
use std::process::Command;

/// Commit under test, as reported by the repository at invocation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommitInfo {
    pub(crate) id: String,
    pub(crate) author: String,
}

/// Ask git for the most recent commit of `repository_path` in topological
/// order. Any git failure aborts the run upstream; there is no commit-level
/// verdict to report without this.
pub(crate) fn current_commit(repository_path: &Path) -> Result<CommitInfo, String> {
    let output = Command::new("git")
        .args(["log", "--topo-order", "--format=format:%H|%an", "-n", "1"])
        .current_dir(repository_path)
        .output()
        .map_err(|err| {
            format!(
                "Failed to run git in {}: {}",
                repository_path.display(),
                err
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "git log failed in {} (exit code {}): {}",
            repository_path.display(),
            output.status.code().unwrap_or(1),
            stderr.trim()
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_commit_line(stdout.trim())
}

fn parse_commit_line(line: &str) -> Result<CommitInfo, String> {
    let Some((id, author)) = line.split_once('|') else {
        return Err(format!("Unexpected git log output: {:?}", line));
    };
    if id.trim().is_empty() {
        return Err(format!("Unexpected git log output: {:?}", line));
    }
    Ok(CommitInfo {
        id: id.trim().to_string(),
        author: author.trim().to_string(),
    })
}
