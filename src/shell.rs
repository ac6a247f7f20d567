use shell_escape::unix::escape;
use std::env;

/// Render an argv as a single shell command line, quoting each word.
/// Plain words pass through untouched, so ["make", "-C", "build"] renders
/// as `make -C build`.
pub(crate) fn render_command(command: &[String]) -> String {
    let mut rendered = String::new();
    for word in command {
        if !rendered.is_empty() {
            rendered.push(' ');
        }
        rendered.push_str(escape(word.as_str().into()).as_ref());
    }
    rendered
}

pub(crate) fn command_exists(name: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|path| {
        let full = path.join(name);
        full.is_file() || full.is_symlink()
    })
}
