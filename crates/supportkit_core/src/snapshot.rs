use std::process::Command;

use crate::report::SystemSnapshot;

pub const COMMANDS_UNAVAILABLE: &str = "Commands not available on this system.";

pub fn capture_snapshot(max_chars: usize) -> SystemSnapshot {
    let processes = command_excerpt(&[("ps", "aux")], max_chars);
    let connections = command_excerpt(&[("netstat", "-an"), ("ss", "-an")], max_chars);
    let error = if processes.is_none() && connections.is_none() {
        Some(COMMANDS_UNAVAILABLE.to_string())
    } else {
        None
    };
    SystemSnapshot {
        processes,
        connections,
        error,
    }
}

/// Stdout of the first candidate that starts, truncated to `max_chars`.
///
/// Candidates are `(command, arguments)` with arguments separated by spaces.
pub fn command_excerpt(candidates: &[(&str, &str)], max_chars: usize) -> Option<String> {
    candidates.iter().find_map(|&(cmd, args)| {
        match Command::new(cmd).args(args.split_whitespace()).output() {
            Ok(output) => {
                if !output.status.success() {
                    tracing::debug!(cmd, status = %output.status, "snapshot command exited non-zero");
                }
                Some(truncate_chars(&String::from_utf8_lossy(&output.stdout), max_chars))
            }
            Err(e) => {
                tracing::debug!(cmd, error = %e, "snapshot command failed to start");
                None
            }
        }
    })
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
