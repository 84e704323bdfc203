// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process invocation.
//!
//! Every external collaborator of spillway, i.e., git, git-filter-repo, and
//! the hosting CLI, is driven through these two helpers. Both block until the
//! child exits. A non-zero exit status is always an error.

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::{Command, Stdio},
};
use tracing::debug;

/// Run command with inherited standard streams.
///
/// Operator sees the child's own output as it happens.
///
/// # Errors
///
/// - Return [`SyscallError::Spawn`] if command cannot be started.
/// - Return [`SyscallError::Failed`] if command exits unsuccessfully.
pub fn syscall_interactive(
    cmd: impl AsRef<OsStr>,
    cwd: Option<&Path>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<()> {
    let args = collect_args(args);
    debug!("run {:?} {:?}", cmd.as_ref(), args);

    let mut command = Command::new(cmd.as_ref());
    command.args(&args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let status = command
        .spawn()
        .map_err(|source| SyscallError::Spawn {
            source,
            cmd: cmd.as_ref().to_owned(),
        })?
        .wait()
        .map_err(|source| SyscallError::Spawn {
            source,
            cmd: cmd.as_ref().to_owned(),
        })?;

    if !status.success() {
        return Err(SyscallError::Failed {
            cmd: cmd.as_ref().to_owned(),
            args,
            message: format!("exited with {status}"),
        });
    }

    Ok(())
}

/// Run command and capture its standard output.
///
/// Standard output is returned with trailing newlines chomped. Standard error
/// is only kept to describe a failure.
///
/// # Errors
///
/// - Return [`SyscallError::Spawn`] if command cannot be started.
/// - Return [`SyscallError::Failed`] if command exits unsuccessfully.
pub fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    cwd: Option<&Path>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let args = collect_args(args);
    debug!("run {:?} {:?}", cmd.as_ref(), args);

    let mut command = Command::new(cmd.as_ref());
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let output = command.output().map_err(|source| SyscallError::Spawn {
        source,
        cmd: cmd.as_ref().to_owned(),
    })?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

    if !output.status.success() {
        let message = match chomp(&stderr) {
            "" => format!("exited with {}", output.status),
            stderr => stderr.to_string(),
        };
        return Err(SyscallError::Failed {
            cmd: cmd.as_ref().to_owned(),
            args,
            message,
        });
    }

    Ok(chomp(&stdout).to_string())
}

fn collect_args(args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| arg.as_ref().to_owned())
        .collect()
}

// INVARIANT: Chomp trailing newlines only, leading whitespace is meaningful.
fn chomp(text: &str) -> &str {
    text.trim_end_matches(['\r', '\n'])
}

/// External process error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Command could not be started at all.
    #[error("failed to run {cmd:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        cmd: OsString,
    },

    /// Command ran but reported failure.
    #[error("command {cmd:?} {args:?} failed: {message}")]
    Failed {
        cmd: OsString,
        args: Vec<OsString>,
        message: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn non_interactive_returns_chomped_stdout() -> anyhow::Result<()> {
        let output = syscall_non_interactive("sh", None, ["-c", "printf 'hello\\n\\n'"])?;
        assert_eq!(output, "hello");
        Ok(())
    }

    #[test]
    fn non_interactive_reports_stderr_on_failure() {
        let result = syscall_non_interactive("sh", None, ["-c", "echo broken >&2; exit 3"]);
        match result {
            Err(SyscallError::Failed { message, .. }) => assert_eq!(message, "broken"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn non_interactive_honors_working_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = syscall_non_interactive("pwd", Some(dir.path()), Vec::<&str>::new())?;
        assert_eq!(
            std::fs::canonicalize(output)?,
            std::fs::canonicalize(dir.path())?
        );
        Ok(())
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let result = syscall_non_interactive("spillway-no-such-binary", None, ["x"]);
        assert!(matches!(result, Err(SyscallError::Spawn { .. })));
    }

    #[test]
    fn interactive_reports_exit_failure() {
        let result = syscall_interactive("sh", None, ["-c", "exit 1"]);
        assert!(matches!(result, Err(SyscallError::Failed { .. })));
    }
}
