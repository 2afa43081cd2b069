//! Blocking execution of external tools with argument-vector semantics.
//!
//! Argument content is never passed through a shell, so there is no
//! metacharacter expansion to guard against. The child's stdout and stderr
//! go to a single target: one interleaved stream into a file, or a null
//! sink. Callers that capture to a file parse that very stream afterwards,
//! so nothing else may write to it while the child runs; [`run_in`] itself
//! emits no log message between spawn and wait.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Where the child's combined output goes.
#[derive(Debug, Clone, Copy)]
pub enum OutputTarget<'a> {
    /// Redirect stdout and stderr, interleaved, into this file.
    ToFile(&'a Path),
    /// Send both streams to a null sink.
    Discard,
}

/// How a child invocation ended. All failure is reported through this
/// value; [`run_in`] never panics and never returns `Err`.
#[derive(Debug)]
pub enum RunReport {
    /// The child terminated normally.
    Exited(i32),
    /// The child was terminated by a signal (Unix only).
    Signaled { signal: i32, core_dumped: bool },
    /// The child never ran: spawn or redirection setup failed.
    SpawnFailed(io::Error),
}

impl RunReport {
    /// True only for a normal termination with a zero exit status.
    pub fn ok(&self) -> bool {
        matches!(self, RunReport::Exited(0))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunReport::Exited(code) => write!(f, "exited with status {code}"),
            RunReport::Signaled {
                signal,
                core_dumped: true,
            } => write!(f, "terminated by signal {signal} (core dumped)"),
            RunReport::Signaled { signal, .. } => write!(f, "terminated by signal {signal}"),
            RunReport::SpawnFailed(error) => write!(f, "failed to start: {error}"),
        }
    }
}

/// Runs `argv[0]` with the remaining elements as literal arguments.
pub fn run(argv: &[String], output: OutputTarget<'_>) -> RunReport {
    run_in(argv, output, None)
}

/// Like [`run`], with the child started in `current_dir` when given.
///
/// The call blocks until the child exits; there is no timeout, a hung tool
/// hangs the run.
pub fn run_in(argv: &[String], output: OutputTarget<'_>, current_dir: Option<&Path>) -> RunReport {
    let Some((program, args)) = argv.split_first() else {
        return RunReport::SpawnFailed(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty argument vector",
        ));
    };

    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());
    if let Some(dir) = current_dir {
        command.current_dir(dir);
    }

    match output {
        OutputTarget::ToFile(path) => {
            let file = match File::create(path) {
                Ok(file) => file,
                Err(error) => return RunReport::SpawnFailed(error),
            };
            let stderr = match file.try_clone() {
                Ok(clone) => clone,
                Err(error) => return RunReport::SpawnFailed(error),
            };
            command.stdout(Stdio::from(file)).stderr(Stdio::from(stderr));
        }
        OutputTarget::Discard => {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
    }

    let status = match command.status() {
        Ok(status) => status,
        Err(error) => return RunReport::SpawnFailed(error),
    };

    match status.code() {
        Some(code) => RunReport::Exited(code),
        None => signaled(status),
    }
}

#[cfg(unix)]
fn signaled(status: std::process::ExitStatus) -> RunReport {
    use std::os::unix::process::ExitStatusExt;

    RunReport::Signaled {
        signal: status.signal().unwrap_or(0),
        core_dumped: status.core_dumped(),
    }
}

#[cfg(not(unix))]
fn signaled(_status: std::process::ExitStatus) -> RunReport {
    // On non-Unix platforms a missing exit code has no signal to report.
    RunReport::Exited(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".into(), "-c".into(), script.into()]
    }

    #[test]
    #[cfg(unix)]
    fn zero_exit_is_ok() {
        let report = run(&sh("exit 0"), OutputTarget::Discard);
        assert!(report.ok());
        assert!(matches!(report, RunReport::Exited(0)));
    }

    #[test]
    #[cfg(unix)]
    fn nonzero_exit_is_reported_not_raised() {
        let report = run(&sh("exit 7"), OutputTarget::Discard);
        assert!(!report.ok());
        assert!(matches!(report, RunReport::Exited(7)));
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let argv = vec!["/nonexistent/mybackup-no-such-tool".to_string()];
        let report = run(&argv, OutputTarget::Discard);
        assert!(!report.ok());
        assert!(matches!(report, RunReport::SpawnFailed(_)));
    }

    #[test]
    fn empty_argv_is_a_spawn_failure() {
        let report = run(&[], OutputTarget::Discard);
        assert!(matches!(report, RunReport::SpawnFailed(_)));
    }

    #[test]
    #[cfg(unix)]
    fn both_streams_end_up_in_the_capture_file() {
        let dir = tempfile::tempdir().unwrap();
        let capture = dir.path().join("capture.out");

        let report = run(
            &sh("echo to-stdout; echo to-stderr >&2"),
            OutputTarget::ToFile(&capture),
        );
        assert!(report.ok());

        let captured = std::fs::read_to_string(&capture).unwrap();
        assert!(captured.contains("to-stdout"));
        assert!(captured.contains("to-stderr"));
    }

    #[test]
    #[cfg(unix)]
    fn current_dir_applies_to_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let capture = dir.path().join("pwd.out");

        let report = run_in(&sh("pwd"), OutputTarget::ToFile(&capture), Some(dir.path()));
        assert!(report.ok());

        let captured = std::fs::read_to_string(&capture).unwrap();
        let reported = std::path::Path::new(captured.trim()).canonicalize().unwrap();
        assert_eq!(reported, dir.path().canonicalize().unwrap());
    }
}
