//! Per-database dump execution through the server's dump tool.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};

use crate::exec::{run, OutputTarget};
use crate::mysql::{redacted_command, Credentials};

/// Flags passed to every dump invocation: lock tables for a consistent
/// snapshot, column names on every INSERT, DROP before CREATE, streamed row
/// retrieval, quoted identifiers. These are part of the behavior contract
/// with the dump tool.
const DUMP_FLAGS: [&str; 5] = [
    "--quote-names",
    "--complete-insert",
    "--add-drop-table",
    "--quick",
    "--lock-tables",
];

/// What one dump invocation covers. Exactly one selector by construction;
/// there is no way to ask for both everything and a single database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpTarget {
    AllDatabases,
    Database(String),
}

/// A database name that cannot be used to build a dump file path.
#[derive(Debug, Display, Error)]
#[display("database name unusable in a file path: {_0:?}")]
pub struct BadDatabaseName(#[error(ignore)] String);

/// One dump invocation: the selector and the file its output goes to.
#[derive(Debug, Clone)]
pub struct DumpJob {
    pub target: DumpTarget,
    pub dest: PathBuf,
}

impl DumpJob {
    /// Job covering every database on the server.
    pub fn all_databases(dump_dir: &Path) -> Self {
        Self {
            target: DumpTarget::AllDatabases,
            dest: dump_dir.join("all-databases.sql"),
        }
    }

    /// Job for a single database. The name comes from the server catalog,
    /// but it becomes a file name here, so path separators are rejected.
    pub fn for_database(dump_dir: &Path, database: &str) -> Result<Self, BadDatabaseName> {
        if database.is_empty()
            || database == "."
            || database == ".."
            || database.contains(['/', '\\'])
        {
            return Err(BadDatabaseName(database.to_string()));
        }

        Ok(Self {
            target: DumpTarget::Database(database.to_string()),
            dest: dump_dir.join(format!("{database}.sql")),
        })
    }
}

/// Read-back of a failed dump's output file. Its only purpose is to enrich
/// the error message, so failing to read it never escalates anything.
#[derive(Debug, Display)]
pub enum Diagnostics {
    /// Trailing output of the failed invocation.
    #[display("last output: {_0}")]
    Content(String),
    #[display("no diagnostic output")]
    Empty,
    #[display("diagnostic output unreadable: {_0}")]
    Unreadable(io::Error),
}

#[derive(Debug, Display, Error)]
#[display("dump {detail}; {diagnostics}")]
pub struct DumpError {
    /// How the invocation ended.
    pub detail: String,
    pub diagnostics: Diagnostics,
}

/// Runs the dump tool, one job at a time.
pub struct Dumper<'a> {
    mysqldump: &'a Path,
    credentials: &'a Credentials,
}

impl<'a> Dumper<'a> {
    pub fn new(mysqldump: &'a Path, credentials: &'a Credentials) -> Self {
        Self {
            mysqldump,
            credentials,
        }
    }

    /// Dumps the job's target into its destination file. SQL and any error
    /// text share that file as one interleaved stream, which is what makes
    /// the failure read-back possible.
    pub fn dump(&self, job: &DumpJob) -> Result<PathBuf, DumpError> {
        let argv = self.command_argv(job);
        log::debug!(
            target: "mysql::dump",
            "Running: {}",
            redacted_command(&argv, self.credentials)
        );

        let report = run(&argv, OutputTarget::ToFile(&job.dest));
        if report.ok() {
            log::info!(
                target: "mysql::dump",
                "Dumped {:?} to {}",
                job.target,
                job.dest.display()
            );
            return Ok(job.dest.clone());
        }

        let diagnostics = read_back(&job.dest);
        log::error!(
            target: "mysql::dump",
            "Dump failed ({report}): {}",
            redacted_command(&argv, self.credentials)
        );

        Err(DumpError {
            detail: report.to_string(),
            diagnostics,
        })
    }

    fn command_argv(&self, job: &DumpJob) -> Vec<String> {
        let mut argv = vec![self.mysqldump.display().to_string()];
        argv.extend(self.credentials.argv());
        argv.extend(DUMP_FLAGS.map(str::to_string));
        match &job.target {
            DumpTarget::AllDatabases => argv.push("--all-databases".to_string()),
            DumpTarget::Database(database) => argv.push(database.clone()),
        }
        argv
    }
}

/// The failure output lands at the end of the interleaved stream, so the
/// trailing lines are the interesting ones.
fn read_back(path: &Path) -> Diagnostics {
    const TAIL_LINES: usize = 10;

    match fs::read_to_string(path) {
        Err(error) => Diagnostics::Unreadable(error),
        Ok(raw) if raw.trim().is_empty() => Diagnostics::Empty,
        Ok(raw) => {
            let lines: Vec<&str> = raw.lines().collect();
            let tail = &lines[lines.len().saturating_sub(TAIL_LINES)..];
            Diagnostics::Content(tail.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dumper_argv(credentials: &Credentials, job: &DumpJob) -> Vec<String> {
        Dumper::new(Path::new("/usr/bin/mysqldump"), credentials).command_argv(job)
    }

    #[test]
    fn exactly_one_selector_is_appended() {
        let credentials = Credentials::default();
        let dump_dir = Path::new("/work/host");

        let all = dumper_argv(&credentials, &DumpJob::all_databases(dump_dir));
        assert_eq!(
            all.iter().filter(|arg| *arg == "--all-databases").count(),
            1
        );
        assert_eq!(all.last().map(String::as_str), Some("--all-databases"));

        let single = dumper_argv(
            &credentials,
            &DumpJob::for_database(dump_dir, "shop").unwrap(),
        );
        assert!(!single.contains(&"--all-databases".to_string()));
        assert_eq!(single.last().map(String::as_str), Some("shop"));
    }

    #[test]
    fn safety_flags_are_always_present() {
        let credentials = Credentials::default();
        let argv = dumper_argv(
            &credentials,
            &DumpJob::for_database(Path::new("/work"), "shop").unwrap(),
        );
        for flag in DUMP_FLAGS {
            assert!(argv.contains(&flag.to_string()), "missing {flag}");
        }
    }

    #[test]
    fn credentials_precede_the_selector() {
        let credentials = Credentials {
            user: Some("backup".into()),
            password: Some("hunter2".into()),
            ..Credentials::default()
        };
        let argv = dumper_argv(
            &credentials,
            &DumpJob::for_database(Path::new("/work"), "shop").unwrap(),
        );
        let user_at = argv.iter().position(|arg| arg == "--user=backup").unwrap();
        let selector_at = argv.iter().position(|arg| arg == "shop").unwrap();
        assert!(user_at < selector_at);
    }

    #[test]
    fn path_separators_in_names_are_rejected() {
        let dump_dir = Path::new("/work/host");
        assert!(DumpJob::for_database(dump_dir, "../etc").is_err());
        assert!(DumpJob::for_database(dump_dir, "a/b").is_err());
        assert!(DumpJob::for_database(dump_dir, "a\\b").is_err());
        assert!(DumpJob::for_database(dump_dir, "").is_err());
        assert!(DumpJob::for_database(dump_dir, "shop").is_ok());
    }

    #[test]
    fn dump_filenames_derive_from_the_database() {
        let job = DumpJob::for_database(Path::new("/work/host"), "shop").unwrap();
        assert_eq!(job.dest, Path::new("/work/host/shop.sql"));

        let job = DumpJob::all_databases(Path::new("/work/host"));
        assert_eq!(job.dest, Path::new("/work/host/all-databases.sql"));
    }

    #[test]
    fn read_back_distinguishes_empty_content_and_unreadable() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.sql");
        assert!(matches!(read_back(&missing), Diagnostics::Unreadable(_)));

        let empty = dir.path().join("empty.sql");
        fs::write(&empty, "\n").unwrap();
        assert!(matches!(read_back(&empty), Diagnostics::Empty));

        let failed = dir.path().join("failed.sql");
        fs::write(&failed, "-- dump header\nmysqldump: Got error: 1045\n").unwrap();
        match read_back(&failed) {
            Diagnostics::Content(tail) => assert!(tail.contains("1045")),
            other => panic!("unexpected diagnostics: {other:?}"),
        }
    }
}
