//! Talking to the MySQL-compatible server through its client tools.
//!
//! - [`Catalog`]: lists databases and tables.
//! - [`Dumper`]: produces one logical dump file per [`DumpJob`].
//! - [`Maintenance`]: optional `OPTIMIZE TABLE` pass after the backup.

pub mod catalog;
pub mod dump;
pub mod optimize;

pub use catalog::Catalog;
pub use dump::{DumpJob, DumpTarget, Dumper};
pub use optimize::Maintenance;

use regex::Regex;

use crate::config::Config;

/// Connection credentials with the precedence rule shared by every client
/// invocation: a configured defaults file is passed alone, discrete flags
/// are only used without one and each is omitted when unset.
///
/// When discrete flags are in play, [`Credentials::redact`] strips the
/// password from anything that reaches a log message.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub defaults_file: Option<std::path::PathBuf>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
}

impl Credentials {
    pub fn from_config(config: &Config) -> Self {
        Self {
            defaults_file: config.defaults_file.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            host: config.host.clone(),
        }
    }

    /// Credential arguments for one client invocation.
    pub fn argv(&self) -> Vec<String> {
        if let Some(defaults_file) = &self.defaults_file {
            return vec![format!("--defaults-extra-file={}", defaults_file.display())];
        }

        let mut argv = Vec::new();
        if let Some(user) = &self.user {
            argv.push(format!("--user={user}"));
        }
        if let Some(password) = &self.password {
            argv.push(format!("--password={password}"));
        }
        if let Some(host) = &self.host {
            argv.push(format!("--host={host}"));
        }
        argv
    }

    /// Removes the password from a command line or diagnostic before it is
    /// logged. Replaces the literal configured password wherever it occurs
    /// and masks any `--password=` fragment on top.
    pub fn redact(&self, line: &str) -> String {
        let mut redacted = match &self.password {
            Some(password) if !password.is_empty() => line.replace(password, "XXXXXX"),
            _ => line.to_string(),
        };

        let mask = Regex::new(r"--password=\S*").unwrap();
        redacted = mask.replace_all(&redacted, "--password=XXXXXX").into_owned();
        redacted
    }
}

/// Joins and redacts an argument vector for logging.
pub(crate) fn redacted_command(argv: &[String], credentials: &Credentials) -> String {
    credentials.redact(&argv.join(" "))
}
