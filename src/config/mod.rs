//! Typed run configuration, merged from the system-wide and the user file.
//!
//! Both sources are TOML with the same recognized key set; the user file
//! wins key-by-key. Unrecognized keys are ignored so existing deployments
//! can carry extra keys without breaking. Once [`Config::load`] returns,
//! the configuration is immutable for the rest of the run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error};
use log::LevelFilter;
use serde::{Deserialize, Deserializer};

/// Configuration file shared by all users of the machine.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/mybackup/mybackup.toml";

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    /// A configuration file exists but could not be read.
    #[display("unable to read {}: {error}", path.display())]
    Read { path: PathBuf, error: io::Error },
    /// A configuration file is not valid TOML.
    #[display("unable to parse {}: {error}", path.display())]
    Parse {
        path: PathBuf,
        error: toml::de::Error,
    },
    /// Neither file nor the command line named a backup directory.
    #[display("no backup directory configured")]
    MissingBackupDir,
    /// The configured backup directory does not exist or is not a directory.
    #[display("backup directory is not an existing directory: {}", _0.display())]
    BadBackupDir(#[error(ignore)] PathBuf),
}

/// One parsed configuration source. Every key is optional; [`Config`]
/// applies defaults after the merge.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub backup_dir: Option<PathBuf>,
    /// Comma-separated list of databases to back up. Absent means all.
    pub databases: Option<String>,
    /// Comma-separated list of databases to leave out.
    pub exclude: Option<String>,
    /// Credentials file passed to the client tools instead of discrete flags.
    pub defaults_file: Option<PathBuf>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    /// Label used in archive names instead of the server host.
    pub host_alias: Option<String>,
    pub mysql: Option<PathBuf>,
    pub mysqldump: Option<PathBuf>,
    pub archiver: Option<PathBuf>,
    pub compressor: Option<PathBuf>,
    pub compress: Option<bool>,
    pub optimize_tables: Option<bool>,
    pub syslog: Option<bool>,
    #[serde(default, deserialize_with = "lenient_keep")]
    pub keep: Option<i64>,
    /// Log verbosity from 0 (silent) to 5 (trace).
    pub verbosity: Option<u8>,
}

impl ConfigFile {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        toml::from_str(&raw).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Key-by-key merge with `over` winning wherever it has a value.
    fn merge(self, over: ConfigFile) -> ConfigFile {
        ConfigFile {
            backup_dir: over.backup_dir.or(self.backup_dir),
            databases: over.databases.or(self.databases),
            exclude: over.exclude.or(self.exclude),
            defaults_file: over.defaults_file.or(self.defaults_file),
            user: over.user.or(self.user),
            password: over.password.or(self.password),
            host: over.host.or(self.host),
            host_alias: over.host_alias.or(self.host_alias),
            mysql: over.mysql.or(self.mysql),
            mysqldump: over.mysqldump.or(self.mysqldump),
            archiver: over.archiver.or(self.archiver),
            compressor: over.compressor.or(self.compressor),
            compress: over.compress.or(self.compress),
            optimize_tables: over.optimize_tables.or(self.optimize_tables),
            syslog: over.syslog.or(self.syslog),
            keep: over.keep.or(self.keep),
            verbosity: over.verbosity.or(self.verbosity),
        }
    }
}

/// Retention counts were plain strings in older deployments; an integer is
/// taken as-is, an unparseable string degrades to "not configured".
fn lenient_keep<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Int(keep)) => Some(keep),
        Some(Raw::Str(raw)) => match raw.trim().parse() {
            Ok(keep) => Some(keep),
            Err(_) => {
                log::warn!(target: "config", "Ignoring non-numeric retention count: {raw:?}");
                None
            }
        },
    })
}

/// The merged, validated configuration of one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub backup_dir: PathBuf,
    pub databases: Option<Vec<String>>,
    pub exclude: Vec<String>,
    pub defaults_file: Option<PathBuf>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub host_alias: Option<String>,
    pub mysql: Option<PathBuf>,
    pub mysqldump: Option<PathBuf>,
    pub archiver: Option<PathBuf>,
    pub compressor: Option<PathBuf>,
    pub compress: bool,
    pub optimize_tables: bool,
    pub syslog: bool,
    pub keep: Option<i64>,
    pub verbosity: Option<u8>,
}

impl Config {
    /// Loads and merges the system file and an optional user file, then
    /// applies `backup_dir_override` from the command line.
    ///
    /// A missing system file is fine; a user file named explicitly must be
    /// readable.
    pub fn load(
        user_file: Option<&Path>,
        backup_dir_override: Option<PathBuf>,
    ) -> Result<Config, ConfigError> {
        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        let mut merged = ConfigFile::default();
        if system_path.is_file() {
            merged = merged.merge(ConfigFile::read(system_path)?);
        }
        if let Some(user_file) = user_file {
            merged = merged.merge(ConfigFile::read(user_file)?);
        }

        Self::from_file(merged, backup_dir_override)
    }

    fn from_file(
        file: ConfigFile,
        backup_dir_override: Option<PathBuf>,
    ) -> Result<Config, ConfigError> {
        let backup_dir = backup_dir_override
            .or(file.backup_dir)
            .ok_or(ConfigError::MissingBackupDir)?;
        if !backup_dir.is_dir() {
            return Err(ConfigError::BadBackupDir(backup_dir));
        }

        Ok(Config {
            backup_dir,
            databases: file.databases.as_deref().map(split_list).filter(|list| !list.is_empty()),
            exclude: file.exclude.as_deref().map(split_list).unwrap_or_default(),
            defaults_file: file.defaults_file,
            user: file.user,
            password: file.password,
            host: file.host,
            host_alias: file.host_alias,
            mysql: file.mysql,
            mysqldump: file.mysqldump,
            archiver: file.archiver,
            compressor: file.compressor,
            compress: file.compress.unwrap_or(true),
            optimize_tables: file.optimize_tables.unwrap_or(false),
            syslog: file.syslog.unwrap_or(false),
            keep: file.keep,
            verbosity: file.verbosity,
        })
    }

    /// Label the archive name is derived from: the configured alias, else
    /// the server host, else `localhost`.
    pub fn host_label(&self) -> &str {
        self.host_alias
            .as_deref()
            .or(self.host.as_deref())
            .unwrap_or("localhost")
    }

    /// Maps the configured 0-5 verbosity onto a [LevelFilter]. Values above
    /// 5 saturate at trace.
    pub fn level_filter(&self) -> Option<LevelFilter> {
        self.verbosity.map(|verbosity| match verbosity {
            0 => LevelFilter::Off,
            1 => LevelFilter::Error,
            2 => LevelFilter::Warn,
            3 => LevelFilter::Info,
            4 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}
