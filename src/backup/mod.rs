//! The run loop: catalog, filter, dump, archive, purge, maintain, clean up.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::Local;
use derive_more::{Display, Error, From};

use crate::archive::{self, ArchiveError, ArchiveRequest};
use crate::config::Config;
use crate::exec::resolve;
use crate::mysql::catalog::CatalogError;
use crate::mysql::{Catalog, Credentials, DumpJob, Dumper, Maintenance};
use crate::util::retention::{self, PurgeError};

#[derive(Debug, Display, Error, From)]
pub enum RunError {
    /// A required client tool could not be resolved.
    #[display("required tool '{_0}' could not be resolved")]
    ToolNotFound(#[error(ignore)] &'static str),
    #[display("unable to create the work directory: {_0}")]
    WorkDir(io::Error),
    #[display("unable to create the host directory: {_0}")]
    HostDir(io::Error),
    /// The computed archive name already exists; overwriting an earlier
    /// backup is never acceptable.
    #[display("target archive already exists: {}", _0.display())]
    ArchiveExists(#[error(ignore)] PathBuf),
    #[display("no databases left to back up after filtering")]
    EmptyBackupSet,
    #[display("{_0}")]
    #[from]
    Catalog(CatalogError),
    #[display("archiving failed: {_0}")]
    #[from]
    Archive(ArchiveError),
    #[display("purging old backups failed: {_0}")]
    #[from]
    Purge(PurgeError),
}

/// One full backup run over one configuration.
pub struct BackupRun {
    config: Config,
}

impl BackupRun {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Performs the run end to end.
    ///
    /// The work directory is a [tempfile::TempDir], so every return path,
    /// fatal included, tears it down; only killing the process outright
    /// leaves it behind for manual collection.
    pub fn run(&self) -> Result<(), RunError> {
        let config = &self.config;

        let mysqldump = resolve(config.mysqldump.as_deref(), "mysqldump")
            .ok_or(RunError::ToolNotFound("mysqldump"))?;
        let mysql =
            resolve(config.mysql.as_deref(), "mysql").ok_or(RunError::ToolNotFound("mysql"))?;

        let work_dir = tempfile::Builder::new()
            .prefix("mybackup-")
            .tempdir()
            .map_err(RunError::WorkDir)?;

        let timestamp = Local::now().format("%Y_%m_%d-%H_%M_%S");
        let base = format!("{}_{timestamp}", config.host_label());
        let host_dir = work_dir.path().join(&base);
        fs::create_dir(&host_dir).map_err(RunError::HostDir)?;
        log::debug!(target: "backup", "Host directory: {}", host_dir.display());

        // collision check runs before any dump work is spent
        let target = archive::archive_target(&config.backup_dir, &base);
        if target.exists() {
            return Err(RunError::ArchiveExists(target));
        }

        let credentials = Credentials::from_config(config);
        let catalog = Catalog::new(&mysql, &credentials, work_dir.path());
        let all_databases = catalog.list_databases()?;

        let backup_set = backup_set(&all_databases, config.databases.as_deref(), &config.exclude);
        if backup_set.is_empty() {
            return Err(RunError::EmptyBackupSet);
        }
        log::info!(
            target: "backup",
            "Backing up {} of {} database(s)",
            backup_set.len(),
            all_databases.len()
        );

        let dumper = Dumper::new(&mysqldump, &credentials);
        let mut produced = Vec::new();
        for database in &backup_set {
            let job = match DumpJob::for_database(&host_dir, database) {
                Ok(job) => job,
                Err(error) => {
                    log::error!(target: "backup", "Skipping {database}: {error}");
                    continue;
                }
            };
            match dumper.dump(&job) {
                Ok(path) => produced.push(path),
                Err(error) => {
                    log::error!(
                        target: "backup",
                        "Backup of {database} failed, continuing: {error}"
                    );
                    // keep the host directory in sync with the list of
                    // successful dumps, the archive covers both
                    let _ = fs::remove_file(&job.dest);
                }
            }
        }

        let archiver = archive::select(config);
        let request = ArchiveRequest {
            work_dir: work_dir.path(),
            source_dir: &host_dir,
            files: &produced,
            target: &target,
            compress: config.compress,
        };
        let archive_path = archiver.archive(&request)?;
        log::info!(target: "backup", "Wrote archive {}", archive_path.display());

        let purged = retention::purge(&config.backup_dir, config.keep)?;
        if purged.removed > 0 {
            log::info!(
                target: "backup",
                "Purged {} old backup(s), {} kept",
                purged.removed,
                purged.kept
            );
        }

        if config.optimize_tables {
            log::info!(target: "backup", "Running table maintenance");
            let maintenance = Maintenance::new(&mysql, &credentials, work_dir.path());
            maintenance.optimize_all(&catalog, &backup_set);
        }

        log::info!(
            target: "backup",
            "Backed up {} of {} database(s) to {}",
            produced.len(),
            backup_set.len(),
            archive_path.display()
        );

        match work_dir.close() {
            Ok(()) => log::debug!(target: "backup", "Removed work directory"),
            Err(error) => log::warn!(target: "backup", "Work directory cleanup failed: {error}"),
        }

        Ok(())
    }
}

/// The final list of databases to dump, in catalog order:
/// `(explicit ∩ catalog) \ exclude` when an explicit list is configured,
/// `catalog \ exclude` otherwise.
fn backup_set(
    catalog: &[String],
    explicit: Option<&[String]>,
    exclude: &[String],
) -> Vec<String> {
    let selected: Vec<String> = match explicit {
        Some(explicit) => {
            for name in explicit {
                if !catalog.contains(name) {
                    log::warn!(
                        target: "backup",
                        "Configured database {name} does not exist on the server"
                    );
                }
            }
            catalog
                .iter()
                .filter(|name| explicit.contains(*name))
                .cloned()
                .collect()
        }
        None => catalog.to_vec(),
    };

    selected
        .into_iter()
        .filter(|name| !exclude.contains(name))
        .collect()
}
