//! Optional `OPTIMIZE TABLE` pass after a successful backup.

use std::fs;
use std::path::Path;

use derive_more::{Display, Error};

use crate::exec::{run, OutputTarget};
use crate::mysql::{redacted_command, Catalog, Credentials};

/// Metadata pseudo-database; optimizing it is never meaningful.
const SKIP_DATABASE: &str = "information_schema";

#[derive(Debug, Display, Error)]
#[display("optimize of `{table}` in `{database}` {detail}")]
pub struct MaintenanceError {
    pub database: String,
    pub table: String,
    pub detail: String,
}

/// Runs table maintenance through the query tool. Every failure here is
/// logged and skipped; the backup itself already succeeded.
pub struct Maintenance<'a> {
    mysql: &'a Path,
    credentials: &'a Credentials,
    capture_dir: &'a Path,
}

impl<'a> Maintenance<'a> {
    pub fn new(mysql: &'a Path, credentials: &'a Credentials, capture_dir: &'a Path) -> Self {
        Self {
            mysql,
            credentials,
            capture_dir,
        }
    }

    /// Optimizes every table of every database in `databases`, one table at
    /// a time, continuing past failures.
    pub fn optimize_all(&self, catalog: &Catalog<'_>, databases: &[String]) {
        for database in databases {
            if database == SKIP_DATABASE {
                log::debug!(target: "mysql::optimize", "Skipping {SKIP_DATABASE}");
                continue;
            }

            let tables = match catalog.list_tables(database) {
                Ok(tables) => tables,
                Err(error) => {
                    log::error!(
                        target: "mysql::optimize",
                        "Unable to list tables of {database}: {error}"
                    );
                    continue;
                }
            };

            for table in &tables {
                match self.optimize(database, table) {
                    Ok(result) => {
                        for line in result {
                            log::info!(target: "mysql::optimize", "{line}");
                        }
                    }
                    Err(error) => log::error!(target: "mysql::optimize", "{error}"),
                }
            }
        }
    }

    /// Optimizes one table, returning the statement's result lines.
    pub fn optimize(&self, database: &str, table: &str) -> Result<Vec<String>, MaintenanceError> {
        let argv = self.command_argv(database, table);
        let capture = self.capture_dir.join("optimize.out");

        log::debug!(
            target: "mysql::optimize",
            "Running: {}",
            redacted_command(&argv, self.credentials)
        );
        let report = run(&argv, OutputTarget::ToFile(&capture));
        if !report.ok() {
            return Err(MaintenanceError {
                database: database.to_string(),
                table: table.to_string(),
                detail: report.to_string(),
            });
        }

        let raw = fs::read_to_string(&capture).unwrap_or_default();
        Ok(raw.lines().map(str::to_owned).collect())
    }

    fn command_argv(&self, database: &str, table: &str) -> Vec<String> {
        // identifier quoting: backticks inside the name are doubled
        let quoted = table.replace('`', "``");

        let mut argv = vec![self.mysql.display().to_string()];
        argv.extend(self.credentials.argv());
        argv.extend(["--batch", "--execute"].map(str::to_string));
        argv.push(format!("OPTIMIZE TABLE `{quoted}`"));
        argv.push(database.to_string());
        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimize_statement_quotes_the_table() {
        let credentials = Credentials::default();
        let maintenance =
            Maintenance::new(Path::new("/usr/bin/mysql"), &credentials, Path::new("/tmp"));

        let argv = maintenance.command_argv("shop", "orders");
        assert!(argv.contains(&"OPTIMIZE TABLE `orders`".to_string()));
        assert_eq!(argv.last().map(String::as_str), Some("shop"));
    }

    #[test]
    fn backticks_in_table_names_are_doubled() {
        let credentials = Credentials::default();
        let maintenance =
            Maintenance::new(Path::new("/usr/bin/mysql"), &credentials, Path::new("/tmp"));

        let argv = maintenance.command_argv("shop", "odd`name");
        assert!(argv.contains(&"OPTIMIZE TABLE `odd``name`".to_string()));
    }
}
