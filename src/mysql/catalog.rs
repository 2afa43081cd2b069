//! Database and table listing through the query tool.

use std::fs;
use std::io;
use std::path::Path;

use derive_more::{Display, Error};

use crate::exec::{run, OutputTarget};
use crate::mysql::{redacted_command, Credentials};

#[derive(Debug, Display, Error)]
pub enum CatalogError {
    /// The query process could not be run or exited unsuccessfully. The
    /// redacted detail was already logged where it happened.
    #[display("database catalog query failed: {_0}")]
    Query(#[error(ignore)] String),
    /// The captured listing could not be read back.
    #[display("catalog output unreadable: {_0}")]
    Output(io::Error),
    /// A successful query returned no databases at all; the connection is
    /// not trustworthy enough to continue.
    #[display("server reported no databases")]
    Empty,
}

/// Lists databases and tables by shelling out to the query tool, capturing
/// its output to a file under the work directory. A live pipe would be
/// simpler but couldn't be re-read for diagnostics after a failure.
pub struct Catalog<'a> {
    mysql: &'a Path,
    credentials: &'a Credentials,
    capture_dir: &'a Path,
}

impl<'a> Catalog<'a> {
    pub fn new(mysql: &'a Path, credentials: &'a Credentials, capture_dir: &'a Path) -> Self {
        Self {
            mysql,
            credentials,
            capture_dir,
        }
    }

    /// All databases the server reports, in server order.
    pub fn list_databases(&self) -> Result<Vec<String>, CatalogError> {
        let argv = self.databases_argv();
        let raw = self.query(&argv, "show-databases.out")?;

        let databases = parse_databases(&raw);
        if databases.is_empty() {
            return Err(CatalogError::Empty);
        }

        log::debug!(target: "mysql::catalog", "Server reported {} database(s)", databases.len());
        Ok(databases)
    }

    /// All tables of `database`, in server order.
    pub fn list_tables(&self, database: &str) -> Result<Vec<String>, CatalogError> {
        let argv = self.tables_argv(database);
        let raw = self.query(&argv, "show-tables.out")?;
        Ok(parse_tables(&raw))
    }

    fn query(&self, argv: &[String], capture_name: &str) -> Result<String, CatalogError> {
        let capture = self.capture_dir.join(capture_name);
        let report = run(argv, OutputTarget::ToFile(&capture));

        if !report.ok() {
            log::error!(
                target: "mysql::catalog",
                "Catalog query failed ({report}): {}",
                redacted_command(argv, self.credentials)
            );
            // best-effort: whatever partial output exists may name the cause
            if let Ok(partial) = fs::read_to_string(&capture) {
                let partial = partial.trim_end();
                if !partial.is_empty() {
                    log::error!(
                        target: "mysql::catalog",
                        "Query output: {}",
                        self.credentials.redact(partial)
                    );
                }
            }
            return Err(CatalogError::Query(report.to_string()));
        }

        fs::read_to_string(&capture).map_err(CatalogError::Output)
    }

    fn databases_argv(&self) -> Vec<String> {
        let mut argv = vec![self.mysql.display().to_string()];
        argv.extend(self.credentials.argv());
        argv.extend(
            ["--batch", "--skip-column-names", "--execute", "SHOW DATABASES"]
                .map(str::to_string),
        );
        argv
    }

    fn tables_argv(&self, database: &str) -> Vec<String> {
        let mut argv = vec![self.mysql.display().to_string()];
        argv.extend(self.credentials.argv());
        argv.extend(["--batch", "--execute", "SHOW TABLES"].map(str::to_string));
        argv.push(database.to_string());
        argv
    }
}

fn parse_databases(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// The table listing keeps its header row; drop it.
fn parse_tables(raw: &str) -> Vec<String> {
    raw.lines()
        .skip(1)
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_listing_takes_every_line() {
        let raw = "shop\nwiki\ninformation_schema\n";
        assert_eq!(
            parse_databases(raw),
            vec!["shop", "wiki", "information_schema"]
        );
    }

    #[test]
    fn table_listing_discards_the_header_row() {
        let raw = "Tables_in_shop\norders\ncustomers\n";
        assert_eq!(parse_tables(raw), vec!["orders", "customers"]);
    }

    #[test]
    fn empty_output_parses_to_no_records() {
        assert!(parse_databases("").is_empty());
        assert!(parse_tables("").is_empty());
        assert!(parse_tables("Tables_in_empty\n").is_empty());
    }

    #[test]
    fn catalog_argv_uses_the_credential_precedence() {
        let credentials = Credentials {
            defaults_file: Some("/etc/mybackup/client.cnf".into()),
            user: Some("ignored".into()),
            ..Credentials::default()
        };
        let catalog = Catalog::new(Path::new("/usr/bin/mysql"), &credentials, Path::new("/tmp"));

        let argv = catalog.databases_argv();
        assert_eq!(
            argv,
            vec![
                "/usr/bin/mysql",
                "--defaults-extra-file=/etc/mybackup/client.cnf",
                "--batch",
                "--skip-column-names",
                "--execute",
                "SHOW DATABASES",
            ]
        );

        let argv = catalog.tables_argv("shop");
        assert_eq!(argv.last().map(String::as_str), Some("shop"));
        assert!(argv.contains(&"SHOW TABLES".to_string()));
    }
}
