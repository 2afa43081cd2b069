//! Library to create scheduled logical backups of MySQL-compatible servers.
//!
//! One invocation performs one full run: the server's databases are listed,
//! filtered against the configured include/exclude lists, dumped one by one
//! with the server's dump tool, bundled into a single archive in the backup
//! directory, and older archives are pruned by retention count. All external
//! tools are driven through the [`exec`] module; the run itself is sequenced
//! by [`backup::BackupRun`].
//!
//! Secrets are kept out of the process table by preferring a credentials
//! (defaults) file over discrete user/password flags, and every command line
//! that reaches a log message is redacted first.

#![forbid(unsafe_code)]

pub mod archive;
pub mod backup;
pub mod cli;
pub mod config;
pub mod exec;
pub mod mysql;
pub mod util;
