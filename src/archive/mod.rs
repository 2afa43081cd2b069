//! Bundling the produced dump files into one archive.
//!
//! Three strategies implement the same [`Archiver`] capability and are
//! selected in a fixed order: an external archiving tool when one can be
//! resolved, the built-in tar writer otherwise, and on Windows a zip writer
//! replaces both because that is the platform's native archive convention.

#[cfg(not(windows))]
pub mod external;
#[cfg(not(windows))]
pub mod tarball;
#[cfg(windows)]
pub mod zipfile;

#[cfg(not(windows))]
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, Error, From};

use crate::config::Config;
#[cfg(not(windows))]
use crate::exec::resolve;

/// Tool names searched when none is configured.
#[cfg(not(windows))]
const DEFAULT_ARCHIVER: &str = "tar";
#[cfg(not(windows))]
const DEFAULT_COMPRESSOR: &str = "gzip";

#[derive(Debug, Display, Error, From)]
pub enum ArchiveError {
    /// Nothing was dumped; an empty archive is never written.
    #[display("no files to archive")]
    Empty,
    /// The external archiving tool ran and failed.
    #[display("archive tool {_0}")]
    Tool(#[error(ignore)] String),
    #[display("archive i/o failed: {_0}")]
    #[from]
    Io(io::Error),
    #[cfg(windows)]
    #[display("zip writer failed: {_0}")]
    #[from]
    Zip(zip::result::ZipError),
}

/// Everything a strategy needs for one archive.
#[derive(Debug)]
pub struct ArchiveRequest<'a> {
    /// The run's work directory; member paths are made relative to it.
    pub work_dir: &'a Path,
    /// The host directory holding the dump files.
    pub source_dir: &'a Path,
    /// The successful dump files, all inside `source_dir`.
    pub files: &'a [PathBuf],
    /// Target path without any compression suffix.
    pub target: &'a Path,
    pub compress: bool,
}

/// A way to produce the archive. Strategies return the path they actually
/// wrote, which may carry a compression suffix on top of the request's
/// target, and remove their partial output before reporting failure.
pub trait Archiver {
    fn archive(&self, request: &ArchiveRequest<'_>) -> Result<PathBuf, ArchiveError>;
}

/// Picks the strategy for this run.
#[cfg(windows)]
pub fn select(_config: &Config) -> Box<dyn Archiver> {
    Box::new(zipfile::ZipArchiver)
}

/// Picks the strategy for this run.
#[cfg(not(windows))]
pub fn select(config: &Config) -> Box<dyn Archiver> {
    match resolve(config.archiver.as_deref(), DEFAULT_ARCHIVER) {
        Some(tool) => {
            let compressor = if config.compress {
                let compressor = resolve(config.compressor.as_deref(), DEFAULT_COMPRESSOR);
                if compressor.is_none() {
                    log::warn!(
                        target: "archive",
                        "No compression tool available, the archive will not be compressed"
                    );
                }
                compressor
            } else {
                None
            };
            Box::new(external::ExternalTool::new(tool, compressor))
        }
        None => {
            log::info!(
                target: "archive",
                "No external archiving tool found, using the built-in writer"
            );
            Box::new(tarball::TarballWriter)
        }
    }
}

/// Archive file name for one run: the host directory's base name plus the
/// platform extension, inside the backup directory. Deterministic for a
/// fixed base name.
pub fn archive_target(backup_dir: &Path, base: &str) -> PathBuf {
    backup_dir.join(format!("{base}.{}", platform_extension()))
}

/// `tar` where the tar convention rules, `zip` where the platform's native
/// format is a compressed single-file archive.
pub const fn platform_extension() -> &'static str {
    if cfg!(windows) {
        "zip"
    } else {
        "tar"
    }
}

/// Appends a compression suffix to an already-extended file name.
#[cfg(not(windows))]
pub(crate) fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// A failed strategy must not leave a half-written file that looks like a
/// valid backup.
pub(crate) fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::info!(target: "archive", "Removed partial archive {}", path.display()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => log::error!(
            target: "archive",
            "Unable to remove partial archive {}: {error}",
            path.display()
        ),
    }
}

/// Member path of `path` relative to `work_dir`. A path outside the work
/// directory is kept absolute, with an error logged, rather than dropped;
/// the archive members are then less portable but complete.
pub(crate) fn relative_member(work_dir: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(work_dir) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => {
            log::error!(
                target: "archive",
                "{} is not inside the work directory, archiving the absolute path",
                path.display()
            );
            path.to_path_buf()
        }
    }
}
