//! Resolution of tool names to absolute, executable paths.
//!
//! A user-configured absolute path is only validated, never substituted by
//! a search. Bare names are searched in a sanitized copy of `PATH`.

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves the tool to run.
///
/// * `user_supplied` absolute: accepted only if it exists and is executable.
/// * `user_supplied` bare name: searched in the sanitized search path.
/// * absent: `fallback` is searched in the sanitized search path.
///
/// "Not found" is a normal outcome; the caller decides whether that is
/// fatal (dump/query tool) or degrades a feature (archiver, compressor).
pub fn resolve(user_supplied: Option<&Path>, fallback: &str) -> Option<PathBuf> {
    match user_supplied {
        Some(path) if path.is_absolute() => match which::which(path) {
            Ok(path) => Some(path),
            Err(error) => {
                log::error!(
                    target: "exec::resolve",
                    "Configured tool {} is not usable: {error}",
                    path.display()
                );
                None
            }
        },
        Some(name) => search(name.as_os_str()),
        None => search(fallback.as_ref()),
    }
}

fn search(name: &OsStr) -> Option<PathBuf> {
    let dirs = sanitize(env::var_os("PATH").as_deref());
    if dirs.is_empty() {
        log::debug!(
            target: "exec::resolve",
            "Empty search path, nothing to resolve {name:?} against"
        );
        return None;
    }

    let joined = env::join_paths(&dirs).ok()?;
    which::which_in(name, Some(joined), ".").ok()
}

/// Splits a raw search-path value into canonical directories that exist
/// and are readable, de-duplicated while preserving first-occurrence
/// order. An unset or unusable value yields an empty list, not an error.
fn sanitize(raw: Option<&OsStr>) -> Vec<PathBuf> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = Vec::new();
    for dir in env::split_paths(raw) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let Ok(canonical) = dir.canonicalize() else {
            continue;
        };
        if dirs.contains(&canonical) {
            continue;
        }
        // read_dir doubles as the exists/readable/searchable check
        if fs::read_dir(&canonical).is_err() {
            continue;
        }
        dirs.push(canonical);
    }

    dirs
}
