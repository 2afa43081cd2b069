//! Archiving through an external tar-style tool.

use std::path::{Path, PathBuf};

use crate::archive::{
    discard_partial, relative_member, suffixed, ArchiveError, ArchiveRequest, Archiver,
};
use crate::exec::{run_in, OutputTarget};

/// Drives a resolved external archiver. The child runs with the work
/// directory as its working directory so the archive members carry paths
/// relative to it, which keeps the archive portable across restore
/// locations.
pub struct ExternalTool {
    tool: PathBuf,
    /// Resolved compression program, when compression is wanted and a tool
    /// was found. `None` means the archive stays uncompressed.
    compressor: Option<PathBuf>,
}

impl ExternalTool {
    pub fn new(tool: PathBuf, compressor: Option<PathBuf>) -> Self {
        Self { tool, compressor }
    }

    fn target_and_compression(&self, request: &ArchiveRequest<'_>) -> (PathBuf, Vec<String>) {
        if !request.compress {
            return (request.target.to_path_buf(), Vec::new());
        }
        match &self.compressor {
            Some(compressor) => (
                suffixed(request.target, compression_suffix(compressor)),
                vec![
                    "--use-compress-program".to_string(),
                    compressor.display().to_string(),
                ],
            ),
            // select() already warned about the missing tool
            None => (request.target.to_path_buf(), Vec::new()),
        }
    }
}

impl Archiver for ExternalTool {
    fn archive(&self, request: &ArchiveRequest<'_>) -> Result<PathBuf, ArchiveError> {
        if request.files.is_empty() {
            return Err(ArchiveError::Empty);
        }

        let member = relative_member(request.work_dir, request.source_dir);
        let (target, compression_args) = self.target_and_compression(request);

        let mut argv = vec![
            self.tool.display().to_string(),
            "--create".to_string(),
            "--file".to_string(),
            target.display().to_string(),
        ];
        argv.extend(compression_args);
        argv.push(member.display().to_string());

        log::debug!(target: "archive::external", "Running: {}", argv.join(" "));
        let report = run_in(&argv, OutputTarget::Discard, Some(request.work_dir));
        if !report.ok() {
            discard_partial(&target);
            return Err(ArchiveError::Tool(report.to_string()));
        }

        Ok(target)
    }
}

/// `.bz2` for the bzip2 family (bzip2, pbzip2, lbzip2), `.gz` otherwise.
fn compression_suffix(compressor: &Path) -> &'static str {
    let name = compressor
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.contains("bzip2") {
        ".bz2"
    } else {
        ".gz"
    }
}
