//! Zip writer for the platform whose native archive convention is a
//! compressed single-file format.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::archive::{discard_partial, relative_member, ArchiveError, ArchiveRequest, Archiver};

/// Writes the dump files into a zip archive in-process. The compression
/// toggle selects deflate at maximum level versus plain storage.
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    fn archive(&self, request: &ArchiveRequest<'_>) -> Result<PathBuf, ArchiveError> {
        if request.files.is_empty() {
            return Err(ArchiveError::Empty);
        }

        let target = request.target.to_path_buf();
        log::debug!(
            target: "archive::zipfile",
            "Writing {} member(s) to {}",
            request.files.len(),
            target.display()
        );

        if let Err(error) = write_zip(request, &target) {
            discard_partial(&target);
            return Err(error);
        }

        Ok(target)
    }
}

fn write_zip(request: &ArchiveRequest<'_>, target: &Path) -> Result<(), ArchiveError> {
    let options = if request.compress {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9))
    } else {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    };

    let mut writer = zip::ZipWriter::new(File::create(target)?);
    for file in request.files {
        let member = relative_member(request.work_dir, file);
        // zip member names always use forward slashes
        let name = member.to_string_lossy().replace('\\', "/");
        writer.start_file(name, options)?;
        io::copy(&mut File::open(file)?, &mut writer)?;
    }
    writer.finish()?;

    Ok(())
}
