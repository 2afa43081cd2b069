//! Built-in tar writer, used when no external archiving tool is available.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::archive::{
    discard_partial, relative_member, suffixed, ArchiveError, ArchiveRequest, Archiver,
};

/// Writes the dump files into a tar archive in-process, compressed with the
/// built-in gzip layer when requested.
pub struct TarballWriter;

impl Archiver for TarballWriter {
    fn archive(&self, request: &ArchiveRequest<'_>) -> Result<PathBuf, ArchiveError> {
        if request.files.is_empty() {
            return Err(ArchiveError::Empty);
        }

        let members: Vec<PathBuf> = request
            .files
            .iter()
            .map(|file| relative_member(request.work_dir, file))
            .collect();

        let target = if request.compress {
            suffixed(request.target, ".gz")
        } else {
            request.target.to_path_buf()
        };

        log::debug!(
            target: "archive::tarball",
            "Writing {} member(s) to {}",
            members.len(),
            target.display()
        );

        if let Err(error) = self.write(request, &members, &target) {
            discard_partial(&target);
            return Err(error);
        }

        Ok(target)
    }
}

impl TarballWriter {
    fn write(
        &self,
        request: &ArchiveRequest<'_>,
        members: &[PathBuf],
        target: &std::path::Path,
    ) -> Result<(), ArchiveError> {
        let file = File::create(target)?;

        if request.compress {
            let encoder = GzEncoder::new(file, Compression::default());
            let encoder = append_members(encoder, request, members)?;
            encoder.finish()?;
        } else {
            let mut file = append_members(file, request, members)?;
            file.flush()?;
        }

        Ok(())
    }
}

fn append_members<W: Write>(
    writer: W,
    request: &ArchiveRequest<'_>,
    members: &[PathBuf],
) -> Result<W, ArchiveError> {
    let mut builder = tar::Builder::new(writer);
    for member in members {
        builder.append_path_with_name(request.work_dir.join(member), member)?;
    }
    // into_inner finishes the archive footer
    Ok(builder.into_inner()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::path::Path;

    use flate2::read::GzDecoder;

    fn request_dirs() -> (tempfile::TempDir, PathBuf, Vec<PathBuf>) {
        let work = tempfile::tempdir().unwrap();
        let host = work.path().join("db1_2026_08_05-04_30_00");
        fs::create_dir(&host).unwrap();

        let files = vec![host.join("shop.sql"), host.join("wiki.sql")];
        for file in &files {
            fs::write(file, "-- dump\n").unwrap();
        }
        (work, host, files)
    }

    #[test]
    fn members_are_relative_to_the_work_dir() {
        let (work, host, files) = request_dirs();
        let backups = tempfile::tempdir().unwrap();
        let target = backups.path().join("db1_2026_08_05-04_30_00.tar");

        let produced = TarballWriter
            .archive(&ArchiveRequest {
                work_dir: work.path(),
                source_dir: &host,
                files: &files,
                target: &target,
                compress: true,
            })
            .unwrap();
        assert_eq!(
            produced.file_name().unwrap().to_str().unwrap(),
            "db1_2026_08_05-04_30_00.tar.gz"
        );

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&produced).unwrap()));
        let names: Vec<PathBuf> = archive
            .entries()
            .unwrap()
            .map(|entry| entry.unwrap().path().unwrap().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                Path::new("db1_2026_08_05-04_30_00/shop.sql"),
                Path::new("db1_2026_08_05-04_30_00/wiki.sql"),
            ]
        );
    }

    #[test]
    fn uncompressed_archives_keep_the_plain_target_name() {
        let (work, host, files) = request_dirs();
        let backups = tempfile::tempdir().unwrap();
        let target = backups.path().join("db1.tar");

        let produced = TarballWriter
            .archive(&ArchiveRequest {
                work_dir: work.path(),
                source_dir: &host,
                files: &files,
                target: &target,
                compress: false,
            })
            .unwrap();
        assert_eq!(produced, target);
        assert!(target.is_file());
    }

    #[test]
    fn zero_files_are_fatal() {
        let work = tempfile::tempdir().unwrap();
        let result = TarballWriter.archive(&ArchiveRequest {
            work_dir: work.path(),
            source_dir: work.path(),
            files: &[],
            target: &work.path().join("empty.tar"),
            compress: false,
        });
        assert!(matches!(result, Err(ArchiveError::Empty)));
    }
}
