//! Archive extraction for staged files
//!
//! # Supported Formats
//!
//! - **Gzip** (.gz): Using flate2
//! - **Tar.gz** (.tar.gz, .tgz): Combined gzip + tar
//! - **Zip** (.zip): Using zip crate
//!
//! The blocking decoders run on tokio's blocking pool.

use super::{Result, TransportError};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Gzip,
    TarGz,
    Zip,
}

impl ArchiveKind {
    /// Detect the archive format from the file name
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".gz") {
            Some(ArchiveKind::Gzip)
        } else if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else {
            None
        }
    }

    /// Where the extracted content lands: the file without `.gz`, or a directory named
    /// after the archive for multi-file formats
    pub fn output_path(&self, archive: &Path) -> PathBuf {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lower = name.to_ascii_lowercase();
        let suffix = match self {
            ArchiveKind::Gzip => ".gz",
            ArchiveKind::TarGz if lower.ends_with(".tgz") => ".tgz",
            ArchiveKind::TarGz => ".tar.gz",
            ArchiveKind::Zip => ".zip",
        };
        let stem = &name[..name.len().saturating_sub(suffix.len())];
        archive.with_file_name(stem)
    }
}

/// Decompress a gzip file to `destination`
pub fn decompress_gzip(source: &Path, destination: &Path) -> Result<u64> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(source)?));
    let mut output = BufWriter::new(File::create(destination)?);
    let written = io::copy(&mut decoder, &mut output)?;
    output.flush()?;
    debug!(
        source = %source.display(),
        bytes = written,
        "Decompressed gzip file"
    );
    Ok(written)
}

/// Unpack a gzip-compressed tar archive into `directory`
pub fn extract_tar_gz(source: &Path, directory: &Path) -> Result<()> {
    std::fs::create_dir_all(directory)?;
    let decoder = GzDecoder::new(BufReader::new(File::open(source)?));
    tar::Archive::new(decoder).unpack(directory)?;
    debug!(source = %source.display(), "Extracted tar.gz archive");
    Ok(())
}

/// Unpack a zip archive into `directory`
pub fn extract_zip(source: &Path, directory: &Path) -> Result<()> {
    std::fs::create_dir_all(directory)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(source)?))?;
    let entries = archive.len();
    archive.extract(directory)?;
    debug!(source = %source.display(), entries, "Extracted zip archive");
    Ok(())
}

/// Extract `archive` next to itself and remove it, returning the extracted path
pub async fn unpack(archive: &Path, kind: ArchiveKind) -> Result<PathBuf> {
    let source = archive.to_path_buf();
    let output = kind.output_path(archive);
    let target = output.clone();

    tokio::task::spawn_blocking(move || match kind {
        ArchiveKind::Gzip => decompress_gzip(&source, &target).map(|_| ()),
        ArchiveKind::TarGz => extract_tar_gz(&source, &target),
        ArchiveKind::Zip => extract_zip(&source, &target),
    })
    .await
    .map_err(|e| TransportError::Archive(format!("extraction task failed: {}", e)))??;

    tokio::fs::remove_file(archive).await?;
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    #[test]
    fn test_detect() {
        assert_eq!(ArchiveKind::detect(Path::new("a.csv.gz")), Some(ArchiveKind::Gzip));
        assert_eq!(ArchiveKind::detect(Path::new("a.tar.gz")), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::detect(Path::new("a.TGZ")), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::detect(Path::new("a.zip")), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::detect(Path::new("a.csv")), None);
    }

    #[test]
    fn test_output_path() {
        let dir = Path::new("/stage");
        assert_eq!(
            ArchiveKind::Gzip.output_path(&dir.join("a.csv.gz")),
            dir.join("a.csv")
        );
        assert_eq!(ArchiveKind::TarGz.output_path(&dir.join("dump.tar.gz")), dir.join("dump"));
        assert_eq!(ArchiveKind::Zip.output_path(&dir.join("data.zip")), dir.join("data"));
    }

    #[tokio::test]
    async fn test_unpack_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("rows.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&archive).unwrap(), Compression::default());
        encoder.write_all(b"a,b\n1,2\n").unwrap();
        encoder.finish().unwrap();

        let output = unpack(&archive, ArchiveKind::Gzip).await.unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "a,b\n1,2\n");
        assert!(!archive.exists());
    }

    #[tokio::test]
    async fn test_unpack_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.tar.gz");

        let encoder = GzEncoder::new(File::create(&archive).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let data = b"x,y\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "table.csv", &data[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let output = unpack(&archive, ArchiveKind::TarGz).await.unwrap();
        assert_eq!(output, dir.path().join("bundle"));
        assert_eq!(
            std::fs::read_to_string(output.join("table.csv")).unwrap(),
            "x,y\n"
        );
    }

    #[tokio::test]
    async fn test_unpack_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.zip");

        let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
        writer
            .start_file("inner.csv", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"k,v\n").unwrap();
        writer.finish().unwrap();

        let output = unpack(&archive, ArchiveKind::Zip).await.unwrap();
        assert_eq!(std::fs::read_to_string(output.join("inner.csv")).unwrap(), "k,v\n");
        assert!(!archive.exists());
    }
}
