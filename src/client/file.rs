use super::error::UploadError;
use bytes::Bytes;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Where a file's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Memory(Bytes),
    /// Read lazily, slice by slice, so large files never sit in memory whole
    Disk(PathBuf),
}

/// A file selected in the wizard: content plus name, byte length and MIME type.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    mime_type: String,
    size: u64,
    source: FileSource,
}

impl UploadFile {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: data.len() as u64,
            source: FileSource::Memory(data),
        }
    }

    /// Only the file's metadata is read here.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| UploadError::Io {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            mime_type: mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string(),
            name,
            size: metadata.len(),
            source: FileSource::Disk(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Exactly the bytes in `range`, clamped to the file's length.
    pub async fn read_range(&self, range: Range<u64>) -> Result<Bytes, UploadError> {
        let start = range.start.min(self.size);
        let end = range.end.min(self.size).max(start);

        match &self.source {
            FileSource::Memory(data) => Ok(data.slice(start as usize..end as usize)),
            FileSource::Disk(path) => {
                let io_err = |source| UploadError::Io {
                    name: self.name.clone(),
                    source,
                };
                let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
                file.seek(std::io::SeekFrom::Start(start))
                    .await
                    .map_err(io_err)?;
                let mut buf = vec![0u8; (end - start) as usize];
                file.read_exact(&mut buf).await.map_err(io_err)?;
                Ok(Bytes::from(buf))
            }
        }
    }

    pub async fn read_all(&self) -> Result<Bytes, UploadError> {
        self.read_range(0..self.size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_memory_range_is_exact() {
        let file = UploadFile::from_bytes("notes.txt", "text/plain", b"0123456789".to_vec());
        assert_eq!(file.size(), 10);
        assert_eq!(&file.read_range(2..5).await.unwrap()[..], b"234");
        assert_eq!(&file.read_range(8..20).await.unwrap()[..], b"89");
    }

    #[tokio::test]
    async fn test_disk_file_reads_slices() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"abcdefghij").unwrap();
        tmp.flush().unwrap();

        let file = UploadFile::from_path(tmp.path()).await.unwrap();
        assert_eq!(file.size(), 10);
        assert_eq!(file.mime_type(), "application/pdf");
        assert_eq!(&file.read_range(3..7).await.unwrap()[..], b"defg");
        assert_eq!(&file.read_all().await.unwrap()[..], b"abcdefghij");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = UploadFile::from_path("/definitely/not/here.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Io { .. }));
    }

    #[tokio::test]
    async fn test_mime_type_guessed_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        for (name, expected) in [
            (
                "Budget.XLSX",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ),
            (
                "slides.pptx",
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            ),
            ("archive", "application/octet-stream"),
        ] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"x").unwrap();
            let file = UploadFile::from_path(&path).await.unwrap();
            assert_eq!(file.mime_type(), expected, "{}", name);
        }
    }
}
