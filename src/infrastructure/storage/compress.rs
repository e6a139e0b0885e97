use crate::infrastructure::storage::StorageError;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// `<path>.gz` next to the input.
pub fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

fn gzip_blocking(source: &Path, dest: &Path) -> io::Result<()> {
    let mut input = BufReader::new(File::open(source)?);
    let output = BufWriter::new(File::create(dest)?);
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Gzip `source` to `<source>.gz` and delete the original.
pub async fn gzip_and_remove(source: &Path) -> Result<PathBuf, StorageError> {
    let source = source.to_path_buf();
    let dest = gz_path(&source);
    let target = dest.clone();

    tokio::task::spawn_blocking(move || -> io::Result<()> {
        gzip_blocking(&source, &target)?;
        std::fs::remove_file(&source)
    })
    .await
    .map_err(|e| StorageError::Task(e.to_string()))??;

    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[tokio::test]
    async fn given_file_when_gzipped_should_replace_it_with_compressed_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("001-trace.json");
        std::fs::write(&source, b"{\"traceEvents\":[]}").unwrap();

        let dest = gzip_and_remove(&source).await.unwrap();

        assert_eq!(dest, dir.path().join("001-trace.json.gz"));
        assert!(!source.exists());
        let mut decoded = String::new();
        GzDecoder::new(File::open(&dest).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "{\"traceEvents\":[]}");
    }

    #[tokio::test]
    async fn given_missing_file_when_gzipped_should_fail() {
        let dir = tempfile::tempdir().unwrap();
        assert!(gzip_and_remove(&dir.path().join("missing")).await.is_err());
    }
}
