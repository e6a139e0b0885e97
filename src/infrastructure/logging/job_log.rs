use crate::infrastructure::storage::compress::gzip_and_remove;
use crate::infrastructure::storage::StorageError;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

type Slot = Arc<Mutex<Option<BufWriter<File>>>>;

/// Log destination that can be pointed at a per-job file and detached again.
/// Writes while nothing is attached are dropped.
#[derive(Clone, Default)]
pub struct JobLogSink {
    slot: Slot,
}

impl JobLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, path: &Path) -> io::Result<JobLogGuard> {
        let file = File::create(path)?;
        if let Some(mut previous) = lock(&self.slot).replace(BufWriter::new(file)) {
            previous.flush()?;
        }
        Ok(JobLogGuard {
            sink: self.clone(),
            path: path.to_path_buf(),
            attached: true,
        })
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.slot).is_some()
    }

    fn detach(&self) -> io::Result<()> {
        match lock(&self.slot).take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<BufWriter<File>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct JobLogWriter {
    slot: Slot,
}

impl Write for JobLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match lock(&self.slot).as_mut() {
            Some(writer) => writer.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match lock(&self.slot).as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for JobLogSink {
    type Writer = JobLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        JobLogWriter {
            slot: self.slot.clone(),
        }
    }
}

/// Keeps the job log attached until finished or dropped.
pub struct JobLogGuard {
    sink: JobLogSink,
    path: PathBuf,
    attached: bool,
}

impl JobLogGuard {
    /// Detach, then gzip the log next to itself.
    pub async fn finish(mut self) -> Result<PathBuf, StorageError> {
        self.attached = false;
        self.sink.detach()?;
        gzip_and_remove(&self.path).await
    }
}

impl Drop for JobLogGuard {
    fn drop(&mut self) {
        if self.attached {
            let _ = self.sink.detach();
        }
    }
}
