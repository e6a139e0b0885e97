use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Queue-assigned identifier of a reserved job.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct QueueJobId(pub u64);

/// Body sent for the synthetic job that refreshes the most recent build.
pub const LATEST_SENTINEL: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestIdError {
    Empty,
    InvalidCharacters(String),
}

/// A test identifier that is safe to turn into a results path.
///
/// Only `[A-Za-z0-9_]+` is accepted, so separators, dots and whitespace can
/// never reach path construction.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TestId(String);

fn allow_list() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static pattern"))
}

impl TestId {
    pub fn parse(raw: &str) -> Result<Self, TestIdError> {
        if raw.is_empty() {
            return Err(TestIdError::Empty);
        }
        if !allow_list().is_match(raw) {
            return Err(TestIdError::InvalidCharacters(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_latest(&self) -> bool {
        self.0 == LATEST_SENTINEL
    }

    /// Results live under `<results_dir>/<id with '_' as '/'>`.
    pub fn result_dir(&self, results_root: &Path) -> PathBuf {
        self.0
            .split('_')
            .fold(results_root.to_path_buf(), |path, part| path.join(part))
    }
}

impl std::fmt::Display for TestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
