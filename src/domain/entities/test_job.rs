use crate::domain::value_objects::ids::TestId;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Category appended to every capture so trace metadata is always present.
pub const METADATA_CATEGORY: &str = "__metadata";

/// Categories captured when the descriptor does not name any.
pub const DEFAULT_TRACE_CATEGORIES: &[&str] = &[
    "blink",
    "blink.console",
    "blink.net",
    "blink.resource",
    "blink.user_timing",
    "browser",
    "devtools",
    "devtools.timeline",
    "ipc",
    "loading",
    "mojom",
    "navigation",
    "net",
    "netlog",
    "rail",
    "resources",
    "scheduler",
    "sequence_manager",
    "toplevel",
    "toplevel.flow",
    "v8",
    "v8.execute",
    "disabled-by-default-devtools.screenshot",
    "disabled-by-default-ipc.flow",
    "disabled-by-default-net",
    "disabled-by-default-network",
    "disabled-by-default-toplevel.flow",
];

/// Change list reference; the submission form stores it as a number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ChangeList {
    Number(u64),
    Name(String),
}

impl ChangeList {
    pub fn package_name(&self) -> String {
        match self {
            ChangeList::Number(n) => n.to_string(),
            ChangeList::Name(name) => name.clone(),
        }
    }
}

/// `testinfo.json` as written by the submission front end.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobDescriptor {
    pub url: Option<String>,
    pub runs: Option<i64>,
    pub cl: Option<ChangeList>,
    #[serde(default)]
    pub clear: bool,
    #[serde(default)]
    pub video: bool,
    #[serde(default)]
    pub cpu: bool,
    pub categories: Option<Vec<String>>,
    pub latency: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    MissingUrl,
    InvalidRuns(Option<i64>),
    InvalidChangeList(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobFlags {
    pub clear_profile: bool,
    pub capture_video: bool,
    pub capture_cpu: bool,
}

/// A fully resolved test job. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestJob {
    pub id: TestId,
    pub url: String,
    pub run_count: u32,
    pub flags: JobFlags,
    pub trace_categories: Vec<String>,
    pub package_reference: PathBuf,
    pub result_path: PathBuf,
    pub latency_ms: Option<u32>,
}

impl TestJob {
    pub fn from_descriptor(
        id: TestId,
        descriptor: JobDescriptor,
        results_root: &Path,
        package_dir: &Path,
    ) -> Result<Self, DescriptorError> {
        // Step 1: Required fields.
        let url = descriptor
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or(DescriptorError::MissingUrl)?;
        let run_count = match descriptor.runs {
            Some(runs) if runs >= 1 && runs <= u32::MAX as i64 => runs as u32,
            other => return Err(DescriptorError::InvalidRuns(other)),
        };

        // Step 2: Resolve the package; the name ends up in a path too.
        let cl = descriptor
            .cl
            .map(|cl| cl.package_name())
            .unwrap_or_else(|| "latest".to_string());
        let cl = TestId::parse(&cl).map_err(|_| DescriptorError::InvalidChangeList(cl.clone()))?;

        // Step 3: Categories, deduplicated, metadata always last.
        let requested = descriptor.categories.unwrap_or_else(|| {
            DEFAULT_TRACE_CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect()
        });
        let mut trace_categories: Vec<String> = Vec::with_capacity(requested.len() + 1);
        for category in requested {
            if category != METADATA_CATEGORY && !trace_categories.contains(&category) {
                trace_categories.push(category);
            }
        }
        trace_categories.push(METADATA_CATEGORY.to_string());

        Ok(Self {
            result_path: id.result_dir(results_root),
            id,
            url,
            run_count,
            flags: JobFlags {
                clear_profile: descriptor.clear,
                capture_video: descriptor.video,
                capture_cpu: descriptor.cpu,
            },
            trace_categories,
            package_reference: package_path(package_dir, cl.as_str()),
            latency_ms: descriptor.latency.filter(|l| *l > 0),
        })
    }
}

pub fn package_path(package_dir: &Path, name: &str) -> PathBuf {
    package_dir.join(format!("{name}.apk"))
}

/// Work obtained from one reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeasedWork {
    Test(TestJob),
    /// The synthetic `latest` job: refresh the installed browser only.
    RefreshLatest { package_reference: PathBuf },
}
