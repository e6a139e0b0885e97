use crate::domain::workflows::completion::CompletionReport;
use std::path::PathBuf;

/// Steps of one measured run that can fail without failing the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStep {
    Prepare,
    StartVideo,
    StartTrace,
    Navigate,
    StopTrace,
    StopVideo,
    PullTrace,
    Screenshot,
    ReturnToBlank,
    CompressTrace,
    ConvertTrace,
}

impl RunStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStep::Prepare => "prepare",
            RunStep::StartVideo => "start_video",
            RunStep::StartTrace => "start_trace",
            RunStep::Navigate => "navigate",
            RunStep::StopTrace => "stop_trace",
            RunStep::StopVideo => "stop_video",
            RunStep::PullTrace => "pull_trace",
            RunStep::Screenshot => "screenshot",
            RunStep::ReturnToBlank => "return_to_blank",
            RunStep::CompressTrace => "compress_trace",
            RunStep::ConvertTrace => "convert_trace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: RunStep,
    pub reason: String,
}

impl StepFailure {
    pub fn new(step: RunStep, reason: impl Into<String>) -> Self {
        Self {
            step,
            reason: reason.into(),
        }
    }
}

/// Local file names for one run, zero-padded so they sort by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub video: String,
    pub trace: String,
    pub trace_json: String,
    pub screenshot: String,
}

impl ArtifactNames {
    pub fn for_run(run_index: u32) -> Self {
        Self {
            video: format!("{run_index:03}-video.mp4"),
            trace: format!("{run_index:03}-trace.perfetto"),
            trace_json: format!("{run_index:03}-trace.json"),
            screenshot: format!("{run_index:03}-screenshot.png"),
        }
    }
}

/// What one repetition produced. Every run gets one, even a failed one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArtifact {
    pub run_index: u32,
    pub video: Option<PathBuf>,
    pub trace: Option<PathBuf>,
    pub trace_json: Option<PathBuf>,
    pub screenshot: Option<PathBuf>,
    /// How the page load was judged finished, once detection ran.
    pub completion: Option<CompletionReport>,
    pub failures: Vec<StepFailure>,
}

impl RunArtifact {
    pub fn new(run_index: u32) -> Self {
        Self {
            run_index,
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_run_index_when_naming_should_zero_pad_to_three_digits() {
        let names = ArtifactNames::for_run(7);
        assert_eq!(names.video, "007-video.mp4");
        assert_eq!(names.trace, "007-trace.perfetto");
        assert_eq!(names.trace_json, "007-trace.json");
        assert_eq!(names.screenshot, "007-screenshot.png");
    }
}
