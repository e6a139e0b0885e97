// Use case: capture_session.

use crate::application::context::AppContext;
use crate::domain::entities::run_artifact::{ArtifactNames, RunArtifact, RunStep, StepFailure};
use crate::domain::entities::test_job::TestJob;
use crate::domain::workflows::trace_config::render_trace_config;
use crate::infrastructure::device::BackgroundProcess;
use crate::infrastructure::storage::compress::gzip_and_remove;
use metrics::counter;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const TRACE_CONFIG_FILE: &str = "perfetto.pbtx";

/// One screen recording plus one trace capture around a single navigation.
pub struct CaptureSession {
    names: ArtifactNames,
    keep_video: bool,
    video: Option<Box<dyn BackgroundProcess>>,
    trace: Option<Box<dyn BackgroundProcess>>,
}

impl CaptureSession {
    pub fn new(run_index: u32, keep_video: bool) -> Self {
        Self {
            names: ArtifactNames::for_run(run_index),
            keep_video,
            video: None,
            trace: None,
        }
    }

    /// Start the screen recording. It always runs since its growth is the
    /// completion signal; whether it is kept is decided at collection.
    pub async fn start_video(&mut self, ctx: &AppContext) -> Result<(), StepFailure> {
        let capture = ctx.device.capture();
        let fail = |e: crate::infrastructure::device::DeviceError| {
            StepFailure::new(RunStep::StartVideo, e.to_string())
        };

        ctx.device.remove(&capture.remote_video).await.map_err(fail)?;
        let bit_rate = capture.video_bit_rate.to_string();
        let process = ctx
            .device
            .start_background(&[
                "screenrecord",
                "--verbose",
                "--bit-rate",
                bit_rate.as_str(),
                capture.remote_video.as_str(),
            ])
            .await
            .map_err(fail)?;
        self.video = Some(process);
        Ok(())
    }

    /// Push a trace config limited to the job's categories and start perfetto.
    pub async fn start_trace(&mut self, ctx: &AppContext, job: &TestJob) -> Result<(), StepFailure> {
        let capture = ctx.device.capture();
        let fail = |reason: String| StepFailure::new(RunStep::StartTrace, reason);

        ctx.device
            .remove(&capture.remote_trace)
            .await
            .map_err(|e| fail(e.to_string()))?;

        let template = ctx.trace_templates.for_job(job.flags.capture_cpu);
        let config = render_trace_config(template, &job.trace_categories)
            .map_err(|e| fail(e.to_string()))?;
        let local = ctx.workspace.path(TRACE_CONFIG_FILE);
        tokio::fs::write(&local, config)
            .await
            .map_err(|e| fail(e.to_string()))?;
        let pushed = ctx.device.push(&local, &capture.remote_trace_config).await;
        if let Err(e) = tokio::fs::remove_file(&local).await {
            debug!(error = %e, "trace_config_cleanup_failed");
        }
        pushed.map_err(|e| fail(e.to_string()))?;

        let process = ctx
            .device
            .start_background(&[
                "perfetto",
                "-c",
                capture.remote_trace_config.as_str(),
                "--txt",
                "-o",
                capture.remote_trace.as_str(),
            ])
            .await
            .map_err(|e| fail(e.to_string()))?;
        self.trace = Some(process);
        Ok(())
    }

    /// Stop both captures and pull their output into the workspace. Every
    /// step is attempted so nothing is left running on the device.
    pub async fn collect(&mut self, ctx: &AppContext, artifact: &mut RunArtifact) {
        let capture = ctx.device.capture().clone();
        let stop_timeout = Duration::from_secs(capture.stop_timeout_seconds);
        let traced = self.trace.is_some();

        // Stop trace capture.
        if let Some(mut trace) = self.trace.take() {
            let stopped = match ctx.device.kill_process("perfetto", "-SIGTERM").await {
                Ok(()) => trace.wait(stop_timeout).await,
                Err(e) => {
                    if let Err(wait) = trace.wait(stop_timeout).await {
                        warn!(process = "perfetto", error = %wait, "capture_wait_failed");
                    }
                    Err(e)
                }
            };
            if let Err(e) = stopped {
                record(artifact, StepFailure::new(RunStep::StopTrace, e.to_string()));
            }
        }

        // Stop the recording and keep it if asked to.
        if let Some(mut video) = self.video.take() {
            let stopped = match ctx.device.kill_process("screenrecord", "-SIGINT").await {
                Ok(()) => video.wait(stop_timeout).await,
                Err(e) => {
                    if let Err(wait) = video.wait(stop_timeout).await {
                        warn!(process = "screenrecord", error = %wait, "capture_wait_failed");
                    }
                    Err(e)
                }
            };
            match stopped {
                Err(e) => record(artifact, StepFailure::new(RunStep::StopVideo, e.to_string())),
                Ok(()) if self.keep_video => {
                    let local = ctx.workspace.path(&self.names.video);
                    match ctx.device.pull(&capture.remote_video, &local).await {
                        Ok(()) => artifact.video = Some(local),
                        Err(e) => {
                            record(artifact, StepFailure::new(RunStep::StopVideo, e.to_string()))
                        }
                    }
                }
                Ok(()) => {}
            }
            if let Err(e) = ctx.device.remove(&capture.remote_video).await {
                debug!(error = %e, "video_cleanup_failed");
            }
        }

        // Pull the trace.
        if !traced {
            return;
        }
        let local = ctx.workspace.path(&self.names.trace);
        match ctx.device.pull(&capture.remote_trace, &local).await {
            Ok(()) => artifact.trace = Some(local),
            Err(e) => record(artifact, StepFailure::new(RunStep::PullTrace, e.to_string())),
        }
    }

    /// Kill whatever is still running after an aborted run.
    pub async fn abort(&mut self, ctx: &AppContext) {
        let stop_timeout = Duration::from_secs(ctx.device.capture().stop_timeout_seconds);
        for (name, process) in [("perfetto", self.trace.take()), ("screenrecord", self.video.take())] {
            if let Some(mut process) = process {
                if let Err(e) = ctx.device.kill_process(name, "-SIGINT").await {
                    warn!(process = name, error = %e, "capture_kill_failed");
                }
                if let Err(e) = process.wait(stop_timeout).await {
                    warn!(process = name, error = %e, "capture_wait_failed");
                }
            }
        }
    }

    /// Convert the pulled trace to JSON, then gzip both. Uncompressed files
    /// never outlive this call.
    pub async fn finalize_trace(&self, ctx: &AppContext, artifact: &mut RunArtifact) {
        let Some(trace) = artifact.trace.take() else {
            return;
        };

        let json = ctx.workspace.path(&self.names.trace_json);
        match ctx.converter.convert(&trace, &json).await {
            Ok(()) => match gzip_and_remove(&json).await {
                Ok(gz) => artifact.trace_json = Some(gz),
                Err(e) => record(artifact, StepFailure::new(RunStep::CompressTrace, e.to_string())),
            },
            Err(e) => {
                record(artifact, StepFailure::new(RunStep::ConvertTrace, e.to_string()));
                discard(&json).await;
            }
        }

        match gzip_and_remove(&trace).await {
            Ok(gz) => artifact.trace = Some(gz),
            Err(e) => {
                record(artifact, StepFailure::new(RunStep::CompressTrace, e.to_string()));
                discard(&trace).await;
            }
        }
    }
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(file = %path.display(), error = %e, "workspace_cleanup_failed"),
    }
}

/// Log a failed step and keep it with the run.
pub fn record(artifact: &mut RunArtifact, failure: StepFailure) {
    warn!(
        run = artifact.run_index,
        step = failure.step.as_str(),
        reason = %failure.reason,
        "run_step_failed"
    );
    counter!("run_step_failures_total").increment(1);
    artifact.failures.push(failure);
}
