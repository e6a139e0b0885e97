use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use trace_agent::application::context::AppContext;
use trace_agent::application::usecases::orchestrator_loop::OrchestratorLoopUseCase;
use trace_agent::config;
use trace_agent::domain::workflows::trace_config::TraceTemplates;
use trace_agent::infrastructure::converter::CommandTraceConverter;
use trace_agent::infrastructure::device::adb::AdbDevice;
use trace_agent::infrastructure::logging::{self, JobLogSink};
use trace_agent::infrastructure::queue::{BeanstalkQueue, JobQueue};

#[tokio::main]
async fn main() {
    // Step 1: Load configuration and start logging.
    let settings = config::load().expect("load config");
    let job_log = JobLogSink::new();
    logging::init(&settings.logging, job_log.clone()).expect("init logging");

    // Step 2: Connect to the work queue.
    let queue = BeanstalkQueue::connect(&settings.queue.addr)
        .await
        .expect("connect queue")
        .with_put_ttr(Duration::from_secs(settings.queue.reservation_timeout_seconds));
    queue
        .watch(&settings.queue.watch_tube)
        .await
        .expect("watch tube");

    // Step 3: Device channel and trace converter.
    let device = AdbDevice::new(
        settings.device.adb_path.clone(),
        settings.device.serial.clone(),
        Duration::from_secs(settings.device.transfer_timeout_seconds),
    );
    let converter = CommandTraceConverter::new(
        settings.converter.command.clone(),
        Duration::from_secs(settings.converter.timeout_seconds),
    );

    // Step 4: Trace templates, overridable from disk.
    let mut templates = TraceTemplates::default();
    if let Some(path) = &settings.capture.trace_template {
        templates.standard = std::fs::read_to_string(path).expect("read trace template");
    }
    if let Some(path) = &settings.capture.trace_template_cpu {
        templates.cpu = std::fs::read_to_string(path).expect("read cpu trace template");
    }

    // Step 5: Assemble the shared context.
    let ctx = Arc::new(AppContext::new(
        settings,
        Arc::new(queue),
        Arc::new(device),
        Arc::new(converter),
        job_log,
        templates,
    ));

    // Step 6: Stop between jobs on ctrl-c or SIGTERM.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown_requested");
        let _ = shutdown_tx.send(true);
    });

    // Step 7: Run until stopped.
    OrchestratorLoopUseCase::run(ctx, shutdown_rx)
        .await
        .expect("orchestrator loop");
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
