use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use crate::application::shared::device_driver::DeviceDriver;
use crate::config::Settings;
use crate::domain::entities::durable_status::DurableStatus;
use crate::domain::value_objects::ids::QueueJobId;
use crate::domain::workflows::trace_config::TraceTemplates;
use crate::infrastructure::converter::TraceConverter;
use crate::infrastructure::device::DeviceChannel;
use crate::infrastructure::logging::JobLogSink;
use crate::infrastructure::network::TrafficShaper;
use crate::infrastructure::queue::JobQueue;
use crate::infrastructure::storage::status_store::StatusStore;
use crate::infrastructure::storage::workspace::ScratchWorkspace;

/// Shared application resources used by use cases.
pub struct AppContext {
    pub settings: Settings,
    pub queue: Arc<dyn JobQueue>,
    pub device: DeviceDriver,
    pub converter: Arc<dyn TraceConverter>,
    pub shaper: Option<TrafficShaper>,
    pub workspace: ScratchWorkspace,
    pub status: Mutex<DurableStatus>,
    pub status_store: StatusStore,
    pub job_log: JobLogSink,
    /// Reservation the keep-alive cycle should renew, if any.
    pub active_lease: watch::Sender<Option<QueueJobId>>,
    pub trace_templates: TraceTemplates,
}

impl AppContext {
    /// Build a new application context around the queue, device and converter.
    pub fn new(
        settings: Settings,
        queue: Arc<dyn JobQueue>,
        channel: Arc<dyn DeviceChannel>,
        converter: Arc<dyn TraceConverter>,
        job_log: JobLogSink,
        trace_templates: TraceTemplates,
    ) -> Self {
        let device = DeviceDriver::new(
            channel,
            settings.browser.clone(),
            settings.capture.clone(),
            Duration::from_secs(settings.device.shell_timeout_seconds),
        );
        let shaper = settings
            .shaper
            .host
            .as_ref()
            .map(|host| TrafficShaper::new(host.clone(), settings.shaper.interface.clone()));
        let (active_lease, _) = watch::channel(None);

        Self {
            workspace: ScratchWorkspace::new(settings.scratch_dir()),
            status_store: StatusStore::new(settings.status_file()),
            status: Mutex::new(DurableStatus::default()),
            settings,
            queue,
            device,
            converter,
            shaper,
            job_log,
            active_lease,
            trace_templates,
        }
    }
}
