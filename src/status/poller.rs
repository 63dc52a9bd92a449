//! Fixed-interval polling of the backend's status sources
//!
//! Each source runs in its own task and publishes a [`StatusUpdate`] into the
//! runtime's event channel whenever the fetched value changes. The runtime is
//! the single merge point, so a poller never touches shared state itself.

use crate::backend::Backend;
use crate::runtime::KioskEvent;
use crate::status::auth::AuthStatus;
use crate::status::paper::PaperHandlerStatus;
use crate::types::DevicePresence;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Which backend query a poller runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusSource {
    Auth,
    PaperHandler,
    Devices,
}

impl StatusSource {
    pub fn name(self) -> &'static str {
        match self {
            StatusSource::Auth => "auth",
            StatusSource::PaperHandler => "paper_handler",
            StatusSource::Devices => "devices",
        }
    }

    async fn fetch(self, backend: &dyn Backend) -> Result<StatusUpdate> {
        Ok(match self {
            StatusSource::Auth => StatusUpdate::Auth(backend.get_auth_status().await?),
            StatusSource::PaperHandler => {
                StatusUpdate::PaperHandler(backend.get_paper_handler_status().await?)
            }
            StatusSource::Devices => StatusUpdate::Devices(backend.get_device_status().await?),
        })
    }
}

/// An immutable snapshot from one status source
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Auth(AuthStatus),
    PaperHandler(PaperHandlerStatus),
    Devices(DevicePresence),
}

struct StatusPoller {
    source: StatusSource,
    backend: Arc<dyn Backend>,
    interval: Duration,
    events: mpsc::UnboundedSender<KioskEvent>,
    stop_signal: mpsc::Receiver<()>,
}

impl StatusPoller {
    async fn run(mut self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<StatusUpdate> = None;

        tracing::debug!(
            "Status poller started: source={}, interval={:?}",
            self.source.name(),
            self.interval
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.source.fetch(self.backend.as_ref()).await {
                        Ok(update) => {
                            if last.as_ref() == Some(&update) {
                                continue;
                            }
                            last = Some(update.clone());
                            if self.events.send(KioskEvent::Status(update)).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.is_fatal() => {
                            tracing::error!("❌ {} status rejected: {}", self.source.name(), e);
                            let _ = self.events.send(KioskEvent::Fatal(e.to_string()));
                            break;
                        }
                        Err(e) => {
                            // The last published value stays in effect.
                            tracing::warn!("⚠️  {} status poll failed: {}", self.source.name(), e);
                        }
                    }
                }
                _ = self.stop_signal.recv() => break,
            }
        }

        tracing::debug!("Status poller stopped: source={}", self.source.name());
    }
}

/// Owns a running poller; dropping the handle stops it
#[derive(Debug)]
pub struct PollerHandle {
    source: StatusSource,
    stop: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn source(&self) -> StatusSource {
        self.source
    }

    /// Ask the poller to finish its current fetch and wait for it to exit
    pub async fn stop(mut self) {
        let _ = self.stop.send(()).await;
        let _ = (&mut self.task).await;
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start polling `source` every `interval`
pub fn spawn_poller(
    source: StatusSource,
    backend: Arc<dyn Backend>,
    interval: Duration,
    events: mpsc::UnboundedSender<KioskEvent>,
) -> PollerHandle {
    let (stop, stop_signal) = mpsc::channel(1);
    let poller = StatusPoller {
        source,
        backend,
        interval,
        events,
        stop_signal,
    };
    let task = tokio::spawn(poller.run());
    PollerHandle { source, stop, task }
}
