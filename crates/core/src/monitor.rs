//! Event channel: background read loop on the event interface.

use crate::config::Config;
use crate::directory::{DeviceDescriptor, HidapiOpener, InterfaceOpener};
use crate::error::{Error, Result};
use crate::event::HeadsetEvent;
use crate::protocol::EVENT_REPORT_LEN;
use crate::task::{BackgroundTask, StopSignal};
use crate::transport::{HidTransport, ReadMode};
use crate::EVENT_USAGE;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receives decoded events on the read thread.
///
/// Runs on the only thread servicing reads; a slow handler delays later
/// events.
pub type EventCallback = Box<dyn FnMut(&HeadsetEvent) + Send + 'static>;

/// Reads unsolicited notifications from the event interface.
pub struct EventChannel {
    config: Config,
    transport: Option<Arc<dyn HidTransport>>,
    descriptor: Option<DeviceDescriptor>,
    monitor: Option<BackgroundTask>,
}

impl EventChannel {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            transport: None,
            descriptor: None,
            monitor: None,
        }
    }

    /// Locate and open the event interface in non-blocking mode.
    ///
    /// An existing connection is torn down first.
    pub fn connect(&mut self, vendor_id: u16, product_id: u16) -> Result<()> {
        self.connect_with(&HidapiOpener, vendor_id, product_id)
    }

    /// Like [`connect`](Self::connect), opening the interface through `opener`.
    pub fn connect_with(
        &mut self,
        opener: &dyn InterfaceOpener,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<()> {
        self.disconnect();
        let opened = opener.open(
            vendor_id,
            product_id,
            EVENT_USAGE,
            "event",
            ReadMode::NonBlocking,
        )?;
        self.attach(opened.transport);
        self.descriptor = Some(opened.descriptor);
        Ok(())
    }

    /// Use an already-open transport as the event interface.
    pub fn attach(&mut self, transport: Arc<dyn HidTransport>) {
        self.disconnect();
        self.transport = Some(transport);
        info!("Event channel connected");
    }

    /// Stop monitoring and release the handle. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.stop_monitoring();
        if self.transport.take().is_some() {
            self.descriptor = None;
            info!("Event channel disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Interface this channel was connected through, if discovered.
    pub fn descriptor(&self) -> Option<&DeviceDescriptor> {
        self.descriptor.as_ref()
    }

    /// Whether the read loop is running.
    ///
    /// Becomes `false` on its own if a read fails; call
    /// [`start_monitoring`](Self::start_monitoring) again to resume.
    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().is_some_and(BackgroundTask::is_running)
    }

    /// Spawn the read loop, delivering each report to `callback`.
    pub fn start_monitoring<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnMut(&HeadsetEvent) + Send + 'static,
    {
        let transport = Arc::clone(
            self.transport
                .as_ref()
                .ok_or(Error::NotConnected("events"))?,
        );
        if self.is_monitoring() {
            return Err(Error::AlreadyMonitoring);
        }
        // Reap a loop that ended after a read failure.
        self.monitor.take();

        let timeout = self.config.read_timeout();
        let callback: EventCallback = Box::new(callback);
        let task = BackgroundTask::spawn("hs80-event-reader", move |stop| {
            run_read_loop(transport.as_ref(), callback, &stop, timeout);
        })?;
        info!("Event monitoring started");
        self.monitor = Some(task);
        Ok(())
    }

    /// Signal the read loop and wait (bounded) for it to exit.
    ///
    /// Returns immediately if not monitoring.
    pub fn stop_monitoring(&mut self) {
        if let Some(task) = self.monitor.take() {
            if task.stop(self.config.monitor_stop_timeout()) {
                info!("Event monitoring stopped");
            }
        }
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Read reports until stopped or a read fails.
///
/// Each read waits at most `timeout`; an empty read is the loop's chance to
/// notice a stop request, not an error.
fn run_read_loop(
    transport: &dyn HidTransport,
    mut callback: EventCallback,
    stop: &StopSignal,
    timeout: Duration,
) {
    debug!("Event read loop started");
    let mut buf = [0u8; EVENT_REPORT_LEN];

    while !stop.is_requested() {
        match transport.read_report(&mut buf, timeout) {
            Ok(0) => continue,
            Ok(n) => {
                let event = HeadsetEvent::from_bytes(&buf[..n]);
                debug!(len = n, kind = ?event.kind(), "Event RX");
                callback(&event);
            }
            Err(e) => {
                warn!("Event read failed, monitoring stopped: {e}");
                break;
            }
        }
    }

    debug!("Event read loop exited");
}
