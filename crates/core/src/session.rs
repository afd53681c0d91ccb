//! Device session: one connect/disconnect lifecycle over both interfaces.

use crate::color::{Color, Zone, ZoneSet};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::HeadsetEvent;
use crate::directory::{HidapiOpener, InterfaceOpener};
use crate::lighting::LightingChannel;
use crate::monitor::EventChannel;
use crate::protocol::DeviceMode;
use crate::transport::HidTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// How often [`DeviceSession::hold`] checks for an interrupt.
const HOLD_POLL: Duration = Duration::from_millis(50);

/// The headset as a whole: lighting plus event interface.
///
/// Dropping the session disconnects it, which restores hardware lighting.
pub struct DeviceSession {
    config: Config,
    lighting: LightingChannel,
    events: EventChannel,
}

impl DeviceSession {
    pub fn new(config: Config) -> Self {
        Self {
            lighting: LightingChannel::new(config.clone()),
            events: EventChannel::new(config.clone()),
            config,
        }
    }

    /// Connect both interfaces of the configured device.
    ///
    /// Both connections are attempted. If either fails, neither stays open
    /// and the error names which one(s) failed.
    pub fn connect(&mut self) -> Result<()> {
        info!(
            vid = format_args!("0x{:04X}", self.config.vendor_id),
            pid = format_args!("0x{:04X}", self.config.product_id),
            "Connecting to headset"
        );
        self.connect_with(&HidapiOpener)
    }

    /// Like [`connect`](Self::connect), opening both interfaces through
    /// `opener`.
    pub fn connect_with(&mut self, opener: &dyn InterfaceOpener) -> Result<()> {
        let (vid, pid) = (self.config.vendor_id, self.config.product_id);
        let lighting = self.lighting.connect_with(opener, vid, pid).err();
        let events = self.events.connect_with(opener, vid, pid).err();
        self.finish_connect(lighting, events)
    }

    /// Connect both channels over already-open transports.
    pub fn attach(
        &mut self,
        lighting: Arc<dyn HidTransport>,
        events: Arc<dyn HidTransport>,
        mode: DeviceMode,
    ) {
        self.lighting.attach(lighting, mode);
        self.events.attach(events);
    }

    fn finish_connect(&mut self, lighting: Option<Error>, events: Option<Error>) -> Result<()> {
        if lighting.is_none() && events.is_none() {
            info!("All headset interfaces connected");
            return Ok(());
        }
        self.disconnect();
        Err(Error::SessionConnect {
            lighting: lighting.map(Box::new),
            events: events.map(Box::new),
        })
    }

    /// Tear down both channels; a failure in one does not skip the other.
    pub fn disconnect(&mut self) {
        self.events.disconnect();
        self.lighting.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.lighting.is_connected() && self.events.is_connected()
    }

    pub fn lighting(&self) -> &LightingChannel {
        &self.lighting
    }

    pub fn lighting_mut(&mut self) -> &mut LightingChannel {
        &mut self.lighting
    }

    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventChannel {
        &mut self.events
    }

    pub fn set_color(&self, color: Color) -> Result<()> {
        self.lighting.set_color(color)
    }

    pub fn set_zone_colors(&self, zones: ZoneSet) -> Result<()> {
        self.lighting.set_zone_colors(zones)
    }

    pub fn set_zone(&self, zone: Zone, color: Color) -> Result<()> {
        self.lighting.set_zone(zone, color)
    }

    /// Brightness in percent, clamped to 0..=100.
    pub fn set_brightness(&self, percent: i32) -> Result<()> {
        self.lighting.set_brightness(percent)
    }

    pub fn start_monitoring<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnMut(&HeadsetEvent) + Send + 'static,
    {
        self.events.start_monitoring(callback)
    }

    /// Keep the current software lighting on the LEDs.
    ///
    /// Runs keep-alive and blocks until `limit` elapses or `running` is
    /// cleared. Keep-alive is stopped on return; the session stays connected.
    pub fn hold(&mut self, limit: Option<Duration>, running: &AtomicBool) -> Result<()> {
        self.lighting.start_keep_alive_default()?;
        let deadline = limit.map(|limit| Instant::now() + limit);
        info!(limit_ms = limit.map(|l| l.as_millis() as u64), "Holding software lighting");

        while running.load(Ordering::SeqCst) {
            let now = Instant::now();
            let wait = match deadline {
                Some(deadline) if now >= deadline => break,
                Some(deadline) => (deadline - now).min(HOLD_POLL),
                None => HOLD_POLL,
            };
            std::thread::sleep(wait);
        }

        self.lighting.stop_keep_alive();
        Ok(())
    }
}

impl Default for DeviceSession {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
