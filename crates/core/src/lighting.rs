//! Lighting channel: software-mode RGB control over the lighting interface.
//!
//! The headset falls back to firmware effects unless software mode is
//! refreshed, so an optional keep-alive task re-sends the last committed zone
//! colors on an interval. Brightness is not refreshed; it persists on the
//! device across the refresh.

use crate::color::{Color, Zone, ZoneSet};
use crate::config::Config;
use crate::directory::{DeviceDescriptor, HidapiOpener, InterfaceOpener};
use crate::error::{Error, Result};
use crate::protocol::{self, Brightness, DeviceMode, PACKET_LEN};
use crate::task::BackgroundTask;
use crate::transport::{HidTransport, ReadMode};
use crate::LIGHTING_USAGE;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Last state successfully written to the device.
#[derive(Debug, Clone, Copy)]
struct LightingState {
    zones: ZoneSet,
    brightness: Brightness,
}

/// An open lighting interface, shared with the keep-alive task.
struct LightingLink {
    transport: Arc<dyn HidTransport>,
    mode: DeviceMode,
    initialized: Mutex<bool>,
    state: Arc<Mutex<LightingState>>,
    settle: Duration,
}

impl LightingLink {
    fn send(&self, packet: &[u8; PACKET_LEN], what: &'static str) -> Result<()> {
        debug!(
            command = what,
            mode = self.mode.label(),
            report_hex = format_args!("{:02X?}", &packet[..17]),
            "Lighting TX"
        );
        self.transport.write_report(packet)
    }

    fn is_initialized(&self) -> bool {
        *self.initialized.lock()
    }

    /// Enter software mode, open the lighting endpoint, set full brightness.
    ///
    /// Runs under the init lock so concurrent callers do not interleave the
    /// sequence. The cached brightness follows the device on success.
    fn initialize(&self) -> Result<()> {
        let mut initialized = self.initialized.lock();
        self.initialize_locked(&mut initialized)
    }

    fn ensure_initialized(&self) -> Result<()> {
        let mut initialized = self.initialized.lock();
        if *initialized {
            return Ok(());
        }
        self.initialize_locked(&mut initialized)
    }

    fn initialize_locked(&self, initialized: &mut bool) -> Result<()> {
        self.run_init_sequence()?;
        *initialized = true;
        self.state.lock().brightness = Brightness::default();
        info!(mode = self.mode.label(), "Software lighting mode enabled");
        Ok(())
    }

    fn run_init_sequence(&self) -> Result<()> {
        let steps: [(&'static str, [u8; PACKET_LEN]); 3] = [
            ("software mode", protocol::software_mode(self.mode)),
            ("open lighting endpoint", protocol::open_lighting_endpoint(self.mode)),
            (
                "default brightness",
                protocol::brightness(self.mode, Brightness::default()),
            ),
        ];
        for (step, packet) in steps {
            self.send(&packet, step)
                .map_err(|e| Error::InitializationFailed {
                    step,
                    source: Box::new(e),
                })?;
            std::thread::sleep(self.settle);
        }
        Ok(())
    }

    fn send_zones(&self, zones: &ZoneSet) -> Result<()> {
        self.ensure_initialized()?;
        self.send(&protocol::zone_colors(self.mode, zones), "zone colors")
    }

    fn send_brightness(&self, level: Brightness) -> Result<()> {
        self.ensure_initialized()?;
        self.send(&protocol::brightness(self.mode, level), "brightness")
    }

    /// Return control to firmware effects. The channel is un-initialized
    /// afterwards even if the write failed.
    fn restore_hardware_mode(&self) -> Result<()> {
        let mut initialized = self.initialized.lock();
        let result = self.send(&protocol::hardware_mode(self.mode), "hardware mode");
        *initialized = false;
        std::thread::sleep(self.settle);
        result
    }
}

/// Controls the headset LEDs through the lighting interface.
pub struct LightingChannel {
    config: Config,
    state: Arc<Mutex<LightingState>>,
    link: Option<Arc<LightingLink>>,
    descriptor: Option<DeviceDescriptor>,
    keep_alive: Option<BackgroundTask>,
}

impl LightingChannel {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(LightingState {
                zones: ZoneSet::default(),
                brightness: Brightness::default(),
            })),
            link: None,
            descriptor: None,
            keep_alive: None,
        }
    }

    /// Locate and open the lighting interface of the given device.
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
            LIGHTING_USAGE,
            "lighting",
            ReadMode::Blocking,
        )?;
        let mode = DeviceMode::for_product(opened.descriptor.product_id);
        self.attach(opened.transport, mode);
        self.descriptor = Some(opened.descriptor);
        Ok(())
    }

    /// Use an already-open transport as the lighting interface.
    pub fn attach(&mut self, transport: Arc<dyn HidTransport>, mode: DeviceMode) {
        self.disconnect();
        self.link = Some(Arc::new(LightingLink {
            transport,
            mode,
            initialized: Mutex::new(false),
            state: Arc::clone(&self.state),
            settle: self.config.settle_delay(),
        }));
        info!(mode = mode.label(), "Lighting channel connected");
    }

    /// Stop keep-alive, restore hardware mode if needed, release the handle.
    ///
    /// Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.stop_keep_alive();
        let Some(link) = self.link.take() else {
            return;
        };
        if link.is_initialized() {
            info!("Restoring hardware lighting mode");
            if let Err(e) = link.restore_hardware_mode() {
                warn!("Failed to restore hardware mode on disconnect: {e}");
            }
        }
        self.descriptor = None;
        info!("Lighting channel disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn is_initialized(&self) -> bool {
        self.link.as_ref().is_some_and(|l| l.is_initialized())
    }

    /// Interface this channel was connected through, if discovered.
    pub fn descriptor(&self) -> Option<&DeviceDescriptor> {
        self.descriptor.as_ref()
    }

    /// Framing in use, if connected.
    pub fn mode(&self) -> Option<DeviceMode> {
        self.link.as_ref().map(|l| l.mode)
    }

    fn link(&self) -> Result<&Arc<LightingLink>> {
        self.link.as_ref().ok_or(Error::NotConnected("lighting"))
    }

    /// Run the software-mode initialization sequence.
    pub fn initialize(&self) -> Result<()> {
        info!("Initializing software lighting mode");
        self.link()?.initialize()
    }

    /// Write all three zones. The cache is updated only if the write succeeds.
    pub fn set_zone_colors(&self, zones: ZoneSet) -> Result<()> {
        self.link()?.send_zones(&zones)?;
        self.state.lock().zones = zones;
        Ok(())
    }

    /// Same color on every zone.
    pub fn set_color(&self, color: Color) -> Result<()> {
        self.set_zone_colors(ZoneSet::uniform(color))
    }

    /// Change one zone. The full set is re-sent; the device has no partial write.
    pub fn set_zone(&self, zone: Zone, color: Color) -> Result<()> {
        let zones = self.state.lock().zones.with_zone(zone, color);
        self.set_zone_colors(zones)
    }

    pub fn set_logo_color(&self, color: Color) -> Result<()> {
        self.set_zone(Zone::Logo, color)
    }

    pub fn set_power_color(&self, color: Color) -> Result<()> {
        self.set_zone(Zone::Power, color)
    }

    pub fn set_mic_color(&self, color: Color) -> Result<()> {
        self.set_zone(Zone::Mic, color)
    }

    pub fn off(&self) -> Result<()> {
        self.set_color(Color::BLACK)
    }

    /// Brightness in percent; values outside 0..=100 are clamped.
    pub fn set_brightness(&self, percent: i32) -> Result<()> {
        self.set_brightness_level(Brightness::from_percent(percent))
    }

    /// Brightness on the raw 0..=1000 scale; out-of-range values are clamped.
    pub fn set_brightness_raw(&self, raw: i32) -> Result<()> {
        self.set_brightness_level(Brightness::from_raw(raw))
    }

    fn set_brightness_level(&self, level: Brightness) -> Result<()> {
        self.link()?.send_brightness(level)?;
        self.state.lock().brightness = level;
        Ok(())
    }

    /// Last committed brightness in percent.
    pub fn brightness(&self) -> u8 {
        self.state.lock().brightness.percent()
    }

    /// Last committed brightness on the raw scale.
    pub fn brightness_raw(&self) -> u16 {
        self.state.lock().brightness.raw()
    }

    /// Last committed zone colors.
    pub fn zones(&self) -> ZoneSet {
        self.state.lock().zones
    }

    /// Hand the LEDs back to firmware effects.
    ///
    /// The next color or brightness write re-initializes software mode.
    pub fn restore_hardware_mode(&self) -> Result<()> {
        info!("Restoring hardware lighting mode");
        self.link()?.restore_hardware_mode()
    }

    /// Sweep the hue wheel once over `duration`, one write per `step`.
    pub fn rainbow(&self, duration: Duration, step: Duration) -> Result<()> {
        self.rainbow_while(duration, step, || true)
    }

    /// Like [`rainbow`](Self::rainbow), ending early once `keep_running`
    /// returns false. It is checked before every step.
    pub fn rainbow_while(
        &self,
        duration: Duration,
        step: Duration,
        keep_running: impl Fn() -> bool,
    ) -> Result<()> {
        self.link()?;
        let step_ms = step.as_millis();
        if step_ms == 0 {
            return Err(Error::OutOfRange {
                field: "step_ms",
                value: 0,
                min: 1,
                max: u32::MAX,
            });
        }
        let steps = (duration.as_millis() / step_ms) as u64;
        info!(steps, step_ms = step_ms as u64, "Starting rainbow effect");

        for i in 0..steps {
            if !keep_running() {
                info!(completed = i, "Rainbow effect interrupted");
                break;
            }
            let hue = (i as f32 * 360.0) / steps as f32;
            self.set_color(Color::from_hue(hue))?;
            std::thread::sleep(step);
        }
        Ok(())
    }

    /// Fade `color` in and out `cycles` times, one write per `step`.
    ///
    /// The fade is produced by writing scaled colors, so zone-specific colors
    /// are replaced by the uniform pulse color.
    pub fn pulse(&self, color: Color, cycles: u32, step: Duration) -> Result<()> {
        self.pulse_while(color, cycles, step, || true)
    }

    /// Like [`pulse`](Self::pulse), ending early once `keep_running`
    /// returns false. It is checked before every step.
    pub fn pulse_while(
        &self,
        color: Color,
        cycles: u32,
        step: Duration,
        keep_running: impl Fn() -> bool,
    ) -> Result<()> {
        self.link()?;
        info!(%color, cycles, "Starting pulse effect");

        let rising = (0..=255u16).step_by(15);
        let falling = (0..=255u16).rev().step_by(15);
        for _ in 0..cycles {
            for level in rising.clone().chain(falling.clone()) {
                if !keep_running() {
                    info!("Pulse effect interrupted");
                    return Ok(());
                }
                self.set_color(color.scaled(f32::from(level) / 255.0))?;
                std::thread::sleep(step);
            }
        }
        Ok(())
    }

    /// Start re-sending the committed zone colors every `interval`.
    ///
    /// Does nothing if a keep-alive task is already running. Initializes
    /// software mode first if needed.
    pub fn start_keep_alive(&mut self, interval: Duration) -> Result<()> {
        if self.is_keep_alive_running() {
            debug!("Keep-alive already running");
            return Ok(());
        }
        // A task that exited on its own is reaped before starting a new one.
        self.keep_alive.take();

        let link = Arc::clone(self.link()?);
        link.ensure_initialized()?;

        let state = Arc::clone(&self.state);
        let task = BackgroundTask::spawn("hs80-keep-alive", move |stop| {
            while !stop.wait(interval) {
                let zones = state.lock().zones;
                if let Err(e) = link.send_zones(&zones) {
                    warn!("Keep-alive refresh failed: {e}");
                }
            }
        })?;
        info!(
            interval_ms = interval.as_millis() as u64,
            "Keep-alive started"
        );
        self.keep_alive = Some(task);
        Ok(())
    }

    /// Start keep-alive with the configured interval.
    pub fn start_keep_alive_default(&mut self) -> Result<()> {
        self.start_keep_alive(self.config.keep_alive_interval())
    }

    /// Stop the keep-alive task and wait (bounded) for it to exit.
    ///
    /// Returns immediately if none is running.
    pub fn stop_keep_alive(&mut self) {
        if let Some(task) = self.keep_alive.take() {
            if task.stop(self.config.keep_alive_stop_timeout()) {
                info!("Keep-alive stopped");
            }
        }
    }

    pub fn is_keep_alive_running(&self) -> bool {
        self.keep_alive.as_ref().is_some_and(BackgroundTask::is_running)
    }
}

impl Default for LightingChannel {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Drop for LightingChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{cmd, sub, ZONE_DATA_OFFSET};
    use crate::transport::mock::MockTransport;

    fn test_config() -> Config {
        Config {
            settle_delay_ms: 0,
            keep_alive_stop_timeout_ms: 2000,
            ..Config::default()
        }
    }

    fn connected() -> (LightingChannel, Arc<MockTransport>) {
        let mock = Arc::new(MockTransport::new());
        let mut channel = LightingChannel::new(test_config());
        channel.attach(mock.clone(), DeviceMode::Wireless);
        (channel, mock)
    }

    fn is_zone_packet(p: &[u8]) -> bool {
        p[2] == cmd::ZONE_COLORS
    }

    #[test]
    fn first_color_write_runs_initialization() {
        let (channel, mock) = connected();
        channel.set_color(Color::new(10, 20, 30)).unwrap();

        let written = mock.written();
        assert_eq!(written.len(), 4);
        assert_eq!(&written[0][..6], &[0x02, 0x09, 0x01, 0x03, 0x00, 0x02]);
        assert_eq!(&written[1][..5], &[0x02, 0x09, 0x0D, 0x00, 0x01]);
        assert_eq!(&written[2][..7], &[0x02, 0x09, 0x01, 0x02, 0x00, 0xE8, 0x03]);
        assert!(is_zone_packet(&written[3]));
        assert_eq!(
            &written[3][ZONE_DATA_OFFSET..ZONE_DATA_OFFSET + 9],
            &[10, 10, 10, 20, 20, 20, 30, 30, 30]
        );
        assert!(channel.is_initialized());
    }

    #[test]
    fn initialization_failure_reports_step_and_stays_uninitialized() {
        let (channel, mock) = connected();
        mock.fail_write_at(1);

        let err = channel.initialize().unwrap_err();
        match err {
            Error::InitializationFailed { step, .. } => assert_eq!(step, "open lighting endpoint"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!channel.is_initialized());

        // The next write retries initialization lazily.
        channel.set_color(Color::WHITE).unwrap();
        assert!(channel.is_initialized());
    }

    #[test]
    fn failed_write_keeps_cached_state() {
        let (channel, mock) = connected();
        let red = Color::new(255, 0, 0);
        channel.set_color(red).unwrap();
        channel.set_brightness(40).unwrap();

        mock.set_fail_writes(true);
        assert!(channel.set_color(Color::WHITE).is_err());
        assert!(channel.set_brightness(90).is_err());

        assert_eq!(channel.zones(), ZoneSet::uniform(red));
        assert_eq!(channel.brightness(), 40);
    }

    #[test]
    fn set_zone_resends_full_set() {
        let (channel, mock) = connected();
        channel.set_color(Color::BLACK).unwrap();
        mock.clear_written();

        channel.set_zone(Zone::Power, Color::new(0, 255, 0)).unwrap();
        let written = mock.written();
        assert_eq!(written.len(), 1);
        assert_eq!(
            &written[0][ZONE_DATA_OFFSET..ZONE_DATA_OFFSET + 9],
            &[0, 0, 0, 0, 255, 0, 0, 0, 0]
        );
        assert_eq!(channel.zones().power, Color::new(0, 255, 0));
        assert_eq!(channel.zones().logo, Color::BLACK);
    }

    #[test]
    fn brightness_is_clamped_and_cached() {
        let (channel, mock) = connected();
        channel.set_brightness(150).unwrap();
        assert_eq!(channel.brightness_raw(), 1000);

        channel.set_brightness(-5).unwrap();
        assert_eq!(channel.brightness_raw(), 0);
        let last = mock.written().pop().unwrap();
        assert_eq!(&last[2..7], &[cmd::MODE, sub::BRIGHTNESS, 0x00, 0x00, 0x00]);

        channel.set_brightness_raw(420).unwrap();
        assert_eq!(channel.brightness(), 42);
    }

    #[test]
    fn operations_fail_when_not_connected() {
        let channel = LightingChannel::new(test_config());
        assert!(matches!(
            channel.set_color(Color::WHITE),
            Err(Error::NotConnected(_))
        ));
        assert!(channel.set_brightness(50).is_err());
        assert!(channel.restore_hardware_mode().is_err());
        assert!(channel
            .rainbow(Duration::from_millis(10), Duration::from_millis(1))
            .is_err());
    }

    #[test]
    fn disconnect_restores_hardware_mode_once() {
        let (mut channel, mock) = connected();
        channel.set_color(Color::WHITE).unwrap();

        channel.disconnect();
        channel.disconnect();

        let written = mock.written();
        let restores = written
            .iter()
            .filter(|p| p[2] == cmd::MODE && p[3] == sub::LIGHTING_MODE && p[5] == 0x01)
            .count();
        assert_eq!(restores, 1);
        assert!(!channel.is_connected());
    }

    #[test]
    fn disconnect_without_initialization_sends_nothing() {
        let (mut channel, mock) = connected();
        channel.disconnect();
        assert_eq!(mock.write_count(), 0);
    }

    #[test]
    fn restore_hardware_mode_forces_reinitialization() {
        let (channel, mock) = connected();
        channel.set_color(Color::WHITE).unwrap();
        channel.restore_hardware_mode().unwrap();
        assert!(!channel.is_initialized());

        mock.clear_written();
        channel.set_color(Color::WHITE).unwrap();
        assert_eq!(mock.write_count(), 4);
    }

    #[test]
    fn stop_keep_alive_without_task_is_noop() {
        let (mut channel, _mock) = connected();
        channel.stop_keep_alive();
        channel.stop_keep_alive();
        assert!(!channel.is_keep_alive_running());
    }

    #[test]
    fn keep_alive_resends_committed_zones() {
        let (mut channel, mock) = connected();
        let blue = Color::new(0, 0, 255);
        channel.set_color(blue).unwrap();
        mock.clear_written();

        channel.start_keep_alive(Duration::from_millis(10)).unwrap();
        assert!(channel.is_keep_alive_running());
        std::thread::sleep(Duration::from_millis(80));
        channel.stop_keep_alive();
        assert!(!channel.is_keep_alive_running());

        let written = mock.written();
        assert!(written.len() >= 2, "expected refreshes, got {}", written.len());
        for p in &written {
            assert!(is_zone_packet(p));
            assert_eq!(&p[ZONE_DATA_OFFSET..ZONE_DATA_OFFSET + 9], &[0, 0, 0, 0, 0, 0, 255, 255, 255]);
        }
    }

    #[test]
    fn keep_alive_start_twice_is_noop() {
        let (mut channel, _mock) = connected();
        channel.start_keep_alive(Duration::from_secs(60)).unwrap();
        channel.start_keep_alive(Duration::from_secs(60)).unwrap();
        assert!(channel.is_keep_alive_running());
        channel.disconnect();
        assert!(!channel.is_keep_alive_running());
    }

    #[test]
    fn keep_alive_stop_is_prompt_with_long_interval() {
        let (mut channel, _mock) = connected();
        channel.start_keep_alive(Duration::from_secs(60)).unwrap();
        let start = std::time::Instant::now();
        channel.stop_keep_alive();
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn rainbow_writes_one_color_per_step() {
        let (channel, mock) = connected();
        channel.initialize().unwrap();
        mock.clear_written();

        channel
            .rainbow(Duration::from_millis(6), Duration::from_millis(1))
            .unwrap();
        let written = mock.written();
        assert_eq!(written.len(), 6);
        // First step is pure red.
        assert_eq!(
            &written[0][ZONE_DATA_OFFSET..ZONE_DATA_OFFSET + 9],
            &[255, 255, 255, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn rainbow_rejects_zero_step() {
        let (channel, _mock) = connected();
        assert!(matches!(
            channel.rainbow(Duration::from_millis(10), Duration::ZERO),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn pulse_fades_in_and_out() {
        let (channel, mock) = connected();
        channel.initialize().unwrap();
        mock.clear_written();

        let red = Color::new(255, 0, 0);
        channel.pulse(red, 1, Duration::ZERO).unwrap();
        let written = mock.written();
        // 18 steps up (0..=255 by 15) and 18 steps down.
        assert_eq!(written.len(), 36);
        assert_eq!(written[0][ZONE_DATA_OFFSET], 0);
        assert_eq!(written[17][ZONE_DATA_OFFSET], 255);
        assert_eq!(written[18][ZONE_DATA_OFFSET], 255);
        assert_eq!(written[35][ZONE_DATA_OFFSET], 0);
        assert_eq!(channel.zones(), ZoneSet::uniform(Color::BLACK));
    }

    #[test]
    fn effects_end_early_when_interrupted() {
        let (channel, mock) = connected();
        channel.initialize().unwrap();
        mock.clear_written();

        let budget = std::cell::Cell::new(3u32);
        let keep_running = || {
            let left = budget.get();
            budget.set(left.saturating_sub(1));
            left > 0
        };
        channel
            .rainbow_while(Duration::from_millis(50), Duration::from_millis(1), keep_running)
            .unwrap();
        assert_eq!(mock.write_count(), 3);

        mock.clear_written();
        channel
            .pulse_while(Color::WHITE, 5, Duration::ZERO, || false)
            .unwrap();
        assert_eq!(mock.write_count(), 0);
    }

    #[test]
    fn wired_mode_uses_wired_framing() {
        let mock = Arc::new(MockTransport::new());
        let mut channel = LightingChannel::new(test_config());
        channel.attach(mock.clone(), DeviceMode::Wired);
        channel.set_color(Color::WHITE).unwrap();
        assert!(mock.written().iter().all(|p| p[1] == 0x08));
    }
}
