//! HID transport abstraction for device communication.
//!
//! Provides a trait-based transport layer so that real HID devices and
//! mock devices share the same interface. Both sub-interfaces of the headset
//! are driven through it: the lighting interface only writes, the event
//! interface only reads.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::ffi::CString;
use std::time::Duration;
use tracing::{debug, trace};

/// Abstraction over raw HID read/write.
///
/// The handle is released when the last owner drops it, so a background
/// task holding a clone keeps the handle valid until it exits.
pub trait HidTransport: Send + Sync {
    /// Write one complete output report. A short write is an error.
    fn write_report(&self, data: &[u8]) -> Result<()>;

    /// Read one input report, waiting at most `timeout`.
    ///
    /// Returns `Ok(0)` when nothing arrived before the timeout expired.
    fn read_report(&self, buf: &mut [u8], timeout: Duration) -> Result<usize>;
}

/// How the interface handle services reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Reads park the calling thread until data arrives.
    Blocking,
    /// Reads return immediately; waits are bounded by `read_report`'s timeout.
    NonBlocking,
}

/// Map a hidapi open failure onto not-found, permission-denied or generic.
///
/// OS errors are classified by kind; backends that only report text fall
/// back to message matching.
pub(crate) fn classify_open_error(path: &str, err: &hidapi::HidError) -> Error {
    let msg = err.to_string();
    if let hidapi::HidError::IoError { error } = err {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return Error::PermissionDenied(format!("{path}: {msg}"))
            }
            std::io::ErrorKind::NotFound => {
                return Error::DeviceNotFound(format!("{path}: {msg}"))
            }
            _ => {}
        }
    }
    let lower = msg.to_lowercase();
    if lower.contains("permission")
        || lower.contains("access denied")
        || lower.contains("access is denied")
        || lower.contains("eacces")
    {
        Error::PermissionDenied(format!("{path}: {msg}"))
    } else if lower.contains("not found")
        || lower.contains("no such device")
        || lower.contains("no such file")
        || lower.contains("disconnect")
    {
        Error::DeviceNotFound(format!("{path}: {msg}"))
    } else {
        Error::Hid(format!("open {path}: {msg}"))
    }
}

/// A real device handle opened through hidapi.
pub struct HidapiTransport {
    device: Mutex<hidapi::HidDevice>,
    path: String,
}

impl HidapiTransport {
    /// Open the interface at `path`.
    pub fn open(path: &str, mode: ReadMode) -> Result<Self> {
        let api = hidapi::HidApi::new().map_err(|e| Error::Hid(format!("hidapi init: {e}")))?;
        let c_path = CString::new(path)
            .map_err(|e| Error::Hid(format!("invalid device path {path:?}: {e}")))?;
        let device = api
            .open_path(&c_path)
            .map_err(|e| classify_open_error(path, &e))?;

        if mode == ReadMode::NonBlocking {
            device
                .set_blocking_mode(false)
                .map_err(|e| Error::Hid(format!("set non-blocking {path}: {e}")))?;
        }

        debug!(path, ?mode, "HID interface opened");
        Ok(Self {
            device: Mutex::new(device),
            path: path.to_string(),
        })
    }
}

impl HidTransport for HidapiTransport {
    fn write_report(&self, data: &[u8]) -> Result<()> {
        trace!(report_hex = format_args!("{:02X?}", data), "HID TX");
        let written = self
            .device
            .lock()
            .write(data)
            .map_err(|e| Error::Hid(format!("write: {e}")))?;
        if written != data.len() {
            return Err(Error::Hid(format!(
                "short write: {} of {} bytes",
                written,
                data.len()
            )));
        }
        Ok(())
    }

    fn read_report(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let n = self
            .device
            .lock()
            .read_timeout(buf, timeout_ms)
            .map_err(|e| Error::Hid(format!("read_timeout: {e}")))?;
        if n > 0 {
            trace!(report_hex = format_args!("{:02X?}", &buf[..n]), "HID RX");
        }
        Ok(n)
    }
}

impl Drop for HidapiTransport {
    fn drop(&mut self) {
        debug!(path = %self.path, "HID interface closed");
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn mock_records_writes_in_order() {
        let mock = MockTransport::new();
        mock.write_report(&[0x01]).unwrap();
        mock.write_report(&[0x02, 0x03]).unwrap();
        assert_eq!(mock.written(), vec![vec![0x01], vec![0x02, 0x03]]);
    }

    #[test]
    fn mock_fails_selected_write_only() {
        let mock = MockTransport::new();
        mock.fail_write_at(1);
        assert!(mock.write_report(&[0x01]).is_ok());
        assert!(mock.write_report(&[0x02]).is_err());
        assert!(mock.write_report(&[0x03]).is_ok());
        assert_eq!(mock.write_count(), 2);
    }

    #[test]
    fn mock_read_times_out_with_zero_length() {
        let mock = MockTransport::new();
        let mut buf = [0u8; 65];
        let n = mock
            .read_report(&mut buf, Duration::from_millis(5))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn mock_serves_queued_reports() {
        let mock = MockTransport::new();
        mock.queue_report(&[0x03, 0x01, 0x01, 0x10]);
        let mut buf = [0u8; 65];
        let n = mock
            .read_report(&mut buf, Duration::from_millis(5))
            .unwrap();
        assert_eq!(&buf[..n], &[0x03, 0x01, 0x01, 0x10]);
    }

    #[test]
    fn classify_permission_message() {
        let err = hidapi::HidError::HidApiError {
            message: "Permission denied".into(),
        };
        assert!(matches!(
            classify_open_error("/dev/hidraw1", &err),
            Error::PermissionDenied(_)
        ));
    }

    #[test]
    fn classify_missing_device_message() {
        let err = hidapi::HidError::HidApiError {
            message: "No such device".into(),
        };
        assert!(matches!(
            classify_open_error("/dev/hidraw1", &err),
            Error::DeviceNotFound(_)
        ));
    }

    #[test]
    fn classify_io_error_by_kind() {
        let denied = hidapi::HidError::IoError {
            error: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(matches!(
            classify_open_error("/dev/hidraw1", &denied),
            Error::PermissionDenied(_)
        ));

        let missing = hidapi::HidError::IoError {
            error: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(matches!(
            classify_open_error("/dev/hidraw1", &missing),
            Error::DeviceNotFound(_)
        ));
    }

    #[test]
    fn classify_other_message_as_generic() {
        let err = hidapi::HidError::HidApiError {
            message: "Input/output error".into(),
        };
        assert!(matches!(
            classify_open_error("/dev/hidraw1", &err),
            Error::Hid(_)
        ));
    }
}
