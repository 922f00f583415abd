//! Output seam towards the HID transport.
//!
//! Everything that renders packets writes through [`OutputPort`], so the
//! rendering and diffing code can be exercised against a recording mock.
//! [`UsbConnection`] is the hidapi-backed implementation. When the device
//! cannot be opened it degrades to a disconnected stub whose reads return
//! nothing and whose writes succeed without touching hardware, keeping the
//! surrounding application alive.

use hidapi::{HidApi, HidResult};

/// Sink for complete output reports (report ID first).
pub trait OutputPort {
    fn send_report(&self, data: &[u8]) -> HidResult<()>;
}

pub struct UsbConnection {
    device: Option<hidapi::HidDevice>,
}

impl UsbConnection {
    /// Opens the device with the given VID/PID. Failure to open is logged
    /// and yields the disconnected stub instead of an error.
    pub fn open(api: &HidApi, vendor_id: u16, product_id: u16) -> Self {
        match api.open(vendor_id, product_id) {
            Ok(device) => {
                if let Err(e) = device.set_blocking_mode(false) {
                    log::warn!("could not set non-blocking mode: {e}");
                }
                Self { device: Some(device) }
            }
            Err(e) => {
                log::warn!(
                    "no device {vendor_id:04x}:{product_id:04x} ({e}), continuing disconnected"
                );
                Self { device: None }
            }
        }
    }

    /// A connection that was never backed by hardware.
    pub fn disconnected() -> Self {
        Self { device: None }
    }

    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    /// Reads one input report. Returns 0 on timeout and when disconnected.
    pub fn read_timeout(&self, buf: &mut [u8], timeout_ms: i32) -> HidResult<usize> {
        match &self.device {
            Some(device) => device.read_timeout(buf, timeout_ms),
            None => Ok(0),
        }
    }

    /// Drops the HID handle. Further writes become no-ops.
    pub fn close(&mut self) {
        self.device = None;
    }
}

impl OutputPort for UsbConnection {
    fn send_report(&self, data: &[u8]) -> HidResult<()> {
        match &self.device {
            Some(device) => device.write(data).map(|_| ()),
            None => Ok(()),
        }
    }
}
