//! Shared driver state and the outbound update cycle.
//!
//! The three output resources live behind individual locks so a thread
//! repainting the display never waits on one updating the key lights.
//! One thread owns the [`UsbConnection`](crate::port::UsbConnection) and
//! calls [`flush`](DeviceState::flush); any thread may mutate the
//! resources.

use crate::display::Display;
use crate::lights::{ButtonLights, KeyLights};
use crate::port::OutputPort;
use hidapi::HidResult;
use std::sync::Mutex;

/// Init report sent once after the device was opened.
const INIT_REPORT: [u8; 3] = [0xa0, 0x00, 0x00];

pub struct DeviceState {
    pub display: Mutex<Display>,
    pub button_lights: Mutex<ButtonLights>,
    pub key_lights: Mutex<KeyLights>,
}

impl DeviceState {
    pub fn new(num_keys: usize) -> Self {
        Self {
            display: Mutex::new(Display::new()),
            button_lights: Mutex::new(ButtonLights::new()),
            key_lights: Mutex::new(KeyLights::new(num_keys)),
        }
    }

    /// Puts the display controller into report mode.
    pub fn send_init(&self, port: &impl OutputPort) -> HidResult<()> {
        port.send_report(&INIT_REPORT)
    }

    /// Writes every output resource that changed since its last
    /// transmission. Unchanged resources cause no bus traffic.
    pub fn flush(&self, port: &impl OutputPort) -> HidResult<()> {
        self.display.lock().unwrap().flush(port)?;
        self.button_lights.lock().unwrap().write(port)?;
        self.key_lights.lock().unwrap().write(port)?;
        Ok(())
    }

    /// Best-effort teardown: blanks the display and all LEDs the driver
    /// knows about. Transport errors are logged, not propagated, so
    /// shutdown always completes.
    pub fn shutdown(&self, port: &impl OutputPort) {
        self.display.lock().unwrap().clear();
        self.button_lights.lock().unwrap().clear();
        self.key_lights.lock().unwrap().clear();
        if let Err(e) = self.flush(port) {
            log::warn!("final LED blanking failed: {e}");
        }
    }
}
