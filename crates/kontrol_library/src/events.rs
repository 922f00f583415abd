//! Decoded input events, consumed by the host through a channel.

use crate::controls::Button;

/// One decoded change from an input report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KontrolEvent {
    /// A button or touch sensor changed state.
    Button { button: Button, pressed: bool },
    /// The main encoder moved one step.
    MainEncoder { increased: bool },
    /// A value encoder moved. `delta` is already quantized to detents.
    Encoder { index: usize, delta: i32 },
    /// The keyboard was transposed. `first_note` is the MIDI note now
    /// mapped to the lowest physical key.
    Octave { first_note: u8 },
}
